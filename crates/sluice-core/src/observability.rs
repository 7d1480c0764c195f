use crate::error::CoreError;

/// 对象安全的日志接口。
///
/// # 设计背景（Why）
/// - 桥接管线核心与宿主的日志实现，允许对接 `tracing`、`log` 或自研系统；
///   核心自身不绑定任何日志后端。
///
/// # 契约说明（What）
/// - 所有方法需线程安全且快速返回；日志格式由实现决定。
/// - 管线在尾哨兵诊断与生命周期失败路径上通过该接口输出。
///
/// # 风险提示（Trade-offs）
/// - 高频调用需注意内部缓冲开销，建议实现者批量输出或节流。
pub trait Logger: Send + Sync + 'static {
    /// 输出 DEBUG 级别日志。
    fn debug(&self, message: &str);
    /// 输出 INFO 级别日志。
    fn info(&self, message: &str);
    /// 输出 WARN 级别日志。
    fn warn(&self, message: &str);
    /// 输出 ERROR 级别日志。
    fn error(&self, message: &str, error: Option<&CoreError>);
}

/// 丢弃一切输出的日志桩，供测试与最小化装配使用。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str, _error: Option<&CoreError>) {}
}
