use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use sluice_buffer::BufferError;

/// 管线核心跨层共享的稳定错误域。
///
/// # 设计背景（Why）
/// - 结构化操作、事件回调与生命周期钩子在不同层次产生的故障需要合流为
///   统一的错误码，日志与上层容错策略才能按码值精确分派。
/// - 错误码 `code` 始终为 `'static` 字符串，承载稳定语义；`message` 面向
///   排障人员；`cause` 以装箱形式保留底层根因链。
///
/// # 契约说明（What）
/// - **前置条件**：调用方使用 [`codes`] 模块或遵循 `<域>.<语义>` 约定的
///   自定义码值。
/// - **后置条件**：返回的错误拥有独立所有权，可安全跨线程移动；除非显式
///   调用 `with_cause`，错误不含底层原因。
#[derive(Debug)]
pub struct CoreError {
    code: &'static str,
    message: Cow<'static, str>,
    cause: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl CoreError {
    /// 构造核心错误。
    pub fn new(code: &'static str, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    /// 附带底层原因并返回新的错误。
    pub fn with_cause(mut self, cause: impl Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// 获取稳定错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// 获取描述。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 获取底层原因。
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_ref()
            .map(|boxed| boxed.as_ref() as &(dyn Error + 'static))
    }
}

impl From<BufferError> for CoreError {
    fn from(error: BufferError) -> Self {
        let code = match &error {
            BufferError::Index { .. } => codes::BUFFER_INDEX,
            BufferError::Capacity { .. } => codes::BUFFER_CAPACITY,
            BufferError::Released => codes::BUFFER_RELEASED,
            BufferError::RefCountUnderflow => codes::BUFFER_UNDERFLOW,
        };
        CoreError::new(code, error.to_string()).with_cause(error)
    }
}

/// 稳定错误码清单，命名遵循 `<域>.<语义>` 约定。
///
/// 新增码值需同步更新相关测试与排障文档，避免命名漂移。
pub mod codes {
    /// 结构化添加时名称冲突。
    pub const PIPELINE_DUPLICATE_NAME: &str = "pipeline.duplicate_name";
    /// 按名称/实例检索不到上下文。
    pub const PIPELINE_NOT_FOUND: &str = "pipeline.not_found";
    /// 不可共享的 Handler 被重复挂载。
    pub const PIPELINE_REJECTED: &str = "pipeline.rejected";
    /// `handler_added` / `handler_removed` 等生命周期钩子失败。
    pub const PIPELINE_LIFECYCLE: &str = "pipeline.lifecycle";
    /// 事件回调内的 Handler 运行期错误。
    pub const PIPELINE_HANDLER: &str = "pipeline.handler";
    /// 入站消息未经处理抵达尾哨兵。
    pub const PIPELINE_UNHANDLED_INBOUND: &str = "pipeline.unhandled_inbound";
    /// 执行器已关停，任务被拒绝。
    pub const EXECUTOR_SHUTDOWN: &str = "executor.shutdown";
    /// 跨执行器任务执行失败。
    pub const EXECUTOR_TASK: &str = "executor.task";
    /// 缓冲索引越界。
    pub const BUFFER_INDEX: &str = "buffer.index";
    /// 缓冲扩容超出上限。
    pub const BUFFER_CAPACITY: &str = "buffer.capacity";
    /// 访问已释放的缓冲。
    pub const BUFFER_RELEASED: &str = "buffer.released";
    /// 缓冲引用计数下溢。
    pub const BUFFER_UNDERFLOW: &str = "buffer.underflow";
}
