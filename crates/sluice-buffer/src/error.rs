use thiserror::Error;

/// 缓冲操作的统一错误类型。
///
/// # 设计背景（Why）
/// - 缓冲核心的失败模式是有限且稳定的：越界、容量耗尽、已释放、引用计数下溢；
///   以枚举形式暴露可以让上层按变体精确分派容错策略，而无需解析字符串。
/// - 所有错误路径都满足"失败前不改状态"：任何返回 `Err` 的操作都不会移动游标、
///   不会触碰底层存储。
///
/// # 契约说明（What）
/// - `Index`：索引或区间越过了可寻址窗口；`capacity` 表示本次访问允许的上界
///   （定位访问为视图容量，顺序读取为当前写游标）。
/// - `Capacity`：扩容请求超出 `max_capacity`，缓冲保持原容量。
/// - `Released`：引用计数已归零，内容访问被拒绝。
/// - `RefCountUnderflow`：对计数为零的缓冲再次 `release`。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// 索引或长度越界。
    #[error("index out of bounds: index {index}, length {length}, accessible {capacity}")]
    Index {
        /// 访问起点。
        index: usize,
        /// 访问长度。
        length: usize,
        /// 本次访问允许的上界。
        capacity: usize,
    },
    /// 扩容会超出最大容量。
    #[error("cannot grow buffer: required capacity {required} exceeds max capacity {max_capacity}")]
    Capacity {
        /// 满足本次写入所需的总容量。
        required: usize,
        /// 缓冲允许的容量上限。
        max_capacity: usize,
    },
    /// 缓冲已被释放（ref_count = 0）。
    #[error("buffer was released (ref_count = 0)")]
    Released,
    /// 释放次数超过持有次数。
    #[error("release underflow: ref_count is already 0")]
    RefCountUnderflow,
}
