use alloc::sync::Arc;

use crate::byte_buf::ByteBuf;
use crate::error::BufferError;

/// 缓冲容量上限：索引契约以 31 位寻址为边界，超长缓冲不在支持范围内。
pub const MAX_CAPACITY: usize = i32::MAX as usize;

/// 容量归一化的分界线：低于 4 MiB 按二倍增长，高于则按 4 MiB 线性步进。
///
/// 倍增在小容量段把扩容次数压到对数级；大容量段切换为线性步进，
/// 避免一次倍增浪费多达一半的内存。
const CALCULATE_THRESHOLD: usize = 4 * 1024 * 1024;

/// 缓冲分配协作方：创建缓冲并裁决扩容后的新容量。
///
/// # 契约说明（What）
/// - `calculate_new_capacity` 必须是纯函数：相同输入产生相同输出；
///   返回值满足 `min_required <= r <= max_capacity`，同等条件下取最小合规值。
/// - `buffer` 返回游标归零、计数为 1 的新缓冲。
///
/// # 风险提示（Trade-offs）
/// - 扩容策略直接影响热路径的搬移次数与内存峰值，替换实现时应以
///   基准数据佐证，不建议在单个进程内混用多种策略。
pub trait BufAllocator: Send + Sync + 'static {
    /// 创建 `(initial_capacity, max_capacity)` 的新缓冲。
    fn buffer(&self, initial_capacity: usize, max_capacity: usize) -> Result<ByteBuf, BufferError>;

    /// 给定最小需求与容量上限，裁决扩容后的目标容量。
    fn calculate_new_capacity(
        &self,
        min_required: usize,
        max_capacity: usize,
    ) -> Result<usize, BufferError>;
}

/// 默认堆分配器。
///
/// # 解析逻辑（How）
/// - 小于阈值：从 64 字节起二倍归一化到恰好覆盖需求的 2 的幂；
/// - 达到阈值：按 4 MiB 对齐向下取整后加一个步进，贴近上限时直接取上限。
#[derive(Debug, Default, Clone, Copy)]
pub struct HeapAllocator;

impl BufAllocator for HeapAllocator {
    fn buffer(&self, initial_capacity: usize, max_capacity: usize) -> Result<ByteBuf, BufferError> {
        if max_capacity > MAX_CAPACITY || initial_capacity > max_capacity {
            return Err(BufferError::Capacity {
                required: initial_capacity,
                max_capacity,
            });
        }
        Ok(ByteBuf::fresh(
            Arc::new(HeapAllocator),
            initial_capacity,
            max_capacity,
        ))
    }

    fn calculate_new_capacity(
        &self,
        min_required: usize,
        max_capacity: usize,
    ) -> Result<usize, BufferError> {
        if min_required > max_capacity {
            return Err(BufferError::Capacity {
                required: min_required,
                max_capacity,
            });
        }
        if min_required == CALCULATE_THRESHOLD {
            return Ok(CALCULATE_THRESHOLD);
        }

        if min_required > CALCULATE_THRESHOLD {
            // 线性段：按阈值对齐取整再前进一个步进，越过上限则收敛到上限。
            let aligned = min_required / CALCULATE_THRESHOLD * CALCULATE_THRESHOLD;
            let grown = if aligned > max_capacity - CALCULATE_THRESHOLD {
                max_capacity
            } else {
                aligned + CALCULATE_THRESHOLD
            };
            return Ok(grown);
        }

        // 倍增段：64 起步归一化到 2 的幂。
        let mut normalized = 64usize;
        while normalized < min_required {
            normalized <<= 1;
        }
        Ok(normalized.min(max_capacity))
    }
}
