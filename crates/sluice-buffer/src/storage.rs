use alloc::vec;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::BufferError;

/// 所有视图共享的底层存储块：一段连续字节加一枚原子引用计数。
///
/// # 设计背景（Why）
/// - 切片、复制视图与根缓冲必须观察到同一份字节：任何视图的写入要立即对
///   其余视图可见，因此存储只能有一份，视图各自携带 `offset/length` 窗口。
/// - 引用计数由调用方显式 `retain`/`release` 驱动（而非依赖 `Drop`），
///   计数归零后内容被主动归还，其后的内容访问一律失败。
///
/// # 解析逻辑（How）
/// - 字节通过 `UnsafeCell<Vec<u8>>` 持有；所有读写都经由裸指针完成，
///   从不同时物化两个可变切片，避免别名冲突。
/// - 计数更新使用原子 CAS 循环：`retain` 拒绝从 0 复活，`release` 拒绝下溢。
///
/// # 契约说明（What）
/// - 内容的并发可变访问不由本类型保证：缓冲跨线程移交需要外部同步，
///   这是缓冲层的调度模型约定；只有计数本身是线程安全的。
/// - 计数归零时字节被替换为空 `Vec`，内存立即归还分配器；存储块结构体
///   本身由 `Arc` 在最后一个视图消失时回收。
pub(crate) struct SharedStorage {
    bytes: UnsafeCell<Vec<u8>>,
    refs: AtomicUsize,
}

// SAFETY: 字节内容的可变访问遵循"单线程写、跨线程需移交"的缓冲调度模型，
// 结构体内部从不并发构造可变引用；引用计数为原子类型。在该契约下跨线程
// 传递与共享引用均不会引入数据竞争。
unsafe impl Send for SharedStorage {}
unsafe impl Sync for SharedStorage {}

impl SharedStorage {
    /// 分配一块全零的存储，计数从 1 起步。
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bytes: UnsafeCell::new(vec![0; capacity]),
            refs: AtomicUsize::new(1),
        }
    }

    /// 当前后备长度。
    pub(crate) fn len(&self) -> usize {
        unsafe { (*self.bytes.get()).len() }
    }

    /// 当前引用计数；0 表示已释放。
    pub(crate) fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }

    /// 计数加一；已释放的存储不可复活。
    pub(crate) fn retain(&self) -> Result<(), BufferError> {
        self.refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == 0 { None } else { Some(current + 1) }
            })
            .map(|_| ())
            .map_err(|_| BufferError::Released)
    }

    /// 计数减一；返回 `true` 表示本次释放触达 0 并已归还字节。
    pub(crate) fn release(&self) -> Result<bool, BufferError> {
        let previous = self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == 0 { None } else { Some(current - 1) }
            })
            .map_err(|_| BufferError::RefCountUnderflow)?;
        if previous == 1 {
            // 最后一个持有者负责把字节归还给分配器；存储块壳体留给 Arc 收尾。
            unsafe {
                *self.bytes.get() = Vec::new();
            }
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// 读取单个字节。
    ///
    /// # 前置条件
    /// - 调用方已完成边界与存活检查，`offset < len()`。
    pub(crate) fn byte_at(&self, offset: usize) -> u8 {
        unsafe { *(*self.bytes.get()).as_ptr().add(offset) }
    }

    /// 把 `[offset, offset + dst.len())` 拷贝到目标切片。
    pub(crate) fn copy_to(&self, offset: usize, dst: &mut [u8]) {
        unsafe {
            ptr::copy_nonoverlapping(
                (*self.bytes.get()).as_ptr().add(offset),
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
    }

    /// 把源切片写入 `[offset, offset + src.len())`。
    pub(crate) fn copy_from(&self, offset: usize, src: &[u8]) {
        unsafe {
            ptr::copy_nonoverlapping(
                src.as_ptr(),
                (*self.bytes.get()).as_mut_ptr().add(offset),
                src.len(),
            );
        }
    }

    /// 存储内部搬移，区间允许重叠（压缩路径使用）。
    pub(crate) fn copy_within(&self, src: usize, dst: usize, len: usize) {
        unsafe {
            let base = (*self.bytes.get()).as_mut_ptr();
            ptr::copy(base.add(src), base.add(dst), len);
        }
    }

    /// 以 8/4/1 字节步长清零一段区间。
    ///
    /// 宽步长写入摊薄长区间的清零成本，尾部降级为逐字节补齐。
    pub(crate) fn fill_zero(&self, offset: usize, len: usize) {
        unsafe {
            let base = (*self.bytes.get()).as_mut_ptr().add(offset);
            let mut written = 0;
            while len - written >= 8 {
                ptr::write_unaligned(base.add(written).cast::<u64>(), 0);
                written += 8;
            }
            if len - written >= 4 {
                ptr::write_unaligned(base.add(written).cast::<u32>(), 0);
                written += 4;
            }
            while written < len {
                *base.add(written) = 0;
                written += 1;
            }
        }
    }

    /// 把后备长度增长到 `new_len`，新增区间填零。
    ///
    /// # 前置条件
    /// - 仅允许根缓冲或复制视图在独占变更窗口内调用；`new_len >= len()`。
    pub(crate) fn grow_to(&self, new_len: usize) {
        unsafe {
            (*self.bytes.get()).resize(new_len, 0);
        }
    }
}
