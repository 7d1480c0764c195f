#![cfg_attr(not(feature = "std"), no_std)]
#![doc = "sluice-buffer: 双游标、引用计数、可动态扩容的字节缓冲核心。"]
#![doc = ""]
#![doc = "缓冲是管线数据面的最底层载体：传输层读到的字节先落入缓冲，"]
#![doc = "再以入站事件的形式沿管线传播；切片与复制视图共享同一后备存储，"]
#![doc = "编解码阶段无需复制即可圈定子区间。生命周期由显式 retain/release"]
#![doc = "驱动，跨执行器传递时由最后一个持有者归还内存。"]

extern crate alloc;

mod allocator;
mod byte_buf;
mod error;
mod storage;
mod swapped;

pub use allocator::{BufAllocator, HeapAllocator, MAX_CAPACITY};
pub use byte_buf::{ByteBuf, WritableCheck};
pub use error::BufferError;
pub use swapped::SwappedBuf;
