#![deny(unsafe_code)]
#![doc = "sluice-core: 事件驱动网络框架的管线核心契约与默认实现。"]
#![doc = ""]
#![doc = "== 调度模型 =="]
#![doc = "每条通道绑定一个事件循环执行器，哨兵事件固定在其上派发；"]
#![doc = "个别上下文可在挂载时绑定亲和执行器。结构化变更由管线级互斥量"]
#![doc = "守护，跨执行器的生命周期回调在锁内提交、锁外等待。"]
#![doc = ""]
#![doc = "== 依赖边界 =="]
#![doc = "套接字驱动、选择器循环与线程池实现均为外部协作方，仅以"]
#![doc = "`Channel`/`Transport`/`EventExecutor` 契约接入；本 crate 不含"]
#![doc = "任何 I/O。阻塞等待使用 `parking_lot` 原语，因此要求 `std`。"]

mod channel;
mod error;
mod message;
mod observability;
mod pipeline;
mod promise;
mod runtime;
pub mod test_stubs;

pub use channel::{Channel, Transport};
pub use error::{CoreError, codes};
pub use message::PipelineMessage;
pub use observability::{Logger, NoopLogger};
pub use pipeline::{
    ChannelHandler, ChannelPipeline, EventMask, HandlerContext, HandlerDescriptor, UserEvent,
};
pub use promise::ChannelPromise;
pub use runtime::{EventExecutor, EventExecutorGroup, Task, TaskCompletion};

pub use sluice_buffer::{BufAllocator, BufferError, ByteBuf, HeapAllocator, SwappedBuf, WritableCheck};
