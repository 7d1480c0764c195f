use std::net::SocketAddr;
use std::sync::Arc;

use crate::message::PipelineMessage;
use crate::promise::ChannelPromise;
use crate::runtime::EventExecutor;

/// 通道协作方：管线对底层连接的全部所见。
///
/// # 设计背景（Why）
/// - 管线不拥有套接字，只关心三件事：通道是否已注册到事件循环、是否仍
///   打开（注销且关闭时触发管线销毁）、以及哨兵终端要委托的传输操作面。
///
/// # 契约说明（What）
/// - `event_loop` 返回通道绑定的事件循环执行器；哨兵事件固定在其上派发。
/// - `is_registered` / `is_open` 必须可在任意线程读取。
pub trait Channel: Send + Sync + 'static {
    /// 通道是否已注册到事件循环。
    fn is_registered(&self) -> bool;

    /// 通道是否仍处于打开状态。
    fn is_open(&self) -> bool;

    /// 通道绑定的事件循环执行器。
    fn event_loop(&self) -> Arc<dyn EventExecutor>;

    /// 头哨兵委托的传输操作面。
    fn transport(&self) -> Arc<dyn Transport>;
}

/// 传输协作方：出站事件走完管线后的终端。
///
/// # 契约说明（What）
/// - 每个带 `promise` 的操作由传输方以成功或失败完结句柄；
/// - `deregister` 永远经由事件循环提交执行，头哨兵不会内联调用它，
///   实现方无需再做二次跳转；
/// - `begin_read` / `flush` 为即发即忘。
///
/// # 风险提示（Trade-offs）
/// - 传输实现不得在这些回调里同步走回管线的结构化接口，否则会与
///   调用方持有的管线互斥量相互等待。
pub trait Transport: Send + Sync + 'static {
    /// 绑定本地地址。
    fn bind(&self, local: SocketAddr, promise: ChannelPromise);

    /// 发起连接。
    fn connect(&self, remote: SocketAddr, local: Option<SocketAddr>, promise: ChannelPromise);

    /// 断开连接。
    fn disconnect(&self, promise: ChannelPromise);

    /// 关闭通道。
    fn close(&self, promise: ChannelPromise);

    /// 从事件循环注销。
    fn deregister(&self, promise: ChannelPromise);

    /// 请求传输层开始读取。
    fn begin_read(&self);

    /// 写出一条消息。
    fn write(&self, msg: PipelineMessage, promise: ChannelPromise);

    /// 冲刷已写出的消息。
    fn flush(&self);
}
