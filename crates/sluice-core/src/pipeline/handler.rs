use std::any::Any;
use std::borrow::Cow;
use std::net::SocketAddr;

use crate::error::CoreError;
use crate::message::PipelineMessage;
use crate::promise::ChannelPromise;

use super::context::HandlerContext;
use super::mask::EventMask;

/// 沿管线广播的用户事件载体。
pub type UserEvent = Box<dyn Any + Send + 'static>;

/// Handler 自描述元数据：展示标签、处理集合与共享性。
///
/// # 契约说明（What）
/// - `label`：用于默认命名（`label#0`）与日志标注；
/// - `events`：声明处理的事件集合，上下文据此构造跳过位图；
/// - `sharable`：声明可共享的 Handler 才允许同时挂载在多个位置。
#[derive(Clone, Debug)]
pub struct HandlerDescriptor {
    label: Cow<'static, str>,
    events: EventMask,
    sharable: bool,
}

impl HandlerDescriptor {
    /// 以标签与处理集合构造描述符。
    pub fn new(label: impl Into<Cow<'static, str>>, events: EventMask) -> Self {
        Self {
            label: label.into(),
            events,
            sharable: false,
        }
    }

    /// 声明该 Handler 可共享（可同时出现在多个位置/多条管线）。
    pub fn sharable(mut self) -> Self {
        self.sharable = true;
        self
    }

    /// 展示标签。
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 处理的事件集合。
    pub fn events(&self) -> EventMask {
        self.events
    }

    /// 是否可共享。
    pub fn is_sharable(&self) -> bool {
        self.sharable
    }
}

/// 管线阶段的统一回调契约。
///
/// # 设计背景（Why）
/// - 入站、出站与生命周期回调收敛在一个对象安全 Trait 上，单个 Handler
///   可按需实现任意子集；未声明的事件在传播中被直接跳过，没有动态分派
///   开销。
/// - 默认方法体一律转发给下一个（入站）或上一个（出站）阶段，覆写即拦截。
///
/// # 契约说明（What）
/// - 所有回调都在上下文绑定的执行器上串行调用，不得阻塞，耗时逻辑应
///   移交执行器异步完成。
/// - 事件回调返回 `Err` 时：入站与无句柄的出站事件转换为下一个上下文的
///   `exception_caught` 事件；带句柄的出站事件以失败完结其 `promise`。
/// - `handler_added` 在任何事件回调之前调用；`handler_removed` 之后
///   不会再有事件抵达本 Handler。
///
/// # 风险提示（Trade-offs）
/// - 请避免在回调内长期持有 `HandlerContext` 的引用；需要跨事件保存时
///   应当克隆所需的 `Arc` 资源。
pub trait ChannelHandler: Send + Sync + 'static {
    /// 返回自描述元数据；挂载时被定格为上下文的跳过位图。
    fn descriptor(&self) -> HandlerDescriptor;

    /// 挂载完成。
    fn handler_added(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    /// 移除完成。
    fn handler_removed(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    /// 通道注册到事件循环。
    fn channel_registered(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.fire_channel_registered();
        Ok(())
    }

    /// 通道从事件循环注销。
    fn channel_unregistered(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.fire_channel_unregistered();
        Ok(())
    }

    /// 通道变为活跃。
    fn channel_active(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.fire_channel_active();
        Ok(())
    }

    /// 通道不再活跃。
    fn channel_inactive(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.fire_channel_inactive();
        Ok(())
    }

    /// 读到一条入站消息。
    fn channel_read(&self, ctx: &HandlerContext, msg: PipelineMessage) -> Result<(), CoreError> {
        ctx.fire_channel_read(msg);
        Ok(())
    }

    /// 一轮读取结束。
    fn channel_read_complete(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.fire_channel_read_complete();
        Ok(())
    }

    /// 用户事件。
    fn user_event(&self, ctx: &HandlerContext, event: UserEvent) -> Result<(), CoreError> {
        ctx.fire_user_event(event);
        Ok(())
    }

    /// 可写性变化。
    fn writability_changed(
        &self,
        ctx: &HandlerContext,
        is_writable: bool,
    ) -> Result<(), CoreError> {
        ctx.fire_writability_changed(is_writable);
        Ok(())
    }

    /// 异常事件。
    fn exception_caught(&self, ctx: &HandlerContext, error: CoreError) -> Result<(), CoreError> {
        ctx.fire_exception_caught(error);
        Ok(())
    }

    /// 出站：绑定本地地址。
    fn bind(
        &self,
        ctx: &HandlerContext,
        local: SocketAddr,
        promise: ChannelPromise,
    ) -> Result<(), CoreError> {
        ctx.bind(local, promise);
        Ok(())
    }

    /// 出站：发起连接。
    fn connect(
        &self,
        ctx: &HandlerContext,
        remote: SocketAddr,
        local: Option<SocketAddr>,
        promise: ChannelPromise,
    ) -> Result<(), CoreError> {
        ctx.connect(remote, local, promise);
        Ok(())
    }

    /// 出站：断开连接。
    fn disconnect(&self, ctx: &HandlerContext, promise: ChannelPromise) -> Result<(), CoreError> {
        ctx.disconnect(promise);
        Ok(())
    }

    /// 出站：关闭通道。
    fn close(&self, ctx: &HandlerContext, promise: ChannelPromise) -> Result<(), CoreError> {
        ctx.close(promise);
        Ok(())
    }

    /// 出站：从事件循环注销。
    fn deregister(&self, ctx: &HandlerContext, promise: ChannelPromise) -> Result<(), CoreError> {
        ctx.deregister(promise);
        Ok(())
    }

    /// 出站：请求读取。
    fn read(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.read();
        Ok(())
    }

    /// 出站：写消息。
    fn write(
        &self,
        ctx: &HandlerContext,
        msg: PipelineMessage,
        promise: ChannelPromise,
    ) -> Result<(), CoreError> {
        ctx.write(msg, promise);
        Ok(())
    }

    /// 出站：冲刷。
    fn flush(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
        ctx.flush();
        Ok(())
    }
}

impl std::fmt::Debug for dyn ChannelHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandler")
            .field("label", &self.descriptor().label())
            .finish()
    }
}
