use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::channel::Channel;
use crate::error::{CoreError, codes};
use crate::message::PipelineMessage;
use crate::observability::Logger;
use crate::promise::ChannelPromise;
use crate::runtime::EventExecutor;

use super::handler::{ChannelHandler, UserEvent};
use super::mask::EventMask;
use super::pipeline::{ChannelPipeline, PipelineShared};

/// 上下文生命周期：已入链、钩子未跑。
const STATE_ADDED: u8 = 0;
/// 生命周期：`handler_added` 已在归属执行器上完成。
const STATE_LIVE: u8 = 1;
/// 生命周期：已出链，等待 `handler_removed`。
const STATE_PENDING_REMOVE: u8 = 2;
/// 生命周期：终态，不再接收事件，也不会被重新入链。
const STATE_REMOVED: u8 = 3;

/// 链表指针对。前向为强引用、后向为弱引用，避免双向环导致整条链泄漏。
struct Links {
    prev: Weak<HandlerContext>,
    next: Option<Arc<HandlerContext>>,
}

/// 管线对单个 Handler 的包装：名字、执行器绑定、跳过位图与链表指针。
///
/// # 设计背景（Why）
/// - 事件沿侵入式双向链表逐级传播；每一跳先按位图找到下一个确实处理
///   该事件的上下文，再在其归属执行器上派发——发起线程已在目标循环内
///   则内联执行，否则入队。
/// - 结构化变更（移除/替换）只改邻居的指针，被摘除节点自己的指针保持
///   指向链上（替换时指向替身），因此进行中的事件行走可以无缝越过它。
///
/// # 契约说明（What）
/// - `fire_*` 系列向尾方向继续传播入站事件；`bind`/`write` 等向头方向
///   传播出站事件。
/// - 同一上下文上的事件投递是全序的：它们都串行于该上下文的归属执行器。
pub struct HandlerContext {
    name: String,
    handler: Arc<dyn ChannelHandler>,
    events: EventMask,
    bound_executor: Option<Arc<dyn EventExecutor>>,
    channel: Arc<dyn Channel>,
    pipeline: Weak<PipelineShared>,
    links: RwLock<Links>,
    state: AtomicU8,
}

impl HandlerContext {
    /// 构造上下文；跳过位图在此一次性定格。
    pub(crate) fn new(
        name: String,
        handler: Arc<dyn ChannelHandler>,
        bound_executor: Option<Arc<dyn EventExecutor>>,
        channel: Arc<dyn Channel>,
        pipeline: Weak<PipelineShared>,
    ) -> Arc<Self> {
        let events = handler.descriptor().events();
        Arc::new(Self {
            name,
            handler,
            events,
            bound_executor,
            channel,
            pipeline,
            links: RwLock::new(Links {
                prev: Weak::new(),
                next: None,
            }),
            state: AtomicU8::new(STATE_ADDED),
        })
    }

    /// 上下文名称，在同一条管线内唯一。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 被包装的 Handler。
    pub fn handler(&self) -> &Arc<dyn ChannelHandler> {
        &self.handler
    }

    /// 所属通道。
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// 归属执行器：挂载时绑定的亲和执行器，否则为通道的事件循环。
    pub fn executor(&self) -> Arc<dyn EventExecutor> {
        self.bound_executor
            .clone()
            .unwrap_or_else(|| self.channel.event_loop())
    }

    /// 所属管线；管线已销毁时返回 `None`。
    pub fn pipeline(&self) -> Option<ChannelPipeline> {
        self.pipeline.upgrade().map(ChannelPipeline::from_shared)
    }

    pub(crate) fn bound_executor(&self) -> Option<Arc<dyn EventExecutor>> {
        self.bound_executor.clone()
    }

    pub(crate) fn handles(&self, mask: EventMask) -> bool {
        self.events.intersects(mask)
    }

    pub(crate) fn next(&self) -> Option<Arc<HandlerContext>> {
        self.links.read().next.clone()
    }

    pub(crate) fn prev(&self) -> Option<Arc<HandlerContext>> {
        self.links.read().prev.upgrade()
    }

    pub(crate) fn set_next(&self, next: Option<Arc<HandlerContext>>) {
        self.links.write().next = next;
    }

    pub(crate) fn set_prev(&self, prev: Weak<HandlerContext>) {
        self.links.write().prev = prev;
    }

    pub(crate) fn mark_live(&self) {
        let _ = self.state.compare_exchange(
            STATE_ADDED,
            STATE_LIVE,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// 尝试进入待移除态；已在移除流程中则返回 `false`，防止重复摘除。
    pub(crate) fn try_mark_pending_remove(&self) -> bool {
        loop {
            let current = self.state.load(Ordering::Acquire);
            if current == STATE_PENDING_REMOVE || current == STATE_REMOVED {
                return false;
            }
            if self
                .state
                .compare_exchange(
                    current,
                    STATE_PENDING_REMOVE,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return true;
            }
        }
    }

    pub(crate) fn mark_removed(&self) {
        self.state.store(STATE_REMOVED, Ordering::Release);
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_REMOVED
    }

    fn logger(&self) -> Option<Arc<dyn Logger>> {
        self.pipeline.upgrade().map(|shared| shared.logger())
    }

    /// 自本上下文向尾方向找到下一个处理该事件的上下文。
    fn find_next(&self, mask: EventMask) -> Option<Arc<HandlerContext>> {
        let mut cursor = self.next();
        while let Some(ctx) = cursor {
            if ctx.handles(mask) {
                return Some(ctx);
            }
            cursor = ctx.next();
        }
        None
    }

    /// 自本上下文向头方向找到上一个处理该事件的上下文。
    fn find_prev(&self, mask: EventMask) -> Option<Arc<HandlerContext>> {
        let mut cursor = self.prev();
        while let Some(ctx) = cursor {
            if ctx.handles(mask) {
                return Some(ctx);
            }
            cursor = ctx.prev();
        }
        None
    }

    /// 在目标上下文的归属执行器上运行回调：循环内内联，循环外入队。
    fn dispatch<F>(ctx: &Arc<HandlerContext>, run: F)
    where
        F: FnOnce(&Arc<HandlerContext>) + Send + 'static,
    {
        let executor = ctx.executor();
        if executor.in_event_loop() {
            run(ctx);
        } else {
            let target = Arc::clone(ctx);
            executor.execute(Box::new(move || run(&target)));
        }
    }

    /// 入站回调失败的统一转换：在下一个上下文上触发异常事件。
    fn notify_handler_error(&self, error: CoreError) {
        self.fire_exception_caught(
            CoreError::new(codes::PIPELINE_HANDLER, format!("{} 的事件回调失败", self.name))
                .with_cause(error),
        );
    }

    /// 继续向尾方向传播：通道注册。
    pub fn fire_channel_registered(&self) {
        if let Some(next) = self.find_next(EventMask::CHANNEL_REGISTERED) {
            Self::dispatch(&next, |ctx| {
                if ctx.is_removed() {
                    ctx.fire_channel_registered();
                    return;
                }
                if let Err(error) = ctx.handler.channel_registered(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：通道注销。
    pub fn fire_channel_unregistered(&self) {
        if let Some(next) = self.find_next(EventMask::CHANNEL_UNREGISTERED) {
            Self::dispatch(&next, |ctx| {
                if ctx.is_removed() {
                    ctx.fire_channel_unregistered();
                    return;
                }
                if let Err(error) = ctx.handler.channel_unregistered(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：通道活跃。
    pub fn fire_channel_active(&self) {
        if let Some(next) = self.find_next(EventMask::CHANNEL_ACTIVE) {
            Self::dispatch(&next, |ctx| {
                if ctx.is_removed() {
                    ctx.fire_channel_active();
                    return;
                }
                if let Err(error) = ctx.handler.channel_active(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：通道失活。
    pub fn fire_channel_inactive(&self) {
        if let Some(next) = self.find_next(EventMask::CHANNEL_INACTIVE) {
            Self::dispatch(&next, |ctx| {
                if ctx.is_removed() {
                    ctx.fire_channel_inactive();
                    return;
                }
                if let Err(error) = ctx.handler.channel_inactive(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：读到消息。
    pub fn fire_channel_read(&self, msg: PipelineMessage) {
        if let Some(next) = self.find_next(EventMask::CHANNEL_READ) {
            Self::dispatch(&next, move |ctx| {
                if ctx.is_removed() {
                    ctx.fire_channel_read(msg);
                    return;
                }
                if let Err(error) = ctx.handler.channel_read(ctx, msg) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：一轮读取完成。
    pub fn fire_channel_read_complete(&self) {
        if let Some(next) = self.find_next(EventMask::CHANNEL_READ_COMPLETE) {
            Self::dispatch(&next, |ctx| {
                if ctx.is_removed() {
                    ctx.fire_channel_read_complete();
                    return;
                }
                if let Err(error) = ctx.handler.channel_read_complete(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：用户事件。
    pub fn fire_user_event(&self, event: UserEvent) {
        if let Some(next) = self.find_next(EventMask::USER_EVENT) {
            Self::dispatch(&next, move |ctx| {
                if ctx.is_removed() {
                    ctx.fire_user_event(event);
                    return;
                }
                if let Err(error) = ctx.handler.user_event(ctx, event) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：可写性变化。
    pub fn fire_writability_changed(&self, is_writable: bool) {
        if let Some(next) = self.find_next(EventMask::WRITABILITY_CHANGED) {
            Self::dispatch(&next, move |ctx| {
                if ctx.is_removed() {
                    ctx.fire_writability_changed(is_writable);
                    return;
                }
                if let Err(error) = ctx.handler.writability_changed(ctx, is_writable) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 继续向尾方向传播：异常事件。
    ///
    /// 异常回调自身再失败时只记日志，不再递归转换，避免风暴。
    pub fn fire_exception_caught(&self, error: CoreError) {
        if let Some(next) = self.find_next(EventMask::EXCEPTION_CAUGHT) {
            Self::dispatch(&next, move |ctx| {
                if ctx.is_removed() {
                    ctx.fire_exception_caught(error);
                    return;
                }
                if let Err(secondary) = ctx.handler.exception_caught(ctx, error) {
                    if let Some(logger) = ctx.logger() {
                        logger.warn(&format!(
                            "{} 的 exception_caught 回调自身失败：{secondary}",
                            ctx.name
                        ));
                    }
                }
            });
        }
    }

    /// 向头方向传播：绑定本地地址。
    pub fn bind(&self, local: SocketAddr, promise: ChannelPromise) {
        if let Some(prev) = self.find_prev(EventMask::BIND) {
            Self::dispatch(&prev, move |ctx| {
                if ctx.is_removed() {
                    ctx.bind(local, promise);
                    return;
                }
                if let Err(error) = ctx.handler.bind(ctx, local, promise.clone()) {
                    promise.try_failure(error);
                }
            });
        }
    }

    /// 向头方向传播：发起连接。
    pub fn connect(&self, remote: SocketAddr, local: Option<SocketAddr>, promise: ChannelPromise) {
        if let Some(prev) = self.find_prev(EventMask::CONNECT) {
            Self::dispatch(&prev, move |ctx| {
                if ctx.is_removed() {
                    ctx.connect(remote, local, promise);
                    return;
                }
                if let Err(error) = ctx.handler.connect(ctx, remote, local, promise.clone()) {
                    promise.try_failure(error);
                }
            });
        }
    }

    /// 向头方向传播：断开连接。
    pub fn disconnect(&self, promise: ChannelPromise) {
        if let Some(prev) = self.find_prev(EventMask::DISCONNECT) {
            Self::dispatch(&prev, move |ctx| {
                if ctx.is_removed() {
                    ctx.disconnect(promise);
                    return;
                }
                if let Err(error) = ctx.handler.disconnect(ctx, promise.clone()) {
                    promise.try_failure(error);
                }
            });
        }
    }

    /// 向头方向传播：关闭通道。
    pub fn close(&self, promise: ChannelPromise) {
        if let Some(prev) = self.find_prev(EventMask::CLOSE) {
            Self::dispatch(&prev, move |ctx| {
                if ctx.is_removed() {
                    ctx.close(promise);
                    return;
                }
                if let Err(error) = ctx.handler.close(ctx, promise.clone()) {
                    promise.try_failure(error);
                }
            });
        }
    }

    /// 向头方向传播：从事件循环注销。
    pub fn deregister(&self, promise: ChannelPromise) {
        if let Some(prev) = self.find_prev(EventMask::DEREGISTER) {
            Self::dispatch(&prev, move |ctx| {
                if ctx.is_removed() {
                    ctx.deregister(promise);
                    return;
                }
                if let Err(error) = ctx.handler.deregister(ctx, promise.clone()) {
                    promise.try_failure(error);
                }
            });
        }
    }

    /// 向头方向传播：读请求。
    pub fn read(&self) {
        if let Some(prev) = self.find_prev(EventMask::READ) {
            Self::dispatch(&prev, |ctx| {
                if ctx.is_removed() {
                    ctx.read();
                    return;
                }
                if let Err(error) = ctx.handler.read(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 向头方向传播：写消息。
    pub fn write(&self, msg: PipelineMessage, promise: ChannelPromise) {
        if let Some(prev) = self.find_prev(EventMask::WRITE) {
            Self::dispatch(&prev, move |ctx| {
                if ctx.is_removed() {
                    ctx.write(msg, promise);
                    return;
                }
                if let Err(error) = ctx.handler.write(ctx, msg, promise.clone()) {
                    promise.try_failure(error);
                }
            });
        }
    }

    /// 向头方向传播：冲刷。
    pub fn flush(&self) {
        if let Some(prev) = self.find_prev(EventMask::FLUSH) {
            Self::dispatch(&prev, |ctx| {
                if ctx.is_removed() {
                    ctx.flush();
                    return;
                }
                if let Err(error) = ctx.handler.flush(ctx) {
                    ctx.notify_handler_error(error);
                }
            });
        }
    }

    /// 写后立即冲刷的便捷入口。
    pub fn write_and_flush(&self, msg: PipelineMessage) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.write(msg, promise.clone());
        self.flush();
        promise
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("name", &self.name)
            .field("state", &self.state.load(Ordering::Acquire))
            .finish()
    }
}
