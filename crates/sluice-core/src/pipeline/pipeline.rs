use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::channel::Channel;
use crate::error::{CoreError, codes};
use crate::message::PipelineMessage;
use crate::observability::Logger;
use crate::promise::ChannelPromise;
use crate::runtime::EventExecutorGroup;

use super::context::HandlerContext;
use super::handler::{ChannelHandler, UserEvent};
use super::mask::EventMask;

/// 结构化互斥量守护的共享态：名字到上下文的索引。
///
/// 链表指针与索引在同一把锁下变更，任何同步出口处两者保持一致。
type NameIndex = HashMap<String, Arc<HandlerContext>>;

/// 不可共享 Handler 的进程级占用清单。
///
/// 与原始语义一致：占用一经登记便不因移除而解除（"不可重复挂载或移除"）。
/// 清单存放弱引用，实例销毁后条目在下次检查时被顺手清理，避免地址复用
/// 造成误判。
static CLAIMED_HANDLERS: spin::Mutex<Vec<Weak<dyn ChannelHandler>>> =
    spin::Mutex::new(Vec::new());

fn check_multiplicity(handler: &Arc<dyn ChannelHandler>) -> Result<(), CoreError> {
    let descriptor = handler.descriptor();
    if descriptor.is_sharable() {
        return Ok(());
    }
    let probe = Arc::downgrade(handler);
    let mut claimed = CLAIMED_HANDLERS.lock();
    claimed.retain(|entry| entry.strong_count() > 0);
    if claimed.iter().any(|entry| entry.ptr_eq(&probe)) {
        return Err(CoreError::new(
            codes::PIPELINE_REJECTED,
            format!(
                "{} 未声明可共享，不允许重复挂载或在移除后再次挂载",
                descriptor.label()
            ),
        ));
    }
    claimed.push(probe);
    Ok(())
}

/// 头哨兵 Handler：出站事件的终端，委托传输协作方落地。
struct HeadHandler {
    channel: Arc<dyn Channel>,
}

impl ChannelHandler for HeadHandler {
    fn descriptor(&self) -> super::handler::HandlerDescriptor {
        super::handler::HandlerDescriptor::new("head", EventMask::ALL_OUTBOUND).sharable()
    }

    fn bind(
        &self,
        _ctx: &HandlerContext,
        local: SocketAddr,
        promise: ChannelPromise,
    ) -> Result<(), CoreError> {
        self.channel.transport().bind(local, promise);
        Ok(())
    }

    fn connect(
        &self,
        _ctx: &HandlerContext,
        remote: SocketAddr,
        local: Option<SocketAddr>,
        promise: ChannelPromise,
    ) -> Result<(), CoreError> {
        self.channel.transport().connect(remote, local, promise);
        Ok(())
    }

    fn disconnect(&self, _ctx: &HandlerContext, promise: ChannelPromise) -> Result<(), CoreError> {
        self.channel.transport().disconnect(promise);
        Ok(())
    }

    fn close(&self, _ctx: &HandlerContext, promise: ChannelPromise) -> Result<(), CoreError> {
        self.channel.transport().close(promise);
        Ok(())
    }

    /// 注销必须经由事件循环提交，不得在循环暂停收新任务的窗口内内联执行。
    fn deregister(&self, _ctx: &HandlerContext, promise: ChannelPromise) -> Result<(), CoreError> {
        let transport = self.channel.transport();
        self.channel
            .event_loop()
            .execute(Box::new(move || transport.deregister(promise)));
        Ok(())
    }

    fn read(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        self.channel.transport().begin_read();
        Ok(())
    }

    fn write(
        &self,
        _ctx: &HandlerContext,
        msg: PipelineMessage,
        promise: ChannelPromise,
    ) -> Result<(), CoreError> {
        self.channel.transport().write(msg, promise);
        Ok(())
    }

    fn flush(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        self.channel.transport().flush();
        Ok(())
    }
}

/// 尾哨兵 Handler：入站事件的终点，兜底释放与诊断。
struct TailHandler {
    logger: Arc<dyn Logger>,
}

impl ChannelHandler for TailHandler {
    fn descriptor(&self) -> super::handler::HandlerDescriptor {
        super::handler::HandlerDescriptor::new("tail", EventMask::ALL_INBOUND).sharable()
    }

    fn channel_registered(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    fn channel_unregistered(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    fn channel_active(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    fn channel_inactive(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    /// 未经处理抵达尾部的消息在此释放并留诊断，提醒检查管线装配。
    fn channel_read(&self, _ctx: &HandlerContext, msg: PipelineMessage) -> Result<(), CoreError> {
        self.logger.debug(&format!(
            "入站消息 {msg:?} 未经处理抵达管线尾部，请检查管线配置"
        ));
        if let Err(error) = msg.release() {
            self.logger
                .warn(&format!("释放尾部兜底消息失败：{error}"));
        }
        Ok(())
    }

    fn channel_read_complete(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        Ok(())
    }

    fn user_event(&self, _ctx: &HandlerContext, _event: UserEvent) -> Result<(), CoreError> {
        Ok(())
    }

    fn writability_changed(
        &self,
        _ctx: &HandlerContext,
        _is_writable: bool,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn exception_caught(&self, _ctx: &HandlerContext, error: CoreError) -> Result<(), CoreError> {
        self.logger.warn(&format!(
            "exception_caught 事件未经处理抵达管线尾部，通常意味着最后一个 Handler 未处理异常：{error}"
        ));
        Ok(())
    }
}

/// 管线共享核心：哨兵、通道、日志器与结构化互斥量。
///
/// # 并发模型（Why/How）
/// - 结构化操作（增删改）全部在可重入互斥量下进行，覆盖链表指针与名字
///   索引；事件传播不取这把锁，靠上下文各自的指针读取原子地看到"旧节点
///   或新节点之一"。
/// - 需要跨执行器执行的生命周期回调在锁内提交、锁外等待；持锁等待会与
///   执行器上并发的管线任务互相卡死，这一反转是正确性的关键。
pub(crate) struct PipelineShared {
    channel: Arc<dyn Channel>,
    logger: Arc<dyn Logger>,
    head: Arc<HandlerContext>,
    tail: Arc<HandlerContext>,
    sync: ReentrantMutex<RefCell<NameIndex>>,
    self_ref: Weak<PipelineShared>,
}

impl PipelineShared {
    pub(crate) fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    fn self_arc(&self) -> Arc<PipelineShared> {
        self.self_ref
            .upgrade()
            .expect("PipelineShared 的自引用在构造时注册，存续期内必然可升级")
    }

    /// 解析显式名字或按 `标签#序号` 生成不冲突的默认名。
    fn filter_name(
        &self,
        index: &NameIndex,
        name: Option<&str>,
        handler: &Arc<dyn ChannelHandler>,
    ) -> Result<String, CoreError> {
        match name {
            Some(explicit) => {
                if index.contains_key(explicit) {
                    return Err(CoreError::new(
                        codes::PIPELINE_DUPLICATE_NAME,
                        format!("名称 {explicit} 已被占用"),
                    ));
                }
                Ok(explicit.to_string())
            }
            None => {
                let label = handler.descriptor().label().to_string();
                let mut candidate = format!("{label}#0");
                let mut sequence = 1usize;
                while index.contains_key(&candidate) {
                    candidate = format!("{label}#{sequence}");
                    sequence += 1;
                }
                Ok(candidate)
            }
        }
    }

    fn new_context(
        &self,
        name: String,
        handler: Arc<dyn ChannelHandler>,
        group: Option<&dyn EventExecutorGroup>,
    ) -> Arc<HandlerContext> {
        HandlerContext::new(
            name,
            handler,
            group.map(|g| g.next()),
            Arc::clone(&self.channel),
            self.self_ref.clone(),
        )
    }

    /// 在 `anchor` 之后插入 `ctx`；调用方必须持有结构化互斥量。
    fn link_after(anchor: &Arc<HandlerContext>, ctx: &Arc<HandlerContext>) {
        let next = anchor.next().expect("哨兵之间的节点必有后继");
        ctx.set_prev(Arc::downgrade(anchor));
        ctx.set_next(Some(next.clone()));
        anchor.set_next(Some(ctx.clone()));
        next.set_prev(Arc::downgrade(ctx));
    }

    /// 在 `anchor` 之前插入 `ctx`；调用方必须持有结构化互斥量。
    fn link_before(anchor: &Arc<HandlerContext>, ctx: &Arc<HandlerContext>) {
        let prev = anchor.prev().expect("哨兵之间的节点必有前驱");
        ctx.set_prev(Arc::downgrade(&prev));
        ctx.set_next(Some(anchor.clone()));
        prev.set_next(Some(ctx.clone()));
        anchor.set_prev(Arc::downgrade(ctx));
    }

    /// 结构化添加的公共路径。`position` 解析出插入锚点与方向。
    fn add(
        &self,
        group: Option<&dyn EventExecutorGroup>,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
        position: Position,
    ) -> Result<(), CoreError> {
        let guard = self.sync.lock();
        let ctx = {
            let mut index = guard.borrow_mut();
            // 先解析锚点与名字，再登记共享性占用：任何失败路径都不应留下占用。
            let anchor = match &position {
                Position::First | Position::Last => None,
                Position::Before(base) | Position::After(base) => {
                    Some(index.get(base.as_str()).cloned().ok_or_else(|| {
                        CoreError::new(
                            codes::PIPELINE_NOT_FOUND,
                            format!("基准上下文 {base} 不存在"),
                        )
                    })?)
                }
            };
            let resolved = self.filter_name(&index, name, &handler)?;
            check_multiplicity(&handler)?;
            let ctx = self.new_context(resolved.clone(), handler, group);
            match (&position, anchor) {
                (Position::First, _) => Self::link_after(&self.head, &ctx),
                (Position::Last, _) => Self::link_before(&self.tail, &ctx),
                (Position::Before(_), Some(anchor)) => Self::link_before(&anchor, &ctx),
                (Position::After(_), Some(anchor)) => Self::link_after(&anchor, &ctx),
                _ => unreachable!("锚点在上方已随位置解析"),
            }
            index.insert(resolved, ctx.clone());
            ctx
        };
        self.call_handler_added(&ctx);
        drop(guard);
        Ok(())
    }

    /// 挂载完成钩子：未注册或已在归属循环内则内联，否则异步投递。
    fn call_handler_added(&self, ctx: &Arc<HandlerContext>) {
        if !ctx.handles(EventMask::HANDLER_ADDED) {
            ctx.mark_live();
            return;
        }
        if self.channel.is_registered() && !ctx.executor().in_event_loop() {
            let shared = self.self_arc();
            let target = Arc::clone(ctx);
            ctx.executor()
                .execute(Box::new(move || shared.call_handler_added0(&target)));
            return;
        }
        self.call_handler_added0(ctx);
    }

    /// 挂载钩子失败时移除该上下文并转换为异常事件；移除也失败则加重诊断。
    fn call_handler_added0(&self, ctx: &Arc<HandlerContext>) {
        match ctx.handler().handler_added(ctx) {
            Ok(()) => ctx.mark_live(),
            Err(cause) => {
                let removed = self.remove_ctx(ctx).is_ok();
                let message = if removed {
                    format!("{} 的 handler_added 失败，该 Handler 已被移除", ctx.name())
                } else {
                    format!(
                        "{} 的 handler_added 失败，且随后的移除也未成功",
                        ctx.name()
                    )
                };
                self.head.fire_exception_caught(
                    CoreError::new(codes::PIPELINE_LIFECYCLE, message).with_cause(cause),
                );
            }
        }
    }

    /// 按上下文移除：在锁内决定内联或提交，在锁外等待跨执行器完成。
    fn remove_ctx(&self, ctx: &Arc<HandlerContext>) -> Result<(), CoreError> {
        let completion = {
            let guard = self.sync.lock();
            if !self.channel.is_registered() || ctx.executor().in_event_loop() {
                self.remove0(ctx, &guard);
                return Ok(());
            }
            let shared = self.self_arc();
            let target = Arc::clone(ctx);
            let completion = ctx.executor().submit(Box::new(move || {
                let guard = shared.sync.lock();
                shared.remove0(&target, &guard);
                drop(guard);
            }));
            drop(guard);
            completion
        };
        completion.wait().map_err(|error| {
            CoreError::new(
                codes::EXECUTOR_TASK,
                format!("跨执行器移除任务失败：{error}"),
            )
        })
    }

    /// 摘链 + 索引清理 + 移除钩子；幂等，重复调用直接返回。
    fn remove0(&self, ctx: &Arc<HandlerContext>, guard: &ReentrantMutexGuard<'_, RefCell<NameIndex>>) {
        if !ctx.try_mark_pending_remove() {
            return;
        }
        {
            let mut index = guard.borrow_mut();
            if let (Some(prev), Some(next)) = (ctx.prev(), ctx.next()) {
                prev.set_next(Some(next.clone()));
                next.set_prev(Arc::downgrade(&prev));
            }
            // 被摘除节点保留自己的指针，进行中的事件行走据此越过它。
            index.remove(ctx.name());
        }
        self.call_handler_removed(ctx);
    }

    fn call_handler_removed(&self, ctx: &Arc<HandlerContext>) {
        if !ctx.handles(EventMask::HANDLER_REMOVED) {
            ctx.mark_removed();
            return;
        }
        if self.channel.is_registered() && !ctx.executor().in_event_loop() {
            let shared = self.self_arc();
            let target = Arc::clone(ctx);
            ctx.executor()
                .execute(Box::new(move || shared.call_handler_removed0(&target)));
            return;
        }
        self.call_handler_removed0(ctx);
    }

    fn call_handler_removed0(&self, ctx: &Arc<HandlerContext>) {
        let outcome = ctx.handler().handler_removed(ctx);
        ctx.mark_removed();
        if let Err(cause) = outcome {
            self.head.fire_exception_caught(
                CoreError::new(
                    codes::PIPELINE_LIFECYCLE,
                    format!("{} 的 handler_removed 失败", ctx.name()),
                )
                .with_cause(cause),
            );
        }
    }

    /// 原子替换：替身入链并完成挂载钩子之后，旧者才出链并走移除钩子。
    fn replace_ctx(
        &self,
        old: &Arc<HandlerContext>,
        new_name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<Arc<dyn ChannelHandler>, CoreError> {
        let completion = {
            let guard = self.sync.lock();
            let new_ctx = {
                let index = guard.borrow();
                let resolved = match new_name {
                    None => old.name().to_string(),
                    Some(name) if name == old.name() => name.to_string(),
                    Some(name) => {
                        if index.contains_key(name) {
                            return Err(CoreError::new(
                                codes::PIPELINE_DUPLICATE_NAME,
                                format!("名称 {name} 已被占用"),
                            ));
                        }
                        name.to_string()
                    }
                };
                check_multiplicity(&handler)?;
                HandlerContext::new(
                    resolved,
                    handler,
                    old.bound_executor(),
                    Arc::clone(&self.channel),
                    self.self_ref.clone(),
                )
            };
            if !self.channel.is_registered() || new_ctx.executor().in_event_loop() {
                self.replace0(old, &new_ctx, &guard);
                return Ok(Arc::clone(old.handler()));
            }
            let shared = self.self_arc();
            let old_ctx = Arc::clone(old);
            let completion = new_ctx.executor().submit(Box::new(move || {
                let guard = shared.sync.lock();
                shared.replace0(&old_ctx, &new_ctx, &guard);
                drop(guard);
            }));
            drop(guard);
            completion
        };
        completion.wait().map_err(|error| {
            CoreError::new(
                codes::EXECUTOR_TASK,
                format!("跨执行器替换任务失败：{error}"),
            )
        })?;
        Ok(Arc::clone(old.handler()))
    }

    fn replace0(
        &self,
        old: &Arc<HandlerContext>,
        new_ctx: &Arc<HandlerContext>,
        guard: &ReentrantMutexGuard<'_, RefCell<NameIndex>>,
    ) {
        {
            let mut index = guard.borrow_mut();
            let prev = old.prev().expect("被替换节点必有前驱");
            let next = old.next().expect("被替换节点必有后继");
            new_ctx.set_prev(Arc::downgrade(&prev));
            new_ctx.set_next(Some(next.clone()));
            prev.set_next(Some(new_ctx.clone()));
            next.set_prev(Arc::downgrade(new_ctx));
            if old.name() != new_ctx.name() {
                index.remove(old.name());
            }
            index.insert(new_ctx.name().to_string(), new_ctx.clone());
            // 旧节点的指针改指替身，缓存了旧引用的事件行走会路由到新节点。
            old.set_prev(Arc::downgrade(new_ctx));
            old.set_next(Some(new_ctx.clone()));
            old.try_mark_pending_remove();
        }
        // 先完成替身的挂载钩子，再触发旧者的移除钩子。
        self.call_handler_added(new_ctx);
        self.call_handler_removed(old);
    }

    /// 按名检索（仅用户上下文）。
    fn context_by_name(&self, name: &str) -> Option<Arc<HandlerContext>> {
        let guard = self.sync.lock();
        let found = guard.borrow().get(name).cloned();
        drop(guard);
        found
    }

    /// 按 Handler 实例检索。
    fn context_by_handler(&self, handler: &Arc<dyn ChannelHandler>) -> Option<Arc<HandlerContext>> {
        let mut cursor = self.head.next();
        while let Some(ctx) = cursor {
            if Arc::ptr_eq(ctx.handler(), handler) {
                return Some(ctx);
            }
            if Arc::ptr_eq(&ctx, &self.tail) {
                return None;
            }
            cursor = ctx.next();
        }
        None
    }

    fn user_contexts(&self) -> Vec<Arc<HandlerContext>> {
        let mut contexts = Vec::new();
        let mut cursor = self.head.next();
        while let Some(ctx) = cursor {
            if Arc::ptr_eq(&ctx, &self.tail) {
                break;
            }
            cursor = ctx.next();
            contexts.push(ctx);
        }
        contexts
    }

    /// 管线销毁：先顺向走到尾部排空在途事件，再逆向逐个摘除。
    ///
    /// 两段行走都按上下文的归属执行器跳转，保证任何 Handler 都不会在
    /// 自己的 `handler_removed` 之后再收到事件。
    pub(crate) fn destroy(&self) {
        let start = self.head.next().expect("头哨兵必有后继");
        self.destroy_up(start);
    }

    fn destroy_up(&self, mut ctx: Arc<HandlerContext>) {
        loop {
            if Arc::ptr_eq(&ctx, &self.tail) {
                let last = self.tail.prev().expect("尾哨兵必有前驱");
                self.destroy_down(last);
                return;
            }
            let executor = ctx.executor();
            if !executor.in_event_loop() {
                let shared = self.self_arc();
                let resume = Arc::clone(&ctx);
                executor.execute(Box::new(move || shared.destroy_up(resume)));
                return;
            }
            let Some(next) = ctx.next() else { return };
            ctx = next;
        }
    }

    fn destroy_down(&self, mut ctx: Arc<HandlerContext>) {
        loop {
            if Arc::ptr_eq(&ctx, &self.head) {
                return;
            }
            let executor = ctx.executor();
            if executor.in_event_loop() {
                let guard = self.sync.lock();
                self.remove0(&ctx, &guard);
                drop(guard);
            } else {
                let shared = self.self_arc();
                let resume = Arc::clone(&ctx);
                executor.execute(Box::new(move || shared.destroy_down(resume)));
                return;
            }
            let Some(prev) = ctx.prev() else { return };
            ctx = prev;
        }
    }
}

/// 插入位置。
enum Position {
    First,
    Last,
    Before(String),
    After(String),
}

/// 通道级事件管线：哨兵夹持的有序 Handler 链。
///
/// # 设计背景（Why）
/// - 入站事件自头向尾、出站事件自尾向头穿过全部阶段，协议编解码与业务
///   逻辑以阶段的形式组合；头哨兵把出站事件落到传输协作方，尾哨兵兜底
///   未处理的入站消息与异常。
///
/// # 契约说明（What）
/// - 结构化操作对调用方同步：返回即表示链表与名字索引已一致变更，
///   生命周期钩子已按归属执行器完成或投递。
/// - 单通道单管线上的事件在每个上下文处全序；跨管线不作任何约定。
#[derive(Clone)]
pub struct ChannelPipeline {
    shared: Arc<PipelineShared>,
}

impl ChannelPipeline {
    /// 以通道与日志器装配一条空管线（只含头尾哨兵）。
    pub fn new(channel: Arc<dyn Channel>, logger: Arc<dyn Logger>) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<PipelineShared>| {
            let head_handler: Arc<dyn ChannelHandler> = Arc::new(HeadHandler {
                channel: Arc::clone(&channel),
            });
            let tail_handler: Arc<dyn ChannelHandler> = Arc::new(TailHandler {
                logger: Arc::clone(&logger),
            });
            let head = HandlerContext::new(
                "head".to_string(),
                head_handler,
                None,
                Arc::clone(&channel),
                weak.clone(),
            );
            let tail = HandlerContext::new(
                "tail".to_string(),
                tail_handler,
                None,
                Arc::clone(&channel),
                weak.clone(),
            );
            head.set_next(Some(Arc::clone(&tail)));
            tail.set_prev(Arc::downgrade(&head));
            head.mark_live();
            tail.mark_live();
            PipelineShared {
                channel,
                logger,
                head,
                tail,
                sync: ReentrantMutex::new(RefCell::new(HashMap::new())),
                self_ref: weak.clone(),
            }
        });
        Self { shared }
    }

    pub(crate) fn from_shared(shared: Arc<PipelineShared>) -> Self {
        Self { shared }
    }

    /// 所属通道。
    pub fn channel(&self) -> &Arc<dyn Channel> {
        &self.shared.channel
    }

    /// 在链首添加 Handler。`name` 为空时按 `标签#序号` 生成。
    pub fn add_first(
        &self,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared.add(None, name, handler, Position::First)
    }

    /// 在链首添加并绑定亲和执行器。
    pub fn add_first_bound(
        &self,
        group: &dyn EventExecutorGroup,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared.add(Some(group), name, handler, Position::First)
    }

    /// 在链尾添加 Handler。
    pub fn add_last(
        &self,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared.add(None, name, handler, Position::Last)
    }

    /// 在链尾添加并绑定亲和执行器。
    pub fn add_last_bound(
        &self,
        group: &dyn EventExecutorGroup,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared.add(Some(group), name, handler, Position::Last)
    }

    /// 在基准上下文之前添加。
    pub fn add_before(
        &self,
        base: &str,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared
            .add(None, name, handler, Position::Before(base.to_string()))
    }

    /// 在基准上下文之前添加并绑定亲和执行器。
    pub fn add_before_bound(
        &self,
        group: &dyn EventExecutorGroup,
        base: &str,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared
            .add(Some(group), name, handler, Position::Before(base.to_string()))
    }

    /// 在基准上下文之后添加。
    pub fn add_after(
        &self,
        base: &str,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared
            .add(None, name, handler, Position::After(base.to_string()))
    }

    /// 在基准上下文之后添加并绑定亲和执行器。
    pub fn add_after_bound(
        &self,
        group: &dyn EventExecutorGroup,
        base: &str,
        name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<(), CoreError> {
        self.shared
            .add(Some(group), name, handler, Position::After(base.to_string()))
    }

    /// 按名移除，返回被移除的 Handler。
    pub fn remove(&self, name: &str) -> Result<Arc<dyn ChannelHandler>, CoreError> {
        let ctx = self.shared.context_by_name(name).ok_or_else(|| {
            CoreError::new(codes::PIPELINE_NOT_FOUND, format!("上下文 {name} 不存在"))
        })?;
        self.shared.remove_ctx(&ctx)?;
        Ok(Arc::clone(ctx.handler()))
    }

    /// 按实例移除。
    pub fn remove_handler(&self, handler: &Arc<dyn ChannelHandler>) -> Result<(), CoreError> {
        let ctx = self.shared.context_by_handler(handler).ok_or_else(|| {
            CoreError::new(codes::PIPELINE_NOT_FOUND, "目标 Handler 不在本管线中")
        })?;
        self.shared.remove_ctx(&ctx)
    }

    /// 移除第一个用户 Handler。
    pub fn remove_first(&self) -> Result<Arc<dyn ChannelHandler>, CoreError> {
        let ctx = self.first_context().ok_or_else(|| {
            CoreError::new(codes::PIPELINE_NOT_FOUND, "管线中没有用户 Handler")
        })?;
        self.shared.remove_ctx(&ctx)?;
        Ok(Arc::clone(ctx.handler()))
    }

    /// 移除最后一个用户 Handler。
    pub fn remove_last(&self) -> Result<Arc<dyn ChannelHandler>, CoreError> {
        let ctx = self.last_context().ok_or_else(|| {
            CoreError::new(codes::PIPELINE_NOT_FOUND, "管线中没有用户 Handler")
        })?;
        self.shared.remove_ctx(&ctx)?;
        Ok(Arc::clone(ctx.handler()))
    }

    /// 原子替换：链序保持，替身的挂载钩子先于旧者的移除钩子。
    pub fn replace(
        &self,
        old_name: &str,
        new_name: Option<&str>,
        handler: Arc<dyn ChannelHandler>,
    ) -> Result<Arc<dyn ChannelHandler>, CoreError> {
        let ctx = self.shared.context_by_name(old_name).ok_or_else(|| {
            CoreError::new(
                codes::PIPELINE_NOT_FOUND,
                format!("上下文 {old_name} 不存在"),
            )
        })?;
        self.shared.replace_ctx(&ctx, new_name, handler)
    }

    /// 第一个用户 Handler。
    pub fn first(&self) -> Option<Arc<dyn ChannelHandler>> {
        self.first_context().map(|ctx| Arc::clone(ctx.handler()))
    }

    /// 最后一个用户 Handler。
    pub fn last(&self) -> Option<Arc<dyn ChannelHandler>> {
        self.last_context().map(|ctx| Arc::clone(ctx.handler()))
    }

    /// 第一个用户上下文。
    pub fn first_context(&self) -> Option<Arc<HandlerContext>> {
        let next = self.shared.head.next()?;
        if Arc::ptr_eq(&next, &self.shared.tail) {
            None
        } else {
            Some(next)
        }
    }

    /// 最后一个用户上下文。
    pub fn last_context(&self) -> Option<Arc<HandlerContext>> {
        let prev = self.shared.tail.prev()?;
        if Arc::ptr_eq(&prev, &self.shared.head) {
            None
        } else {
            Some(prev)
        }
    }

    /// 按名取 Handler。
    pub fn get(&self, name: &str) -> Option<Arc<dyn ChannelHandler>> {
        self.context(name).map(|ctx| Arc::clone(ctx.handler()))
    }

    /// 按名取上下文。
    pub fn context(&self, name: &str) -> Option<Arc<HandlerContext>> {
        self.shared.context_by_name(name)
    }

    /// 按 Handler 实例取上下文。
    pub fn context_of(&self, handler: &Arc<dyn ChannelHandler>) -> Option<Arc<HandlerContext>> {
        self.shared.context_by_handler(handler)
    }

    /// 链序名字清单。
    pub fn names(&self) -> Vec<String> {
        self.shared
            .user_contexts()
            .iter()
            .map(|ctx| ctx.name().to_string())
            .collect()
    }

    /// 链序的 `(名字, Handler)` 对。
    pub fn to_map(&self) -> Vec<(String, Arc<dyn ChannelHandler>)> {
        self.shared
            .user_contexts()
            .iter()
            .map(|ctx| (ctx.name().to_string(), Arc::clone(ctx.handler())))
            .collect()
    }

    /// 入站：通道注册。
    pub fn fire_channel_registered(&self) {
        self.shared.head.fire_channel_registered();
    }

    /// 入站：通道注销；通道已关闭时顺带销毁管线。
    pub fn fire_channel_unregistered(&self) {
        self.shared.head.fire_channel_unregistered();
        if !self.shared.channel.is_open() {
            self.shared.destroy();
        }
    }

    /// 入站：通道活跃。
    pub fn fire_channel_active(&self) {
        self.shared.head.fire_channel_active();
    }

    /// 入站：通道失活。
    pub fn fire_channel_inactive(&self) {
        self.shared.head.fire_channel_inactive();
    }

    /// 入站：注入一条读到的消息。
    pub fn fire_channel_read(&self, msg: PipelineMessage) {
        self.shared.head.fire_channel_read(msg);
    }

    /// 入站：一轮读取完成。
    pub fn fire_channel_read_complete(&self) {
        self.shared.head.fire_channel_read_complete();
    }

    /// 入站：广播用户事件。
    pub fn fire_user_event(&self, event: UserEvent) {
        self.shared.head.fire_user_event(event);
    }

    /// 入站：可写性变化。
    pub fn fire_writability_changed(&self, is_writable: bool) {
        self.shared.head.fire_writability_changed(is_writable);
    }

    /// 入站：注入异常事件。
    pub fn fire_exception_caught(&self, error: CoreError) {
        self.shared.head.fire_exception_caught(error);
    }

    /// 出站：绑定本地地址。
    pub fn bind(&self, local: SocketAddr) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.shared.tail.bind(local, promise.clone());
        promise
    }

    /// 出站：发起连接。
    pub fn connect(&self, remote: SocketAddr, local: Option<SocketAddr>) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.shared.tail.connect(remote, local, promise.clone());
        promise
    }

    /// 出站：断开连接。
    pub fn disconnect(&self) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.shared.tail.disconnect(promise.clone());
        promise
    }

    /// 出站：关闭通道。
    pub fn close(&self) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.shared.tail.close(promise.clone());
        promise
    }

    /// 出站：从事件循环注销。
    pub fn deregister(&self) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.shared.tail.deregister(promise.clone());
        promise
    }

    /// 出站：请求传输层开始读取。
    pub fn read(&self) {
        self.shared.tail.read();
    }

    /// 出站：写消息。
    pub fn write(&self, msg: PipelineMessage) -> ChannelPromise {
        let promise = ChannelPromise::new();
        self.shared.tail.write(msg, promise.clone());
        promise
    }

    /// 出站：以既有句柄写消息。
    pub fn write_with(&self, msg: PipelineMessage, promise: ChannelPromise) {
        self.shared.tail.write(msg, promise);
    }

    /// 出站：冲刷。
    pub fn flush(&self) {
        self.shared.tail.flush();
    }

    /// 出站：写后立即冲刷。
    pub fn write_and_flush(&self, msg: PipelineMessage) -> ChannelPromise {
        let promise = self.write(msg);
        self.flush();
        promise
    }
}

impl fmt::Debug for ChannelPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stages = f.debug_list();
        for ctx in self.shared.user_contexts() {
            stages.entry(&ctx.name());
        }
        stages.finish()
    }
}
