//! `lifecycle_contract` 集成测试：聚焦执行器亲和与跨线程生命周期协调。
//!
//! # 测试总览（Why）
//! - 绑定亲和执行器的上下文，其事件与生命周期回调必须落在该执行器的
//!   循环线程上；
//! - 结构化移除从外部线程发起时，调用方在管线互斥量之外等待回调完成，
//!   返回即表示 `handler_removed` 已经执行；
//! - 任何 Handler 在自己的 `handler_removed` 之后不得再收到事件。

use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use sluice_core::test_stubs::{LoopExecutor, SingleExecutorGroup, StubChannel};
use sluice_core::{
    BufAllocator, ChannelHandler, ChannelPipeline, CoreError, EventExecutor, EventMask,
    HandlerContext, HandlerDescriptor, HeapAllocator, NoopLogger, PipelineMessage,
};

/// 记录事件与所在线程的探针。
#[derive(Default)]
struct ThreadTrace {
    entries: Mutex<Vec<(String, ThreadId)>>,
}

impl ThreadTrace {
    fn push(&self, entry: impl Into<String>) {
        self.entries
            .lock()
            .push((entry.into(), thread::current().id()));
    }

    fn take(&self) -> Vec<(String, ThreadId)> {
        self.entries.lock().drain(..).collect()
    }
}

struct AffinityProbe {
    tag: &'static str,
    trace: Arc<ThreadTrace>,
}

impl AffinityProbe {
    fn new(tag: &'static str, trace: &Arc<ThreadTrace>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            trace: Arc::clone(trace),
        })
    }
}

impl ChannelHandler for AffinityProbe {
    fn descriptor(&self) -> HandlerDescriptor {
        HandlerDescriptor::new(
            self.tag,
            EventMask::CHANNEL_READ | EventMask::HANDLER_ADDED | EventMask::HANDLER_REMOVED,
        )
    }

    fn handler_added(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        self.trace.push(format!("{}.added", self.tag));
        Ok(())
    }

    fn handler_removed(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
        self.trace.push(format!("{}.removed", self.tag));
        Ok(())
    }

    fn channel_read(&self, ctx: &HandlerContext, msg: PipelineMessage) -> Result<(), CoreError> {
        self.trace.push(format!("{}.read", self.tag));
        ctx.fire_channel_read(msg);
        Ok(())
    }
}

/// 把循环队列排空：提交空任务并等待其完成。
fn flush(executor: &Arc<LoopExecutor>) {
    let executor: Arc<dyn EventExecutor> = executor.clone();
    executor
        .submit(Box::new(|| {}))
        .wait()
        .expect("冲刷任务应成功");
}

fn sample_message() -> PipelineMessage {
    let mut buf = HeapAllocator.buffer(8, 8).expect("分配应成功");
    buf.write_u8(42).expect("填充");
    PipelineMessage::Bytes(buf)
}

/// 亲和上下文的挂载钩子与事件都落在绑定执行器的循环线程上。
#[test]
fn bound_context_runs_lifecycle_and_events_on_its_loop() {
    let event_loop = LoopExecutor::new();
    let affinity_loop = LoopExecutor::new();
    let affinity_thread = {
        let probe: Arc<dyn EventExecutor> = affinity_loop.clone();
        let holder = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&holder);
        probe
            .submit(Box::new(move || {
                *sink.lock() = Some(thread::current().id());
            }))
            .wait()
            .expect("探测任务");
        holder.lock().take().expect("循环线程 ID")
    };

    let channel = StubChannel::new(event_loop.clone());
    let pipeline = ChannelPipeline::new(channel, Arc::new(NoopLogger));
    let trace = Arc::new(ThreadTrace::default());
    let group = SingleExecutorGroup::new(affinity_loop.clone());

    pipeline
        .add_last_bound(&group, Some("bound"), AffinityProbe::new("BOUND", &trace))
        .expect("挂载亲和上下文");
    flush(&affinity_loop);

    pipeline.fire_channel_read(sample_message());
    flush(&event_loop);
    flush(&affinity_loop);

    let entries = trace.take();
    assert_eq!(
        entries.iter().map(|(tag, _)| tag.as_str()).collect::<Vec<_>>(),
        vec!["BOUND.added", "BOUND.read"],
        "挂载钩子先于任何事件回调"
    );
    for (tag, thread_id) in &entries {
        assert_eq!(
            *thread_id, affinity_thread,
            "{tag} 应落在亲和循环线程上"
        );
    }

    affinity_loop.shutdown();
    event_loop.shutdown();
}

/// 外部线程发起移除：返回即表示 `handler_removed` 已在归属执行器上完成。
#[test]
fn remove_from_foreign_thread_awaits_lifecycle_completion() {
    let event_loop = LoopExecutor::new();
    let channel = StubChannel::new(event_loop.clone());
    let pipeline = ChannelPipeline::new(channel, Arc::new(NoopLogger));
    let trace = Arc::new(ThreadTrace::default());

    pipeline
        .add_last(Some("probe"), AffinityProbe::new("P", &trace))
        .expect("挂载");
    flush(&event_loop);

    pipeline.remove("probe").expect("移除应成功");
    let tags: Vec<String> = trace.take().into_iter().map(|(tag, _)| tag).collect();
    assert!(
        tags.contains(&"P.removed".to_string()),
        "移除返回时钩子必须已执行，实际轨迹：{tags:?}"
    );
    assert!(pipeline.names().is_empty());

    event_loop.shutdown();
}

/// 事件与移除交错时，任何事件都不会出现在该阶段的移除钩子之后。
#[test]
fn no_event_is_delivered_after_handler_removed() {
    let event_loop = LoopExecutor::new();
    let channel = StubChannel::new(event_loop.clone());
    let pipeline = ChannelPipeline::new(channel, Arc::new(NoopLogger));
    let trace = Arc::new(ThreadTrace::default());

    pipeline
        .add_last(Some("probe"), AffinityProbe::new("P", &trace))
        .expect("挂载");
    flush(&event_loop);

    for round in 0..32 {
        pipeline.fire_channel_read(sample_message());
        if round == 16 {
            pipeline.remove("probe").expect("移除");
        }
    }
    flush(&event_loop);

    let tags: Vec<String> = trace.take().into_iter().map(|(tag, _)| tag).collect();
    let removed_at = tags
        .iter()
        .position(|tag| tag == "P.removed")
        .expect("移除钩子必然出现");
    assert!(
        tags[removed_at + 1..].iter().all(|tag| tag != "P.read"),
        "移除钩子之后不得再有事件抵达，实际轨迹：{tags:?}"
    );

    event_loop.shutdown();
}

/// 销毁路径跨执行器推进：先排空在途事件，再在归属执行器上逐个摘除。
#[test]
fn destroy_coordinates_across_executors() {
    let event_loop = LoopExecutor::new();
    let affinity_loop = LoopExecutor::new();
    let channel = StubChannel::new(event_loop.clone());
    let pipeline = ChannelPipeline::new(channel.clone(), Arc::new(NoopLogger));
    let trace = Arc::new(ThreadTrace::default());
    let group = SingleExecutorGroup::new(affinity_loop.clone());

    pipeline
        .add_last(Some("a"), AffinityProbe::new("A", &trace))
        .expect("挂载 A");
    pipeline
        .add_last_bound(&group, Some("b"), AffinityProbe::new("B", &trace))
        .expect("挂载 B");
    flush(&event_loop);
    flush(&affinity_loop);

    channel.set_open(false);
    channel.set_registered(false);
    pipeline.fire_channel_unregistered();

    // 销毁在两个循环之间接力推进，轮流排空直到两个阶段都完成移除。
    for _ in 0..8 {
        flush(&event_loop);
        flush(&affinity_loop);
    }

    let tags: Vec<String> = trace.take().into_iter().map(|(tag, _)| tag).collect();
    assert!(tags.contains(&"A.removed".to_string()), "轨迹：{tags:?}");
    assert!(tags.contains(&"B.removed".to_string()), "轨迹：{tags:?}");
    assert!(pipeline.names().is_empty());

    affinity_loop.shutdown();
    event_loop.shutdown();
}
