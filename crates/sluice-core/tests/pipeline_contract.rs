//! `pipeline_contract` 集成测试：聚焦事件传播顺序与结构化变更语义。
//!
//! # 测试总览（Why）
//! - 入站事件必须按链序逐级抵达，尾哨兵兜底释放未处理的消息；
//! - 结构化操作之后，名字索引与链表行走必须一致；
//! - 替换保持链序，且替身的挂载钩子先于旧者的移除钩子。

use std::sync::Arc;

use parking_lot::Mutex;
use sluice_core::test_stubs::{ImmediateExecutor, StubChannel};
use sluice_core::{
    BufAllocator, ChannelHandler, ChannelPipeline, CoreError, EventMask, HandlerContext,
    HandlerDescriptor, HeapAllocator, NoopLogger, PipelineMessage, codes,
};

/// 事件轨迹探针：把 `阶段名.事件名` 按发生顺序入列。
#[derive(Default)]
struct Trace {
    entries: Mutex<Vec<String>>,
}

impl Trace {
    fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    fn take(&self) -> Vec<String> {
        self.entries.lock().drain(..).collect()
    }
}

/// 记录读事件与生命周期的转发 Handler。
struct Recorder {
    tag: &'static str,
    trace: Arc<Trace>,
    sharable: bool,
}

impl Recorder {
    fn new(tag: &'static str, trace: &Arc<Trace>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            trace: Arc::clone(trace),
            sharable: false,
        })
    }

    fn sharable(tag: &'static str, trace: &Arc<Trace>) -> Arc<Self> {
        Arc::new(Self {
            tag,
            trace: Arc::clone(trace),
            sharable: true,
        })
    }
}

impl ChannelHandler for Recorder {
    fn descriptor(&self) -> HandlerDescriptor {
        let descriptor = HandlerDescriptor::new(
            self.tag,
            EventMask::CHANNEL_READ
                | EventMask::HANDLER_ADDED
                | EventMask::HANDLER_REMOVED
                | EventMask::EXCEPTION_CAUGHT,
        );
        if self.sharable {
            descriptor.sharable()
        } else {
            descriptor
        }
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

    fn exception_caught(&self, ctx: &HandlerContext, error: CoreError) -> Result<(), CoreError> {
        self.trace.push(format!("{}.exception[{}]", self.tag, error.code()));
        ctx.fire_exception_caught(error);
        Ok(())
    }
}

fn inline_pipeline() -> (ChannelPipeline, Arc<StubChannel>) {
    let channel = StubChannel::new(Arc::new(ImmediateExecutor));
    let pipeline = ChannelPipeline::new(channel.clone(), Arc::new(NoopLogger));
    (pipeline, channel)
}

fn sample_message() -> (PipelineMessage, sluice_core::ByteBuf) {
    let mut buf = HeapAllocator.buffer(8, 8).expect("分配应成功");
    buf.write_u32(0xA1B2_C3D4).expect("填充");
    let observer = buf.duplicate().expect("观察视图");
    (PipelineMessage::Bytes(buf), observer)
}

/// 读事件按 A -> B -> C 链序抵达，尾哨兵释放未处理的消息。
#[test]
fn inbound_read_traverses_in_order_and_tail_releases() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("a"), Recorder::new("A", &trace))
        .expect("挂载 A");
    pipeline
        .add_last(Some("b"), Recorder::new("B", &trace))
        .expect("挂载 B");
    pipeline
        .add_last(Some("c"), Recorder::new("C", &trace))
        .expect("挂载 C");
    trace.take();

    let (msg, observer) = sample_message();
    pipeline.fire_channel_read(msg);

    assert_eq!(trace.take(), vec!["A.read", "B.read", "C.read"]);
    assert_eq!(observer.ref_count(), 1, "尾哨兵应释放消息的那份计数");
}

/// `add_first` / `add_before` / `add_after` 的链序语义与索引一致性。
#[test]
fn structural_positions_keep_index_consistent_with_walk() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("b"), Recorder::new("B", &trace))
        .expect("挂载 B");
    pipeline
        .add_first(Some("a"), Recorder::new("A", &trace))
        .expect("挂载 A");
    pipeline
        .add_after("b", Some("d"), Recorder::new("D", &trace))
        .expect("挂载 D");
    pipeline
        .add_before("d", Some("c"), Recorder::new("C", &trace))
        .expect("挂载 C");

    assert_eq!(pipeline.names(), vec!["a", "b", "c", "d"]);
    let mapped: Vec<String> = pipeline.to_map().into_iter().map(|(name, _)| name).collect();
    assert_eq!(mapped, pipeline.names(), "索引遍历与链表行走一致");
    assert!(pipeline.get("c").is_some());
    assert!(
        pipeline
            .add_before("ghost", None, Recorder::new("X", &trace))
            .is_err(),
        "基准不存在应报错"
    );
}

/// 默认命名按 `标签#序号` 递增，显式重名被拒绝且不改动链表。
#[test]
fn name_generation_increments_and_explicit_duplicates_fail() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(None, Recorder::sharable("codec", &trace))
        .expect("第一个默认名");
    pipeline
        .add_last(None, Recorder::sharable("codec", &trace))
        .expect("第二个默认名");
    assert_eq!(pipeline.names(), vec!["codec#0", "codec#1"]);

    let error = pipeline
        .add_last(Some("codec#0"), Recorder::sharable("codec", &trace))
        .expect_err("显式重名应失败");
    assert_eq!(error.code(), codes::PIPELINE_DUPLICATE_NAME);
    assert_eq!(pipeline.names(), vec!["codec#0", "codec#1"], "失败不改链表");
}

/// 不可共享的 Handler 实例只允许挂载一次。
#[test]
fn non_sharable_handler_cannot_mount_twice() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    let handler = Recorder::new("exclusive", &trace);
    pipeline
        .add_last(Some("first"), handler.clone())
        .expect("首次挂载");
    let error = pipeline
        .add_last(Some("second"), handler)
        .expect_err("重复挂载应失败");
    assert_eq!(error.code(), codes::PIPELINE_REJECTED);

    let sharable = Recorder::sharable("shared", &trace);
    pipeline
        .add_last(Some("s1"), sharable.clone())
        .expect("可共享首次挂载");
    pipeline
        .add_last(Some("s2"), sharable)
        .expect("可共享再次挂载");
}

/// 替换保持链序；替身挂载钩子先于旧者移除钩子（S6）。
#[test]
fn replace_preserves_order_and_lifecycle_sequence() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("a"), Recorder::new("A", &trace))
        .expect("挂载 A");
    pipeline
        .add_last(Some("b"), Recorder::new("B", &trace))
        .expect("挂载 B");
    pipeline
        .add_last(Some("c"), Recorder::new("C", &trace))
        .expect("挂载 C");
    trace.take();

    pipeline
        .replace("b", Some("b2"), Recorder::new("B2", &trace))
        .expect("替换 B");
    assert_eq!(
        trace.take(),
        vec!["B2.added", "B.removed"],
        "替身先挂载，旧者后移除"
    );
    assert_eq!(pipeline.names(), vec!["a", "b2", "c"]);

    let (msg, observer) = sample_message();
    pipeline.fire_channel_read(msg);
    assert_eq!(trace.take(), vec!["A.read", "B2.read", "C.read"]);
    assert_eq!(observer.ref_count(), 1);
}

/// 事件回调失败转换为下一个上下文的异常事件。
#[test]
fn handler_error_converts_to_exception_at_next_context() {
    /// 读事件一律失败的 Handler。
    struct Failing;
    impl ChannelHandler for Failing {
        fn descriptor(&self) -> HandlerDescriptor {
            HandlerDescriptor::new("failing", EventMask::CHANNEL_READ)
        }

        fn channel_read(
            &self,
            _ctx: &HandlerContext,
            msg: PipelineMessage,
        ) -> Result<(), CoreError> {
            msg.release()?;
            Err(CoreError::new(codes::PIPELINE_HANDLER, "解码失败"))
        }
    }

    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("fail"), Arc::new(Failing))
        .expect("挂载失败者");
    pipeline
        .add_last(Some("catch"), Recorder::new("CATCH", &trace))
        .expect("挂载捕获者");
    trace.take();

    let (msg, _observer) = sample_message();
    pipeline.fire_channel_read(msg);
    assert_eq!(
        trace.take(),
        vec![format!("CATCH.exception[{}]", codes::PIPELINE_HANDLER)],
        "异常应抵达失败者之后的上下文"
    );
}

/// `handler_added` 失败：上下文被移除，异常沿管线广播。
#[test]
fn handler_added_failure_removes_context_and_fires_exception() {
    /// 挂载钩子失败的 Handler。
    struct BrokenOnAdd;
    impl ChannelHandler for BrokenOnAdd {
        fn descriptor(&self) -> HandlerDescriptor {
            HandlerDescriptor::new("broken", EventMask::HANDLER_ADDED)
        }

        fn handler_added(&self, _ctx: &HandlerContext) -> Result<(), CoreError> {
            Err(CoreError::new(codes::PIPELINE_LIFECYCLE, "初始化失败"))
        }
    }

    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("watch"), Recorder::new("WATCH", &trace))
        .expect("挂载观察者");
    trace.take();

    pipeline
        .add_last(Some("broken"), Arc::new(BrokenOnAdd))
        .expect("添加本身成功，失败转化为异常事件");
    assert!(pipeline.get("broken").is_none(), "失败者应已被移除");
    assert_eq!(
        trace.take(),
        vec![format!("WATCH.exception[{}]", codes::PIPELINE_LIFECYCLE)]
    );
}

/// 出站操作穿过出站阶段后由头哨兵落到传输终端。
#[test]
fn outbound_operations_terminate_at_transport() {
    /// 记录写事件的出站 Handler。
    struct OutboundProbe {
        tag: &'static str,
        trace: Arc<Trace>,
    }
    impl ChannelHandler for OutboundProbe {
        fn descriptor(&self) -> HandlerDescriptor {
            HandlerDescriptor::new(self.tag, EventMask::WRITE | EventMask::FLUSH)
        }

        fn write(
            &self,
            ctx: &HandlerContext,
            msg: PipelineMessage,
            promise: sluice_core::ChannelPromise,
        ) -> Result<(), CoreError> {
            self.trace.push(format!("{}.write", self.tag));
            ctx.write(msg, promise);
            Ok(())
        }

        fn flush(&self, ctx: &HandlerContext) -> Result<(), CoreError> {
            self.trace.push(format!("{}.flush", self.tag));
            ctx.flush();
            Ok(())
        }
    }

    let trace = Arc::new(Trace::default());
    let (pipeline, channel) = inline_pipeline();
    pipeline
        .add_last(
            Some("x"),
            Arc::new(OutboundProbe {
                tag: "X",
                trace: Arc::clone(&trace),
            }),
        )
        .expect("挂载 X");
    pipeline
        .add_last(
            Some("y"),
            Arc::new(OutboundProbe {
                tag: "Y",
                trace: Arc::clone(&trace),
            }),
        )
        .expect("挂载 Y");

    let (msg, observer) = sample_message();
    let promise = pipeline.write_and_flush(msg);
    assert!(promise.is_success(), "传输桩应立即完结句柄");
    assert_eq!(
        trace.take(),
        vec!["Y.write", "X.write", "Y.flush", "X.flush"],
        "出站事件自尾向头穿过阶段"
    );
    let operations = channel.recording_transport().take_operations();
    assert_eq!(operations.len(), 2);
    assert!(operations[0].starts_with("write"), "终端应收到写操作");
    assert_eq!(operations[1], "flush");
    assert_eq!(observer.ref_count(), 1, "传输桩消费后释放消息");

    let local = "127.0.0.1:7000".parse().expect("地址");
    assert!(pipeline.bind(local).is_success());
    assert!(pipeline.close().is_success());
    pipeline.read();
    assert_eq!(
        channel.recording_transport().take_operations(),
        vec![format!("bind {local}"), "close".to_string(), "begin_read".to_string()]
    );
}

/// 哨兵不可被结构化操作移除。
#[test]
fn sentinels_are_not_addressable_for_removal() {
    let (pipeline, _channel) = inline_pipeline();
    assert_eq!(
        pipeline.remove("head").expect_err("头哨兵不可移除").code(),
        codes::PIPELINE_NOT_FOUND
    );
    assert_eq!(
        pipeline.remove("tail").expect_err("尾哨兵不可移除").code(),
        codes::PIPELINE_NOT_FOUND
    );
    assert!(pipeline.remove_first().is_err(), "空管线没有用户 Handler");
}

/// `remove_first` / `remove_last` 摘除对应端的用户 Handler。
#[test]
fn remove_first_and_last_target_user_stages() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("a"), Recorder::new("A", &trace))
        .expect("挂载 A");
    pipeline
        .add_last(Some("b"), Recorder::new("B", &trace))
        .expect("挂载 B");
    pipeline
        .add_last(Some("c"), Recorder::new("C", &trace))
        .expect("挂载 C");

    pipeline.remove_first().expect("移除链首");
    pipeline.remove_last().expect("移除链尾");
    assert_eq!(pipeline.names(), vec!["b"]);
}

/// 通道注销且关闭时销毁管线：全部用户上下文按序走移除钩子。
#[test]
fn destroy_on_unregistered_and_closed_removes_all_stages() {
    let trace = Arc::new(Trace::default());
    let (pipeline, channel) = inline_pipeline();
    pipeline
        .add_last(Some("a"), Recorder::new("A", &trace))
        .expect("挂载 A");
    pipeline
        .add_last(Some("b"), Recorder::new("B", &trace))
        .expect("挂载 B");
    trace.take();

    channel.set_open(false);
    channel.set_registered(false);
    pipeline.fire_channel_unregistered();

    assert_eq!(
        trace.take(),
        vec!["B.removed", "A.removed"],
        "销毁自尾向头逐个摘除"
    );
    assert!(pipeline.names().is_empty(), "销毁后不再有用户上下文");
}

/// 仅当通道关闭时注销事件才触发销毁。
#[test]
fn unregister_alone_does_not_destroy_open_channel() {
    let trace = Arc::new(Trace::default());
    let (pipeline, _channel) = inline_pipeline();
    pipeline
        .add_last(Some("a"), Recorder::new("A", &trace))
        .expect("挂载 A");
    trace.take();

    pipeline.fire_channel_unregistered();
    assert!(trace.take().is_empty(), "通道仍打开，不应触发移除");
    assert_eq!(pipeline.names(), vec!["a"]);
}
