//! 测试桩命名空间，集中暴露官方维护的桩实现，供集成测试与示例复用。
//!
//! # 设计背景（Why）
//! - 统一维护常见桩对象，避免在各处重复定义同构的探针结构；
//! - 核心契约演进时，通过单点更新保证所有测试同步适配。

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Sender, channel};
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::Mutex;

use crate::channel::{Channel, Transport};
use crate::message::PipelineMessage;
use crate::promise::ChannelPromise;
use crate::runtime::{EventExecutor, EventExecutorGroup, Task};

/// 在调用线程上内联执行一切任务的执行器。
///
/// `in_event_loop` 恒为真，因此所有派发都走内联路径；适合验证传播顺序
/// 与结构化语义的单线程测试。
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateExecutor;

impl EventExecutor for ImmediateExecutor {
    fn in_event_loop(&self) -> bool {
        true
    }

    fn execute(&self, task: Task) {
        task();
    }
}

/// 独占一条线程的队列执行器，模拟真实事件循环。
///
/// # 行为描述（How）
/// - 构造时启动循环线程，任务经由通道串行执行；
/// - `in_event_loop` 按线程 ID 判定；
/// - `Drop` 时关闭队列并汇合线程，未执行的任务随队列丢弃。
pub struct LoopExecutor {
    sender: Mutex<Option<Sender<Task>>>,
    loop_thread: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LoopExecutor {
    /// 启动新的循环线程。
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = channel::<Task>();
        let worker = thread::spawn(move || {
            while let Ok(task) = receiver.recv() {
                task();
            }
        });
        let loop_thread = worker.thread().id();
        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            loop_thread,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// 关闭队列并等待循环线程退出。
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl EventExecutor for LoopExecutor {
    fn in_event_loop(&self) -> bool {
        thread::current().id() == self.loop_thread
    }

    fn execute(&self, task: Task) {
        if let Some(sender) = self.sender.lock().as_ref() {
            let _ = sender.send(task);
        }
    }
}

impl Drop for LoopExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 恒定返回同一个执行器的执行器组。
pub struct SingleExecutorGroup {
    executor: Arc<dyn EventExecutor>,
}

impl SingleExecutorGroup {
    /// 以给定执行器构造组。
    pub fn new(executor: Arc<dyn EventExecutor>) -> Self {
        Self { executor }
    }
}

impl EventExecutorGroup for SingleExecutorGroup {
    fn next(&self) -> Arc<dyn EventExecutor> {
        Arc::clone(&self.executor)
    }
}

/// 记录每次出站终端调用的传输桩。
///
/// 操作名按调用顺序入列，带句柄的操作一律立即以成功完结，便于测试
/// 同步断言。
#[derive(Default)]
pub struct RecordingTransport {
    operations: Mutex<Vec<String>>,
}

impl RecordingTransport {
    /// 取走已记录的操作序列。
    pub fn take_operations(&self) -> Vec<String> {
        self.operations.lock().drain(..).collect()
    }

    fn record(&self, operation: impl Into<String>) {
        self.operations.lock().push(operation.into());
    }
}

impl Transport for RecordingTransport {
    fn bind(&self, local: SocketAddr, promise: ChannelPromise) {
        self.record(format!("bind {local}"));
        promise.try_success();
    }

    fn connect(&self, remote: SocketAddr, _local: Option<SocketAddr>, promise: ChannelPromise) {
        self.record(format!("connect {remote}"));
        promise.try_success();
    }

    fn disconnect(&self, promise: ChannelPromise) {
        self.record("disconnect");
        promise.try_success();
    }

    fn close(&self, promise: ChannelPromise) {
        self.record("close");
        promise.try_success();
    }

    fn deregister(&self, promise: ChannelPromise) {
        self.record("deregister");
        promise.try_success();
    }

    fn begin_read(&self) {
        self.record("begin_read");
    }

    fn write(&self, msg: PipelineMessage, promise: ChannelPromise) {
        self.record(format!("write {msg:?}"));
        if let Err(error) = msg.release() {
            self.record(format!("write-release-failed {error}"));
        }
        promise.try_success();
    }

    fn flush(&self) {
        self.record("flush");
    }
}

/// 状态可拨动的通道桩。
pub struct StubChannel {
    registered: AtomicBool,
    open: AtomicBool,
    event_loop: Arc<dyn EventExecutor>,
    transport: Arc<RecordingTransport>,
}

impl StubChannel {
    /// 以给定事件循环构造；初始为已注册、打开。
    pub fn new(event_loop: Arc<dyn EventExecutor>) -> Arc<Self> {
        Arc::new(Self {
            registered: AtomicBool::new(true),
            open: AtomicBool::new(true),
            event_loop,
            transport: Arc::new(RecordingTransport::default()),
        })
    }

    /// 拨动注册状态。
    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }

    /// 拨动打开状态。
    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::Release);
    }

    /// 访问传输桩以断言出站终端调用。
    pub fn recording_transport(&self) -> &Arc<RecordingTransport> {
        &self.transport
    }
}

impl Channel for StubChannel {
    fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn event_loop(&self) -> Arc<dyn EventExecutor> {
        Arc::clone(&self.event_loop)
    }

    fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport) as Arc<dyn Transport>
    }
}
