use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::{CoreError, codes};

/// 提交给执行器的一次性任务。
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// 事件执行器契约：单线程事件循环的最小调度面。
///
/// # 设计背景（Why）
/// - 管线的调度模型是"每通道单线程协作"：哨兵事件固定落在通道绑定的
///   事件循环上，个别上下文可以绑定独立执行器；管线只依赖这三个原语，
///   执行器内部的线程模型由宿主实现决定。
///
/// # 契约说明（What）
/// - `in_event_loop`：当前调用线程是否就是该执行器的循环线程。
/// - `execute`：投递后即返回，任务最终在循环线程上串行执行。
/// - `submit`：与 `execute` 一致，另返回可阻塞等待的完成句柄。
///
/// # 风险提示（Trade-offs）
/// - 已关停的执行器必须以 [`codes::EXECUTOR_SHUTDOWN`] 完结 `submit`
///   返回的句柄（或在 `execute` 路径丢弃前记录日志），否则等待方将
///   永久阻塞；默认的 `submit` 实现无法替实现者兜底。
pub trait EventExecutor: Send + Sync + 'static {
    /// 当前线程是否在事件循环内。
    fn in_event_loop(&self) -> bool;

    /// 投递任务，不等待完成。
    fn execute(&self, task: Task);

    /// 投递任务并返回完成句柄。
    fn submit(&self, task: Task) -> TaskCompletion {
        let completion = TaskCompletion::new();
        let done = completion.clone();
        self.execute(Box::new(move || {
            task();
            done.complete(Ok(()));
        }));
        completion
    }
}

/// 执行器组：为新挂载的上下文挑选一个亲和执行器。
///
/// 选择发生在挂载时刻且一经绑定不再变化，保证同一上下文的事件全程
/// 串行在同一循环上。
pub trait EventExecutorGroup: Send + Sync + 'static {
    /// 返回下一个执行器。
    fn next(&self) -> Arc<dyn EventExecutor>;
}

/// 写一次、可阻塞等待的任务完成句柄。
///
/// # 解析逻辑（How）
/// - 内部以互斥量保存最终结果，条件变量唤醒等待方；首个 `complete`
///   生效，后续写入被忽略。
/// - 结构化管线操作在锁外等待该句柄，这一反转是死锁预防的关键：
///   持有管线互斥量等待执行器任务，会与任务内部再次进入管线互斥。
#[derive(Clone)]
pub struct TaskCompletion {
    inner: Arc<CompletionInner>,
}

struct CompletionInner {
    state: Mutex<Option<Result<(), Arc<CoreError>>>>,
    done: Condvar,
}

impl TaskCompletion {
    /// 创建未完成的句柄。
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                state: Mutex::new(None),
                done: Condvar::new(),
            }),
        }
    }

    /// 写入结果；首次写入返回 `true`，重复写入被忽略。
    pub fn complete(&self, outcome: Result<(), CoreError>) -> bool {
        let mut state = self.inner.state.lock();
        if state.is_some() {
            return false;
        }
        *state = Some(outcome.map_err(Arc::new));
        drop(state);
        self.inner.done.notify_all();
        true
    }

    /// 以执行器关停语义完结句柄。
    pub fn reject_shutdown(&self) -> bool {
        self.complete(Err(CoreError::new(
            codes::EXECUTOR_SHUTDOWN,
            "执行器已关停，任务未被接受",
        )))
    }

    /// 是否已完成。
    pub fn is_done(&self) -> bool {
        self.inner.state.lock().is_some()
    }

    /// 阻塞等待任务结束。
    ///
    /// # 前置条件
    /// - 不得在目标执行器的循环线程上等待自身任务，否则将自我阻塞；
    ///   管线的调用约定（在循环内走内联路径）保证了这一点。
    pub fn wait(&self) -> Result<(), Arc<CoreError>> {
        let mut state = self.inner.state.lock();
        while state.is_none() {
            self.inner.done.wait(&mut state);
        }
        state.as_ref().expect("state 刚被条件变量确认非空").clone()
    }
}

impl Default for TaskCompletion {
    fn default() -> Self {
        Self::new()
    }
}
