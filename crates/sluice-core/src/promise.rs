use std::mem;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::CoreError;

type Listener = Box<dyn FnOnce(Result<(), &CoreError>) + Send + 'static>;

/// 出站操作的写一次完成句柄。
///
/// # 设计背景（Why）
/// - 出站事件（bind/connect/close/write 等）沿管线传到头哨兵后交由传输
///   协作方异步完成；发起方需要一个可以挂接回调、也可以阻塞等待的句柄
///   来观察结局。
///
/// # 契约说明（What）
/// - 首个 `try_success` / `try_failure` 生效并返回 `true`，其后的写入
///   一律返回 `false` 且不改变结局。
/// - 完成时注册的监听器被逐一消费；完成后再注册的监听器立即执行。
///
/// # 风险提示（Trade-offs）
/// - 监听器在完成者的调用线程上执行，不得阻塞或在其中长时间持锁。
#[derive(Clone)]
pub struct ChannelPromise {
    inner: Arc<PromiseInner>,
}

struct PromiseInner {
    state: Mutex<PromiseState>,
    done: Condvar,
}

struct PromiseState {
    outcome: Option<Result<(), Arc<CoreError>>>,
    listeners: Vec<Listener>,
}

impl ChannelPromise {
    /// 创建未完成的句柄。
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PromiseInner {
                state: Mutex::new(PromiseState {
                    outcome: None,
                    listeners: Vec::new(),
                }),
                done: Condvar::new(),
            }),
        }
    }

    /// 以成功完结；仅首次生效。
    pub fn try_success(&self) -> bool {
        self.complete(Ok(()))
    }

    /// 以失败完结；仅首次生效。
    pub fn try_failure(&self, error: CoreError) -> bool {
        self.complete(Err(Arc::new(error)))
    }

    /// 是否已有结局。
    pub fn is_done(&self) -> bool {
        self.inner.state.lock().outcome.is_some()
    }

    /// 是否以成功完结。
    pub fn is_success(&self) -> bool {
        matches!(self.inner.state.lock().outcome, Some(Ok(())))
    }

    /// 读取失败原因（若已失败）。
    pub fn failure(&self) -> Option<Arc<CoreError>> {
        match &self.inner.state.lock().outcome {
            Some(Err(error)) => Some(Arc::clone(error)),
            _ => None,
        }
    }

    /// 注册完成监听器；已完成时立即在当前线程执行。
    pub fn on_complete<F>(&self, listener: F)
    where
        F: FnOnce(Result<(), &CoreError>) + Send + 'static,
    {
        let outcome = {
            let mut state = self.inner.state.lock();
            match &state.outcome {
                None => {
                    state.listeners.push(Box::new(listener));
                    return;
                }
                Some(outcome) => outcome.clone(),
            }
        };
        listener_call(Box::new(listener), outcome);
    }

    /// 阻塞等待结局。
    pub fn wait(&self) -> Result<(), Arc<CoreError>> {
        let mut state = self.inner.state.lock();
        while state.outcome.is_none() {
            self.inner.done.wait(&mut state);
        }
        state.outcome.as_ref().expect("结局刚被确认存在").clone()
    }

    fn complete(&self, outcome: Result<(), Arc<CoreError>>) -> bool {
        let listeners = {
            let mut state = self.inner.state.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(outcome.clone());
            mem::take(&mut state.listeners)
        };
        self.inner.done.notify_all();
        for listener in listeners {
            listener_call(listener, outcome.clone());
        }
        true
    }
}

impl Default for ChannelPromise {
    fn default() -> Self {
        Self::new()
    }
}

fn listener_call(listener: Listener, outcome: Result<(), Arc<CoreError>>) {
    match &outcome {
        Ok(()) => listener(Ok(())),
        Err(error) => listener(Err(error.as_ref())),
    }
}
