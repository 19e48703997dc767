//! Deferred render-task queue.
//!
//! Background threads hand units of work to a [`RenderTaskQueue`] and get a
//! [`TaskPromise`] back. The owning thread drains the queue once per tick
//! with [`execute_pending`](RenderTaskQueue::execute_pending), running work
//! in FIFO order until the per-tick budget is spent.
//!
//! There is no cancellation. A caller that wants to give up on a task races
//! the promise against its own signal and drops it.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use levelforge_core::task_queue::RenderTaskQueue;
//!
//! let queue = RenderTaskQueue::new();
//! let promise = queue.schedule(|| 6 * 7);
//! assert!(promise.try_take().is_none());
//!
//! queue.execute_pending(Duration::from_millis(4));
//! assert_eq!(promise.try_take(), Some(Ok(42)));
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Why a task produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The unit of work panicked; carries the panic message.
    Panicked(String),
    /// The queue was dropped before the task ran.
    Dropped,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Panicked(msg) => write!(f, "render task panicked: {msg}"),
            Self::Dropped => write!(f, "render task queue dropped before the task ran"),
        }
    }
}

impl std::error::Error for TaskError {}

pub type TaskResult<T> = Result<T, TaskError>;

struct PromiseState<T> {
    result: Option<TaskResult<T>>,
    waker: Option<Waker>,
}

type Shared<T> = Arc<Mutex<PromiseState<T>>>;

fn resolve<T>(shared: &Shared<T>, result: TaskResult<T>) {
    let waker = {
        let mut state = shared.lock();
        state.result = Some(result);
        state.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}

/// Handle to the eventual result of a scheduled task.
///
/// Poll it from a UI tick with [`try_take`](Self::try_take), or `.await` it.
pub struct TaskPromise<T> {
    shared: Shared<T>,
}

impl<T> TaskPromise<T> {
    /// Takes the result if the task has finished.
    ///
    /// Returns `None` while the task is queued, and after the result has
    /// already been taken.
    pub fn try_take(&self) -> Option<TaskResult<T>> {
        self.shared.lock().result.take()
    }

    /// Returns whether a result is waiting to be taken.
    pub fn is_ready(&self) -> bool {
        self.shared.lock().result.is_some()
    }
}

impl<T> Future for TaskPromise<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.lock();
        match state.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for TaskPromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskPromise")
            .field("ready", &self.is_ready())
            .finish()
    }
}

struct QueuedTask<T> {
    work: Box<dyn FnOnce() -> T + Send>,
    promise: Shared<T>,
}

/// FIFO queue of deferred work, filled from any thread and drained by its
/// owner.
///
/// Share it between threads behind an [`Arc`].
pub struct RenderTaskQueue<T> {
    tasks: Mutex<VecDeque<QueuedTask<T>>>,
}

impl<T: Send + 'static> RenderTaskQueue<T> {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues `work` and returns a promise for its result.
    pub fn schedule(&self, work: impl FnOnce() -> T + Send + 'static) -> TaskPromise<T> {
        let shared = Arc::new(Mutex::new(PromiseState {
            result: None,
            waker: None,
        }));
        self.tasks.lock().push_back(QueuedTask {
            work: Box::new(work),
            promise: shared.clone(),
        });
        TaskPromise { shared }
    }

    /// Runs queued tasks in FIFO order until the queue is empty or `budget`
    /// has elapsed. At least one task runs per call if any is queued.
    ///
    /// Returns the number of tasks executed.
    pub fn execute_pending(&self, budget: Duration) -> usize {
        let start = Instant::now();
        let mut executed = 0;

        loop {
            // The lock is released before running the task so it may
            // schedule follow-up work.
            let Some(task) = self.tasks.lock().pop_front() else {
                break;
            };

            let result = panic::catch_unwind(AssertUnwindSafe(task.work)).map_err(|payload| {
                let msg = panic_message(payload.as_ref());
                log::warn!("Render task panicked: {msg}");
                TaskError::Panicked(msg)
            });
            resolve(&task.promise, result);
            executed += 1;

            if start.elapsed() >= budget {
                break;
            }
        }

        if executed > 0 {
            log::trace!(
                "Executed {executed} render tasks in {:?}, {} still queued",
                start.elapsed(),
                self.pending_count()
            );
        }
        executed
    }

    /// Returns the number of tasks waiting to run.
    pub fn pending_count(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl<T: Send + 'static> Default for RenderTaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RenderTaskQueue<T> {
    fn drop(&mut self) {
        let tasks = std::mem::take(self.tasks.get_mut());
        if !tasks.is_empty() {
            log::debug!("Dropping render task queue with {} pending tasks", tasks.len());
        }
        for task in tasks {
            resolve(&task.promise, Err(TaskError::Dropped));
        }
    }
}

impl<T> fmt::Debug for RenderTaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderTaskQueue")
            .field("pending", &self.tasks.lock().len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::{RawWaker, RawWakerVTable};

    fn noop_waker() -> Waker {
        fn noop(_: *const ()) {}
        fn clone(p: *const ()) -> RawWaker {
            RawWaker::new(p, &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }

    fn poll_once<T>(promise: &mut TaskPromise<T>) -> Poll<TaskResult<T>> {
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);
        Pin::new(promise).poll(&mut cx)
    }

    #[test]
    fn runs_in_fifo_order() {
        let queue = RenderTaskQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let promises: Vec<_> = (0..4)
            .map(|i| {
                let order = order.clone();
                queue.schedule(move || {
                    order.lock().push(i);
                    i * 10
                })
            })
            .collect();

        assert_eq!(queue.execute_pending(Duration::from_secs(10)), 4);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
        assert_eq!(promises[2].try_take(), Some(Ok(20)));
        assert!(queue.is_empty());
    }

    #[test]
    fn zero_budget_runs_one_task() {
        let queue = RenderTaskQueue::new();
        let first = queue.schedule(|| 1);
        let second = queue.schedule(|| 2);

        assert_eq!(queue.execute_pending(Duration::ZERO), 1);
        assert!(first.is_ready());
        assert!(!second.is_ready());
        assert_eq!(queue.pending_count(), 1);

        assert_eq!(queue.execute_pending(Duration::ZERO), 1);
        assert_eq!(second.try_take(), Some(Ok(2)));
    }

    #[test]
    fn empty_queue_executes_nothing() {
        let queue: RenderTaskQueue<()> = RenderTaskQueue::new();
        assert_eq!(queue.execute_pending(Duration::from_millis(1)), 0);
    }

    #[test]
    fn panic_becomes_error() {
        let queue: RenderTaskQueue<u32> = RenderTaskQueue::new();
        let promise = queue.schedule(|| panic!("texture decode failed"));
        let after = queue.schedule(|| 7);

        queue.execute_pending(Duration::from_secs(10));

        assert_eq!(
            promise.try_take(),
            Some(Err(TaskError::Panicked("texture decode failed".into())))
        );
        assert_eq!(after.try_take(), Some(Ok(7)));
    }

    #[test]
    fn dropping_queue_resolves_pending() {
        let queue = RenderTaskQueue::new();
        let promise = queue.schedule(|| 1);
        drop(queue);
        assert_eq!(promise.try_take(), Some(Err(TaskError::Dropped)));
    }

    #[test]
    fn promise_polls_as_future() {
        let queue = RenderTaskQueue::new();
        let mut promise = queue.schedule(|| "mesh");

        assert!(poll_once(&mut promise).is_pending());
        queue.execute_pending(Duration::from_millis(4));
        assert_eq!(poll_once(&mut promise), Poll::Ready(Ok("mesh")));
    }

    #[test]
    fn result_is_taken_once() {
        let queue = RenderTaskQueue::new();
        let promise = queue.schedule(|| 3);
        queue.execute_pending(Duration::from_millis(4));
        assert_eq!(promise.try_take(), Some(Ok(3)));
        assert_eq!(promise.try_take(), None);
    }

    #[test]
    fn schedule_from_other_threads() {
        let queue = Arc::new(RenderTaskQueue::new());
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let queue = queue.clone();
                std::thread::spawn(move || queue.schedule(move || i + 1))
            })
            .collect();
        let promises: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(queue.execute_pending(Duration::from_secs(10)), 4);
        let mut results: Vec<u32> = promises
            .iter()
            .map(|p| p.try_take().unwrap().unwrap())
            .collect();
        results.sort_unstable();
        assert_eq!(results, vec![1, 2, 3, 4]);
    }
}
