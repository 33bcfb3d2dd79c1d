//! FIFO task queue shared between submitters and the worker thread.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use super::Runnable;

/// State guarded by the queue mutex. The stop flag lives under the same
/// lock as the deque so intake and the worker observe both consistently.
struct QueueState {
    tasks: VecDeque<Box<dyn Runnable>>,
    stopped: bool,
}

/// Thread-safe FIFO of pending tasks with a stop signal.
///
/// Submission order is defined by lock acquisition order, which is what
/// makes the executor's FIFO guarantee hold across concurrent submitters.
/// The queue never runs or drops a task while holding its lock: rejected
/// and drained tasks are handed back to the caller for out-of-lock
/// disposal.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    task_ready: Condvar,
}

impl TaskQueue {
    /// Creates an empty, accepting queue.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                stopped: false,
            }),
            task_ready: Condvar::new(),
        }
    }

    /// Appends a task at the tail and wakes one waiter.
    ///
    /// After [`TaskQueue::stop`] the task is handed back unchanged so the
    /// caller can discard it outside the lock.
    pub fn push(&self, task: Box<dyn Runnable>) -> Result<(), Box<dyn Runnable>> {
        let mut state = self.state.lock().unwrap();
        if state.stopped {
            return Err(task);
        }
        state.tasks.push_back(task);
        drop(state);
        self.task_ready.notify_one();
        Ok(())
    }

    /// Blocks until a task is available or stop has been requested.
    ///
    /// Returns `None` once stop is observed, regardless of what is still
    /// queued; leftovers are the caller's to collect via
    /// [`TaskQueue::drain`].
    pub fn pop_blocking(&self) -> Option<Box<dyn Runnable>> {
        let mut state = self.state.lock().unwrap();
        while state.tasks.is_empty() && !state.stopped {
            state = self.task_ready.wait(state).unwrap();
        }
        if state.stopped {
            return None;
        }
        state.tasks.pop_front()
    }

    /// Swaps out everything still queued for out-of-lock discard.
    pub fn drain(&self) -> VecDeque<Box<dyn Runnable>> {
        let mut state = self.state.lock().unwrap();
        std::mem::take(&mut state.tasks)
    }

    /// Requests stop and wakes every waiter.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        drop(state);
        self.task_ready.notify_all();
    }

    /// True once stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    /// Number of tasks currently queued.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().tasks.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
