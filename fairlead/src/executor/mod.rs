//! Single-threaded serializing executor.
//!
//! The engine requires that certain of its entry points only ever be called
//! from one thread. Any thread that needs such a call submits it here as an
//! opaque task; one dedicated worker runs the tasks strictly in submission
//! order.
//!
//! ```text
//! submit() ──┐
//! submit() ──┼──▶ TaskQueue ──▶ worker thread ──▶ task.run()
//! submit() ──┘      (FIFO)
//! ```
//!
//! Shutdown stops intake, wakes the worker, joins it, and discards whatever
//! was still queued. A discarded task is dropped without running, so
//! whatever it owns is released.

pub mod queue;

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

pub use queue::TaskQueue;

/// Worker thread name used by [`SerializingExecutor::new`].
const DEFAULT_WORKER_NAME: &str = "fairlead-executor";

/// An opaque deferred unit of work.
///
/// `run` consumes the task, so a task either runs exactly once or is
/// dropped unrun exactly once; ownership rules out both happening. Plain
/// closures work through the blanket impl:
///
/// ```rust
/// use fairlead::SerializingExecutor;
///
/// let executor = SerializingExecutor::new();
/// executor.submit(|| {
///     // runs on the worker thread
/// });
/// executor.shutdown();
/// ```
pub trait Runnable: Send {
    /// Executes the task, consuming it.
    fn run(self: Box<Self>);
}

impl<F> Runnable for F
where
    F: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (*self)()
    }
}

/// Runs submitted tasks one at a time, in submission order, on one
/// dedicated worker thread.
///
/// The worker starts at construction and parks on a condition variable
/// while idle. `submit` never blocks beyond a short-held lock, which makes
/// it safe to call from the engine's own callback threads.
pub struct SerializingExecutor {
    queue: Arc<TaskQueue>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerializingExecutor {
    /// Creates an executor with an already-running worker thread.
    pub fn new() -> Self {
        Self::named(DEFAULT_WORKER_NAME)
    }

    /// Creates an executor whose worker thread carries `name`.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the worker thread.
    pub fn named(name: &str) -> Self {
        let queue = Arc::new(TaskQueue::new());
        let worker_queue = Arc::clone(&queue);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || worker_loop(&worker_queue))
            .expect("failed to spawn executor worker thread");
        info!(worker = name, "serializing executor started");
        Self {
            queue,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Hands a task to the worker and returns immediately.
    ///
    /// Callable from any number of threads concurrently. Tasks run in the
    /// order their `submit` calls completed. After shutdown the task is
    /// discarded unrun and the call still returns without error; late
    /// submissions are silently dropped, not reported.
    pub fn submit<T>(&self, task: T)
    where
        T: Runnable + 'static,
    {
        if let Err(rejected) = self.queue.push(Box::new(task)) {
            trace!("task submitted after shutdown, discarding");
            drop(rejected);
        }
    }

    /// Stops intake, wakes the worker, and blocks until it has exited.
    ///
    /// Tasks still queued when the stop signal lands are discarded unrun,
    /// exactly once. Call at most once; later calls find the worker already
    /// joined and return immediately. Must not be called from a task
    /// running on the worker itself, as the join would deadlock.
    pub fn shutdown(&self) {
        let handle = self.worker.lock().unwrap().take();
        let Some(handle) = handle else {
            return;
        };
        self.queue.stop();
        if handle.join().is_err() {
            warn!("executor worker exited by panic");
        }
        // Normally the worker drained before exiting; this covers a worker
        // killed mid-task by a panic.
        let leftover = self.queue.drain();
        if !leftover.is_empty() {
            debug!(
                discarded = leftover.len(),
                "discarding tasks left behind by the worker"
            );
        }
        info!("serializing executor stopped");
    }

    /// True once shutdown has been requested.
    pub fn is_stopped(&self) -> bool {
        self.queue.is_stopped()
    }

    /// Number of tasks waiting to run.
    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }
}

impl Default for SerializingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerializingExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(queue: &TaskQueue) {
    while let Some(task) = queue.pop_blocking() {
        task.run();
    }
    let leftover = queue.drain();
    if !leftover.is_empty() {
        debug!(discarded = leftover.len(), "discarding queued tasks at stop");
    }
}
