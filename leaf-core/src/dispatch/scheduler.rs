//! Scheduler Hook
//!
//! Every leaf defers its next dispatch step through a [`Scheduler`]. This is
//! what makes a leaf yield between signals: after one entry completes, the
//! next tick is queued behind whatever else the scheduler already holds, so
//! a busy leaf cannot starve its neighbours.
//!
//! # Implementations
//!
//! - [`TokioScheduler`] spawns each step as a task on a tokio runtime.
//! - [`ManualScheduler`] keeps steps in a FIFO run queue that the owner
//!   drains explicitly. Interleaving is fully deterministic, which is what
//!   the ordering tests rely on.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::runtime::Handle;

/// A deferred unit of work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Deferred-execution primitive used by the dispatch loop.
pub trait Scheduler: Send + Sync {
    /// Run `task` later, never inline.
    fn defer(&self, task: Task);
}

/// Scheduler backed by a tokio runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Create a scheduler for the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Like [`current`](Self::current), but returns `None` outside a runtime.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }
}

/// Scheduler whose run queue is drained by the caller.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<VecDeque<Task>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deferred tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Run the oldest deferred task. Returns `false` if there was none.
    pub fn run_once(&self) -> bool {
        let task = self.tasks.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks until the queue is empty, including tasks deferred while
    /// running. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }

    /// Run at most `limit` tasks. Returns how many ran.
    ///
    /// Useful when handlers keep signalling each other and the queue never
    /// drains on its own.
    pub fn run_for(&self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit && self.run_once() {
            ran += 1;
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn defer(&self, task: Task) {
        self.tasks.lock().push_back(task);
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}
