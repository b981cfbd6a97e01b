//! Signal Dispatch
//!
//! The machinery each leaf uses to process its signals one at a time.
//!
//! # Overview
//!
//! - `queue`: pending `(signal, callback)` pairs and the busy flag
//! - `handler`: the name → handler table and the `Done` continuation
//! - `callback`: how outcomes are reported back to the sender
//! - `scheduler`: the deferred-execution hook used between dispatch steps
//!
//! # Dispatch Loop
//!
//! A leaf is either idle or dispatching. Each tick:
//!
//! 1. Returns if the leaf is busy or has nothing queued.
//! 2. Pops the newest entry and marks the leaf busy.
//! 3. Rejects nameless signals with `MissingSignalName`.
//! 4. Resolves the handler (falling back to `*`); with no handler the entry
//!    completes successfully without doing anything.
//! 5. Otherwise calls the handler and waits for its `Done`.
//!
//! Whenever an entry completes, the busy flag is cleared and the next tick
//! is deferred through the scheduler before the sender's callback runs. The
//! leaf therefore always yields between entries.

mod callback;
mod handler;
mod queue;
mod scheduler;

pub use callback::{Callback, Delivery};
pub use handler::{AsyncHandler, Done, Handler, HandlerRegistry};
pub use scheduler::{ManualScheduler, Scheduler, Task, TokioScheduler};

pub(crate) use callback::FanIn;
pub(crate) use queue::SignalQueue;
