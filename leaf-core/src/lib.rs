//! Leaf Core
//!
//! This crate provides the core runtime for Leaf signal-propagation graphs.
//! It implements:
//!
//! - Leaves: graph nodes that process named signals one at a time
//! - Per-leaf handler tables with a `*` wildcard fallback
//! - Connect/disconnect topology maintained through the signal queue itself
//! - Broadcast of a signal to every connected output
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: leaves, their builder, and the output/input relations
//! - `dispatch`: queue, handlers, callbacks, and the scheduler hook
//! - `signal`: the signal record
//! - `config`: serde-loadable leaf options
//! - `error`: the crate error type
//!
//! # Ordering
//!
//! Signals sent to one leaf never run concurrently, and the most recently
//! queued signal runs first. A leaf yields to its scheduler after every
//! signal. Nothing is guaranteed about ordering across leaves.
//!
//! # Example
//!
//! ```rust,ignore
//! use leaf_core::{Done, Leaf, Signal};
//!
//! let source = Leaf::new();
//! let sink = Leaf::new();
//!
//! sink.add_handler("ping", |leaf: &Leaf, signal: Signal, done: Done| {
//!     println!("{} got {:?}", leaf.id(), signal.payload());
//!     done.ok();
//! })?;
//!
//! source.link(&sink).await?;
//! source.broadcast_all(Signal::new("ping")).await?;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod signal;

pub use config::{LeafConfig, UnhandledPolicy};
pub use dispatch::{
    AsyncHandler, Callback, Delivery, Done, Handler, HandlerRegistry, ManualScheduler, Scheduler,
    TokioScheduler,
};
pub use error::{LeafError, Result};
pub use graph::{Leaf, LeafBuilder, LeafId};
pub use signal::{Signal, CONNECT, DISCONNECT, WILDCARD};
