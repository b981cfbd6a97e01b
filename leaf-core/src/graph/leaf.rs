//! Leaves
//!
//! A leaf is a graph endpoint: it owns a handler table, a signal queue with
//! its busy flag, and (unless built without default handlers) the relation
//! lists to the leaves it is connected to and from.
//!
//! `Leaf` is a handle. Cloning it is cheap and every clone refers to the same
//! leaf; equality and hashing go by [`LeafId`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::builder::LeafBuilder;
use super::topology::Topology;
use crate::config::{LeafConfig, UnhandledPolicy};
use crate::dispatch::{
    AsyncHandler, Callback, Delivery, Done, FanIn, Handler, HandlerRegistry, Scheduler,
    SignalQueue,
};
use crate::error::{LeafError, Result};
use crate::signal::{Signal, CONNECT, DISCONNECT};

/// Unique identifier for a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(u64);

impl LeafId {
    /// Generate a new unique leaf ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for LeafId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for LeafId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for LeafId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "leaf#{}", self.0)
    }
}

pub(crate) struct LeafInner {
    id: LeafId,
    name: Option<String>,
    handlers: HandlerRegistry,
    queue: Mutex<SignalQueue>,
    topology: Option<Topology>,
    scheduler: Arc<dyn Scheduler>,
    unhandled: UnhandledPolicy,
}

/// A node in a signal-propagation graph.
#[derive(Clone)]
pub struct Leaf {
    inner: Arc<LeafInner>,
}

impl Leaf {
    /// Create a leaf with the built-in `connect`/`disconnect` handlers,
    /// scheduled on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime. Use [`Leaf::builder`]
    /// with an explicit scheduler otherwise.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start building a leaf.
    pub fn builder() -> LeafBuilder {
        LeafBuilder::default()
    }

    /// Create a leaf from a config and a scheduler.
    pub fn with_config(config: LeafConfig, scheduler: Arc<dyn Scheduler>) -> Self {
        let leaf = Self {
            inner: Arc::new(LeafInner {
                id: LeafId::new(),
                name: config.name,
                handlers: HandlerRegistry::new(),
                queue: Mutex::new(SignalQueue::default()),
                topology: config.default_handlers.then(Topology::default),
                scheduler,
                unhandled: config.unhandled,
            }),
        };

        if config.default_handlers {
            leaf.replace_handler(CONNECT, handle_connect);
            leaf.replace_handler(DISCONNECT, handle_disconnect);
        }

        debug!(leaf = %leaf.id(), name = ?leaf.name(), "leaf created");
        leaf
    }

    pub(crate) fn upgrade(weak: &Weak<LeafInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub(crate) fn downgrade(&self) -> Weak<LeafInner> {
        Arc::downgrade(&self.inner)
    }

    /// Get the leaf's ID.
    pub fn id(&self) -> LeafId {
        self.inner.id
    }

    /// Get the leaf's label, if it was given one.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Whether the leaf supports connect, disconnect and broadcast.
    pub fn has_topology(&self) -> bool {
        self.inner.topology.is_some()
    }

    /// Number of queued signals, not counting the one in flight.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Whether a signal is currently being handled.
    pub fn is_busy(&self) -> bool {
        self.inner.queue.lock().is_busy()
    }

    /// Leaves this leaf is connected to, in connection order.
    pub fn outputs(&self) -> Vec<Leaf> {
        self.inner
            .topology
            .as_ref()
            .map(|t| t.outputs().into_vec())
            .unwrap_or_default()
    }

    /// Live leaves connected to this leaf, in connection order.
    pub fn inputs(&self) -> Vec<Leaf> {
        self.inner
            .topology
            .as_ref()
            .map(Topology::inputs)
            .unwrap_or_default()
    }

    /// Whether `peer` is one of this leaf's outputs.
    pub fn is_connected_to(&self, peer: &Leaf) -> bool {
        self.inner
            .topology
            .as_ref()
            .is_some_and(|t| t.has_output(peer.id()))
    }

    // ------------------------------------------------------------------
    // Handler management
    // ------------------------------------------------------------------

    /// Register `handler` for `name`.
    ///
    /// Fails with [`LeafError::HandlerAlreadyRegistered`] if `name` already
    /// has a handler, including the built-in `connect` and `disconnect`.
    pub fn add_handler<H: Handler>(&self, name: &str, handler: H) -> Result<()> {
        self.inner.handlers.add(name, Arc::new(handler))
    }

    /// Register an async handler for `name`.
    ///
    /// The future runs on the tokio runtime that dispatches the signal; its
    /// output is the signal's result.
    pub fn add_async_handler<F, Fut>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(Leaf, Signal) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.add_handler(name, AsyncHandler::new(f))
    }

    /// Remove the handler for `name`.
    ///
    /// Fails with [`LeafError::HandlerNotRegistered`] if there is none.
    pub fn remove_handler(&self, name: &str) -> Result<()> {
        self.inner.handlers.remove(name)
    }

    /// Register `handler` for `name`, replacing any existing handler.
    pub fn replace_handler<H: Handler>(&self, name: &str, handler: H) {
        self.inner.handlers.replace(name, Arc::new(handler));
    }

    /// Whether a handler is registered under exactly `name`.
    pub fn has_handler(&self, name: &str) -> bool {
        self.inner.handlers.contains(name)
    }

    /// Registered handler names, sorted.
    pub fn handler_names(&self) -> Vec<String> {
        self.inner.handlers.names()
    }

    // ------------------------------------------------------------------
    // Signalling
    // ------------------------------------------------------------------

    /// Queue `signal` and schedule a dispatch attempt.
    ///
    /// The newest queued signal is dispatched first. `callback` receives the
    /// handler's result once the signal has been processed.
    pub fn signal(&self, signal: Signal, callback: impl Into<Callback>) {
        let callback = callback.into();
        let depth = {
            let mut queue = self.inner.queue.lock();
            trace!(leaf = %self.id(), signal = ?signal.name(), "signal queued");
            queue.push(signal, callback);
            queue.len()
        };
        trace!(leaf = %self.id(), depth, "dispatch scheduled");
        self.schedule_tick();
    }

    /// Queue `signal` and return a future for its result.
    pub fn send(&self, signal: Signal) -> Delivery {
        let (callback, delivery) = Callback::channel();
        self.signal(signal, callback);
        delivery
    }

    /// Deliver `signal` to every current output.
    ///
    /// The set of outputs is captured when this is called. Each output gets
    /// its own clone of the signal and processes it on its own schedule. The
    /// first output to fail completes `callback` with its error; otherwise
    /// `callback` succeeds once every output has succeeded.
    pub fn broadcast(&self, signal: Signal, callback: impl Into<Callback>) {
        let callback = callback.into();
        let Some(topology) = self.inner.topology.as_ref() else {
            return self.reject(callback, LeafError::TopologyDisabled);
        };

        let targets = topology.outputs();
        if targets.is_empty() {
            trace!(leaf = %self.id(), "broadcast with no outputs");
            return callback.invoke(Ok(()), self.inner.unhandled);
        }

        debug!(
            leaf = %self.id(),
            signal = ?signal.name(),
            outputs = targets.len(),
            "broadcasting"
        );
        let fan_in = Arc::new(FanIn::new(targets.len(), callback, self.inner.unhandled));
        for target in targets {
            let fan_in = Arc::clone(&fan_in);
            target.signal(signal.clone(), move |result: Result<()>| fan_in.settle(result));
        }
    }

    /// Like [`broadcast`](Self::broadcast), returning a future for the
    /// aggregate result.
    pub fn broadcast_all(&self, signal: Signal) -> Delivery {
        let (callback, delivery) = Callback::channel();
        self.broadcast(signal, callback);
        delivery
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Connect this leaf to `peer`.
    ///
    /// Fails through `callback` with [`LeafError::AlreadyConnected`] if
    /// `peer` is already an output, or [`LeafError::TopologyDisabled`] if
    /// either leaf lacks topology support. Otherwise a `connect` signal is
    /// queued and the relation is recorded when it is dispatched.
    pub fn connect(&self, peer: &Leaf, callback: impl Into<Callback>) {
        let callback = callback.into();
        let Some(topology) = self.inner.topology.as_ref() else {
            return self.reject(callback, LeafError::TopologyDisabled);
        };
        if !peer.has_topology() {
            return self.reject(callback, LeafError::TopologyDisabled);
        }
        if topology.has_output(peer.id()) {
            return self.reject(callback, LeafError::AlreadyConnected);
        }
        self.signal(Signal::connect(peer.clone()), callback);
    }

    /// Like [`connect`](Self::connect), returning a future for the result.
    pub fn link(&self, peer: &Leaf) -> Delivery {
        let (callback, delivery) = Callback::channel();
        self.connect(peer, callback);
        delivery
    }

    /// Disconnect this leaf from `peer`.
    ///
    /// Fails through `callback` with [`LeafError::NotConnected`] if `peer`
    /// is not an output, or [`LeafError::TopologyDisabled`] if this leaf
    /// lacks topology support.
    pub fn disconnect(&self, peer: &Leaf, callback: impl Into<Callback>) {
        let callback = callback.into();
        let Some(topology) = self.inner.topology.as_ref() else {
            return self.reject(callback, LeafError::TopologyDisabled);
        };
        if !topology.has_output(peer.id()) {
            return self.reject(callback, LeafError::NotConnected);
        }
        self.signal(Signal::disconnect(peer.clone()), callback);
    }

    /// Like [`disconnect`](Self::disconnect), returning a future for the
    /// result.
    pub fn unlink(&self, peer: &Leaf) -> Delivery {
        let (callback, delivery) = Callback::channel();
        self.disconnect(peer, callback);
        delivery
    }

    fn reject(&self, callback: Callback, err: LeafError) {
        debug!(leaf = %self.id(), error = %err, "request rejected");
        callback.invoke(Err(err), self.inner.unhandled);
    }

    // ------------------------------------------------------------------
    // Dispatch loop
    // ------------------------------------------------------------------

    fn schedule_tick(&self) {
        let leaf = self.clone();
        self.inner.scheduler.defer(Box::new(move || leaf.tick()));
    }

    fn tick(&self) {
        let next = self.inner.queue.lock().begin();
        let Some(pending) = next else {
            return;
        };
        let (signal, callback) = (pending.signal, pending.callback);

        let Some(name) = signal.name().map(str::to_owned) else {
            warn!(leaf = %self.id(), "signal is missing its name");
            self.release();
            return callback.invoke(Err(LeafError::MissingSignalName), self.inner.unhandled);
        };

        let Some(handler) = self.inner.handlers.resolve(&name) else {
            debug!(leaf = %self.id(), signal = %name, "no handler, skipping");
            self.release();
            return callback.invoke(Ok(()), self.inner.unhandled);
        };

        trace!(leaf = %self.id(), signal = %name, "dispatching");
        let done = Done::new(self.clone(), name, callback);
        handler.handle(self, signal, done);
    }

    /// Clear the busy flag and yield before looking at the queue again.
    fn release(&self) {
        self.inner.queue.lock().finish();
        self.schedule_tick();
    }

    pub(crate) fn finish_dispatch(&self, signal: &str, callback: Callback, result: Result<()>) {
        match &result {
            Ok(()) => debug!(leaf = %self.id(), signal, "signal handled"),
            Err(err) => debug!(leaf = %self.id(), signal, error = %err, "signal failed"),
        }
        self.release();
        callback.invoke(result, self.inner.unhandled);
    }

    fn topology(&self) -> Option<&Topology> {
        self.inner.topology.as_ref()
    }
}

/// Built-in `connect` handler: record `peer` as an output of `leaf` and
/// `leaf` as an input of `peer`.
fn handle_connect(leaf: &Leaf, signal: Signal, done: Done) {
    let (Some(peer), Some(topology)) = (signal.target(), leaf.topology()) else {
        return done.fail(LeafError::MissingTarget(CONNECT.to_string()));
    };
    let Some(peer_topology) = peer.topology() else {
        return done.fail(LeafError::TopologyDisabled);
    };

    if !topology.add_output(peer.clone()) {
        debug!(leaf = %leaf.id(), peer = %peer.id(), "already an output");
    }
    peer_topology.add_input(leaf.id(), leaf.downgrade());
    debug!(
        leaf = %leaf.id(),
        peer = %peer.id(),
        outputs = topology.output_count(),
        "connected"
    );
    done.ok();
}

/// Built-in `disconnect` handler: remove both sides of the relation.
fn handle_disconnect(leaf: &Leaf, signal: Signal, done: Done) {
    let (Some(peer), Some(topology)) = (signal.target(), leaf.topology()) else {
        return done.fail(LeafError::MissingTarget(DISCONNECT.to_string()));
    };

    topology.remove_output(peer.id());
    if let Some(peer_topology) = peer.topology() {
        peer_topology.remove_input(leaf.id());
    }
    debug!(leaf = %leaf.id(), peer = %peer.id(), "disconnected");
    done.ok();
}

impl PartialEq for Leaf {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Leaf {}

impl std::hash::Hash for Leaf {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl std::fmt::Debug for Leaf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Leaf")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("pending", &self.pending())
            .field("busy", &self.is_busy())
            .finish()
    }
}
