//! Handlers and the per-leaf handler registry.
//!
//! A handler is invoked with the owning leaf, the signal, and a [`Done`]
//! continuation. It may finish synchronously or hand `Done` to some other
//! task and finish later; the leaf will not dispatch its next signal until
//! `Done` completes.

use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;

use super::callback::Callback;
use crate::error::{LeafError, Result};
use crate::graph::Leaf;
use crate::signal::{Signal, WILDCARD};

/// Processes signals of one name on behalf of a leaf.
pub trait Handler: Send + Sync + 'static {
    /// Handle `signal` for `leaf`, completing `done` exactly once.
    fn handle(&self, leaf: &Leaf, signal: Signal, done: Done);
}

impl<F> Handler for F
where
    F: Fn(&Leaf, Signal, Done) + Send + Sync + 'static,
{
    fn handle(&self, leaf: &Leaf, signal: Signal, done: Done) {
        self(leaf, signal, done)
    }
}

/// Adapts an async closure into a [`Handler`].
///
/// The returned future is spawned on the tokio runtime of the dispatching
/// context and its output completes the continuation.
pub struct AsyncHandler<F> {
    f: F,
}

impl<F> AsyncHandler<F> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> Handler for AsyncHandler<F>
where
    F: Fn(Leaf, Signal) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn handle(&self, leaf: &Leaf, signal: Signal, done: Done) {
        let Ok(runtime) = Handle::try_current() else {
            let signal = done.signal_name().to_string();
            done.complete(Err(LeafError::NoRuntime { signal }));
            return;
        };
        let work = (self.f)(leaf.clone(), signal);
        runtime.spawn(async move { done.complete(work.await) });
    }
}

/// Continuation handed to a handler.
///
/// Completing it releases the leaf for its next signal and reports the
/// result to whoever sent the signal. It is consumed on completion, so it
/// cannot complete twice; dropping it uncompleted reports
/// [`LeafError::Abandoned`].
#[must_use = "the leaf stays busy until the continuation completes"]
pub struct Done {
    leaf: Leaf,
    signal: String,
    callback: Option<Callback>,
}

impl Done {
    pub(crate) fn new(leaf: Leaf, signal: String, callback: Callback) -> Self {
        Self {
            leaf,
            signal,
            callback: Some(callback),
        }
    }

    /// Name of the signal being handled.
    pub fn signal_name(&self) -> &str {
        &self.signal
    }

    /// Complete with `result`.
    pub fn complete(mut self, result: Result<()>) {
        self.finish(result);
    }

    /// Complete successfully.
    pub fn ok(self) {
        self.complete(Ok(()));
    }

    /// Complete with an error.
    pub fn fail(self, err: LeafError) {
        self.complete(Err(err));
    }

    fn finish(&mut self, result: Result<()>) {
        if let Some(callback) = self.callback.take() {
            self.leaf.finish_dispatch(&self.signal, callback, result);
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if self.callback.is_none() {
            return;
        }
        tracing::warn!(
            leaf = %self.leaf.id(),
            signal = %self.signal,
            "handler dropped its continuation"
        );
        let signal = self.signal.clone();
        self.finish(Err(LeafError::Abandoned { signal }));
    }
}

impl std::fmt::Debug for Done {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Done")
            .field("leaf", &self.leaf.id())
            .field("signal", &self.signal)
            .finish()
    }
}

/// Name → handler table owned by one leaf.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` under `name`, failing if the name is taken.
    pub fn add(&self, name: &str, handler: Arc<dyn Handler>) -> Result<()> {
        match self.handlers.entry(name.to_string()) {
            Entry::Occupied(_) => Err(LeafError::HandlerAlreadyRegistered(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(handler);
                Ok(())
            }
        }
    }

    /// Remove the handler for `name`, failing if there is none.
    pub fn remove(&self, name: &str) -> Result<()> {
        self.handlers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| LeafError::HandlerNotRegistered(name.to_string()))
    }

    /// Install `handler` under `name`, replacing any existing one.
    pub fn replace(&self, name: &str, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Find the handler for `name`, falling back to the wildcard handler.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .get(name)
            .or_else(|| self.handlers.get(WILDCARD))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Whether a handler is registered under exactly `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
