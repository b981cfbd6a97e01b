//! Error types for leaf operations.
//!
//! Errors fall into three groups:
//!
//! - Registry misuse (`HandlerAlreadyRegistered`, `HandlerNotRegistered`) is
//!   returned synchronously from the registration call.
//! - Negative topology results (`AlreadyConnected`, `NotConnected`,
//!   `TopologyDisabled`) are delivered through the operation's callback and
//!   never reach the queue.
//! - Everything else is produced while a signal is dispatched and is passed
//!   to the callback of that signal.
//!
//! An unknown signal name is not an error: a leaf may be wired to peers that
//! only understand part of its protocol.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LeafError>;

/// Errors reported by a [`Leaf`](crate::graph::Leaf).
#[derive(Debug, Error)]
pub enum LeafError {
    /// The signal record has no name to dispatch on.
    #[error("signal is missing its `signal` property")]
    MissingSignalName,

    /// `connect` was called for a peer that is already an output.
    #[error("leaf already connected")]
    AlreadyConnected,

    /// `disconnect` was called for a peer that is not an output.
    #[error("leaf not connected")]
    NotConnected,

    /// The leaf (or its peer) was built without connect/disconnect support.
    #[error("leaf was built without connect/disconnect support")]
    TopologyDisabled,

    /// A topology signal arrived without the peer it refers to.
    #[error("`{0}` signal has no target leaf")]
    MissingTarget(String),

    /// `add_handler` was called for a name that already has a handler.
    #[error("handler already registered: {0}")]
    HandlerAlreadyRegistered(String),

    /// `remove_handler` was called for a name with no handler.
    #[error("handler not registered: {0}")]
    HandlerNotRegistered(String),

    /// The handler dropped its continuation without completing it.
    #[error("handler for `{signal}` dropped its continuation")]
    Abandoned {
        /// Name of the signal that was being handled.
        signal: String,
    },

    /// An async handler was dispatched outside a tokio runtime.
    #[error("async handler for `{signal}` needs a tokio runtime")]
    NoRuntime {
        /// Name of the signal that was being handled.
        signal: String,
    },

    /// The callback behind a [`Delivery`](crate::dispatch::Delivery) was
    /// dropped before it reported a result.
    #[error("delivery callback dropped before completion")]
    Closed,

    /// A leaf configuration document could not be parsed.
    #[error("invalid leaf config: {0}")]
    Config(#[from] serde_json::Error),

    /// Error reported by a handler, passed through unchanged.
    #[error("{0}")]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl LeafError {
    /// Build a handler error from a plain message.
    pub fn handler(message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Handler(message.into())
    }

    /// Wrap any error value as a handler error.
    pub fn from_handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Handler(Box::new(error))
    }
}
