//! Signal Records
//!
//! A signal is the message a leaf dispatches on. It carries:
//!
//! - a name, used to pick the handler (`None` or empty means "missing")
//! - a JSON payload for handler-specific data
//! - an optional target leaf, used by the `connect`/`disconnect` signals
//!
//! Signals are consumed by exactly one handler. `broadcast` hands every
//! output its own clone of the same record.

use serde_json::{Map, Value};

use crate::graph::Leaf;

/// Name of the built-in signal that adds an output.
pub const CONNECT: &str = "connect";

/// Name of the built-in signal that removes an output.
pub const DISCONNECT: &str = "disconnect";

/// Handler name that receives every signal without a dedicated handler.
pub const WILDCARD: &str = "*";

/// A named message routed through a leaf's handler table.
#[derive(Debug, Clone, Default)]
pub struct Signal {
    name: Option<String>,
    payload: Value,
    target: Option<Leaf>,
}

impl Signal {
    /// Create a signal with the given name and a `null` payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Create a signal without a name.
    ///
    /// Dispatching it always fails with
    /// [`LeafError::MissingSignalName`](crate::error::LeafError::MissingSignalName).
    pub fn unnamed() -> Self {
        Self::default()
    }

    /// Build a signal from a JSON record of the form
    /// `{"signal": "<name>", ...fields}`.
    ///
    /// The `signal` field becomes the name (if it is a string); the remaining
    /// fields become the payload object. Non-object values become the payload
    /// of an unnamed signal.
    pub fn from_record(record: Value) -> Self {
        match record {
            Value::Object(mut fields) => {
                let name = match fields.remove("signal") {
                    Some(Value::String(name)) => Some(name),
                    _ => None,
                };
                Self {
                    name,
                    payload: Value::Object(fields),
                    target: None,
                }
            }
            other => Self {
                name: None,
                payload: other,
                target: None,
            },
        }
    }

    pub(crate) fn connect(peer: Leaf) -> Self {
        Self::new(CONNECT).with_target(peer)
    }

    pub(crate) fn disconnect(peer: Leaf) -> Self {
        Self::new(DISCONNECT).with_target(peer)
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a target leaf.
    pub fn with_target(mut self, target: Leaf) -> Self {
        self.target = Some(target);
        self
    }

    /// The signal name, if present and non-empty.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    /// The payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// A single payload field, if the payload is an object.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.as_object().and_then(|fields| fields.get(key))
    }

    /// The target leaf, if any.
    pub fn target(&self) -> Option<&Leaf> {
        self.target.as_ref()
    }

    /// Convert back into a JSON record. The target leaf is not included.
    pub fn into_record(self) -> Value {
        let mut fields = match self.payload {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                let mut fields = Map::new();
                fields.insert("payload".to_string(), other);
                fields
            }
        };
        if let Some(name) = self.name {
            fields.insert("signal".to_string(), Value::String(name));
        }
        Value::Object(fields)
    }
}
