//! Leaf Configuration
//!
//! Construction options for a [`Leaf`](crate::graph::Leaf). The config is
//! plain data so it can be embedded in a larger application config and
//! deserialized with serde. Every field has a default, so an empty document
//! yields a leaf with connect/disconnect support and the loud error policy.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the default callback does with an error nobody asked to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledPolicy {
    /// Log the error and panic in the context that completed the signal.
    #[default]
    Panic,

    /// Log the error and carry on.
    Log,
}

/// Options used to build a leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeafConfig {
    /// Label used in logs and `Debug` output.
    pub name: Option<String>,

    /// Install the built-in `connect`/`disconnect` handlers and the
    /// input/output relation storage.
    pub default_handlers: bool,

    /// Policy for errors that reach the default callback.
    pub unhandled: UnhandledPolicy,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self {
            name: None,
            default_handlers: true,
            unhandled: UnhandledPolicy::Panic,
        }
    }
}

impl LeafConfig {
    /// Config for a leaf with no topology support.
    pub fn without_default_handlers() -> Self {
        Self {
            default_handlers: false,
            ..Self::default()
        }
    }

    /// Parse a config from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
