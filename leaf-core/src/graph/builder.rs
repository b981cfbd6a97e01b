//! Builder for [`Leaf`].

use std::sync::Arc;

use super::leaf::Leaf;
use crate::config::{LeafConfig, UnhandledPolicy};
use crate::dispatch::{Scheduler, TokioScheduler};

/// Configures and creates a [`Leaf`].
///
/// # Example
///
/// ```rust,ignore
/// let scheduler = Arc::new(ManualScheduler::new());
/// let leaf = Leaf::builder()
///     .name("sink")
///     .scheduler(scheduler.clone())
///     .build();
/// ```
#[derive(Default)]
pub struct LeafBuilder {
    config: LeafConfig,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl LeafBuilder {
    /// Replace the whole config.
    pub fn config(mut self, config: LeafConfig) -> Self {
        self.config = config;
        self
    }

    /// Label the leaf in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Install (or skip) the built-in `connect`/`disconnect` handlers.
    pub fn default_handlers(mut self, enabled: bool) -> Self {
        self.config.default_handlers = enabled;
        self
    }

    /// Policy for errors that reach the default callback.
    pub fn unhandled(mut self, policy: UnhandledPolicy) -> Self {
        self.config.unhandled = policy;
        self
    }

    /// Schedule dispatch steps on `scheduler` instead of the current tokio
    /// runtime.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Create the leaf.
    ///
    /// # Panics
    ///
    /// Panics if no scheduler was set and there is no current tokio runtime.
    pub fn build(self) -> Leaf {
        let scheduler: Arc<dyn Scheduler> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::current()),
        };
        Leaf::with_config(self.config, scheduler)
    }
}

impl std::fmt::Debug for LeafBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafBuilder")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}
