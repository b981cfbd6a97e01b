//! Completion callbacks.
//!
//! Every leaf operation reports its outcome exactly once through a
//! [`Callback`]. The default, [`Callback::Unhandled`], refuses to swallow
//! errors: what happens to them is decided by the leaf's
//! [`UnhandledPolicy`]. Callers that want the result either pass a closure or
//! await a [`Delivery`].

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::config::UnhandledPolicy;
use crate::error::{LeafError, Result};

/// Receiver of an operation's outcome.
#[derive(Default)]
pub enum Callback {
    /// Nobody is listening. Errors are handled by the leaf's
    /// [`UnhandledPolicy`].
    #[default]
    Unhandled,

    /// Discard the outcome, including errors.
    Ignore,

    /// Call a closure with the outcome.
    Func(Box<dyn FnOnce(Result<()>) + Send + 'static>),

    /// Send the outcome to a [`Delivery`].
    Channel(oneshot::Sender<Result<()>>),
}

impl Callback {
    /// Create a callback and the future that resolves with its outcome.
    pub fn channel() -> (Self, Delivery) {
        let (tx, rx) = oneshot::channel();
        (Self::Channel(tx), Delivery { rx })
    }

    /// Wrap a closure.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        Self::Func(Box::new(f))
    }

    /// Report `result`.
    ///
    /// # Panics
    ///
    /// An `Unhandled` callback panics on error when `policy` is
    /// [`UnhandledPolicy::Panic`], unless the thread is already unwinding.
    pub(crate) fn invoke(self, result: Result<()>, policy: UnhandledPolicy) {
        match self {
            Self::Unhandled => {
                if let Err(err) = result {
                    tracing::error!(error = %err, "unhandled leaf error");
                    // A second panic during unwinding would abort the process.
                    if policy == UnhandledPolicy::Panic && !std::thread::panicking() {
                        panic!("unhandled leaf error: {err}");
                    }
                }
            }
            Self::Ignore => {}
            Self::Func(f) => f(result),
            Self::Channel(tx) => {
                if let Err(Err(err)) = tx.send(result) {
                    tracing::debug!(error = %err, "delivery dropped before error arrived");
                }
            }
        }
    }
}

impl<F> From<F> for Callback
where
    F: FnOnce(Result<()>) + Send + 'static,
{
    fn from(f: F) -> Self {
        Self::from_fn(f)
    }
}

impl std::fmt::Debug for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Unhandled => "Unhandled",
            Self::Ignore => "Ignore",
            Self::Func(_) => "Func",
            Self::Channel(_) => "Channel",
        };
        f.debug_tuple("Callback").field(&kind).finish()
    }
}

/// Future resolving to the outcome of a leaf operation.
#[must_use = "a dropped delivery discards the outcome"]
#[derive(Debug)]
pub struct Delivery {
    rx: oneshot::Receiver<Result<()>>,
}

impl Delivery {
    /// Poll without blocking. Returns `None` while the outcome is pending.
    pub fn try_result(&mut self) -> Option<Result<()>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(LeafError::Closed)),
        }
    }
}

impl Future for Delivery {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(LeafError::Closed)))
    }
}

/// Joins the per-output results of a broadcast into one callback.
///
/// The first error completes the aggregate immediately; results arriving
/// after that are dropped. If every output succeeds, the last one completes
/// the aggregate with success.
pub(crate) struct FanIn {
    state: Mutex<FanInState>,
    policy: UnhandledPolicy,
}

struct FanInState {
    remaining: usize,
    callback: Option<Callback>,
}

impl FanIn {
    pub(crate) fn new(outputs: usize, callback: Callback, policy: UnhandledPolicy) -> Self {
        Self {
            state: Mutex::new(FanInState {
                remaining: outputs,
                callback: Some(callback),
            }),
            policy,
        }
    }

    pub(crate) fn settle(&self, result: Result<()>) {
        let callback = {
            let mut state = self.state.lock();
            state.remaining = state.remaining.saturating_sub(1);
            if result.is_err() || state.remaining == 0 {
                state.callback.take()
            } else {
                None
            }
        };

        match callback {
            Some(callback) => callback.invoke(result, self.policy),
            None => {
                if let Err(err) = result {
                    tracing::debug!(error = %err, "broadcast already settled, dropping error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recorder() -> (Callback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = Callback::from_fn(move |result: Result<()>| {
            sink.lock().push(match result {
                Ok(()) => "ok".to_string(),
                Err(err) => err.to_string(),
            });
        });
        (callback, seen)
    }

    #[test]
    fn unhandled_ok_is_silent() {
        Callback::Unhandled.invoke(Ok(()), UnhandledPolicy::Panic);
    }

    #[test]
    #[should_panic(expected = "unhandled leaf error: leaf not connected")]
    fn unhandled_error_panics_by_default() {
        Callback::default().invoke(Err(LeafError::NotConnected), UnhandledPolicy::Panic);
    }

    #[test]
    fn unhandled_error_only_logs_under_log_policy() {
        Callback::Unhandled.invoke(Err(LeafError::NotConnected), UnhandledPolicy::Log);
    }

    #[test]
    fn channel_delivers_outcome() {
        let (callback, mut delivery) = Callback::channel();
        assert!(delivery.try_result().is_none());

        callback.invoke(Err(LeafError::AlreadyConnected), UnhandledPolicy::Panic);
        assert!(matches!(
            delivery.try_result(),
            Some(Err(LeafError::AlreadyConnected))
        ));
    }

    #[test]
    fn dropped_callback_closes_delivery() {
        let (callback, mut delivery) = Callback::channel();
        drop(callback);
        assert!(matches!(delivery.try_result(), Some(Err(LeafError::Closed))));
    }

    #[tokio::test]
    async fn delivery_can_be_awaited() {
        let (callback, delivery) = Callback::channel();
        callback.invoke(Ok(()), UnhandledPolicy::Panic);
        assert!(delivery.await.is_ok());
    }

    #[test]
    fn fan_in_succeeds_after_every_output() {
        let (callback, seen) = recorder();
        let fan_in = FanIn::new(3, callback, UnhandledPolicy::Panic);

        fan_in.settle(Ok(()));
        fan_in.settle(Ok(()));
        assert!(seen.lock().is_empty());

        fan_in.settle(Ok(()));
        assert_eq!(*seen.lock(), vec!["ok"]);
    }

    #[test]
    fn fan_in_fails_fast_on_first_error() {
        let (callback, seen) = recorder();
        let fan_in = FanIn::new(3, callback, UnhandledPolicy::Panic);

        fan_in.settle(Err(LeafError::handler("first")));
        assert_eq!(*seen.lock(), vec!["first"]);

        fan_in.settle(Err(LeafError::handler("second")));
        fan_in.settle(Ok(()));
        assert_eq!(*seen.lock(), vec!["first"]);
    }
}
