//! Signal Queue
//!
//! Pending `(signal, callback)` pairs for one leaf, plus the busy flag that
//! keeps at most one of them in flight.
//!
//! New entries are pushed onto the front and taken from the front, so the
//! queue is last-in-first-out: a signal raised while another is being
//! handled (a reply, for instance) overtakes older backlog.

use std::collections::VecDeque;

use super::callback::Callback;
use crate::signal::Signal;

/// A queued signal and the callback waiting for its result.
pub(crate) struct Pending {
    pub(crate) signal: Signal,
    pub(crate) callback: Callback,
}

#[derive(Default)]
pub(crate) struct SignalQueue {
    entries: VecDeque<Pending>,
    busy: bool,
}

impl SignalQueue {
    pub(crate) fn push(&mut self, signal: Signal, callback: Callback) {
        self.entries.push_front(Pending { signal, callback });
    }

    /// Take the next entry and mark the queue busy.
    ///
    /// Returns `None` if an entry is already in flight or nothing is queued.
    pub(crate) fn begin(&mut self) -> Option<Pending> {
        if self.busy {
            return None;
        }
        let next = self.entries.pop_front()?;
        self.busy = true;
        Some(next)
    }

    /// Clear the busy flag after the in-flight entry completed.
    pub(crate) fn finish(&mut self) {
        self.busy = false;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy
    }
}
