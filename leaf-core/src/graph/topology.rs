//! Output/input relations of a leaf.
//!
//! Outputs are the leaves this leaf forwards to; inputs are the leaves that
//! forward to it. The two sides are kept symmetric by the built-in
//! `connect`/`disconnect` handlers, which are the only writers:
//!
//! - `A.connect(B)` inserts B into A's outputs and A into B's inputs
//! - `A.disconnect(B)` removes both entries
//!
//! Outputs hold strong references so `broadcast` can reach them. Inputs hold
//! weak references: being connected *from* a leaf never keeps it alive.

use std::sync::Weak;

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::leaf::{Leaf, LeafId, LeafInner};

/// Snapshot of a leaf's outputs, taken for one broadcast.
pub(crate) type Targets = SmallVec<[Leaf; 4]>;

#[derive(Default)]
pub(crate) struct Topology {
    outputs: Mutex<IndexMap<LeafId, Leaf>>,
    inputs: Mutex<IndexMap<LeafId, Weak<LeafInner>>>,
}

impl Topology {
    pub(crate) fn has_output(&self, id: LeafId) -> bool {
        self.outputs.lock().contains_key(&id)
    }

    /// Insert an output. Returns `false` if it was already present.
    pub(crate) fn add_output(&self, leaf: Leaf) -> bool {
        self.outputs.lock().insert(leaf.id(), leaf).is_none()
    }

    /// Remove an output, keeping the order of the rest.
    pub(crate) fn remove_output(&self, id: LeafId) -> bool {
        self.outputs.lock().shift_remove(&id).is_some()
    }

    /// Record an input, dropping entries whose leaf is gone.
    pub(crate) fn add_input(&self, id: LeafId, leaf: Weak<LeafInner>) {
        let mut inputs = self.inputs.lock();
        inputs.retain(|_, weak| weak.strong_count() > 0);
        inputs.insert(id, leaf);
    }

    pub(crate) fn remove_input(&self, id: LeafId) -> bool {
        self.inputs.lock().shift_remove(&id).is_some()
    }

    pub(crate) fn outputs(&self) -> Targets {
        self.outputs.lock().values().cloned().collect()
    }

    /// Inputs that are still alive, in connection order. Dead entries are
    /// pruned on the way.
    pub(crate) fn inputs(&self) -> Vec<Leaf> {
        let mut inputs = self.inputs.lock();
        inputs.retain(|_, weak| weak.strong_count() > 0);
        inputs.values().filter_map(Leaf::upgrade).collect()
    }

    pub(crate) fn output_count(&self) -> usize {
        self.outputs.lock().len()
    }
}
