//! Leaf Graph
//!
//! This module implements the leaves of a signal-propagation graph and the
//! relations between them.
//!
//! # Overview
//!
//! The graph is directed:
//!
//! - Nodes are [`Leaf`]s, each with its own handler table and signal queue
//! - Edges are output/input relations: if A is connected to B, B is one of
//!   A's outputs and A is one of B's inputs
//!
//! Edges are created and removed by the `connect` and `disconnect` signals,
//! so a topology change is serialized with every other signal the leaf
//! handles. `broadcast` sends a signal along every outgoing edge.
//!
//! # Design Decisions
//!
//! 1. There is no central graph. Each leaf owns its side of every edge,
//!    which lets leaves be created and dropped independently.
//!
//! 2. Outputs are strong references and inputs are weak, so dropping a
//!    leaf never drops a leaf it is connected from.
//!
//! 3. Cycles are allowed and not detected. A cycle of outputs (a leaf
//!    connected to itself, or A to B and B to A) is a strong reference
//!    cycle: the leaves in it stay alive until one edge is disconnected.

mod builder;
mod leaf;
mod topology;

pub use builder::LeafBuilder;
pub use leaf::{Leaf, LeafId};
