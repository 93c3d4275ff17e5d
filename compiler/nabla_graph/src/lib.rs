//! Tensor dataflow IR for the nabla JIT.
//!
//! This crate provides:
//!
//! - **Arena IR** ([`Graph`], [`Block`], [`Node`], [`Value`]) — a mutable
//!   dataflow graph referenced by stable IDs ([`NodeId`], [`ValueId`],
//!   [`BlockId`]). Blocks are topologically ordered node sequences bounded
//!   by param/return sentinels; nodes may own nested blocks for structured
//!   control flow and for cluster subgraphs.
//!
//! - **Op catalog** ([`OpKind`]) — kind tags with the behavioral predicates
//!   the passes depend on: side effects, view semantics, in-place writes,
//!   output/input aliasing, executed-op counting.
//!
//! - **Types** ([`Type`], [`TensorMeta`]) — tensor types carry a
//!   three-state requires-grad annotation (absent / `true` / `false`).
//!
//! - **Validation** ([`validate`], [`GraphError`]) — structural invariant
//!   checking for tests and API boundaries.
//!
//! # Design
//!
//! Mutation is identity-preserving: values keep their IDs when their
//! producer is re-pointed (e.g. when a node is wrapped into a cluster), so
//! use lists and externally held alias facts survive graph surgery. All
//! surgery goes through [`Graph`] methods, which keep use lists, positions,
//! and offsets consistent.

mod display;
mod graph;
mod ids;
mod ops;
mod types;
mod validate;

#[cfg(test)]
mod test_helpers;

pub use display::describe_node;
pub use graph::{Block, Graph, Node, Use, Value};
pub use ids::{BlockId, NodeId, ValueId};
pub use ops::OpKind;
pub use types::{Constant, TensorMeta, Type};
pub use validate::{validate, GraphError};
