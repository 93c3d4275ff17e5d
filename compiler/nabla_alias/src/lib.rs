//! Alias analysis for the nabla IR.
//!
//! This crate answers the two questions the clustering pass needs:
//!
//! 1. Can node `P` be relocated to immediately before node `C` without
//!    violating a data or memory dependency? ([`try_move_before`] — which
//!    also *performs* the move on success.)
//! 2. Do two outputs of a cluster's subgraph alias each other, or alias one
//!    of the subgraph's own inputs? ([`aliased_output_pairs`],
//!    [`outputs_aliasing_inputs`].)
//!
//! # Model
//!
//! May-alias is an equivalence over values, kept in a union-find: view ops
//! and in-place ops alias their output to an input (per the op catalog),
//! and a cluster boundary aliases outer input *i* to inner param *i* and
//! outer output *j* to inner output operand *j*. Writes come straight from
//! the catalog (`writes_first_input`). Side-effecting nodes are never
//! reordered around at all, so no heap model is needed for them.
//!
//! # Consistency discipline
//!
//! One [`AliasDb`] is built per pass invocation and kept consistent
//! *incrementally* during subgraph construction: the subgraph utilities
//! call [`AliasDb::union`] whenever a boundary value pair is created.
//! Conservative staleness is fine (a destroyed value's set member is just
//! never queried again); missing aliasing would not be.

mod db;
mod move_check;

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests;

pub use db::AliasDb;
pub use move_check::try_move_before;

use nabla_graph::{Graph, NodeId};

/// Pairs of output offsets of `cluster`'s subgraph that may alias each
/// other, as `(i, j)` with `i < j` in output order.
///
/// Computed over a fresh scope-local [`AliasDb`], since this is only asked
/// after subgraph construction has finished (phase 2).
pub fn aliased_output_pairs(g: &Graph, cluster: NodeId) -> Vec<(usize, usize)> {
    let sub = g.cluster_subgraph(cluster);
    let mut db = AliasDb::build_scope(g, sub);
    let outs = g.block_outputs(sub);
    let mut pairs = Vec::new();
    for i in 0..outs.len() {
        for j in i + 1..outs.len() {
            if db.may_alias(outs[i], outs[j]) {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Output offsets of `cluster`'s subgraph that may alias one of the
/// subgraph's own inputs.
pub fn outputs_aliasing_inputs(g: &Graph, cluster: NodeId) -> Vec<usize> {
    let sub = g.cluster_subgraph(cluster);
    let mut db = AliasDb::build_scope(g, sub);
    let outs: Vec<_> = g.block_outputs(sub).to_vec();
    let params: Vec<_> = g.block_params(sub).to_vec();
    let mut offending = Vec::new();
    for (j, &out) in outs.iter().enumerate() {
        if params.iter().any(|&p| db.may_alias(out, p)) {
            offending.push(j);
        }
    }
    offending
}
