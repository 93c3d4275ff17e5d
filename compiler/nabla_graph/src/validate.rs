//! Structural validation for the nabla IR.
//!
//! Checks the invariants every pass relies on: sentinel integrity,
//! position-numbering consistency, use-list symmetry, and topological
//! order of every block (each input produced in the same block must come
//! from an earlier node; inputs from other blocks must come from an
//! enclosing scope).
//!
//! Validation is a test/debug aid at the API boundary. Passes themselves
//! assert invariants directly and panic — a broken invariant mid-pass is a
//! compiler bug, not a recoverable condition.

use thiserror::Error;

use crate::graph::Graph;
use crate::ids::{BlockId, NodeId, ValueId};
use crate::ops::OpKind;

/// A structural defect found by [`validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("block {block:?} has a malformed sentinel")]
    BadSentinel { block: BlockId },

    #[error("block {block:?} body is mis-numbered at {node:?}")]
    BadPosition { block: BlockId, node: NodeId },

    #[error("{node:?} uses {value:?} before it is defined")]
    UseBeforeDef { node: NodeId, value: ValueId },

    #[error("{node:?} uses {value:?} from a non-enclosing scope")]
    ScopeEscape { node: NodeId, value: ValueId },

    #[error("use list of {value:?} disagrees with the inputs of {node:?}")]
    InconsistentUse { node: NodeId, value: ValueId },

    #[error("side-effecting {node:?} found inside cluster subgraph {block:?}")]
    SideEffectInCluster { block: BlockId, node: NodeId },
}

/// Validate the whole graph, starting from the top-level block.
pub fn validate(g: &Graph) -> Result<(), GraphError> {
    validate_block(g, g.top(), false)
}

fn validate_block(g: &Graph, b: BlockId, in_cluster: bool) -> Result<(), GraphError> {
    let param = g.param_node(b);
    let ret = g.return_node(b);
    if !matches!(g.kind(param), OpKind::Param)
        || !matches!(g.kind(ret), OpKind::Return)
        || g.position(param) != 0
        || g.position(ret) as usize != g.body(b).len() + 1
    {
        return Err(GraphError::BadSentinel { block: b });
    }

    for (i, &n) in g.body(b).iter().enumerate() {
        if g.position(n) as usize != i + 1 || g.owner_block(n) != Some(b) {
            return Err(GraphError::BadPosition { block: b, node: n });
        }
        if in_cluster && g.kind(n).has_side_effects() {
            return Err(GraphError::SideEffectInCluster { block: b, node: n });
        }
    }

    let mut all = vec![param];
    all.extend_from_slice(g.body(b));
    all.push(ret);
    for n in all {
        validate_node_inputs(g, b, n)?;
        for (i, &v) in g.outputs(n).iter().enumerate() {
            if g.producer(v) != n || g.producer_offset(v) != i {
                return Err(GraphError::InconsistentUse { node: n, value: v });
            }
        }
        for &nested in g.node_blocks(n) {
            validate_block(g, nested, in_cluster || g.kind(n).is_cluster())?;
        }
    }
    Ok(())
}

fn validate_node_inputs(g: &Graph, b: BlockId, n: NodeId) -> Result<(), GraphError> {
    for (i, &v) in g.inputs(n).iter().enumerate() {
        // symmetry: the value must record this use
        let recorded = g
            .uses(v)
            .iter()
            .any(|u| u.user == n && u.offset as usize == i);
        if !recorded {
            return Err(GraphError::InconsistentUse { node: n, value: v });
        }

        let producer = g.producer(v);
        let Some(producer_block) = g.owner_block(producer) else {
            return Err(GraphError::UseBeforeDef { node: n, value: v });
        };
        if producer_block == b {
            // param sentinel is position 0, so block params always pass
            if n != g.return_node(b) && !g.is_before(producer, n) && producer != n {
                return Err(GraphError::UseBeforeDef { node: n, value: v });
            }
        } else if !is_enclosing(g, producer_block, b) {
            return Err(GraphError::ScopeEscape { node: n, value: v });
        }
    }
    Ok(())
}

/// Returns `true` if `outer` encloses `inner` (walking block-owner chains).
fn is_enclosing(g: &Graph, outer: BlockId, inner: BlockId) -> bool {
    let mut cur = inner;
    loop {
        if cur == outer {
            return true;
        }
        match g.block_owner(cur).and_then(|n| g.owner_block(n)) {
            Some(parent) => cur = parent,
            None => return false,
        }
    }
}
