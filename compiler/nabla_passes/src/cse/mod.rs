//! Common-subexpression elimination.
//!
//! Two nodes are common when they have the same kind and the same input
//! values. Later duplicates fold onto the first occurrence. Nodes with
//! side effects, in-place writes, or nested blocks never participate.
//!
//! Runs over one block, recursing into nested control-flow blocks but not
//! into cluster subgraphs — those are deduplicated individually by the
//! clustering pass before their size is measured.

use rustc_hash::FxHashMap;

use nabla_graph::{BlockId, Graph, NodeId, OpKind, ValueId};

/// Fold duplicate computations in `block`. Returns the number of nodes
/// removed.
pub fn eliminate_common_subexpressions(g: &mut Graph, block: BlockId) -> usize {
    let mut seen: FxHashMap<(OpKind, Vec<ValueId>), NodeId> = FxHashMap::default();
    let mut removed = 0;
    for n in g.body(block).to_vec() {
        if !g.kind(n).is_cluster() {
            for b in g.node_blocks(n).to_vec() {
                removed += eliminate_common_subexpressions(g, b);
            }
        }
        if g.kind(n).has_side_effects()
            || g.kind(n).writes_first_input()
            || !g.node_blocks(n).is_empty()
        {
            continue;
        }
        let key = (g.kind(n).clone(), g.inputs(n).to_vec());
        if let Some(&keep) = seen.get(&key) {
            let dead: Vec<ValueId> = g.outputs(n).to_vec();
            let kept: Vec<ValueId> = g.outputs(keep).to_vec();
            for (&d, &k) in dead.iter().zip(&kept) {
                g.replace_all_uses(d, k);
            }
            g.destroy_node(n);
            removed += 1;
        } else {
            seen.insert(key, n);
        }
    }
    if removed > 0 {
        tracing::debug!(?block, removed, "eliminated common subexpressions");
    }
    removed
}
