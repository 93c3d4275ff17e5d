//! Cluster subgraph surgery: wrap, grow, dissolve, disalias.
//!
//! A cluster node owns exactly one nested block; cluster input `i` feeds
//! the block's param value `i`, and the block's output operand `j` is
//! exposed as cluster output `j`. Every helper here maintains that
//! correspondence.
//!
//! Outer values keep their identity through all of this: when a node is
//! pulled into a cluster, its escaping outputs are re-pointed onto the
//! cluster node rather than replaced, so outer use lists and alias facts
//! survive without rewrites.

use rustc_hash::FxHashSet;

use nabla_alias::{aliased_output_pairs, outputs_aliasing_inputs, AliasDb};
use nabla_graph::{BlockId, Graph, NodeId, OpKind, ValueId};

/// Wrap `node` in a fresh single-member cluster at its current position.
/// Returns the cluster node.
pub fn wrap_in_singleton(g: &mut Graph, db: &mut AliasDb, node: NodeId) -> NodeId {
    debug_assert!(!g.kind(node).is_cluster(), "wrapping a cluster in a cluster");
    let inputs: Vec<ValueId> = g.inputs(node).to_vec();
    let cluster = g.create_node(OpKind::Cluster, &inputs, &[]);
    g.insert_before(cluster, node);
    let sub = g.add_nested_block(cluster);
    let ret = g.return_node(sub);
    g.remove_from_block(node);
    g.insert_before(node, ret);

    for (i, &outer) in inputs.iter().enumerate() {
        let ty = *g.value_ty(outer);
        let p = g.add_block_param(sub, ty);
        g.replace_input(node, i, p);
        db.union(p, outer);
    }
    let outs: Vec<ValueId> = g.outputs(node).to_vec();
    for (slot, &outer) in outs.iter().enumerate() {
        let ty = *g.value_ty(outer);
        let (displaced, inner) = g.refresh_output(node, slot, ty);
        debug_assert_eq!(displaced, outer);
        g.adopt_output(cluster, outer);
        g.add_block_output(sub, inner);
        db.union(outer, inner);
    }
    cluster
}

/// Pull `producer` — the node immediately before `cluster` — into the
/// cluster's subgraph.
///
/// Constant inputs are re-materialized inside the subgraph instead of
/// becoming cluster inputs; per-cluster deduplication folds the copies
/// later. Producer outputs consumed by the cluster turn into internal
/// edges; outputs with remaining outside uses are exposed as cluster
/// outputs, keeping their outer identity.
pub fn merge_into(g: &mut Graph, db: &mut AliasDb, producer: NodeId, cluster: NodeId) {
    debug_assert!(g.kind(cluster).is_cluster());
    debug_assert_eq!(
        g.next_in_block(producer),
        Some(cluster),
        "producer must sit immediately before the cluster"
    );
    if g.kind(producer).is_cluster() {
        merge_cluster_producer(g, db, producer, cluster);
    } else {
        merge_plain_producer(g, db, producer, cluster);
    }
}

fn merge_plain_producer(g: &mut Graph, db: &mut AliasDb, producer: NodeId, cluster: NodeId) {
    let sub = g.cluster_subgraph(cluster);
    let front = front_anchor(g, sub);
    let pins: Vec<ValueId> = g.inputs(producer).to_vec();
    let mut resolved = Vec::with_capacity(pins.len());
    for &v in &pins {
        resolved.push(import_value(g, db, cluster, sub, front, v));
    }
    g.remove_from_block(producer);
    g.insert_before(producer, front);
    for (i, &r) in resolved.iter().enumerate() {
        g.replace_input(producer, i, r);
    }
    let outs: Vec<ValueId> = g.outputs(producer).to_vec();
    for (slot, &outer) in outs.iter().enumerate() {
        let ty = *g.value_ty(outer);
        let (displaced, inner) = g.refresh_output(producer, slot, ty);
        debug_assert_eq!(displaced, outer);
        absorb_output(g, db, cluster, sub, outer, inner);
    }
}

/// Merging a cluster producer splices its body in at the front and retires
/// the producer node entirely.
fn merge_cluster_producer(g: &mut Graph, db: &mut AliasDb, producer: NodeId, cluster: NodeId) {
    let sub = g.cluster_subgraph(cluster);
    let psub = g.cluster_subgraph(producer);
    let front = front_anchor(g, sub);

    let pins: Vec<ValueId> = g.inputs(producer).to_vec();
    let pparams: Vec<ValueId> = g.block_params(psub).to_vec();
    for (&outer, &p) in pins.iter().zip(&pparams) {
        let mapped = import_value(g, db, cluster, sub, front, outer);
        g.replace_all_uses(p, mapped);
    }
    for n in g.body(psub).to_vec() {
        g.move_before(n, front);
    }

    let pouts: Vec<ValueId> = g.block_outputs(psub).to_vec();
    for off in (0..pouts.len()).rev() {
        g.remove_block_output(psub, off);
    }
    for &inner in &pouts {
        let outer = g.remove_output(producer, 0);
        absorb_output(g, db, cluster, sub, outer, inner);
    }
    g.destroy_node(producer);
}

/// Wire one producer output into the consuming cluster: uses behind the
/// cluster boundary switch to the inner value; the outer value either dies
/// or becomes a cluster output.
fn absorb_output(
    g: &mut Graph,
    db: &mut AliasDb,
    cluster: NodeId,
    sub: BlockId,
    outer: ValueId,
    inner: ValueId,
) {
    while let Some(k) = g.inputs(cluster).iter().position(|&x| x == outer) {
        let p = g.block_params(sub)[k];
        g.replace_all_uses(p, inner);
        g.remove_input(cluster, k);
        g.remove_block_param(sub, k);
    }
    db.union(outer, inner);
    if g.uses(outer).is_empty() {
        g.destroy_value(outer);
    } else {
        g.adopt_output(cluster, outer);
        g.add_block_output(sub, inner);
    }
}

/// Resolve an outer value to something usable inside the subgraph: an
/// existing param, a fresh param, or (for constants) a copy materialized
/// at the subgraph front.
fn import_value(
    g: &mut Graph,
    db: &mut AliasDb,
    cluster: NodeId,
    sub: BlockId,
    front: NodeId,
    v: ValueId,
) -> ValueId {
    let vp = g.producer(v);
    if g.kind(vp).is_constant() && g.owner_block(vp) != Some(sub) {
        let kind = g.kind(vp).clone();
        let ty = *g.value_ty(v);
        let copy = g.create_node(kind, &[], &[ty]);
        g.insert_before(copy, front);
        return g.outputs(copy)[0];
    }
    if let Some(k) = g.inputs(cluster).iter().position(|&x| x == v) {
        return g.block_params(sub)[k];
    }
    g.add_input(cluster, v);
    let ty = *g.value_ty(v);
    let p = g.add_block_param(sub, ty);
    db.union(p, v);
    p
}

fn front_anchor(g: &Graph, sub: BlockId) -> NodeId {
    g.body(sub)
        .first()
        .copied()
        .unwrap_or_else(|| g.return_node(sub))
}

/// Inline a cluster's subgraph back into the enclosing block and delete
/// the cluster node.
pub fn dissolve(g: &mut Graph, cluster: NodeId) {
    debug_assert!(g.kind(cluster).is_cluster());
    let sub = g.cluster_subgraph(cluster);

    let params: Vec<ValueId> = g.block_params(sub).to_vec();
    let cins: Vec<ValueId> = g.inputs(cluster).to_vec();
    for (&p, &outer) in params.iter().zip(&cins) {
        g.replace_all_uses(p, outer);
    }

    let inner_outs: Vec<ValueId> = g.block_outputs(sub).to_vec();
    for off in (0..inner_outs.len()).rev() {
        g.remove_block_output(sub, off);
    }
    for n in g.body(sub).to_vec() {
        g.move_before(n, cluster);
    }
    let outer_outs: Vec<ValueId> = g.outputs(cluster).to_vec();
    for (&outer, &inner) in outer_outs.iter().zip(&inner_outs) {
        g.replace_all_uses(outer, inner);
    }
    for _ in 0..outer_outs.len() {
        let v = g.remove_output(cluster, 0);
        g.destroy_value(v);
    }
    g.destroy_node(cluster);
}

/// Break aliasing at a cluster's output boundary.
///
/// Downstream gradient construction assumes cluster outputs are
/// independent tensors, so an output that aliases another output or a
/// cluster input must not stay behind the boundary. The producers of such
/// outputs — together with their transitive in-cluster consumers — are
/// moved back out to just after the cluster. Returns `true` if anything
/// changed; callers iterate to a fixpoint since newly exposed outputs can
/// alias in turn.
pub fn split_aliasing_outputs(g: &mut Graph, cluster: NodeId) -> bool {
    debug_assert!(g.kind(cluster).is_cluster());
    let mut offending: Vec<usize> = aliased_output_pairs(g, cluster)
        .into_iter()
        .map(|(_, later)| later)
        .collect();
    offending.extend(outputs_aliasing_inputs(g, cluster));
    offending.sort_unstable();
    offending.dedup();
    if offending.is_empty() {
        return false;
    }
    tracing::debug!(?cluster, outputs = ?offending, "splitting aliasing outputs out of cluster");

    let sub = g.cluster_subgraph(cluster);
    let param = g.param_node(sub);
    let mut seeds: Vec<NodeId> = Vec::new();
    // reverse index order: pass-through handling removes outputs in place
    for &j in offending.iter().rev() {
        let inner = g.block_outputs(sub)[j];
        let p = g.producer(inner);
        if p == param {
            // a passed-through input needs no node surgery
            let k = g.producer_offset(inner);
            let replacement = g.inputs(cluster)[k];
            let outer = g.outputs(cluster)[j];
            g.replace_all_uses(outer, replacement);
            g.remove_block_output(sub, j);
            let dead = g.remove_output(cluster, j);
            g.destroy_value(dead);
        } else if !seeds.contains(&p) {
            seeds.push(p);
        }
    }

    let to_unmerge = collect_with_consumers(g, sub, seeds);
    let mut cursor = cluster;
    for n in to_unmerge {
        unmerge_node(g, cluster, sub, n, &mut cursor);
    }
    prune_unused_inputs(g, cluster, sub);
    true
}

/// Expand `seeds` to the transitive closure of their in-subgraph
/// consumers, returned in body order so they can be moved out one after
/// another without breaking topology.
fn collect_with_consumers(g: &Graph, sub: BlockId, seeds: Vec<NodeId>) -> Vec<NodeId> {
    let ret = g.return_node(sub);
    let mut set: FxHashSet<NodeId> = seeds.iter().copied().collect();
    let mut stack = seeds;
    while let Some(n) = stack.pop() {
        for &out in g.outputs(n) {
            for u in g.uses(out) {
                if u.user != ret && g.owner_block(u.user) == Some(sub) && set.insert(u.user) {
                    stack.push(u.user);
                }
            }
        }
    }
    let mut nodes: Vec<NodeId> = set.into_iter().collect();
    nodes.sort_unstable_by_key(|&n| g.position(n));
    nodes
}

/// Move one node out of the subgraph to just after `cursor`, rewiring its
/// inputs to outer values and carrying any cluster outputs it produced
/// along with it.
fn unmerge_node(g: &mut Graph, cluster: NodeId, sub: BlockId, n: NodeId, cursor: &mut NodeId) {
    g.remove_from_block(n);
    g.insert_after(n, *cursor);
    *cursor = n;

    let param = g.param_node(sub);
    let ins: Vec<ValueId> = g.inputs(n).to_vec();
    for (i, &v) in ins.iter().enumerate() {
        let vp = g.producer(v);
        if vp == param {
            let k = g.producer_offset(v);
            let outer = g.inputs(cluster)[k];
            g.replace_input(n, i, outer);
        } else if g.owner_block(vp) == Some(sub) {
            // still computed inside; expose it
            let outer = ensure_cluster_output(g, cluster, sub, v);
            g.replace_input(n, i, outer);
        }
        // otherwise the producer already sits outside
    }

    for slot in 0..g.outputs(n).len() {
        let inner = g.outputs(n)[slot];
        let positions: Vec<usize> = g
            .block_outputs(sub)
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x == inner)
            .map(|(j, _)| j)
            .collect();
        if positions.is_empty() {
            continue;
        }
        let mut outers: Vec<ValueId> = Vec::with_capacity(positions.len());
        for &j in positions.iter().rev() {
            g.remove_block_output(sub, j);
            outers.push(g.remove_output(cluster, j));
        }
        outers.reverse();
        let primary = outers[0];
        let displaced = g.set_output_value(n, slot, primary);
        debug_assert_eq!(displaced, inner);
        g.replace_all_uses(inner, primary);
        g.destroy_value(inner);
        for &extra in &outers[1..] {
            g.replace_all_uses(extra, primary);
            g.destroy_value(extra);
        }
    }
}

/// The cluster output exposing `inner`, creating one if it is not exposed
/// yet.
fn ensure_cluster_output(g: &mut Graph, cluster: NodeId, sub: BlockId, inner: ValueId) -> ValueId {
    if let Some(j) = g.block_outputs(sub).iter().position(|&x| x == inner) {
        return g.outputs(cluster)[j];
    }
    let ty = *g.value_ty(inner);
    let outer = g.add_output(cluster, ty);
    g.add_block_output(sub, inner);
    outer
}

/// Drop cluster inputs whose params lost their last use during unmerging.
fn prune_unused_inputs(g: &mut Graph, cluster: NodeId, sub: BlockId) {
    let params: Vec<ValueId> = g.block_params(sub).to_vec();
    for (k, &p) in params.iter().enumerate().rev() {
        if g.uses(p).is_empty() {
            g.remove_input(cluster, k);
            g.remove_block_param(sub, k);
        }
    }
}
