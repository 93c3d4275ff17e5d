//! Differentiable-subgraph clustering.
//!
//! # Algorithm
//!
//! Each block is carved into *work blocks* at side-effecting nodes; spans
//! with fewer than `threshold` candidate nodes are skipped outright. Within
//! a work block the grower walks backwards, wraps each candidate in a
//! singleton cluster, and greedily merges producers whose relocation to
//! just before the cluster is topologically valid, repeating until a
//! fixpoint. The whole work block is rescanned after any merge: absorbing a
//! producer can unlock merges that were previously blocked.
//!
//! After growth, aliasing output pairs are split back out of every cluster
//! (downstream gradient construction assumes independent outputs), each
//! cluster is deduplicated, and clusters whose effective size — the number
//! of nodes that actually execute — fell below `threshold` are dissolved
//! back into their enclosing block.
//!
//! Cluster subgraphs are opaque to block recursion: a cluster's nested
//! block is never itself sliced.

use nabla_alias::{try_move_before, AliasDb};
use nabla_graph::{BlockId, Graph, NodeId, ValueId};

use crate::classify::Differentiable;
use crate::cse::eliminate_common_subexpressions;
use crate::requires_grad::add_requires_grad_on_outputs;
use crate::subgraph::{dissolve, merge_into, split_aliasing_outputs, wrap_in_singleton};

/// Cluster the differentiable operations of `g` into cluster nodes holding
/// at least `threshold` executed operations each.
///
/// Returns the surviving clusters, in creation order per block (outer
/// blocks before the nested blocks of their control-flow nodes).
pub fn create_autodiff_subgraphs(
    g: &mut Graph,
    threshold: usize,
    classifier: &dyn Differentiable,
) -> Vec<NodeId> {
    let mut clusters = Vec::new();
    let mut db = AliasDb::build(g);
    let slicer = Slicer {
        threshold,
        classifier,
    };
    tracing::debug!(threshold, "clustering differentiable subgraphs");
    let top = g.top();
    slicer.buildup(g, &mut db, top);
    slicer.unfuse_aliased_outputs(g, top);
    slicer.cleanup(g, top, &mut clusters);
    eliminate_common_subexpressions(g, top);
    add_requires_grad_on_outputs(g, top);
    tracing::debug!(clusters = clusters.len(), "clustering finished");
    clusters
}

struct Slicer<'c> {
    threshold: usize,
    classifier: &'c dyn Differentiable,
}

/// A span of one block the grower may reorder freely: the nodes strictly
/// between `begin` and `end` contain no side-effecting node.
struct WorkBlock {
    begin: NodeId,
    end: NodeId,
}

impl Slicer<'_> {
    /// Is this node allowed inside a cluster? Views are excluded even when
    /// a classifier claims them: a view at a cluster output boundary
    /// corrupts downstream gradient bookkeeping.
    fn should_consider(&self, g: &Graph, n: NodeId) -> bool {
        let kind = g.kind(n);
        if kind.is_cluster() {
            return true;
        }
        if kind.is_constant() || kind.is_view() {
            return false;
        }
        self.classifier.is_differentiable(g, n)
    }

    /// Split `block` at side-effecting nodes, keeping only spans with
    /// enough candidates to possibly reach the threshold.
    fn build_work_blocks(&self, g: &Graph, block: BlockId) -> Vec<WorkBlock> {
        let param = g.param_node(block);
        let mut worklist = Vec::new();
        let mut end = g.return_node(block);
        let mut candidates = 0usize;
        let mut cur = g.prev_in_block(end);
        while let Some(n) = cur {
            if n == param {
                break;
            }
            if g.kind(n).has_side_effects() {
                if candidates >= self.threshold {
                    worklist.push(WorkBlock { begin: n, end });
                }
                candidates = 0;
                end = n;
            } else if self.should_consider(g, n) {
                candidates += 1;
            }
            cur = g.prev_in_block(n);
        }
        if candidates >= self.threshold {
            worklist.push(WorkBlock { begin: param, end });
        }
        worklist
    }

    fn buildup(&self, g: &mut Graph, db: &mut AliasDb, block: BlockId) {
        for wb in self.build_work_blocks(g, block) {
            let mut changed = true;
            while changed {
                changed = false;
                let mut cur = g.prev_in_block(wb.end);
                while let Some(n) = cur {
                    if n == wb.begin {
                        break;
                    }
                    let (next, merged) = self.scan_node(g, db, block, n);
                    changed |= merged;
                    cur = next;
                }
            }
        }
        for n in g.body(block).to_vec() {
            if g.kind(n).is_cluster() {
                continue;
            }
            for b in g.node_blocks(n).to_vec() {
                self.buildup(g, db, b);
            }
        }
    }

    /// Examine one node during the backward walk. Candidates become (or
    /// already are) clusters, which then try to absorb one producer; after
    /// a merge the walk resumes at the enlarged cluster so it can keep
    /// absorbing.
    fn scan_node(
        &self,
        g: &mut Graph,
        db: &mut AliasDb,
        block: BlockId,
        n: NodeId,
    ) -> (Option<NodeId>, bool) {
        if !self.should_consider(g, n) {
            return (g.prev_in_block(n), false);
        }
        let consumer = if g.kind(n).is_cluster() {
            n
        } else {
            wrap_in_singleton(g, db, n)
        };
        for v in self.sort_reverse_topological(g, block, consumer) {
            let producer = g.producer(v);
            if self.try_merge(g, db, producer, consumer) {
                return (Some(consumer), true);
            }
        }
        (g.prev_in_block(consumer), false)
    }

    /// The inputs of `n` produced in `block`, producers closest to `n`
    /// first. Merging in that order keeps every relocation a short hop.
    fn sort_reverse_topological(&self, g: &Graph, block: BlockId, n: NodeId) -> Vec<ValueId> {
        let mut inputs: Vec<ValueId> = g
            .inputs(n)
            .iter()
            .copied()
            .filter(|&v| g.owner_block(g.producer(v)) == Some(block))
            .collect();
        inputs.sort_by(|&a, &b| g.position(g.producer(b)).cmp(&g.position(g.producer(a))));
        inputs
    }

    fn try_merge(&self, g: &mut Graph, db: &mut AliasDb, producer: NodeId, consumer: NodeId) -> bool {
        if !self.should_consider(g, producer) {
            return false;
        }
        if !try_move_before(g, db, producer, consumer) {
            tracing::trace!(?producer, ?consumer, "merge rejected by topology");
            return false;
        }
        tracing::trace!(?producer, ?consumer, "merging producer into cluster");
        merge_into(g, db, producer, consumer);
        true
    }

    /// Split aliasing outputs out of every cluster in `block`, to a
    /// fixpoint (a split can expose a new output that aliases in turn).
    fn unfuse_aliased_outputs(&self, g: &mut Graph, block: BlockId) {
        let param = g.param_node(block);
        let mut changed = true;
        while changed {
            changed = false;
            let mut cur = g.prev_in_block(g.return_node(block));
            while let Some(n) = cur {
                if n == param {
                    break;
                }
                let prev = g.prev_in_block(n);
                if g.kind(n).is_cluster() {
                    changed |= split_aliasing_outputs(g, n);
                }
                cur = prev;
            }
        }
        for n in g.body(block).to_vec() {
            if g.kind(n).is_cluster() {
                continue;
            }
            for b in g.node_blocks(n).to_vec() {
                self.unfuse_aliased_outputs(g, b);
            }
        }
    }

    /// Deduplicate each cluster, dissolve the ones that came out too
    /// small, and collect the survivors.
    fn cleanup(&self, g: &mut Graph, block: BlockId, clusters: &mut Vec<NodeId>) {
        let param = g.param_node(block);
        let mut kept = Vec::new();
        let mut cur = g.prev_in_block(g.return_node(block));
        while let Some(n) = cur {
            if n == param {
                break;
            }
            let prev = g.prev_in_block(n);
            if g.kind(n).is_cluster() {
                let sub = g.cluster_subgraph(n);
                eliminate_common_subexpressions(g, sub);
                if !self.inline_if_too_small(g, n) {
                    kept.push(n);
                }
            }
            cur = prev;
        }
        kept.reverse();
        clusters.extend(kept);
        for n in g.body(block).to_vec() {
            if g.kind(n).is_cluster() {
                continue;
            }
            for b in g.node_blocks(n).to_vec() {
                self.cleanup(g, b, clusters);
            }
        }
    }

    /// Dissolve `cluster` if fewer than `threshold` of its nodes actually
    /// execute (constants and profiles do not). Returns `true` when
    /// dissolved.
    fn inline_if_too_small(&self, g: &mut Graph, cluster: NodeId) -> bool {
        let sub = g.cluster_subgraph(cluster);
        let mut executed = 0usize;
        for &n in g.body(sub) {
            if !g.kind(n).not_executed() {
                executed += 1;
                if executed >= self.threshold {
                    return false;
                }
            }
        }
        tracing::debug!(?cluster, executed, "dissolving under-sized cluster");
        dissolve(g, cluster);
        true
    }
}

#[cfg(test)]
mod tests;
