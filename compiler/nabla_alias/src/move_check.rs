//! Topologically-valid node relocation.
//!
//! # Algorithm
//!
//! To move `to_move` to immediately before `move_point` (forward, within
//! one block), walk the nodes between them, pulling every node that
//! interacts with the moving set — consumes one of its outputs, produces
//! one of its inputs, or has a write interaction through may-aliasing
//! memory — into the set. Side-effecting nodes are hard barriers.
//!
//! The mover itself ends up *before* `move_point`; its dragged dependents
//! are displaced to just *after* `move_point`, preserving their relative
//! order. That split is only legal if `move_point` does not interact with
//! the dragged set (the mover is excluded from that final check: the mover
//! staying before `move_point` means a dependency between them is fine).
//!
//! Failure is an expected outcome — the caller simply does not merge.

use rustc_hash::FxHashSet;

use nabla_graph::{Graph, NodeId, ValueId};

use crate::db::AliasDb;

/// Try to relocate `to_move` to immediately before `move_point`, keeping
/// the block topologically valid. Performs the move and returns `true` on
/// success; leaves the graph untouched and returns `false` otherwise.
///
/// Only forward moves are supported: `to_move` must currently sit before
/// `move_point` in the same block (the clustering pass only ever moves a
/// producer down to its consumer).
pub fn try_move_before(
    g: &mut Graph,
    db: &mut AliasDb,
    to_move: NodeId,
    move_point: NodeId,
) -> bool {
    if to_move == move_point {
        return false;
    }
    let Some(block) = g.owner_block(to_move) else {
        return false;
    };
    if g.owner_block(move_point) != Some(block) {
        return false;
    }
    debug_assert!(
        g.is_before(to_move, move_point),
        "try_move_before only supports forward moves"
    );
    if !g.is_before(to_move, move_point) {
        return false;
    }
    if g.kind(to_move).has_side_effects() {
        return false;
    }
    if g.next_in_block(to_move) == Some(move_point) {
        // already in position
        return true;
    }

    let mut working = WorkingSet::new(g, to_move);
    let mut deferred: Vec<NodeId> = Vec::new();
    let mut cur = g.next_in_block(to_move);
    while let Some(n) = cur {
        if n == move_point {
            break;
        }
        if g.kind(n).has_side_effects() {
            return false;
        }
        if working.interacts(g, db, n) {
            working.add(g, n);
            deferred.push(n);
        }
        cur = g.next_in_block(n);
    }

    // Only the dragged dependents cross move_point; check them without the
    // mover.
    working.remove(g, to_move);
    if working.interacts(g, db, move_point) {
        tracing::trace!(?to_move, ?move_point, "move blocked: move point depends on dragged nodes");
        return false;
    }

    g.move_before(to_move, move_point);
    let mut anchor = move_point;
    for n in deferred {
        g.move_after(n, anchor);
        anchor = n;
    }
    true
}

/// The set of nodes being displaced by a move, with its data/memory
/// footprint.
struct WorkingSet {
    members: Vec<NodeId>,
    produced: FxHashSet<ValueId>,
    consumed: FxHashSet<ValueId>,
    writes: Vec<ValueId>,
}

impl WorkingSet {
    fn new(g: &Graph, seed: NodeId) -> Self {
        let mut set = WorkingSet {
            members: Vec::new(),
            produced: FxHashSet::default(),
            consumed: FxHashSet::default(),
            writes: Vec::new(),
        };
        set.add(g, seed);
        set
    }

    fn add(&mut self, g: &Graph, n: NodeId) {
        self.members.push(n);
        self.produced.extend(g.outputs(n).iter().copied());
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        collect_footprint(g, n, &mut reads, &mut writes);
        self.consumed.extend(reads);
        self.writes.extend(writes);
    }

    fn remove(&mut self, g: &Graph, n: NodeId) {
        self.members.retain(|&m| m != n);
        let members = std::mem::take(&mut self.members);
        self.produced.clear();
        self.consumed.clear();
        self.writes.clear();
        for m in members {
            self.add(g, m);
        }
    }

    /// Does `n` have a data or memory dependency with the set, in either
    /// direction?
    fn interacts(&self, g: &Graph, db: &mut AliasDb, n: NodeId) -> bool {
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        collect_footprint(g, n, &mut reads, &mut writes);

        // data: n consumes a set output, or produces a set input
        if reads.iter().any(|v| self.produced.contains(v)) {
            return true;
        }
        if g.outputs(n).iter().any(|v| self.consumed.contains(v)) {
            return true;
        }

        // memory: a write on one side aliasing a read or write on the other
        for &w in &self.writes {
            if reads.iter().chain(writes.iter()).any(|&v| db.may_alias(v, w)) {
                return true;
            }
        }
        for &w in &writes {
            if self
                .consumed
                .iter()
                .chain(self.produced.iter())
                .any(|&v| db.may_alias(v, w))
            {
                return true;
            }
        }
        false
    }
}

/// Collect the values `n` reads and writes, recursing through nested
/// blocks so control-flow nodes and clusters carry their whole footprint.
fn collect_footprint(g: &Graph, n: NodeId, reads: &mut Vec<ValueId>, writes: &mut Vec<ValueId>) {
    reads.extend(g.inputs(n).iter().copied());
    if g.kind(n).writes_first_input() {
        writes.push(g.inputs(n)[0]);
    }
    for &b in g.node_blocks(n) {
        for &inner in g.body(b) {
            collect_footprint(g, inner, reads, writes);
        }
    }
}
