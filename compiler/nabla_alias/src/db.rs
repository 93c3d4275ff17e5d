//! The may-alias database: a union-find over value IDs.

use nabla_graph::{BlockId, Graph, NodeId, ValueId};

/// May-alias equivalence over the values of a graph (or one block scope).
///
/// Queries take `&mut self` because lookups path-compress. The structure
/// grows on demand, so values allocated after construction (cluster params,
/// re-materialized constants) can be unioned in as they appear.
#[derive(Debug)]
pub struct AliasDb {
    parent: Vec<u32>,
}

impl AliasDb {
    /// Build the database for a whole graph.
    pub fn build(g: &Graph) -> Self {
        Self::build_scope(g, g.top())
    }

    /// Build the database for one block scope (recursing into nested
    /// blocks). Used for cluster-subgraph queries.
    pub fn build_scope(g: &Graph, scope: BlockId) -> Self {
        let mut db = AliasDb {
            parent: (0..g.value_capacity() as u32).collect(),
        };
        db.seed_block(g, scope);
        db
    }

    fn seed_block(&mut self, g: &Graph, b: BlockId) {
        for &n in g.body(b) {
            self.seed_node(g, n);
            for &nested in g.node_blocks(n) {
                self.seed_block(g, nested);
            }
        }
    }

    fn seed_node(&mut self, g: &Graph, n: NodeId) {
        let outputs: Vec<ValueId> = g.outputs(n).to_vec();
        for (j, &out) in outputs.iter().enumerate() {
            if let Some(i) = g.kind(n).output_aliases_input(j) {
                self.union(out, g.inputs(n)[i]);
            }
        }
        if g.kind(n).is_cluster() {
            let sub = g.cluster_subgraph(n);
            for (&outer, &inner) in g.inputs(n).iter().zip(g.block_params(sub)) {
                self.union(outer, inner);
            }
            for (&outer, &inner) in g.outputs(n).iter().zip(g.block_outputs(sub)) {
                self.union(outer, inner);
            }
        }
    }

    fn find(&mut self, v: ValueId) -> u32 {
        let idx = v.index();
        if idx >= self.parent.len() {
            let start = self.parent.len() as u32;
            self.parent.extend(start..=idx as u32);
        }
        let mut x = idx as u32;
        while self.parent[x as usize] != x {
            // path halving
            let grand = self.parent[self.parent[x as usize] as usize];
            self.parent[x as usize] = grand;
            x = grand;
        }
        x
    }

    /// Record that `a` and `b` may alias.
    pub fn union(&mut self, a: ValueId, b: ValueId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra as usize] = rb;
        }
    }

    /// May `a` and `b` refer to the same memory?
    pub fn may_alias(&mut self, a: ValueId, b: ValueId) -> bool {
        self.find(a) == self.find(b)
    }
}
