//! Arena-owned dataflow graph.
//!
//! A [`Graph`] owns every node, value, and block in three arenas with free
//! lists. Blocks are ordered node sequences bounded by two sentinels (a
//! `Param` node producing the block's inputs and a `Return` node consuming
//! its outputs); body order is always a valid topological order with respect
//! to data dependencies.
//!
//! # Mutation discipline
//!
//! All surgery (insert, move, destroy, use replacement, producer
//! re-pointing) goes through methods here so that use lists, positions, and
//! input/output offsets stay consistent. Positions are renumbered on every
//! structural change, which makes `is_after` O(1) at the cost of O(block)
//! per mutation — blocks in this IR are short enough that this is the right
//! trade.
//!
//! Misusing an ID after its node or value is destroyed is a programmer
//! error and panics; these are invariant assertions, not recoverable
//! conditions.

use smallvec::SmallVec;

use crate::ids::{BlockId, NodeId, ValueId};
use crate::ops::OpKind;
use crate::types::Type;

/// One consumption of a value: which node, at which input offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Use {
    pub user: NodeId,
    pub offset: u32,
}

/// The typed output of exactly one node.
#[derive(Clone, Debug)]
pub struct Value {
    producer: NodeId,
    offset: u32,
    ty: Type,
    uses: Vec<Use>,
}

/// One IR operation: a kind tag, ordered inputs/outputs, optional nested
/// blocks, and its placement within an owning block.
#[derive(Clone, Debug)]
pub struct Node {
    kind: OpKind,
    inputs: SmallVec<[ValueId; 4]>,
    outputs: SmallVec<[ValueId; 2]>,
    blocks: SmallVec<[BlockId; 1]>,
    owner: Option<BlockId>,
    position: u32,
}

/// An ordered node sequence bounded by param/return sentinels.
#[derive(Clone, Debug)]
pub struct Block {
    param: NodeId,
    ret: NodeId,
    body: Vec<NodeId>,
    owner: Option<NodeId>,
}

/// The root of the IR: arenas plus the top-level block.
#[derive(Clone, Debug)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    values: Vec<Option<Value>>,
    blocks: Vec<Option<Block>>,
    free_nodes: Vec<NodeId>,
    top: BlockId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// Create an empty graph with a fresh top-level block.
    pub fn new() -> Self {
        let mut g = Graph {
            nodes: Vec::new(),
            values: Vec::new(),
            blocks: Vec::new(),
            free_nodes: Vec::new(),
            top: BlockId::new(0),
        };
        g.top = g.new_block(None);
        g
    }

    /// The top-level block.
    #[inline]
    pub fn top(&self) -> BlockId {
        self.top
    }

    // ── arena access ────────────────────────────────────────────────

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        match self.nodes[id.index()].as_ref() {
            Some(n) => n,
            None => panic!("use of destroyed node {id:?}"),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.nodes[id.index()].as_mut() {
            Some(n) => n,
            None => panic!("use of destroyed node {id:?}"),
        }
    }

    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        match self.values[id.index()].as_ref() {
            Some(v) => v,
            None => panic!("use of destroyed value {id:?}"),
        }
    }

    #[inline]
    fn value_mut(&mut self, id: ValueId) -> &mut Value {
        match self.values[id.index()].as_mut() {
            Some(v) => v,
            None => panic!("use of destroyed value {id:?}"),
        }
    }

    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        match self.blocks[id.index()].as_ref() {
            Some(b) => b,
            None => panic!("use of destroyed block {id:?}"),
        }
    }

    #[inline]
    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        match self.blocks[id.index()].as_mut() {
            Some(b) => b,
            None => panic!("use of destroyed block {id:?}"),
        }
    }

    /// Returns `true` if the node slot is still live. Useful for callers
    /// that cached IDs across mutations.
    #[inline]
    pub fn node_alive(&self, id: NodeId) -> bool {
        self.nodes.get(id.index()).is_some_and(Option::is_some)
    }

    /// Upper bound on value IDs ever allocated (for dense side tables).
    #[inline]
    pub fn value_capacity(&self) -> usize {
        self.values.len()
    }

    // ── node queries ────────────────────────────────────────────────

    #[inline]
    pub fn kind(&self, n: NodeId) -> &OpKind {
        &self.node(n).kind
    }

    #[inline]
    pub fn inputs(&self, n: NodeId) -> &[ValueId] {
        &self.node(n).inputs
    }

    #[inline]
    pub fn outputs(&self, n: NodeId) -> &[ValueId] {
        &self.node(n).outputs
    }

    #[inline]
    pub fn node_blocks(&self, n: NodeId) -> &[BlockId] {
        &self.node(n).blocks
    }

    /// The block a node currently sits in, `None` while detached.
    #[inline]
    pub fn owner_block(&self, n: NodeId) -> Option<BlockId> {
        self.node(n).owner
    }

    /// The nested subgraph of a cluster node.
    ///
    /// Panics if `n` is not a cluster — callers passing anything else have
    /// a bug.
    #[inline]
    pub fn cluster_subgraph(&self, n: NodeId) -> BlockId {
        let node = self.node(n);
        assert!(node.kind.is_cluster(), "node {n:?} is not a cluster");
        node.blocks[0]
    }

    // ── value queries ───────────────────────────────────────────────

    #[inline]
    pub fn producer(&self, v: ValueId) -> NodeId {
        self.value(v).producer
    }

    #[inline]
    pub fn producer_offset(&self, v: ValueId) -> usize {
        self.value(v).offset as usize
    }

    #[inline]
    pub fn value_ty(&self, v: ValueId) -> &Type {
        &self.value(v).ty
    }

    pub fn set_value_ty(&mut self, v: ValueId, ty: Type) {
        self.value_mut(v).ty = ty;
    }

    #[inline]
    pub fn uses(&self, v: ValueId) -> &[Use] {
        &self.value(v).uses
    }

    // ── block queries ───────────────────────────────────────────────

    #[inline]
    pub fn body(&self, b: BlockId) -> &[NodeId] {
        &self.block(b).body
    }

    #[inline]
    pub fn param_node(&self, b: BlockId) -> NodeId {
        self.block(b).param
    }

    #[inline]
    pub fn return_node(&self, b: BlockId) -> NodeId {
        self.block(b).ret
    }

    /// The block's input values (outputs of the param sentinel).
    #[inline]
    pub fn block_params(&self, b: BlockId) -> &[ValueId] {
        let param = self.block(b).param;
        &self.node(param).outputs
    }

    /// The block's output operands (inputs of the return sentinel).
    #[inline]
    pub fn block_outputs(&self, b: BlockId) -> &[ValueId] {
        let ret = self.block(b).ret;
        &self.node(ret).inputs
    }

    /// The node owning this block (`None` for the top-level block).
    #[inline]
    pub fn block_owner(&self, b: BlockId) -> Option<NodeId> {
        self.block(b).owner
    }

    // ── ordering ────────────────────────────────────────────────────

    /// Topological position within the owning block (param sentinel is 0).
    #[inline]
    pub fn position(&self, n: NodeId) -> u32 {
        self.node(n).position
    }

    /// Returns `true` if `a` comes after `b`. Both must sit in the same
    /// block.
    pub fn is_after(&self, a: NodeId, b: NodeId) -> bool {
        debug_assert_eq!(
            self.node(a).owner,
            self.node(b).owner,
            "is_after across blocks"
        );
        self.node(a).position > self.node(b).position
    }

    /// Returns `true` if `a` comes before `b` in the same block.
    #[inline]
    pub fn is_before(&self, a: NodeId, b: NodeId) -> bool {
        self.is_after(b, a)
    }

    /// The node preceding `n` in its block (`None` at the param sentinel).
    pub fn prev_in_block(&self, n: NodeId) -> Option<NodeId> {
        let b = self.node(n).owner?;
        let block = self.block(b);
        if n == block.param {
            return None;
        }
        let pos = self.node(n).position as usize;
        Some(if pos == 1 {
            block.param
        } else {
            block.body[pos - 2]
        })
    }

    /// The node following `n` in its block (`None` at the return sentinel).
    pub fn next_in_block(&self, n: NodeId) -> Option<NodeId> {
        let b = self.node(n).owner?;
        let block = self.block(b);
        if n == block.ret {
            return None;
        }
        let pos = self.node(n).position as usize;
        Some(if pos == block.body.len() {
            block.ret
        } else {
            block.body[pos]
        })
    }

    // ── construction ────────────────────────────────────────────────

    /// Create a fresh block (with sentinels) owned by `owner`.
    fn new_block(&mut self, owner: Option<NodeId>) -> BlockId {
        let param = self.alloc_node(OpKind::Param);
        let ret = self.alloc_node(OpKind::Return);
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(Some(Block {
            param,
            ret,
            body: Vec::new(),
            owner,
        }));
        self.node_mut(param).owner = Some(id);
        self.node_mut(param).position = 0;
        self.node_mut(ret).owner = Some(id);
        self.node_mut(ret).position = 1;
        id
    }

    /// Attach a fresh nested block to `node`.
    pub fn add_nested_block(&mut self, node: NodeId) -> BlockId {
        let b = self.new_block(Some(node));
        self.node_mut(node).blocks.push(b);
        b
    }

    fn alloc_node(&mut self, kind: OpKind) -> NodeId {
        let node = Node {
            kind,
            inputs: SmallVec::new(),
            outputs: SmallVec::new(),
            blocks: SmallVec::new(),
            owner: None,
            position: 0,
        };
        if let Some(id) = self.free_nodes.pop() {
            self.nodes[id.index()] = Some(node);
            id
        } else {
            let id = NodeId::new(self.nodes.len() as u32);
            self.nodes.push(Some(node));
            id
        }
    }

    // Value slots are never recycled: analyses key side tables by value ID
    // across surgery, and a reused ID would inherit the dead value's
    // entries.
    fn alloc_value(&mut self, producer: NodeId, offset: u32, ty: Type) -> ValueId {
        let value = Value {
            producer,
            offset,
            ty,
            uses: Vec::new(),
        };
        let id = ValueId::new(self.values.len() as u32);
        self.values.push(Some(value));
        id
    }

    /// Create a detached node with the given inputs and one output per
    /// entry of `output_types`.
    pub fn create_node(
        &mut self,
        kind: OpKind,
        inputs: &[ValueId],
        output_types: &[Type],
    ) -> NodeId {
        let id = self.alloc_node(kind);
        for (i, &v) in inputs.iter().enumerate() {
            self.node_mut(id).inputs.push(v);
            self.add_use(v, id, i as u32);
        }
        for (i, &ty) in output_types.iter().enumerate() {
            let val = self.alloc_value(id, i as u32, ty);
            self.node_mut(id).outputs.push(val);
        }
        id
    }

    /// Create a node and append it at the end of `block`'s body.
    pub fn append_node(
        &mut self,
        block: BlockId,
        kind: OpKind,
        inputs: &[ValueId],
        output_types: &[Type],
    ) -> NodeId {
        let n = self.create_node(kind, inputs, output_types);
        let ret = self.block(block).ret;
        self.insert_before(n, ret);
        n
    }

    // ── placement ───────────────────────────────────────────────────

    /// Insert a detached node immediately before `anchor` (which may be the
    /// return sentinel, but not the param sentinel).
    pub fn insert_before(&mut self, node: NodeId, anchor: NodeId) {
        assert!(
            self.node(node).owner.is_none(),
            "insert_before on an attached node"
        );
        let b = self
            .node(anchor)
            .owner
            .unwrap_or_else(|| panic!("anchor {anchor:?} is detached"));
        let block = self.block(b);
        assert!(anchor != block.param, "cannot insert before the param sentinel");
        let idx = if anchor == block.ret {
            block.body.len()
        } else {
            self.node(anchor).position as usize - 1
        };
        self.block_mut(b).body.insert(idx, node);
        self.node_mut(node).owner = Some(b);
        self.renumber(b);
    }

    /// Insert a detached node immediately after `anchor` (which may be the
    /// param sentinel, but not the return sentinel).
    pub fn insert_after(&mut self, node: NodeId, anchor: NodeId) {
        assert!(
            self.node(node).owner.is_none(),
            "insert_after on an attached node"
        );
        let b = self
            .node(anchor)
            .owner
            .unwrap_or_else(|| panic!("anchor {anchor:?} is detached"));
        let block = self.block(b);
        assert!(anchor != block.ret, "cannot insert after the return sentinel");
        let idx = if anchor == block.param {
            0
        } else {
            self.node(anchor).position as usize
        };
        self.block_mut(b).body.insert(idx, node);
        self.node_mut(node).owner = Some(b);
        self.renumber(b);
    }

    /// Detach a node from its block's body. Sentinels cannot be removed.
    pub fn remove_from_block(&mut self, node: NodeId) {
        let b = self
            .node(node)
            .owner
            .unwrap_or_else(|| panic!("node {node:?} is already detached"));
        let block = self.block(b);
        assert!(
            node != block.param && node != block.ret,
            "cannot detach a sentinel"
        );
        let idx = self.node(node).position as usize - 1;
        debug_assert_eq!(self.block(b).body[idx], node);
        self.block_mut(b).body.remove(idx);
        self.node_mut(node).owner = None;
        self.renumber(b);
    }

    /// Relocate a node to immediately before `anchor`.
    pub fn move_before(&mut self, node: NodeId, anchor: NodeId) {
        self.remove_from_block(node);
        self.insert_before(node, anchor);
    }

    /// Relocate a node to immediately after `anchor`.
    pub fn move_after(&mut self, node: NodeId, anchor: NodeId) {
        self.remove_from_block(node);
        self.insert_after(node, anchor);
    }

    fn renumber(&mut self, b: BlockId) {
        let block = self.block(b);
        let body: Vec<NodeId> = block.body.clone();
        let (param, ret) = (block.param, block.ret);
        self.node_mut(param).position = 0;
        for (i, n) in body.iter().enumerate() {
            self.node_mut(*n).position = i as u32 + 1;
        }
        self.node_mut(ret).position = body.len() as u32 + 1;
    }

    // ── use-list surgery ────────────────────────────────────────────

    fn add_use(&mut self, v: ValueId, user: NodeId, offset: u32) {
        self.value_mut(v).uses.push(Use { user, offset });
    }

    fn remove_use(&mut self, v: ValueId, user: NodeId, offset: u32) {
        let uses = &mut self.value_mut(v).uses;
        let idx = uses
            .iter()
            .position(|u| u.user == user && u.offset == offset)
            .unwrap_or_else(|| panic!("missing use of {v:?} by {user:?}@{offset}"));
        uses.remove(idx);
    }

    fn retarget_use_offset(&mut self, v: ValueId, user: NodeId, old: u32, new: u32) {
        let uses = &mut self.value_mut(v).uses;
        let idx = uses
            .iter()
            .position(|u| u.user == user && u.offset == old)
            .unwrap_or_else(|| panic!("missing use of {v:?} by {user:?}@{old}"));
        uses[idx].offset = new;
    }

    /// Append `v` to `node`'s input list.
    pub fn add_input(&mut self, node: NodeId, v: ValueId) {
        let offset = self.node(node).inputs.len() as u32;
        self.node_mut(node).inputs.push(v);
        self.add_use(v, node, offset);
    }

    /// Remove the input at `offset`, shifting later inputs down.
    pub fn remove_input(&mut self, node: NodeId, offset: usize) {
        let v = self.node(node).inputs[offset];
        self.remove_use(v, node, offset as u32);
        let later: Vec<ValueId> = self.node(node).inputs[offset + 1..].to_vec();
        for (i, &lv) in later.iter().enumerate() {
            let old = (offset + 1 + i) as u32;
            self.retarget_use_offset(lv, node, old, old - 1);
        }
        self.node_mut(node).inputs.remove(offset);
    }

    /// Replace the input at `offset` with `new`.
    pub fn replace_input(&mut self, node: NodeId, offset: usize, new: ValueId) {
        let old = self.node(node).inputs[offset];
        if old == new {
            return;
        }
        self.remove_use(old, node, offset as u32);
        self.node_mut(node).inputs[offset] = new;
        self.add_use(new, node, offset as u32);
    }

    /// Rewrite every use of `old` to `new`, preserving use order.
    pub fn replace_all_uses(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        let uses = std::mem::take(&mut self.value_mut(old).uses);
        for u in &uses {
            self.node_mut(u.user).inputs[u.offset as usize] = new;
        }
        self.value_mut(new).uses.extend(uses);
    }

    // ── output surgery ──────────────────────────────────────────────

    /// Create a fresh output value on `node`.
    pub fn add_output(&mut self, node: NodeId, ty: Type) -> ValueId {
        let offset = self.node(node).outputs.len() as u32;
        let v = self.alloc_value(node, offset, ty);
        self.node_mut(node).outputs.push(v);
        v
    }

    /// Append an existing value as `node`'s next output, re-pointing its
    /// producer. The value keeps its identity (ID, type, uses).
    pub fn adopt_output(&mut self, node: NodeId, v: ValueId) {
        let offset = self.node(node).outputs.len() as u32;
        self.node_mut(node).outputs.push(v);
        let value = self.value_mut(v);
        value.producer = node;
        value.offset = offset;
    }

    /// Detach the output at `offset`, shifting later outputs down. The
    /// returned value is left producer-less; the caller must either adopt
    /// it elsewhere or destroy it.
    pub fn remove_output(&mut self, node: NodeId, offset: usize) -> ValueId {
        let v = self.node_mut(node).outputs.remove(offset);
        let later: Vec<ValueId> = self.node(node).outputs[offset..].to_vec();
        for (i, &lv) in later.iter().enumerate() {
            self.value_mut(lv).offset = (offset + i) as u32;
        }
        v
    }

    /// Swap the value in output slot `offset` for `v` (re-pointing `v`'s
    /// producer). Returns the displaced value, producer-less.
    pub fn set_output_value(&mut self, node: NodeId, offset: usize, v: ValueId) -> ValueId {
        let old = self.node_mut(node).outputs[offset];
        self.node_mut(node).outputs[offset] = v;
        let value = self.value_mut(v);
        value.producer = node;
        value.offset = offset as u32;
        old
    }

    /// Put a fresh value of type `ty` into output slot `offset`, returning
    /// `(displaced, fresh)`. The displaced value keeps its identity and
    /// uses but is left producer-less; the caller must adopt or destroy it.
    pub fn refresh_output(&mut self, node: NodeId, offset: usize, ty: Type) -> (ValueId, ValueId) {
        let fresh = self.alloc_value(node, offset as u32, ty);
        let displaced = self.set_output_value(node, offset, fresh);
        (displaced, fresh)
    }

    // ── block param / output surgery ────────────────────────────────

    /// Add a block input value of the given type.
    pub fn add_block_param(&mut self, b: BlockId, ty: Type) -> ValueId {
        let param = self.block(b).param;
        self.add_output(param, ty)
    }

    /// Remove the block input at `offset`. Its value must be unused.
    pub fn remove_block_param(&mut self, b: BlockId, offset: usize) {
        let param = self.block(b).param;
        let v = self.remove_output(param, offset);
        self.destroy_value(v);
    }

    /// Append `v` to the block's output operands.
    pub fn add_block_output(&mut self, b: BlockId, v: ValueId) {
        let ret = self.block(b).ret;
        self.add_input(ret, v);
    }

    /// Remove the block output operand at `offset`.
    pub fn remove_block_output(&mut self, b: BlockId, offset: usize) {
        let ret = self.block(b).ret;
        self.remove_input(ret, offset);
    }

    // ── destruction ─────────────────────────────────────────────────

    /// Destroy a node. Output values must be unused; nested blocks must
    /// already be empty.
    pub fn destroy_node(&mut self, n: NodeId) {
        let nested: SmallVec<[BlockId; 1]> = self.node(n).blocks.clone();
        for b in nested {
            self.destroy_block(b);
        }
        if let Some(b) = self.node(n).owner {
            let block = self.block(b);
            if n != block.param && n != block.ret {
                self.remove_from_block(n);
            }
        }
        let inputs: SmallVec<[ValueId; 4]> = self.node(n).inputs.clone();
        for (i, v) in inputs.into_iter().enumerate() {
            self.remove_use(v, n, i as u32);
        }
        let outputs: SmallVec<[ValueId; 2]> = self.node(n).outputs.clone();
        for v in outputs {
            self.destroy_value(v);
        }
        self.nodes[n.index()] = None;
        self.free_nodes.push(n);
    }

    /// Destroy a detached or producer-less value. Must be unused.
    pub fn destroy_value(&mut self, v: ValueId) {
        assert!(
            self.value(v).uses.is_empty(),
            "destroying value {v:?} which still has uses"
        );
        self.values[v.index()] = None;
    }

    /// Destroy a block whose body has already been emptied.
    pub fn destroy_block(&mut self, b: BlockId) {
        assert!(
            self.block(b).body.is_empty(),
            "destroying non-empty block {b:?}"
        );
        let (param, ret) = {
            let block = self.block(b);
            (block.param, block.ret)
        };
        self.destroy_node(ret);
        self.destroy_node(param);
        self.blocks[b.index()] = None;
    }
}
