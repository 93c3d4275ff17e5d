//! ID newtypes for the nabla IR arenas.
//!
//! Nodes, values, and blocks are owned by [`Graph`](crate::Graph) arenas and
//! referenced everywhere by these stable IDs, never by structural position.
//! Mutation (merging, splicing, dissolving subgraphs) preserves the identity
//! of every unaffected ID.

/// Node ID within a [`Graph`](crate::Graph).
///
/// Identifies one IR operation. IDs are allocated sequentially and reused
/// from a free list after a node is destroyed; holding an ID across the
/// destruction of its node is a bug in the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Create a new node ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Value ID within a [`Graph`](crate::Graph).
///
/// Identifies the typed output of exactly one node. A value's producer may
/// be re-pointed (e.g. when a node is wrapped into a cluster) without the
/// ID changing, so use lists and alias facts survive graph surgery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueId(u32);

impl ValueId {
    /// Create a new value ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Block ID within a [`Graph`](crate::Graph).
///
/// Identifies one lexical scope: the graph's top-level block, a control-flow
/// arm, or a cluster's nested subgraph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    /// Create a new block ID from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Get the index as `usize` (for indexing into `Vec`s).
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
