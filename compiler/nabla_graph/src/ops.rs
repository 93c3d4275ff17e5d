//! The operation catalog.
//!
//! Every node carries an [`OpKind`]. The predicate methods here are the
//! single source of truth for the behavioral facts the passes care about:
//! side effects (reorder barriers), view semantics (output aliases an
//! input), in-place writes, and which kinds count as executed operations
//! when a cluster's effective size is measured.
//!
//! Whether an op is *differentiable* is deliberately not answered here —
//! that classification is injected into the clustering pass so the pass
//! stays agnostic to the concrete catalog.

use crate::types::{Constant, Type};

/// The kind tag of a [`Node`](crate::Node).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Block entry sentinel. Produces the block's parameter values.
    Param,
    /// Block exit sentinel. Consumes the block's output values.
    Return,

    /// A literal constant.
    Constant(Constant),

    // Elementwise / linear-algebra ops.
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    MatMul,
    Relu,
    Sigmoid,
    Tanh,
    Sum,

    /// Split a tensor into `chunks` pieces along a dimension. Multi-output;
    /// every output is a view of the input, so the outputs alias each other.
    Chunk { chunks: u32 },

    /// In-place accumulate: writes its first input and returns a renamed
    /// alias of it.
    AddInPlace,

    // View ops: the output is a reshaped/retyped alias of the input.
    View,
    Reshape,
    Transpose,
    Expand,

    // Side-effecting ops: immovable order barriers.
    Print,
    Store,
    Bailout,

    /// Records observed runtime type information about the value it wraps.
    /// Passes the value through unchanged; `profiled` is the observation,
    /// absent when the profiler never saw this value.
    Profile { profiled: Option<Type> },

    /// Conditional with two nested blocks (then / else arms).
    If,
    /// Counted loop with one nested body block.
    Loop,

    /// A nested subgraph formed by merging previously separate nodes.
    /// Owns exactly one block; input `i` corresponds to the block's param
    /// value `i`, output `j` to the block's output operand `j`.
    Cluster,
}

impl OpKind {
    /// Side-effecting nodes cannot be reordered relative to one another and
    /// act as barriers for work-block construction.
    #[inline]
    pub fn has_side_effects(&self) -> bool {
        matches!(self, OpKind::Print | OpKind::Store | OpKind::Bailout)
    }

    /// View-producing ops. Excluded from clustering: a view at a cluster
    /// boundary output corrupts downstream differentiation.
    #[inline]
    pub fn is_view(&self) -> bool {
        matches!(
            self,
            OpKind::View | OpKind::Reshape | OpKind::Transpose | OpKind::Expand
        )
    }

    /// Returns `true` if this op writes (mutates) its first input.
    #[inline]
    pub fn writes_first_input(&self) -> bool {
        matches!(self, OpKind::AddInPlace)
    }

    /// If output `offset` is an alias of one of the inputs, returns that
    /// input's offset.
    #[inline]
    pub fn output_aliases_input(&self, _offset: usize) -> Option<usize> {
        match self {
            OpKind::View
            | OpKind::Reshape
            | OpKind::Transpose
            | OpKind::Expand
            | OpKind::AddInPlace
            | OpKind::Chunk { .. } => Some(0),
            _ => None,
        }
    }

    /// Node kinds that do not represent an executed operation. These do not
    /// count toward a cluster's effective size.
    #[inline]
    pub fn not_executed(&self) -> bool {
        matches!(self, OpKind::Constant(_) | OpKind::Profile { .. })
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        matches!(self, OpKind::Constant(_))
    }

    #[inline]
    pub fn is_cluster(&self) -> bool {
        matches!(self, OpKind::Cluster)
    }

    #[inline]
    pub fn is_profile(&self) -> bool {
        matches!(self, OpKind::Profile { .. })
    }

    /// Short mnemonic for dumps.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            OpKind::Param => "param",
            OpKind::Return => "return",
            OpKind::Constant(_) => "constant",
            OpKind::Add => "add",
            OpKind::Sub => "sub",
            OpKind::Mul => "mul",
            OpKind::Div => "div",
            OpKind::Neg => "neg",
            OpKind::MatMul => "matmul",
            OpKind::Relu => "relu",
            OpKind::Sigmoid => "sigmoid",
            OpKind::Tanh => "tanh",
            OpKind::Sum => "sum",
            OpKind::Chunk { .. } => "chunk",
            OpKind::AddInPlace => "add_",
            OpKind::View => "view",
            OpKind::Reshape => "reshape",
            OpKind::Transpose => "transpose",
            OpKind::Expand => "expand",
            OpKind::Print => "print",
            OpKind::Store => "store",
            OpKind::Bailout => "bailout",
            OpKind::Profile { .. } => "profile",
            OpKind::If => "if",
            OpKind::Loop => "loop",
            OpKind::Cluster => "cluster",
        }
    }
}
