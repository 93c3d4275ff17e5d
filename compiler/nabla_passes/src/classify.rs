//! Differentiability classification.
//!
//! The clustering pass asks this trait, not the op catalog, whether a node
//! can be differentiated, so gradient support can evolve without touching
//! the pass itself.

use nabla_graph::{Graph, NodeId, OpKind};

/// Answers whether a gradient can be computed for a node.
pub trait Differentiable {
    fn is_differentiable(&self, g: &Graph, n: NodeId) -> bool;
}

/// The built-in gradient catalog: elementwise arithmetic, activations,
/// reductions, chunking, in-place accumulation, and profile observations
/// (which pass their value through unchanged).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultClassifier;

impl Differentiable for DefaultClassifier {
    fn is_differentiable(&self, g: &Graph, n: NodeId) -> bool {
        matches!(
            g.kind(n),
            OpKind::Add
                | OpKind::Sub
                | OpKind::Mul
                | OpKind::Div
                | OpKind::Neg
                | OpKind::MatMul
                | OpKind::Relu
                | OpKind::Sigmoid
                | OpKind::Tanh
                | OpKind::Sum
                | OpKind::Chunk { .. }
                | OpKind::AddInPlace
                | OpKind::Profile { .. }
        )
    }
}
