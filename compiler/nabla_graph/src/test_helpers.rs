//! Shared test utilities for the IR crate. Only compiled in test builds.

use crate::graph::Graph;
use crate::ids::{NodeId, ValueId};
use crate::ops::OpKind;
use crate::types::{Constant, Type};

/// Shorthand for an unannotated tensor type.
pub(crate) fn t() -> Type {
    Type::tensor()
}

/// Add a tensor-typed input to the top-level block.
pub(crate) fn input(g: &mut Graph) -> ValueId {
    let top = g.top();
    g.add_block_param(top, t())
}

/// Append a single-output unary op to the top-level block.
pub(crate) fn unary(g: &mut Graph, kind: OpKind, v: ValueId) -> (NodeId, ValueId) {
    let top = g.top();
    let n = g.append_node(top, kind, &[v], &[t()]);
    (n, g.outputs(n)[0])
}

/// Append a single-output binary op to the top-level block.
pub(crate) fn binary(g: &mut Graph, kind: OpKind, a: ValueId, b: ValueId) -> (NodeId, ValueId) {
    let top = g.top();
    let n = g.append_node(top, kind, &[a, b], &[t()]);
    (n, g.outputs(n)[0])
}

/// Append a constant node to the top-level block.
pub(crate) fn constant(g: &mut Graph, c: Constant) -> (NodeId, ValueId) {
    let top = g.top();
    let ty = c.ty();
    let n = g.append_node(top, OpKind::Constant(c), &[], &[ty]);
    (n, g.outputs(n)[0])
}
