//! Shared test utilities for alias analysis tests. Only compiled in test
//! builds.

use nabla_graph::{Graph, NodeId, OpKind, Type, ValueId};

/// Shorthand for an unannotated tensor type.
pub(crate) fn t() -> Type {
    Type::tensor()
}

/// Add a tensor-typed input to the top-level block.
pub(crate) fn input(g: &mut Graph) -> ValueId {
    let top = g.top();
    g.add_block_param(top, t())
}

/// Append a single-output op to the top-level block.
pub(crate) fn op(g: &mut Graph, kind: OpKind, inputs: &[ValueId]) -> (NodeId, ValueId) {
    let top = g.top();
    let n = g.append_node(top, kind, inputs, &[t()]);
    (n, g.outputs(n)[0])
}
