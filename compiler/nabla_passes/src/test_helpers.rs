//! Shared builders for pass tests. Only compiled in test builds.

use nabla_graph::{BlockId, Constant, Graph, NodeId, OpKind, Type, ValueId};

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

/// Append a constant to the top-level block.
pub(crate) fn constant(g: &mut Graph, c: Constant) -> (NodeId, ValueId) {
    let top = g.top();
    let n = g.append_node(top, OpKind::Constant(c), &[], &[c.ty()]);
    (n, g.outputs(n)[0])
}

/// A profile node observing a resolved requires-grad annotation.
pub(crate) fn profile(g: &mut Graph, v: ValueId, requires_grad: bool) -> (NodeId, ValueId) {
    op(
        g,
        OpKind::Profile {
            profiled: Some(Type::tensor_requiring_grad(requires_grad)),
        },
        &[v],
    )
}

/// The kind mnemonics of a block's body, in order.
pub(crate) fn body_mnemonics(g: &Graph, b: BlockId) -> Vec<&'static str> {
    g.body(b).iter().map(|&n| g.kind(n).mnemonic()).collect()
}
