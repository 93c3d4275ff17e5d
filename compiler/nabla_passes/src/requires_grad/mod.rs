//! Requires-grad annotation for cluster outputs.
//!
//! Gradient construction needs to know, per cluster output, whether the
//! value requires a gradient. The profile node observing a value usually
//! ends up inside the same cluster as its producer, but a work-block
//! barrier or output splitting can leave the observation outside — in the
//! enclosing block, or behind the boundary of the next cluster over. This
//! pass chases those observations and copies the answer onto the cluster's
//! inner output value. Unobserved outputs stay unresolved; absence is
//! never defaulted to `false`.

use nabla_graph::{BlockId, Graph, NodeId, OpKind, Type};

/// Annotate the outputs of every cluster in `block` (recursively) with
/// requires-grad information recovered from nearby profile nodes.
pub fn add_requires_grad_on_outputs(g: &mut Graph, block: BlockId) {
    for n in g.body(block).to_vec() {
        if g.kind(n).is_cluster() {
            annotate_cluster_outputs(g, n);
            continue;
        }
        for b in g.node_blocks(n).to_vec() {
            add_requires_grad_on_outputs(g, b);
        }
    }
}

fn annotate_cluster_outputs(g: &mut Graph, cluster: NodeId) {
    let sub = g.cluster_subgraph(cluster);
    for j in 0..g.block_outputs(sub).len() {
        let inner = g.block_outputs(sub)[j];
        // a profile inside the cluster already carries the answer
        if g.kind(g.producer(inner)).is_profile() {
            continue;
        }
        let ty = *g.value_ty(inner);
        let Some(meta) = ty.as_tensor() else { continue };
        if meta.requires_grad.is_some() {
            continue;
        }

        let outer = g.outputs(cluster)[j];
        let mut answer = None;
        for u in g.uses(outer).to_vec() {
            match g.kind(u.user) {
                OpKind::Profile { .. } => {
                    answer = profile_observation(g, u.user);
                }
                OpKind::Cluster => {
                    // the observation may sit just inside the consumer
                    let next_sub = g.cluster_subgraph(u.user);
                    let inner_param = g.block_params(next_sub)[u.offset as usize];
                    for iu in g.uses(inner_param).to_vec() {
                        if g.kind(iu.user).is_profile() {
                            answer = profile_observation(g, iu.user);
                            if answer.is_some() {
                                break;
                            }
                        }
                    }
                }
                _ => {}
            }
            if answer.is_some() {
                break;
            }
        }
        if let Some(rg) = answer {
            g.set_value_ty(inner, ty.with_requires_grad(rg));
            tracing::trace!(?cluster, output = j, requires_grad = rg, "annotated cluster output");
        }
    }
}

fn profile_observation(g: &Graph, profile: NodeId) -> Option<bool> {
    let OpKind::Profile { profiled } = g.kind(profile) else {
        unreachable!("profile_observation on a non-profile node");
    };
    profiled.as_ref().and_then(Type::requires_grad)
}
