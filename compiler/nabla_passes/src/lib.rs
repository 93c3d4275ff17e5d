//! Graph passes for the nabla IR.
//!
//! The centerpiece is [`create_autodiff_subgraphs`], which clusters
//! differentiable operations into [`Cluster`](nabla_graph::OpKind::Cluster)
//! nodes large enough to be worth differentiating as a unit. The supporting
//! machinery — subgraph surgery, common-subexpression elimination, and
//! requires-grad annotation — is exposed for use by other pipeline stages.

pub mod autodiff;
pub mod classify;
pub mod cse;
pub mod requires_grad;
pub mod subgraph;

#[cfg(test)]
mod test_helpers;

pub use autodiff::create_autodiff_subgraphs;
pub use classify::{DefaultClassifier, Differentiable};
pub use cse::eliminate_common_subexpressions;
pub use requires_grad::add_requires_grad_on_outputs;
pub use subgraph::{dissolve, merge_into, split_aliasing_outputs, wrap_in_singleton};
