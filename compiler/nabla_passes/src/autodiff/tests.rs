use pretty_assertions::assert_eq;

use nabla_graph::{validate, Graph, OpKind, Type};

use crate::classify::DefaultClassifier;
use crate::create_autodiff_subgraphs;
use crate::test_helpers::{body_mnemonics, input, op, profile, t};

/// A chain of differentiable ops collapses into one cluster.
#[test]
fn chain_collapses_into_one_cluster() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[a]);
    let (_, c) = op(&mut g, OpKind::Sigmoid, &[b]);
    let (_, d) = op(&mut g, OpKind::Neg, &[c]);
    let top = g.top();
    g.add_block_output(top, d);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(clusters.len(), 1);
    assert_eq!(body_mnemonics(&g, top), vec!["cluster"]);
    assert_eq!(clusters[0], g.body(top)[0]);
    let sub = g.cluster_subgraph(clusters[0]);
    assert_eq!(
        body_mnemonics(&g, sub),
        vec!["relu", "tanh", "sigmoid", "neg"]
    );
    // the block output kept its identity through wrapping and merging
    assert_eq!(g.outputs(clusters[0]), &[d]);
    assert_eq!(g.block_outputs(top), &[d]);
    assert!(validate(&g).is_ok());
}

/// Below-threshold spans are never even scanned.
#[test]
fn threshold_above_chain_size_builds_nothing() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[a]);
    let (_, c) = op(&mut g, OpKind::Sigmoid, &[b]);
    let (_, d) = op(&mut g, OpKind::Neg, &[c]);
    let top = g.top();
    g.add_block_output(top, d);

    let clusters = create_autodiff_subgraphs(&mut g, 5, &DefaultClassifier);

    assert!(clusters.is_empty());
    assert_eq!(
        body_mnemonics(&g, top),
        vec!["relu", "tanh", "sigmoid", "neg"]
    );
    assert!(validate(&g).is_ok());
}

/// A side-effecting node splits the block; spans left with fewer than
/// `threshold` candidates produce nothing.
#[test]
fn side_effect_barrier_blocks_small_spans() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let top = g.top();
    g.append_node(top, OpKind::Print, &[x], &[]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[a]);
    g.add_block_output(top, b);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert!(clusters.is_empty());
    assert_eq!(body_mnemonics(&g, top), vec!["relu", "print", "tanh"]);
    assert!(validate(&g).is_ok());
}

/// Large enough spans on both sides of a barrier become separate clusters,
/// reported in creation order.
#[test]
fn clusters_form_on_both_sides_of_barrier() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a1) = op(&mut g, OpKind::Relu, &[x]);
    let (_, a2) = op(&mut g, OpKind::Tanh, &[a1]);
    let top = g.top();
    g.append_node(top, OpKind::Print, &[x], &[]);
    let (_, b1) = op(&mut g, OpKind::Sigmoid, &[a2]);
    let (_, b2) = op(&mut g, OpKind::Neg, &[b1]);
    g.add_block_output(top, b2);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(clusters.len(), 2);
    assert!(g.is_before(clusters[0], clusters[1]));
    assert_eq!(body_mnemonics(&g, top), vec!["cluster", "print", "cluster"]);
    assert_eq!(
        body_mnemonics(&g, g.cluster_subgraph(clusters[0])),
        vec!["relu", "tanh"]
    );
    assert_eq!(
        body_mnemonics(&g, g.cluster_subgraph(clusters[1])),
        vec!["sigmoid", "neg"]
    );
    assert!(validate(&g).is_ok());
}

/// View ops never enter a cluster, and the singletons left around them
/// dissolve again.
#[test]
fn views_are_left_out() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, v) = op(&mut g, OpKind::View, &[a]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[v]);
    let top = g.top();
    g.add_block_output(top, b);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert!(clusters.is_empty());
    assert_eq!(body_mnemonics(&g, top), vec!["relu", "view", "tanh"]);
    assert!(validate(&g).is_ok());
}

/// Per-cluster deduplication runs before the size check, so a cluster that
/// only reaches the threshold through duplicates dissolves.
#[test]
fn dedup_can_dissolve_a_cluster() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a1) = op(&mut g, OpKind::Mul, &[x, x]);
    let (_, a2) = op(&mut g, OpKind::Mul, &[x, x]);
    let (_, s) = op(&mut g, OpKind::Add, &[a1, a2]);
    let top = g.top();
    g.add_block_output(top, s);

    let clusters = create_autodiff_subgraphs(&mut g, 3, &DefaultClassifier);

    assert!(clusters.is_empty());
    assert_eq!(body_mnemonics(&g, top), vec!["mul", "add"]);
    assert!(validate(&g).is_ok());
}

/// Outputs that alias each other are split back out of the cluster.
#[test]
fn aliasing_outputs_are_split_out() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, s) = op(&mut g, OpKind::Mul, &[x, x]);
    let (_, tv) = op(&mut g, OpKind::Add, &[s, x]);
    let top = g.top();
    let chunk = g.append_node(top, OpKind::Chunk { chunks: 2 }, &[tv], &[t(), t()]);
    let a = g.outputs(chunk)[0];
    let b = g.outputs(chunk)[1];
    g.add_block_output(top, a);
    g.add_block_output(top, b);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(clusters.len(), 1);
    assert_eq!(body_mnemonics(&g, top), vec!["cluster", "chunk"]);
    assert_eq!(
        body_mnemonics(&g, g.cluster_subgraph(clusters[0])),
        vec!["mul", "add"]
    );
    // the chunk consumes the cluster's sole remaining output
    assert_eq!(g.outputs(clusters[0]).len(), 1);
    assert_eq!(g.inputs(chunk), &[g.outputs(clusters[0])[0]]);
    assert_eq!(g.block_outputs(top), &[a, b]);
    assert!(validate(&g).is_ok());
}

/// A profile observation stranded outside the cluster by a barrier still
/// annotates the cluster output.
#[test]
fn requires_grad_recovered_across_barrier() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[a]);
    let top = g.top();
    g.append_node(top, OpKind::Print, &[x], &[]);
    let (_, pv) = profile(&mut g, b, true);
    g.add_block_output(top, pv);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(clusters.len(), 1);
    let sub = g.cluster_subgraph(clusters[0]);
    assert_eq!(body_mnemonics(&g, sub), vec!["relu", "tanh"]);
    let inner = g.block_outputs(sub)[0];
    assert_eq!(g.value_ty(inner).requires_grad(), Some(true));
    assert!(validate(&g).is_ok());
}

/// The observation may also sit just inside the consuming cluster.
#[test]
fn requires_grad_recovered_through_adjacent_cluster() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[a]);
    let top = g.top();
    g.append_node(top, OpKind::Print, &[x], &[]);
    let (_, pv) = profile(&mut g, b, true);
    let (_, m) = op(&mut g, OpKind::Mul, &[pv, pv]);
    let (_, n) = op(&mut g, OpKind::Neg, &[m]);
    g.add_block_output(top, n);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(clusters.len(), 2);
    // the profile was absorbed into the second cluster
    assert_eq!(
        body_mnemonics(&g, g.cluster_subgraph(clusters[1])),
        vec!["profile", "mul", "neg"]
    );
    let first_sub = g.cluster_subgraph(clusters[0]);
    let inner = g.block_outputs(first_sub)[0];
    assert_eq!(g.value_ty(inner).requires_grad(), Some(true));
    assert!(validate(&g).is_ok());
}

/// Profiles are absorbed but do not count toward cluster size.
#[test]
fn profiles_do_not_count_toward_size() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, pv) = profile(&mut g, a, true);
    let top = g.top();
    g.add_block_output(top, pv);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert!(clusters.is_empty());
    assert_eq!(body_mnemonics(&g, top), vec!["relu", "profile"]);
    assert!(validate(&g).is_ok());
}

/// Chains inside control-flow arms are clustered by recursion.
#[test]
fn nested_blocks_are_clustered() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let top = g.top();
    let cond = g.add_block_param(top, Type::Bool);
    let branch = g.append_node(top, OpKind::If, &[cond], &[]);
    let arm = g.add_nested_block(branch);
    let r = g.append_node(arm, OpKind::Relu, &[x], &[t()]);
    let rv = g.outputs(r)[0];
    let tn = g.append_node(arm, OpKind::Tanh, &[rv], &[t()]);
    let tv = g.outputs(tn)[0];
    g.add_block_output(arm, tv);

    let clusters = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(clusters.len(), 1);
    assert_eq!(g.owner_block(clusters[0]), Some(arm));
    assert_eq!(
        body_mnemonics(&g, g.cluster_subgraph(clusters[0])),
        vec!["relu", "tanh"]
    );
    assert!(validate(&g).is_ok());
}

/// Running the pass on its own output changes nothing.
#[test]
fn rerun_is_stable() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, a) = op(&mut g, OpKind::Relu, &[x]);
    let (_, b) = op(&mut g, OpKind::Tanh, &[a]);
    let (_, c) = op(&mut g, OpKind::Sigmoid, &[b]);
    let top = g.top();
    g.add_block_output(top, c);

    let first = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);
    let shape: Vec<_> = body_mnemonics(&g, top);
    let sub_shape = body_mnemonics(&g, g.cluster_subgraph(first[0]));

    let second = create_autodiff_subgraphs(&mut g, 2, &DefaultClassifier);

    assert_eq!(second, first);
    assert_eq!(body_mnemonics(&g, top), shape);
    assert_eq!(body_mnemonics(&g, g.cluster_subgraph(first[0])), sub_shape);
    assert!(validate(&g).is_ok());
}
