use pretty_assertions::assert_eq;

use nabla_graph::{validate, Graph, OpKind};

use crate::test_helpers::{input, op, t};
use crate::{aliased_output_pairs, outputs_aliasing_inputs, try_move_before, AliasDb};

/// A node already directly before the move point needs no move.
#[test]
fn adjacent_is_trivially_valid() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (n1, v1) = op(&mut g, OpKind::Relu, &[x]);
    let (n2, _) = op(&mut g, OpKind::Tanh, &[v1]);
    let mut db = AliasDb::build(&g);

    assert!(try_move_before(&mut g, &mut db, n1, n2));
    assert_eq!(g.body(g.top()), &[n1, n2]);
}

/// An independent intermediate node is simply jumped over.
#[test]
fn independent_intermediate_stays() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (n1, _) = op(&mut g, OpKind::Relu, &[x]);
    let (n2, _) = op(&mut g, OpKind::Tanh, &[x]);
    let (n3, _) = op(&mut g, OpKind::Neg, &[x]);
    let mut db = AliasDb::build(&g);

    assert!(try_move_before(&mut g, &mut db, n1, n3));
    assert_eq!(g.body(g.top()), &[n2, n1, n3]);
    assert!(validate(&g).is_ok());
}

/// A consumer sitting between mover and move point is dragged to the far
/// side of the move point.
#[test]
fn dependent_intermediate_is_dragged() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (n1, v1) = op(&mut g, OpKind::Relu, &[x]);
    let (n2, _) = op(&mut g, OpKind::Tanh, &[v1]);
    let (n3, _) = op(&mut g, OpKind::Neg, &[x]);
    let mut db = AliasDb::build(&g);

    assert!(try_move_before(&mut g, &mut db, n1, n3));
    assert_eq!(g.body(g.top()), &[n1, n3, n2]);
    assert!(validate(&g).is_ok());
}

/// If the move point itself depends on a dragged node, the move is illegal.
#[test]
fn move_point_depending_on_dragged_fails() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (n1, v1) = op(&mut g, OpKind::Relu, &[x]);
    let (n2, v2) = op(&mut g, OpKind::Tanh, &[v1]);
    let (n3, _) = op(&mut g, OpKind::Neg, &[v2]);
    let mut db = AliasDb::build(&g);

    assert!(!try_move_before(&mut g, &mut db, n1, n3));
    // graph untouched
    assert_eq!(g.body(g.top()), &[n1, n2, n3]);
}

/// Side-effecting nodes are hard barriers.
#[test]
fn side_effect_blocks_move() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (n1, _) = op(&mut g, OpKind::Relu, &[x]);
    let top = g.top();
    let p = g.append_node(top, OpKind::Print, &[x], &[]);
    let (n3, _) = op(&mut g, OpKind::Neg, &[x]);
    let mut db = AliasDb::build(&g);

    assert!(!try_move_before(&mut g, &mut db, n1, n3));
    assert_eq!(g.body(g.top()), &[n1, p, n3]);
}

/// An in-place write drags readers of the written memory along.
#[test]
fn inplace_write_drags_readers() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let y = input(&mut g);
    let (m, _) = op(&mut g, OpKind::AddInPlace, &[x, y]);
    let (r, _) = op(&mut g, OpKind::Relu, &[x]);
    let (n3, _) = op(&mut g, OpKind::Neg, &[y]);
    let mut db = AliasDb::build(&g);

    assert!(try_move_before(&mut g, &mut db, m, n3));
    // r read x after the in-place write, and still does
    assert_eq!(g.body(g.top()), &[m, n3, r]);
    assert!(validate(&g).is_ok());
}

/// A dragged writer may not cross a move point that reads the written
/// memory.
#[test]
fn dragged_writer_blocks_on_reading_move_point() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let y = input(&mut g);
    let (n1, v1) = op(&mut g, OpKind::Relu, &[x]);
    let (w, _) = op(&mut g, OpKind::AddInPlace, &[v1, y]);
    let (n3, _) = op(&mut g, OpKind::Tanh, &[v1]);
    let mut db = AliasDb::build(&g);

    assert!(!try_move_before(&mut g, &mut db, n1, n3));
    assert_eq!(g.body(g.top()), &[n1, w, n3]);
}

/// View chains propagate may-alias through the union-find.
#[test]
fn view_chain_aliases() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let (_, v1) = op(&mut g, OpKind::View, &[x]);
    let (_, v2) = op(&mut g, OpKind::Transpose, &[v1]);
    let (_, other) = op(&mut g, OpKind::Relu, &[x]);
    let mut db = AliasDb::build(&g);

    assert!(db.may_alias(x, v2));
    assert!(db.may_alias(v1, v2));
    assert!(!db.may_alias(other, x));
}

/// Chunk outputs alias each other and the chunked input.
#[test]
fn cluster_output_alias_queries() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let top = g.top();
    let ret = g.return_node(top);
    let cl = g.create_node(OpKind::Cluster, &[x], &[]);
    g.insert_before(cl, ret);
    let sub = g.add_nested_block(cl);
    let p0 = g.add_block_param(sub, t());
    let chunk = g.append_node(sub, OpKind::Chunk { chunks: 2 }, &[p0], &[t(), t()]);
    let a = g.outputs(chunk)[0];
    let b = g.outputs(chunk)[1];
    g.add_block_output(sub, a);
    g.add_block_output(sub, b);
    g.add_output(cl, t());
    g.add_output(cl, t());

    assert_eq!(aliased_output_pairs(&g, cl), vec![(0, 1)]);
    assert_eq!(outputs_aliasing_inputs(&g, cl), vec![0, 1]);
}

/// A subgraph of pure ops has no aliasing outputs.
#[test]
fn clean_cluster_has_no_aliasing() {
    let mut g = Graph::new();
    let x = input(&mut g);
    let top = g.top();
    let ret = g.return_node(top);
    let cl = g.create_node(OpKind::Cluster, &[x], &[]);
    g.insert_before(cl, ret);
    let sub = g.add_nested_block(cl);
    let p0 = g.add_block_param(sub, t());
    let r = g.append_node(sub, OpKind::Relu, &[p0], &[t()]);
    let rv = g.outputs(r)[0];
    let s = g.append_node(sub, OpKind::Tanh, &[rv], &[t()]);
    let sv = g.outputs(s)[0];
    g.add_block_output(sub, rv);
    g.add_block_output(sub, sv);
    g.add_output(cl, t());
    g.add_output(cl, t());

    assert_eq!(aliased_output_pairs(&g, cl), Vec::<(usize, usize)>::new());
    assert_eq!(outputs_aliasing_inputs(&g, cl), Vec::<usize>::new());
}
