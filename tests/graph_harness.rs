#![allow(unused)]
//! Graph traversal and tree integration harness.
//!
//! # What this covers
//!
//! - **Reachability**: `collect_nodes` visits every reachable node once,
//!   terminating on self-loops and longer cycles.
//! - **Paths**: `collect_paths` returns every maximal cycle-free walk;
//!   `find_roots` returns the distinct walk endpoints.
//! - **Trees**: lazy expansion, path identity (the same entity at two
//!   positions gives two unequal tree nodes), cycle cutting and the
//!   depth-limited text rendering.
//! - **Index-backed neighbours**: reference and referrer neighbour functions
//!   over a live node index.
//!
//! # What this does NOT cover
//!
//! - Very large graphs (see `benches/graph_bench.rs`)
//!
//! # Running
//!
//! ```sh
//! cargo test --test graph_harness
//! ```

mod common;
use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use termed::graph::{
    collect_nodes, collect_paths, find_roots, find_roots_from, pretty_print_tree, pretty_print_tree_to_depth, to_tree,
    TreeBuilder,
};
use termed::nodes::{reference_neighbours, referrer_neighbours};
use termed::NodeId;

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

#[test]
fn collect_nodes_visits_each_node_once() {
    let nodes: Vec<_> = collect_nodes("a", neighbours(BINARY_TREE)).into_iter().collect();
    assert_eq!(nodes.len(), 7);
    assert_eq!(nodes[0], "a");

    let nodes: Vec<_> = collect_nodes("d", neighbours(DIAMOND)).into_iter().collect();
    assert_eq!(nodes.len(), 4);
}

#[test]
fn collect_nodes_terminates_on_cycles() {
    assert_eq!(collect_nodes("a", neighbours(SELF_LOOP)).len(), 1);
    assert_eq!(collect_nodes("b", neighbours(TRIANGLE)).len(), 3);
}

// ---------------------------------------------------------------------------
// Paths and roots
// ---------------------------------------------------------------------------

#[test]
fn binary_tree_has_one_path_per_leaf() {
    let mut paths = collect_paths("a", neighbours(BINARY_TREE));
    paths.sort();
    assert_eq!(paths.len(), 4);
    // Walks come back reversed: leaf first, start last.
    assert!(paths.iter().all(|p| p.len() == 3 && p[2] == "a"));
    assert_eq!(paths[0], ["d", "b", "a"]);
}

#[test]
fn self_loop_yields_the_single_node_path() {
    assert_eq!(collect_paths("a", neighbours(SELF_LOOP)), vec![vec!["a"]]);
}

#[test]
fn cycle_paths_stop_before_revisiting() {
    assert_eq!(collect_paths("a", neighbours(TRIANGLE)), vec![vec!["c", "b", "a"]]);
}

#[test]
fn diamond_has_a_single_root() {
    let paths = collect_paths("d", neighbours(DIAMOND));
    assert_eq!(paths.len(), 2);
    assert_eq!(find_roots(&paths).into_iter().collect::<Vec<_>>(), ["a"]);
    assert_eq!(find_roots_from("d", neighbours(DIAMOND)).into_iter().collect::<Vec<_>>(), ["a"]);
}

#[test]
fn isolated_node_is_its_own_root() {
    assert_eq!(find_roots_from("z", neighbours(DIAMOND)).into_iter().collect::<Vec<_>>(), ["z"]);
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

#[test]
fn trees_expand_lazily() {
    let tree = to_tree("a", neighbours(BINARY_TREE));
    assert!(!tree.is_expanded());
    assert_eq!(tree.children().len(), 2);
    assert!(tree.is_expanded());
    assert!(!tree.children()[0].is_expanded());
    assert_eq!(tree.children()[1].children()[0].path(), ["a", "c", "f"]);
    assert_eq!(tree.children()[1].children()[0].depth(), 2);
}

#[test]
fn same_entity_at_two_positions_is_two_tree_nodes() {
    // From d, a is reached through both b and c.
    let tree = to_tree("d", neighbours(DIAMOND));
    let via_b = &tree.children()[0].children()[0];
    let via_c = &tree.children()[1].children()[0];
    assert_eq!(via_b.data(), via_c.data());
    assert_ne!(via_b, via_c);
}

#[test]
fn cyclic_graphs_give_finite_trees() {
    let tree = to_tree("a", neighbours(TRIANGLE));
    let rendered = pretty_print_tree(&tree);
    assert_eq!(rendered, " - a\n\t - b\n\t\t - c\n");

    let tree = to_tree("a", neighbours(SELF_LOOP));
    assert!(tree.children().is_empty());
}

#[test]
fn rendering_respects_the_depth_limit() {
    let tree = to_tree("a", neighbours(BINARY_TREE));
    assert_eq!(pretty_print_tree_to_depth(&tree, 1), " - a\n\t - b\n\t - c\n");
    // Nodes at the limit are never expanded.
    assert!(!tree.children()[0].is_expanded());
    assert_eq!(pretty_print_tree_to_depth(&tree, 0), " - a\n");
}

#[test]
fn builder_shares_one_neighbour_function() {
    let builder = TreeBuilder::new(neighbours(DIAMOND));
    let trees = builder.trees(["b", "c"]);
    assert_eq!(trees.len(), 2);
    assert!(trees.iter().all(|t| t.children().len() == 1 && *t.children()[0].data() == "a"));
}

// ---------------------------------------------------------------------------
// Index-backed neighbours
// ---------------------------------------------------------------------------

#[tokio::test]
async fn broader_references_lead_to_the_top_concept() {
    let index = Arc::new(index_with(&animal_corpus()));
    let broader = reference_neighbours(Arc::clone(&index), "broader");

    assert_eq!(broader(&concept_id(4)), [concept_id(2)]);
    assert!(broader(&concept_id(1)).is_empty());
    assert!(broader(&concept_id(404)).is_empty());

    let roots: Vec<NodeId> = find_roots_from(concept_id(4), broader).into_iter().collect();
    assert_eq!(roots, [concept_id(1)]);

    index.close().await.unwrap();
}

#[tokio::test]
async fn referrers_build_the_narrower_tree() {
    let index = Arc::new(index_with(&animal_corpus()));
    let narrower = referrer_neighbours(Arc::clone(&index), "broader");

    let tree = to_tree(concept_id(1), narrower);
    let children: Vec<&NodeId> = tree.children().iter().map(|t| t.data()).collect();
    assert_eq!(children, [&concept_id(2), &concept_id(3)]);

    let grandchildren: Vec<&NodeId> = tree.children()[0].children().iter().map(|t| t.data()).collect();
    assert_eq!(grandchildren, [&concept_id(4), &concept_id(5)]);

    let rendered = pretty_print_tree(&tree);
    assert_eq!(rendered.lines().count(), 5);

    index.close().await.unwrap();
}
