//! Graph traversal and tree materialisation.
//!
//! Graphs are implicit: a start node plus a neighbour function `Fn(&T) ->
//! Vec<T>`, usually "nodes referenced through attribute X" or "nodes
//! referring through attribute X". Graphs may contain cycles; none of the
//! functions here loop on them.
//!
//! - [`collect_nodes`]: every node reachable from a start node, once each.
//! - [`collect_paths`]: every maximal cycle-free walk from a start node.
//! - [`find_roots`] / [`find_roots_from`]: the nodes those walks end at.
//! - [`to_tree`]: a lazily expanded [`Tree`] rooted at a node.

mod tree;

pub use tree::{depth_limited, pretty_print_tree, pretty_print_tree_to_depth, to_tree, DepthLimited, Neighbours, Tree, TreeBuilder};

use indexmap::IndexSet;
use std::hash::Hash;

/// Nodes reachable from `root` (including it) in depth-first, first-visit
/// order.
pub fn collect_nodes<T, F>(root: T, neighbours: F) -> IndexSet<T>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> Vec<T>,
{
    let mut visited = IndexSet::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if visited.contains(&node) {
            continue;
        }
        let next = neighbours(&node);
        visited.insert(node);
        stack.extend(next.into_iter().rev().filter(|n| !visited.contains(n)));
    }

    visited
}

/// Every maximal walk from `root` that does not revisit a node.
///
/// A walk ends at a node without neighbours, or where its next step would
/// close a cycle. Each walk is returned reversed: the node it ended at comes
/// first and `root` last.
pub fn collect_paths<T, F>(root: T, neighbours: F) -> Vec<Vec<T>>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> Vec<T>,
{
    let mut paths = Vec::new();
    let mut branch: IndexSet<T> = IndexSet::new();
    // Per branch element: its neighbours and how many have been walked.
    let mut frames: Vec<(Vec<T>, usize)> = Vec::new();

    let emit = |branch: &IndexSet<T>, paths: &mut Vec<Vec<T>>| {
        paths.push(branch.iter().rev().cloned().collect());
    };

    let first = neighbours(&root);
    branch.insert(root);
    if first.is_empty() {
        emit(&branch, &mut paths);
    }
    frames.push((first, 0));

    while let Some((next, walked)) = frames.last_mut() {
        let Some(node) = next.get(*walked).cloned() else {
            frames.pop();
            branch.pop();
            continue;
        };
        *walked += 1;

        if branch.contains(&node) {
            emit(&branch, &mut paths);
            continue;
        }

        let following = neighbours(&node);
        branch.insert(node);
        if following.is_empty() {
            emit(&branch, &mut paths);
        }
        frames.push((following, 0));
    }

    paths
}

/// Distinct first elements of `paths`, in first-seen order.
pub fn find_roots<T: Clone + Eq + Hash>(paths: &[Vec<T>]) -> IndexSet<T> {
    paths.iter().filter_map(|path| path.first().cloned()).collect()
}

/// Roots reached by walking `neighbours` from `node`. With a "parents"
/// neighbour function these are the top-level ancestors of `node`.
pub fn find_roots_from<T, F>(node: T, neighbours: F) -> IndexSet<T>
where
    T: Clone + Eq + Hash,
    F: Fn(&T) -> Vec<T>,
{
    find_roots(&collect_paths(node, neighbours))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn graph(edges: &[(&'static str, &'static str)]) -> impl Fn(&&'static str) -> Vec<&'static str> {
        let mut map: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for (from, to) in edges {
            map.entry(*from).or_default().push(*to);
        }
        move |n| map.get(n).cloned().unwrap_or_default()
    }

    #[test]
    fn collect_nodes_visits_each_once_in_dfs_order() {
        let g = graph(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d"), ("d", "a")]);
        let nodes: Vec<_> = collect_nodes("a", g).into_iter().collect();
        assert_eq!(nodes, ["a", "b", "d", "c"]);
    }

    #[test]
    fn collect_paths_reverses_each_walk() {
        let g = graph(&[("a", "b"), ("b", "c"), ("a", "d")]);
        assert_eq!(collect_paths("a", g), vec![vec!["c", "b", "a"], vec!["d", "a"]]);
    }

    #[test]
    fn cycle_closes_the_branch() {
        let g = graph(&[("a", "b"), ("b", "a")]);
        assert_eq!(collect_paths("a", g), vec![vec!["b", "a"]]);
    }

    #[test]
    fn isolated_node_is_its_own_path() {
        let g = graph(&[]);
        assert_eq!(collect_paths("a", g), vec![vec!["a"]]);
    }

    #[test]
    fn roots_are_distinct_path_heads() {
        let paths = vec![vec!["x", "1"], vec!["y", "2"], vec!["x", "3"]];
        let roots: Vec<_> = find_roots(&paths).into_iter().collect();
        assert_eq!(roots, ["x", "y"]);
    }
}
