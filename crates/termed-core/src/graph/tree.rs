//! Lazily expanded trees over a graph.
//!
//! A [`Tree`] node knows its data, the path from the materialisation root
//! down to itself, and how to compute its neighbours. Children are computed
//! on first access and memoised. A neighbour already on the path is left
//! out, so cyclic graphs still yield finite trees.
//!
//! Identity is `(path, data)`: the same entity reached along two routes gives
//! two distinct tree nodes.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

pub type Neighbours<T> = Arc<dyn Fn(&T) -> Vec<T> + Send + Sync>;

pub struct Tree<T> {
    data: T,
    /// Root first, this node last.
    path: Vec<T>,
    neighbours: Neighbours<T>,
    children: OnceLock<Vec<Tree<T>>>,
}

impl<T: Clone + PartialEq> Tree<T> {
    fn new(data: T, path: Vec<T>, neighbours: Neighbours<T>) -> Self {
        Self { data, path, neighbours, children: OnceLock::new() }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn path(&self) -> &[T] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn children(&self) -> &[Tree<T>] {
        self.children.get_or_init(|| {
            (self.neighbours)(&self.data)
                .into_iter()
                .filter(|n| !self.path.contains(n))
                .map(|n| {
                    let mut path = self.path.clone();
                    path.push(n.clone());
                    Tree::new(n, path, Arc::clone(&self.neighbours))
                })
                .collect()
        })
    }

    /// Whether children have been computed yet.
    pub fn is_expanded(&self) -> bool {
        self.children.get().is_some()
    }
}

impl<T: PartialEq> PartialEq for Tree<T> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.data == other.data
    }
}

impl<T: Eq> Eq for Tree<T> {}

impl<T: Hash> Hash for Tree<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.data.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("data", &self.data)
            .field("path", &self.path)
            .field("expanded", &self.children.get().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub fn to_tree<T, F>(root: T, neighbours: F) -> Tree<T>
where
    T: Clone + PartialEq,
    F: Fn(&T) -> Vec<T> + Send + Sync + 'static,
{
    TreeBuilder::new(neighbours).tree(root)
}

/// Builds trees for many roots over one shared neighbour function.
pub struct TreeBuilder<T> {
    neighbours: Neighbours<T>,
}

impl<T: Clone + PartialEq> TreeBuilder<T> {
    pub fn new<F>(neighbours: F) -> Self
    where
        F: Fn(&T) -> Vec<T> + Send + Sync + 'static,
    {
        Self { neighbours: Arc::new(neighbours) }
    }

    pub fn tree(&self, root: T) -> Tree<T> {
        Tree::new(root.clone(), vec![root], Arc::clone(&self.neighbours))
    }

    pub fn trees(&self, roots: impl IntoIterator<Item = T>) -> Vec<Tree<T>> {
        roots.into_iter().map(|root| self.tree(root)).collect()
    }
}

// ---------------------------------------------------------------------------
// Depth limiting
// ---------------------------------------------------------------------------

/// A view of a tree that shows no children below `max_depth` levels.
pub struct DepthLimited<'a, T> {
    tree: &'a Tree<T>,
    remaining: usize,
}

pub fn depth_limited<T>(tree: &Tree<T>, max_depth: usize) -> DepthLimited<'_, T> {
    DepthLimited { tree, remaining: max_depth }
}

impl<'a, T: Clone + PartialEq> DepthLimited<'a, T> {
    pub fn data(&self) -> &'a T {
        self.tree.data()
    }

    pub fn tree(&self) -> &'a Tree<T> {
        self.tree
    }

    /// Children of the underlying node, or none once the limit is reached.
    /// Nodes at the limit are never expanded.
    pub fn children(&self) -> Vec<DepthLimited<'a, T>> {
        match self.remaining {
            0 => Vec::new(),
            n => self.tree.children().iter().map(|c| DepthLimited { tree: c, remaining: n - 1 }).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// One line per node, `<tabs> - <data>`, children indented one tab deeper.
/// Expands the whole tree.
pub fn pretty_print_tree<T: Clone + PartialEq + fmt::Display>(tree: &Tree<T>) -> String {
    pretty_print_tree_to_depth(tree, usize::MAX)
}

pub fn pretty_print_tree_to_depth<T: Clone + PartialEq + fmt::Display>(tree: &Tree<T>, max_depth: usize) -> String {
    let mut out = String::new();
    let mut stack = vec![(depth_limited(tree, max_depth), 0usize)];
    while let Some((node, indent)) = stack.pop() {
        out.push_str(&"\t".repeat(indent));
        out.push_str(&format!(" - {}\n", node.data()));
        stack.extend(node.children().into_iter().rev().map(|c| (c, indent + 1)));
    }
    out
}
