//! Static node corpora and small graphs used across harnesses.
//!
//! Graph fixtures are adjacency lists over `&'static str` labels so failing
//! assertions print readable paths.

use super::builders::*;
use termed::Node;

// ---------------------------------------------------------------------------
// Node corpus
// ---------------------------------------------------------------------------

/// Six concepts in a small animal hierarchy, plus one `Term` node.
///
/// ```text
/// animal(1)
///   ├── mammal(2)
///   │     ├── cat(4)
///   │     └── dog(5)
///   └── bird(3)
/// ```
pub fn animal_corpus() -> Vec<Node> {
    vec![
        NodeBuilder::concept(1).code("animal").uri("http://example.org/animal").label("en", "Animal").label("fi", "Eläin").created(at(2019, 1, 1)).modified(at(2020, 1, 1)).build(),
        NodeBuilder::concept(2).code("mammal").label("en", "Mammal").label("fi", "Nisäkäs").broader(1).modified(at(2021, 6, 1)).build(),
        NodeBuilder::concept(3).code("bird").label("en", "Bird").label("fi", "Lintu").broader(1).modified(at(2022, 3, 15)).build(),
        NodeBuilder::concept(4)
            .code("cat")
            .label("en", "Domestic cat")
            .label("fi", "Kissa")
            .property("altLabel", "en", "House cat")
            .broader(2)
            .created(at(2022, 5, 1))
            .modified(at(2023, 9, 30))
            .build(),
        NodeBuilder::concept(5).code("dog").label("en", "Dog").label("fi", "Koira").broader(2).build(),
        NodeBuilder::concept(6).code("orphan").label("en", "Unsorted").build(),
        NodeBuilder::new(term_type(), 7).label("en", "Cat").build(),
    ]
}

// ---------------------------------------------------------------------------
// Graphs
// ---------------------------------------------------------------------------

pub type Edges = &'static [(&'static str, &'static [&'static str])];

/// Complete binary tree of depth 3 (root plus two levels).
pub const BINARY_TREE: Edges = &[
    ("a", &["b", "c"]),
    ("b", &["d", "e"]),
    ("c", &["f", "g"]),
];

/// `a` points at itself.
pub const SELF_LOOP: Edges = &[("a", &["a"])];

/// `d -> b -> a` and `d -> c -> a`.
pub const DIAMOND: Edges = &[("d", &["b", "c"]), ("b", &["a"]), ("c", &["a"])];

/// `a -> b -> c -> a`.
pub const TRIANGLE: Edges = &[("a", &["b"]), ("b", &["c"]), ("c", &["a"])];

/// Neighbour function over an adjacency list.
pub fn neighbours(edges: Edges) -> impl Fn(&&'static str) -> Vec<&'static str> + Send + Sync + 'static {
    move |node: &&'static str| {
        edges
            .iter()
            .find(|(from, _)| from == node)
            .map(|(_, to)| to.to_vec())
            .unwrap_or_default()
    }
}
