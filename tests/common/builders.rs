//! Test builders — ergonomic constructors for nodes and indexes.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use termed::config::IndexConfig;
use termed::nodes::{open_node_index, NodeIndex};
use termed::{GraphId, LangValue, Node, NodeId, TypeId};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

pub fn graph() -> GraphId {
    GraphId::new(Uuid::from_u128(0xA))
}

pub fn concept_type() -> TypeId {
    TypeId::new(graph(), "Concept")
}

pub fn term_type() -> TypeId {
    TypeId::new(graph(), "Term")
}

/// Node id `n` of type `Concept`.
pub fn concept_id(n: u128) -> NodeId {
    NodeId::new(concept_type(), Uuid::from_u128(n))
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// NodeBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Node`] test fixtures.
///
/// # Example
///
/// ```rust
/// let cat = NodeBuilder::concept(1)
///     .code("cat")
///     .label("en", "Cat")
///     .broader(2)
///     .build();
/// ```
pub struct NodeBuilder {
    node: Node,
}

impl NodeBuilder {
    pub fn new(type_id: TypeId, n: u128) -> Self {
        Self { node: Node::new(type_id, Uuid::from_u128(n)) }
    }

    pub fn concept(n: u128) -> Self {
        Self::new(concept_type(), n)
    }

    pub fn code(mut self, code: &str) -> Self {
        self.node = self.node.with_code(code);
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.node = self.node.with_uri(uri);
        self
    }

    /// Adds a `prefLabel` value.
    pub fn label(self, lang: &str, value: &str) -> Self {
        self.property("prefLabel", lang, value)
    }

    pub fn property(mut self, attr: &str, lang: &str, value: &str) -> Self {
        self.node = self.node.add_property(attr, LangValue::new(lang, value));
        self
    }

    /// Adds a `broader` reference to concept `n`.
    pub fn broader(self, n: u128) -> Self {
        self.reference("broader", concept_id(n))
    }

    pub fn reference(mut self, attr: &str, target: NodeId) -> Self {
        self.node = self.node.add_reference(attr, target);
        self
    }

    pub fn created(mut self, at: DateTime<Utc>) -> Self {
        self.node = self.node.with_created("tester", at);
        self
    }

    pub fn modified(mut self, at: DateTime<Utc>) -> Self {
        self.node = self.node.with_last_modified("tester", at);
        self
    }

    pub fn build(self) -> Node {
        self.node
    }
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

/// Index config whose schedulers never fire during a test.
pub fn quiet_config(directory: Option<&Path>) -> IndexConfig {
    let mut config = match directory {
        Some(dir) => IndexConfig::in_directory(dir),
        None => IndexConfig::in_memory(),
    };
    config.refresh_interval_ms = 3_600_000;
    config.commit_interval_ms = 3_600_000;
    config.progress_interval = 1;
    config
}

pub fn memory_index() -> NodeIndex {
    open_node_index(&quiet_config(None)).expect("open in-memory index")
}

/// Opens an in-memory index, writes `nodes` and makes them visible.
pub fn index_with(nodes: &[Node]) -> NodeIndex {
    let index = memory_index();
    for node in nodes {
        index.index(&node.node_id(), node).expect("index node");
    }
    index.refresh_blocking().expect("refresh");
    index
}
