//! termed — thesaurus backend core
//!
//! Storage-agnostic query and traversal machinery for a termed graph of
//! nodes. This crate re-exports the two library crates and adds the
//! node-specific glue between them so that integration tests and the CLI
//! can import everything from one place.
//!
//! # Architecture
//!
//! ```text
//! Specification ──► SQL fragment            (row store)
//!       │
//!       └─────────► IndexQuery ──► SearchIndex ──► Hits
//!                                      │
//! Graph traversal / Tree ◄── nodes ◄───┘
//! ```
//!
//! `termed-core` holds the pure parts (types, specifications, document
//! mapping, graph algorithms, config). `termed-index` holds the async search
//! index engine.

pub mod nodes;

pub use termed_core::{
    config, document, graph, node, query, specification, types, CompileError, Criterion, Document, DocumentError,
    DocumentMapper, Engine, GraphId, IndexKey, IndexQuery, JsonDocumentMapper, LangValue, Node, NodeCriterion,
    NodeDocumentMapper, NodeId, NodeSpecification, Query, RowStoreDao, SortField, Specification, SqlQuery,
    TypeDefinition, TypeId,
};
pub use termed_index::{BulkStatsSnapshot, Hits, IndexError, IndexLocation, SearchIndex, ValueProvider, COMMIT_FILE};
