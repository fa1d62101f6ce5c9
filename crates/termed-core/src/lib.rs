//! termed-core — the pure half of the termed thesaurus backend.
//!
//! # Architecture
//!
//! ```text
//! Specification ──► SqlQuery ──► RowStoreDao (external)
//!       │
//!       └────────► IndexQuery ──► termed-index
//!
//! Node ──► NodeDocumentMapper ──► Document ──► termed-index
//!
//! neighbours(T) ──► graph::{collect_paths, to_tree} ──► Tree<T>
//! ```
//!
//! Nothing here performs I/O except [`config::Config::load`].

pub mod config;
pub mod document;
pub mod graph;
pub mod node;
pub mod query;
pub mod specification;
pub mod types;

pub use document::{Document, DocumentError, DocumentMapper, IndexKey, JsonDocumentMapper};
pub use node::{NodeCriterion, NodeDocumentMapper, NodeSpecification};
pub use query::{Query, RowStoreDao, SortField};
pub use specification::{CompileError, Criterion, Engine, IndexQuery, Specification, SqlQuery};
pub use types::{GraphId, LangValue, Node, NodeId, TypeDefinition, TypeId};
