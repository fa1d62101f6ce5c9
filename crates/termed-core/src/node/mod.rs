//! The node domain: criteria, the query language, per-type filtering and
//! index documents.

pub mod criteria;
pub mod document;
pub mod parser;
pub mod type_filter;

pub use criteria::{resolve_reference_path, NodeCriterion, NodeSpecification};
pub use document::{format_timestamp, NodeDocumentMapper};
pub use parser::{parse_node_query, parse_node_query_with, ParseError};
pub use type_filter::filter_by_type;
