//! Node-specific wiring: the node index and graph neighbour functions backed
//! by it.
//!
//! Reference neighbours read the node's own `references` and fetch the
//! targets; referrer neighbours search for nodes whose reference field holds
//! the node's uuid. Either can feed [`collect_nodes`], [`collect_paths`] or a
//! [`TreeBuilder`].
//!
//! [`collect_nodes`]: termed_core::graph::collect_nodes
//! [`collect_paths`]: termed_core::graph::collect_paths
//! [`TreeBuilder`]: termed_core::graph::TreeBuilder

use std::sync::Arc;
use termed_core::config::IndexConfig;
use termed_core::node::document::reference_field;
use termed_core::node::{parse_node_query_with, ParseError};
use termed_core::{IndexQuery, Node, NodeDocumentMapper, NodeId, NodeSpecification};
use termed_index::{Result, SearchIndex, ValueProvider};

pub type NodeIndex = SearchIndex<NodeId, Node>;

/// Open a node index with the standard node mapper.
pub fn open_node_index(config: &IndexConfig) -> Result<NodeIndex> {
    SearchIndex::open(config, NodeDocumentMapper::new())
}

/// Queue a bulk job indexing `nodes`, keyed by their ids.
pub async fn index_nodes(index: &NodeIndex, nodes: Vec<Node>) -> Result<u64> {
    let keys = nodes.iter().map(Node::node_id).collect();
    let by_id: std::collections::HashMap<NodeId, Node> = nodes.into_iter().map(|n| (n.node_id(), n)).collect();
    let provider: ValueProvider<NodeId, Node> = Arc::new(move |id: &NodeId| by_id.get(id).cloned());
    index.index_all(keys, provider).await
}

/// Parse a node query, resolving reference paths against `index`.
pub fn parse_query(index: &NodeIndex, input: &str) -> std::result::Result<NodeSpecification, ParseError> {
    parse_node_query_with(input, |inner| {
        let query = inner.to_index_query()?;
        let keys: Vec<NodeId> = index.keys(&query, &[], None)?.collect::<Result<_>>()?;
        Ok(keys)
    })
}

/// Nodes that `id` points at through `attr`, in reference order. Targets
/// missing from the index are skipped.
pub fn references(index: &NodeIndex, id: &NodeId, attr: &str) -> Result<Vec<NodeId>> {
    let Some(node) = index.get(id)? else {
        return Ok(Vec::new());
    };
    let found = index.get_many(node.reference(attr))?;
    Ok(found.iter().map(Node::node_id).collect())
}

/// Nodes that point at `id` through `attr`, in key order.
pub fn referrers(index: &NodeIndex, id: &NodeId, attr: &str) -> Result<Vec<NodeId>> {
    let query = IndexQuery::term(reference_field(attr), id.id.to_string());
    index.keys(&query, &[], None)?.collect()
}

fn neighbours_with(
    index: Arc<NodeIndex>,
    attr: String,
    lookup: fn(&NodeIndex, &NodeId, &str) -> Result<Vec<NodeId>>,
) -> impl Fn(&NodeId) -> Vec<NodeId> + Send + Sync + 'static {
    move |id: &NodeId| match lookup(&index, id, &attr) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(node = %id, attr = %attr, error = %e, "graph: neighbour lookup failed");
            Vec::new()
        }
    }
}

/// Neighbour function following `attr` forwards. Lookup failures are logged
/// and treated as "no neighbours".
pub fn reference_neighbours(
    index: Arc<NodeIndex>,
    attr: impl Into<String>,
) -> impl Fn(&NodeId) -> Vec<NodeId> + Send + Sync + 'static {
    neighbours_with(index, attr.into(), references)
}

/// Neighbour function following `attr` backwards.
pub fn referrer_neighbours(
    index: Arc<NodeIndex>,
    attr: impl Into<String>,
) -> impl Fn(&NodeId) -> Vec<NodeId> + Send + Sync + 'static {
    neighbours_with(index, attr.into(), referrers)
}
