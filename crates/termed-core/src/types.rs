//! Thesaurus domain types: graphs, types, nodes and their identifiers.
//!
//! Everything here is plain data with serde support. The JSON shape is the
//! one the index stores: camelCase field names, absent optionals omitted, and
//! empty attribute maps left out entirely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifier of a graph (a vocabulary, thesaurus or taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphId {
    pub id: Uuid,
}

impl GraphId {
    pub fn new(id: Uuid) -> Self {
        Self { id }
    }

    pub fn random() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Identifier of a node type inside a graph, e.g. `Concept` or `Collection`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId {
    pub graph: GraphId,
    pub id: String,
}

impl TypeId {
    pub fn new(graph: GraphId, id: impl Into<String>) -> Self {
        Self { graph, id: id.into() }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.graph, self.id)
    }
}

/// Identifier of a single node. Its textual form `<graph>/<type>/<uuid>` is
/// the key under which the node is indexed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    #[serde(rename = "type")]
    pub type_id: TypeId,
    pub id: Uuid,
}

impl NodeId {
    pub fn new(type_id: TypeId, id: Uuid) -> Self {
        Self { type_id, id }
    }

    pub fn graph(&self) -> GraphId {
        self.type_id.graph
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_id, self.id)
    }
}

/// Returned when a string is not a `<graph>/<type>/<uuid>` node key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node id {input:?}: {reason}")]
pub struct ParseNodeIdError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = |reason| ParseNodeIdError { input: s.to_string(), reason };

        let (graph, rest) = s.split_once('/').ok_or_else(|| fail("missing type"))?;
        // Type ids may contain '/', the node uuid never does.
        let (type_id, id) = rest.rsplit_once('/').ok_or_else(|| fail("missing node uuid"))?;
        if type_id.is_empty() {
            return Err(fail("empty type"));
        }
        let graph = Uuid::parse_str(graph).map_err(|_| fail("graph is not a uuid"))?;
        let id = Uuid::parse_str(id).map_err(|_| fail("node is not a uuid"))?;

        Ok(NodeId::new(TypeId::new(GraphId::new(graph), type_id), id))
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A localized text value. `lang` is empty for language-neutral values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LangValue {
    #[serde(default)]
    pub lang: String,
    pub value: String,
}

impl LangValue {
    pub fn new(lang: impl Into<String>, value: impl Into<String>) -> Self {
        Self { lang: lang.into(), value: value.into() }
    }
}

/// A thesaurus entity with localized text properties and typed references
/// to other nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
    /// Text attribute id → values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Vec<LangValue>>,
    /// Reference attribute id → referenced nodes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, Vec<NodeId>>,
    /// Reference attribute id → nodes referencing this one.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub referrers: BTreeMap<String, Vec<NodeId>>,
}

impl Node {
    pub fn new(type_id: TypeId, id: Uuid) -> Self {
        Self {
            id,
            type_id,
            code: None,
            uri: None,
            created_by: None,
            created_date: None,
            last_modified_by: None,
            last_modified_date: None,
            properties: BTreeMap::new(),
            references: BTreeMap::new(),
            referrers: BTreeMap::new(),
        }
    }

    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.type_id.clone(), self.id)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_created(mut self, by: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.created_by = Some(by.into());
        self.created_date = Some(at);
        self
    }

    pub fn with_last_modified(mut self, by: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.last_modified_by = Some(by.into());
        self.last_modified_date = Some(at);
        self
    }

    pub fn add_property(mut self, attr: impl Into<String>, value: LangValue) -> Self {
        self.properties.entry(attr.into()).or_default().push(value);
        self
    }

    pub fn add_reference(mut self, attr: impl Into<String>, target: NodeId) -> Self {
        self.references.entry(attr.into()).or_default().push(target);
        self
    }

    pub fn add_referrer(mut self, attr: impl Into<String>, source: NodeId) -> Self {
        self.referrers.entry(attr.into()).or_default().push(source);
        self
    }

    /// Values of a text attribute, empty when the attribute is absent.
    pub fn property(&self, attr: &str) -> &[LangValue] {
        self.properties.get(attr).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets of a reference attribute, empty when the attribute is absent.
    pub fn reference(&self, attr: &str) -> &[NodeId] {
        self.references.get(attr).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn referrer(&self, attr: &str) -> &[NodeId] {
        self.referrers.get(attr).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Type definitions
// ---------------------------------------------------------------------------

/// The attributes of a type a caller is allowed to read. Used to strip
/// unreadable clauses out of node specifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDefinition {
    pub id: TypeId,
    #[serde(default)]
    pub text_attributes: BTreeSet<String>,
    #[serde(default)]
    pub reference_attributes: BTreeSet<String>,
}

impl TypeDefinition {
    pub fn new(id: TypeId) -> Self {
        Self { id, text_attributes: BTreeSet::new(), reference_attributes: BTreeSet::new() }
    }

    pub fn with_text_attribute(mut self, attr: impl Into<String>) -> Self {
        self.text_attributes.insert(attr.into());
        self
    }

    pub fn with_reference_attribute(mut self, attr: impl Into<String>) -> Self {
        self.reference_attributes.insert(attr.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
