//! Leaf criteria over [`Node`]s.
//!
//! Every criterion evaluates in memory. Most also compile to SQL against the
//! `node`, `node_text_attribute_value` and `node_reference_attribute_value`
//! tables and to an index query against the fields written by
//! [`NodeDocumentMapper`](super::NodeDocumentMapper). Range, free-text and
//! resolved reference-path criteria are index only.

use super::document::{
    format_timestamp, property_field, property_lang_field, reference_field, CREATED_FIELD, LAST_MODIFIED_FIELD,
};
use crate::document::{all_tokens, analyze, ALL_FIELD};
use crate::specification::{Criterion, IndexQuery, SqlQuery, SqlValue, Specification};
use crate::types::{GraphId, Node, NodeId, TypeId};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

pub type NodeSpecification = Specification<NodeCriterion>;

const TEXT_VALUE_EXISTS: &str = "EXISTS (SELECT 1 FROM node_text_attribute_value v \
     WHERE v.node_graph_id = graph_id AND v.node_type_id = type_id AND v.node_id = id \
     AND v.attribute_id = ?";

const REFERENCE_VALUE_EXISTS: &str = "EXISTS (SELECT 1 FROM node_reference_attribute_value v \
     WHERE v.node_graph_id = graph_id AND v.node_type_id = type_id AND v.node_id = id \
     AND v.attribute_id = ?";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeCriterion {
    Id(Uuid),
    Graph(GraphId),
    Type(TypeId),
    /// Type id in any graph.
    TypeName(String),
    Code(String),
    Uri(String),
    /// Some value of `attr` equals `value`, in `lang` when given.
    Property { attr: String, lang: Option<String>, value: String },
    PropertyPrefix { attr: String, lang: Option<String>, prefix: String },
    /// Every analysed token of `text` occurs in some value of `attr`.
    PropertyText { attr: String, lang: Option<String>, text: String },
    /// Some value of `attr` lies in the inclusive string range.
    PropertyRange { attr: String, lang: Option<String>, lower: Option<String>, upper: Option<String> },
    /// Every token of the query occurs somewhere in the node.
    Text(String),
    /// `attr` references the node with uuid `target`.
    Reference { attr: String, target: Uuid },
    WithoutReferences { attr: String },
    LastModified { lower: Option<DateTime<Utc>>, upper: Option<DateTime<Utc>> },
    CreatedDate { lower: Option<DateTime<Utc>>, upper: Option<DateTime<Utc>> },
    /// `attr` references any of `targets`. Built by [`resolve_reference_path`].
    ReferencePath { attr: String, targets: Vec<Uuid> },
}

impl NodeCriterion {
    pub fn property(attr: impl Into<String>, value: impl Into<String>) -> Self {
        NodeCriterion::Property { attr: attr.into(), lang: None, value: value.into() }
    }

    pub fn property_in(attr: impl Into<String>, lang: impl Into<String>, value: impl Into<String>) -> Self {
        NodeCriterion::Property { attr: attr.into(), lang: Some(lang.into()), value: value.into() }
    }

    pub fn property_prefix(attr: impl Into<String>, prefix: impl Into<String>) -> Self {
        NodeCriterion::PropertyPrefix { attr: attr.into(), lang: None, prefix: prefix.into() }
    }

    pub fn property_text(attr: impl Into<String>, text: impl Into<String>) -> Self {
        NodeCriterion::PropertyText { attr: attr.into(), lang: None, text: text.into() }
    }

    pub fn text(query: impl Into<String>) -> Self {
        NodeCriterion::Text(query.into())
    }

    pub fn reference(attr: impl Into<String>, target: &NodeId) -> Self {
        NodeCriterion::Reference { attr: attr.into(), target: target.id }
    }

    pub fn without_references(attr: impl Into<String>) -> Self {
        NodeCriterion::WithoutReferences { attr: attr.into() }
    }

    fn values<'a>(node: &'a Node, attr: &str, lang: &'a Option<String>) -> impl Iterator<Item = &'a str> + 'a {
        node.property(attr)
            .iter()
            .filter(move |v| lang.as_ref().map_or(true, |l| *l == v.lang))
            .map(|v| v.value.as_str())
    }

    fn value_field(attr: &str, lang: &Option<String>) -> String {
        match lang {
            Some(lang) => property_lang_field(attr, lang),
            None => property_field(attr),
        }
    }

    fn text_value_sql(attr: &str, lang: &Option<String>, condition: &str, operand: &str) -> SqlQuery {
        let mut params: Vec<SqlValue> = vec![attr.into()];
        let mut template = TEXT_VALUE_EXISTS.to_string();
        if let Some(lang) = lang {
            template.push_str(" AND v.lang = ?");
            params.push(lang.as_str().into());
        }
        template.push_str(&format!(" AND v.value {condition})"));
        params.push(operand.into());
        SqlQuery::new(template, params)
    }

    fn in_range(at: Option<DateTime<Utc>>, lower: &Option<DateTime<Utc>>, upper: &Option<DateTime<Utc>>) -> bool {
        match (lower, upper) {
            (None, None) => true,
            _ => at.is_some_and(|at| lower.map_or(true, |l| at >= l) && upper.map_or(true, |u| at <= u)),
        }
    }

    fn date_range_sql(column: &str, lower: &Option<DateTime<Utc>>, upper: &Option<DateTime<Utc>>) -> SqlQuery {
        let bounds: Vec<SqlQuery> = [(lower, ">="), (upper, "<=")]
            .into_iter()
            .filter_map(|(bound, op)| bound.map(|at| SqlQuery::new(format!("{column} {op} ?"), vec![at.into()])))
            .collect();
        match bounds.len() {
            0 => SqlQuery::match_all(),
            _ => SqlQuery::new(
                bounds.iter().map(|b| b.template.as_str()).collect::<Vec<_>>().join(" AND "),
                bounds.into_iter().flat_map(|b| b.params).collect(),
            ),
        }
    }

    fn date_range_query(field: &str, lower: &Option<DateTime<Utc>>, upper: &Option<DateTime<Utc>>) -> IndexQuery {
        match (lower, upper) {
            (None, None) => IndexQuery::All,
            _ => IndexQuery::range(field, lower.as_ref().map(format_timestamp), upper.as_ref().map(format_timestamp)),
        }
    }
}

/// `LIKE` pattern matching values that start with `prefix` literally.
/// Pair with `ESCAPE '\'`.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Criterion for NodeCriterion {
    type Key = NodeId;
    type Value = Node;

    fn test(&self, _key: &NodeId, node: &Node) -> bool {
        match self {
            NodeCriterion::Id(id) => node.id == *id,
            NodeCriterion::Graph(graph) => node.type_id.graph == *graph,
            NodeCriterion::Type(type_id) => node.type_id == *type_id,
            NodeCriterion::TypeName(name) => node.type_id.id == *name,
            NodeCriterion::Code(code) => node.code.as_deref() == Some(code.as_str()),
            NodeCriterion::Uri(uri) => node.uri.as_deref() == Some(uri.as_str()),
            NodeCriterion::Property { attr, lang, value } => Self::values(node, attr, lang).any(|v| v == value.as_str()),
            NodeCriterion::PropertyPrefix { attr, lang, prefix } => {
                Self::values(node, attr, lang).any(|v| v.starts_with(prefix.as_str()))
            }
            NodeCriterion::PropertyText { attr, lang, text } => {
                let tokens: HashSet<String> = Self::values(node, attr, lang).flat_map(analyze).collect();
                analyze(text).iter().all(|t| tokens.contains(t))
            }
            NodeCriterion::PropertyRange { attr, lang, lower, upper } => Self::values(node, attr, lang)
                .any(|v| lower.as_deref().map_or(true, |l| v >= l) && upper.as_deref().map_or(true, |u| v <= u)),
            NodeCriterion::Text(query) => match serde_json::to_value(node) {
                Ok(json) => {
                    let tokens = all_tokens(&json);
                    analyze(query).iter().all(|t| tokens.contains(t))
                }
                Err(_) => false,
            },
            NodeCriterion::Reference { attr, target } => node.reference(attr).iter().any(|r| r.id == *target),
            NodeCriterion::WithoutReferences { attr } => node.reference(attr).is_empty(),
            NodeCriterion::LastModified { lower, upper } => Self::in_range(node.last_modified_date, lower, upper),
            NodeCriterion::CreatedDate { lower, upper } => Self::in_range(node.created_date, lower, upper),
            NodeCriterion::ReferencePath { attr, targets } => {
                node.reference(attr).iter().any(|r| targets.contains(&r.id))
            }
        }
    }

    fn to_sql(&self) -> Option<SqlQuery> {
        let sql = match self {
            NodeCriterion::Id(id) => SqlQuery::new("id = ?", vec![(*id).into()]),
            NodeCriterion::Graph(graph) => SqlQuery::new("graph_id = ?", vec![graph.id.into()]),
            NodeCriterion::Type(t) => {
                SqlQuery::new("graph_id = ? AND type_id = ?", vec![t.graph.id.into(), t.id.as_str().into()])
            }
            NodeCriterion::TypeName(name) => SqlQuery::new("type_id = ?", vec![name.as_str().into()]),
            NodeCriterion::Code(code) => SqlQuery::new("code = ?", vec![code.as_str().into()]),
            NodeCriterion::Uri(uri) => SqlQuery::new("uri = ?", vec![uri.as_str().into()]),
            NodeCriterion::Property { attr, lang, value } => Self::text_value_sql(attr, lang, "= ?", value),
            NodeCriterion::PropertyPrefix { attr, lang, prefix } => {
                Self::text_value_sql(attr, lang, "LIKE ? ESCAPE '\\'", &like_prefix(prefix))
            }
            NodeCriterion::Reference { attr, target } => SqlQuery::new(
                format!("{REFERENCE_VALUE_EXISTS} AND v.value_id = ?)"),
                vec![attr.as_str().into(), (*target).into()],
            ),
            NodeCriterion::WithoutReferences { attr } => {
                SqlQuery::new(format!("NOT {REFERENCE_VALUE_EXISTS})"), vec![attr.as_str().into()])
            }
            NodeCriterion::LastModified { lower, upper } => Self::date_range_sql("last_modified_date", lower, upper),
            NodeCriterion::CreatedDate { lower, upper } => Self::date_range_sql("created_date", lower, upper),
            NodeCriterion::PropertyRange { .. }
            | NodeCriterion::PropertyText { .. }
            | NodeCriterion::Text(_)
            | NodeCriterion::ReferencePath { .. } => return None,
        };
        Some(sql)
    }

    fn to_index_query(&self) -> Option<IndexQuery> {
        let query = match self {
            NodeCriterion::Id(id) => IndexQuery::term("id", id.to_string()),
            NodeCriterion::Graph(graph) => IndexQuery::term("type.graph.id", graph.id.to_string()),
            NodeCriterion::Type(t) => IndexQuery::must(vec![
                IndexQuery::term("type.graph.id", t.graph.id.to_string()),
                IndexQuery::term("type.id", t.id.clone()),
            ]),
            NodeCriterion::TypeName(name) => IndexQuery::term("type.id", name.clone()),
            NodeCriterion::Code(code) => IndexQuery::term("code", code.clone()),
            NodeCriterion::Uri(uri) => IndexQuery::term("uri", uri.clone()),
            NodeCriterion::Property { attr, lang, value } => IndexQuery::term(Self::value_field(attr, lang), value.clone()),
            NodeCriterion::PropertyPrefix { attr, lang, prefix } => {
                IndexQuery::prefix(Self::value_field(attr, lang), prefix.clone())
            }
            NodeCriterion::PropertyText { attr, lang, text } => IndexQuery::text(Self::value_field(attr, lang), text.clone()),
            NodeCriterion::PropertyRange { attr, lang, lower, upper } => {
                IndexQuery::range(Self::value_field(attr, lang), lower.clone(), upper.clone())
            }
            NodeCriterion::Text(query) => IndexQuery::text(ALL_FIELD, query.clone()),
            NodeCriterion::Reference { attr, target } => IndexQuery::term(reference_field(attr), target.to_string()),
            NodeCriterion::WithoutReferences { attr } => IndexQuery::all_except(IndexQuery::prefix(reference_field(attr), "")),
            NodeCriterion::LastModified { lower, upper } => Self::date_range_query(LAST_MODIFIED_FIELD, lower, upper),
            NodeCriterion::CreatedDate { lower, upper } => Self::date_range_query(CREATED_FIELD, lower, upper),
            NodeCriterion::ReferencePath { attr, targets } => IndexQuery::should(
                targets.iter().map(|t| IndexQuery::term(reference_field(attr), t.to_string())).collect(),
            ),
        };
        Some(query)
    }
}

impl fmt::Display for NodeCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lang_suffix = |lang: &Option<String>| lang.as_ref().map(|l| format!("@{l}")).unwrap_or_default();
        let bound = |at: &Option<DateTime<Utc>>| at.map(|a| a.to_rfc3339()).unwrap_or_else(|| "*".into());
        match self {
            NodeCriterion::Id(id) => write!(f, "id = {id}"),
            NodeCriterion::Graph(graph) => write!(f, "graph = {graph}"),
            NodeCriterion::Type(t) => write!(f, "type = {t}"),
            NodeCriterion::TypeName(name) => write!(f, "type id = {name:?}"),
            NodeCriterion::Code(code) => write!(f, "code = {code:?}"),
            NodeCriterion::Uri(uri) => write!(f, "uri = {uri:?}"),
            NodeCriterion::Property { attr, lang, value } => write!(f, "{attr}{} = {value:?}", lang_suffix(lang)),
            NodeCriterion::PropertyPrefix { attr, lang, prefix } => {
                write!(f, "{attr}{} starts with {prefix:?}", lang_suffix(lang))
            }
            NodeCriterion::PropertyText { attr, lang, text } => {
                write!(f, "{attr}{} matches {text:?}", lang_suffix(lang))
            }
            NodeCriterion::PropertyRange { attr, lang, lower, upper } => write!(
                f,
                "{attr}{} in [{} .. {}]",
                lang_suffix(lang),
                lower.as_deref().unwrap_or("*"),
                upper.as_deref().unwrap_or("*"),
            ),
            NodeCriterion::Text(query) => write!(f, "text {query:?}"),
            NodeCriterion::Reference { attr, target } => write!(f, "{attr} -> {target}"),
            NodeCriterion::WithoutReferences { attr } => write!(f, "no {attr}"),
            NodeCriterion::LastModified { lower, upper } => {
                write!(f, "lastModified in [{} .. {}]", bound(lower), bound(upper))
            }
            NodeCriterion::CreatedDate { lower, upper } => write!(f, "created in [{} .. {}]", bound(lower), bound(upper)),
            NodeCriterion::ReferencePath { attr, targets } => write!(f, "{attr} -> any of {} nodes", targets.len()),
        }
    }
}

/// Turn "nodes whose `attr` points at a node matching `inner`" into a
/// [`NodeCriterion::ReferencePath`] by resolving `inner` to node ids first.
pub fn resolve_reference_path<E>(
    attr: impl Into<String>,
    inner: &NodeSpecification,
    resolve: impl FnOnce(&NodeSpecification) -> Result<Vec<NodeId>, E>,
) -> Result<NodeSpecification, E> {
    let attr = attr.into();
    let targets: Vec<Uuid> = resolve(inner)?.into_iter().map(|id| id.id).collect();
    tracing::trace!(attr = %attr, inner = %inner, targets = targets.len(), "specification: resolved reference path");
    Ok(Specification::leaf(NodeCriterion::ReferencePath { attr, targets }))
}
