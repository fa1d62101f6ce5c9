use super::criteria::{NodeCriterion, NodeSpecification};
use crate::specification::{filter_tree, Specification};
use crate::types::TypeDefinition;

/// Restrict `spec` to nodes of the readable type `readable` and neutralise
/// every clause about attributes the caller cannot read.
///
/// Returns `AND(Type(readable), spec')` where `spec'` is `spec` with each
/// unreadable clause replaced by `MatchNone`.
pub fn filter_by_type(spec: &NodeSpecification, readable: &TypeDefinition) -> NodeSpecification {
    let filtered = filter_tree(spec, |node| accepts(node, readable));
    if filtered != *spec {
        tracing::debug!(type_id = %readable.id, original = %spec, filtered = %filtered, "specification: dropped unreadable clauses");
    }
    Specification::and([Specification::leaf(NodeCriterion::Type(readable.id.clone())), filtered])
}

fn accepts(spec: &NodeSpecification, readable: &TypeDefinition) -> bool {
    let criterion = match spec {
        Specification::Leaf(c) => c,
        _ => return true,
    };
    match criterion {
        NodeCriterion::Id(_)
        | NodeCriterion::Code(_)
        | NodeCriterion::Uri(_)
        | NodeCriterion::Text(_)
        | NodeCriterion::LastModified { .. }
        | NodeCriterion::CreatedDate { .. } => true,
        NodeCriterion::Graph(graph) => *graph == readable.id.graph,
        NodeCriterion::Type(type_id) => *type_id == readable.id,
        NodeCriterion::TypeName(name) => *name == readable.id.id,
        NodeCriterion::Property { attr, .. }
        | NodeCriterion::PropertyPrefix { attr, .. }
        | NodeCriterion::PropertyText { attr, .. }
        | NodeCriterion::PropertyRange { attr, .. } => readable.text_attributes.contains(attr),
        NodeCriterion::Reference { attr, .. }
        | NodeCriterion::WithoutReferences { attr }
        | NodeCriterion::ReferencePath { attr, .. } => readable.reference_attributes.contains(attr),
    }
}
