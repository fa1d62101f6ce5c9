//! Index documents for [`Node`] values.
//!
//! On top of the generic flattened fields, a node document carries:
//!
//! | Field | Values |
//! |-------|--------|
//! | `properties.<attr>.value.<lang>` | values of `attr` in language `lang` |
//! | `lastModifiedDate`, `createdDate` | fixed-width UTC timestamps (sortable) |

use crate::document::{Document, DocumentError, DocumentMapper, JsonDocumentMapper};
use crate::types::Node;
use chrono::{DateTime, SecondsFormat, Utc};

pub const LAST_MODIFIED_FIELD: &str = "lastModifiedDate";
pub const CREATED_FIELD: &str = "createdDate";

/// Field holding every value of a text attribute.
pub fn property_field(attr: &str) -> String {
    format!("properties.{attr}.value")
}

/// Field holding the values of a text attribute in one language.
pub fn property_lang_field(attr: &str, lang: &str) -> String {
    format!("properties.{attr}.value.{lang}")
}

/// Field holding the uuids of a reference attribute's targets.
pub fn reference_field(attr: &str) -> String {
    format!("references.{attr}.id")
}

pub fn referrer_field(attr: &str) -> String {
    format!("referrers.{attr}.id")
}

/// Timestamps in the index compare lexicographically in time order.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[derive(Default)]
pub struct NodeDocumentMapper {
    json: JsonDocumentMapper<Node>,
}

impl NodeDocumentMapper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentMapper<Node> for NodeDocumentMapper {
    fn to_document(&self, key: &str, node: &Node) -> Result<Document, DocumentError> {
        let mut doc = self.json.to_document(key, node)?;

        for (attr, values) in &node.properties {
            for v in values {
                doc.add_field(property_lang_field(attr, &v.lang), v.value.clone());
            }
        }
        if let Some(at) = &node.last_modified_date {
            doc.replace_field(LAST_MODIFIED_FIELD, vec![format_timestamp(at)]);
        }
        if let Some(at) = &node.created_date {
            doc.replace_field(CREATED_FIELD, vec![format_timestamp(at)]);
        }

        Ok(doc)
    }

    fn from_document(&self, document: &Document) -> Result<Node, DocumentError> {
        self.json.from_document(document)
    }
}
