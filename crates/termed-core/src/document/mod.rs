//! Document mapping — domain values to and from flat index documents.
//!
//! A [`Document`] has two views of the same value:
//!
//! - `stored`: the [`flatten`]ed `path → string` map, enough to rebuild the
//!   value with [`unflatten`];
//! - `indexed`: `field → values`, where a field is a stored path with array
//!   positions removed. Mappers may add derived fields on top.
//!
//! Two reserved fields are always present in `indexed`: [`KEY_FIELD`] holds
//! the encoded key and [`ALL_FIELD`] holds every stored value, for free-text
//! search.

mod path;

pub use path::{field_name, flatten, parse_path, unflatten, PathSegment};

use crate::types::NodeId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use uuid::Uuid;

pub const KEY_FIELD: &str = "_key";
pub const ALL_FIELD: &str = "_all";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed path {path:?}: {reason}")]
    Path { path: String, reason: &'static str },

    #[error("value does not map to a document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid key {key:?}: {reason}")]
    Key { key: String, reason: String },
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub key: String,
    pub stored: BTreeMap<String, String>,
    pub indexed: BTreeMap<String, Vec<String>>,
}

impl Document {
    /// Build a document from a flattened value, deriving the indexed fields.
    pub fn from_flat(key: impl Into<String>, stored: BTreeMap<String, String>) -> Result<Self, DocumentError> {
        let key = key.into();
        let mut indexed: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (path, value) in &stored {
            indexed.entry(field_name(path)?).or_default().push(value.clone());
        }
        indexed.insert(ALL_FIELD.to_string(), stored.values().cloned().collect());
        indexed.insert(KEY_FIELD.to_string(), vec![key.clone()]);

        Ok(Self { key, stored, indexed })
    }

    /// Append a value to an indexed field. Does not touch `stored`.
    pub fn add_field(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.indexed.entry(field.into()).or_default().push(value.into());
    }

    /// Replace all indexed values of a field.
    pub fn replace_field(&mut self, field: impl Into<String>, values: Vec<String>) {
        self.indexed.insert(field.into(), values);
    }

    pub fn values(&self, field: &str) -> &[String] {
        self.indexed.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, field: &str) -> Option<&str> {
        self.values(field).first().map(String::as_str)
    }
}

/// Split text into search tokens: lower-cased, whitespace separated.
pub fn analyze(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Every token the catch-all field of `value`'s document would hold.
pub fn all_tokens(value: &serde_json::Value) -> Vec<String> {
    flatten(value).values().flat_map(|v| analyze(v)).collect()
}

// ---------------------------------------------------------------------------
// Mappers
// ---------------------------------------------------------------------------

/// Converts domain values to documents and back.
pub trait DocumentMapper<V>: Send + Sync {
    fn to_document(&self, key: &str, value: &V) -> Result<Document, DocumentError>;

    fn from_document(&self, document: &Document) -> Result<V, DocumentError>;
}

/// Generic serde mapper. Round trips exactly for types whose JSON leaves are
/// all strings (numbers and booleans come back as strings).
pub struct JsonDocumentMapper<V> {
    _value: PhantomData<fn() -> V>,
}

impl<V> JsonDocumentMapper<V> {
    pub fn new() -> Self {
        Self { _value: PhantomData }
    }
}

impl<V> Default for JsonDocumentMapper<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize + DeserializeOwned> DocumentMapper<V> for JsonDocumentMapper<V> {
    fn to_document(&self, key: &str, value: &V) -> Result<Document, DocumentError> {
        let json = serde_json::to_value(value)?;
        Document::from_flat(key, flatten(&json))
    }

    fn from_document(&self, document: &Document) -> Result<V, DocumentError> {
        let json = unflatten(&document.stored)?;
        Ok(serde_json::from_value(json)?)
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// An index key with a stable string encoding.
pub trait IndexKey: Sized {
    fn encode(&self) -> String;

    fn decode(encoded: &str) -> Result<Self, DocumentError>;
}

impl IndexKey for String {
    fn encode(&self) -> String {
        self.clone()
    }

    fn decode(encoded: &str) -> Result<Self, DocumentError> {
        Ok(encoded.to_string())
    }
}

impl IndexKey for u64 {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(encoded: &str) -> Result<Self, DocumentError> {
        encoded.parse().map_err(|e: std::num::ParseIntError| DocumentError::Key {
            key: encoded.to_string(),
            reason: e.to_string(),
        })
    }
}

impl IndexKey for Uuid {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(encoded: &str) -> Result<Self, DocumentError> {
        Uuid::parse_str(encoded).map_err(|e| DocumentError::Key { key: encoded.to_string(), reason: e.to_string() })
    }
}

impl IndexKey for NodeId {
    fn encode(&self) -> String {
        self.to_string()
    }

    fn decode(encoded: &str) -> Result<Self, DocumentError> {
        encoded
            .parse()
            .map_err(|e: crate::types::ParseNodeIdError| DocumentError::Key { key: encoded.to_string(), reason: e.reason.to_string() })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
