//! Relational compilation target: a SQL `WHERE` fragment with positional
//! `?` parameters.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlValue {
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            SqlValue::Uuid(u) => write!(f, "'{u}'"),
            SqlValue::Timestamp(t) => write!(f, "'{}'", t.to_rfc3339()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<Uuid> for SqlValue {
    fn from(u: Uuid) -> Self {
        SqlValue::Uuid(u)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(t: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(t)
    }
}

/// A `WHERE` fragment and its parameters, in placeholder order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlQuery {
    pub template: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn new(template: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self { template: template.into(), params }
    }

    pub fn literal(template: impl Into<String>) -> Self {
        Self::new(template, Vec::new())
    }

    pub fn match_all() -> Self {
        Self::literal("1 = 1")
    }

    pub fn match_none() -> Self {
        Self::literal("1 = 0")
    }

    /// `(a) AND (b) ...`; `1 = 1` when empty.
    pub fn and(parts: Vec<SqlQuery>) -> Self {
        Self::join(parts, " AND ").unwrap_or_else(Self::match_all)
    }

    /// `(a) OR (b) ...`; `1 = 0` when empty.
    pub fn or(parts: Vec<SqlQuery>) -> Self {
        Self::join(parts, " OR ").unwrap_or_else(Self::match_none)
    }

    pub fn not(inner: SqlQuery) -> Self {
        Self::new(format!("NOT ({})", inner.template), inner.params)
    }

    fn join(parts: Vec<SqlQuery>, separator: &str) -> Option<Self> {
        if parts.is_empty() {
            return None;
        }
        let template = parts.iter().map(|p| format!("({})", p.template)).collect::<Vec<_>>().join(separator);
        let params = parts.into_iter().flat_map(|p| p.params).collect();
        Some(Self::new(template, params))
    }
}

/// Renders the template with parameters inlined. For logs only.
impl fmt::Display for SqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = self.params.iter().peekable();
        for c in self.template.chars() {
            match (c, params.next_if(|_| c == '?')) {
                (_, Some(p)) => write!(f, "{p}")?,
                (c, None) => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}
