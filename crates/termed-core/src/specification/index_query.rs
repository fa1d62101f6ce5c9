//! Inverted-index compilation target.
//!
//! Boolean semantics follow Lucene: when `must` is non-empty every `must`
//! clause has to match and `should` clauses only add score; otherwise at
//! least one `should` clause has to match. A boolean with neither matches
//! nothing, whatever its `must_not` clauses say.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexQuery {
    All,
    /// Exact value of a field.
    Term { field: String, value: String },
    Prefix { field: String, prefix: String },
    /// Inclusive on both ends; `None` leaves that end open.
    Range { field: String, lower: Option<String>, upper: Option<String> },
    /// Every analysed token of `text` occurs in the field's tokens.
    Text { field: String, text: String },
    Boolean(BooleanQuery),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BooleanQuery {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must: Vec<IndexQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub should: Vec<IndexQuery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub must_not: Vec<IndexQuery>,
}

impl IndexQuery {
    pub fn term(field: impl Into<String>, value: impl Into<String>) -> Self {
        IndexQuery::Term { field: field.into(), value: value.into() }
    }

    pub fn prefix(field: impl Into<String>, prefix: impl Into<String>) -> Self {
        IndexQuery::Prefix { field: field.into(), prefix: prefix.into() }
    }

    pub fn range(field: impl Into<String>, lower: Option<String>, upper: Option<String>) -> Self {
        IndexQuery::Range { field: field.into(), lower, upper }
    }

    pub fn text(field: impl Into<String>, text: impl Into<String>) -> Self {
        IndexQuery::Text { field: field.into(), text: text.into() }
    }

    /// Matches nothing.
    pub fn none() -> Self {
        IndexQuery::Boolean(BooleanQuery::default())
    }

    pub fn must(clauses: Vec<IndexQuery>) -> Self {
        IndexQuery::Boolean(BooleanQuery { must: clauses, ..BooleanQuery::default() })
    }

    pub fn should(clauses: Vec<IndexQuery>) -> Self {
        IndexQuery::Boolean(BooleanQuery { should: clauses, ..BooleanQuery::default() })
    }

    /// Everything except what `excluded` matches. Anchored on `All` because a
    /// purely negative boolean matches nothing.
    pub fn all_except(excluded: IndexQuery) -> Self {
        IndexQuery::Boolean(BooleanQuery {
            must: vec![IndexQuery::All],
            should: Vec::new(),
            must_not: vec![excluded],
        })
    }
}

impl fmt::Display for IndexQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexQuery::All => f.write_str("*:*"),
            IndexQuery::Term { field, value } => write!(f, "{field}:{value:?}"),
            IndexQuery::Prefix { field, prefix } => write!(f, "{field}:{prefix:?}*"),
            IndexQuery::Range { field, lower, upper } => write!(
                f,
                "{field}:[{} TO {}]",
                lower.as_deref().unwrap_or("*"),
                upper.as_deref().unwrap_or("*"),
            ),
            IndexQuery::Text { field, text } => write!(f, "{field}:({text})"),
            IndexQuery::Boolean(b) => {
                let clauses = b
                    .must
                    .iter()
                    .map(|q| format!("+{q}"))
                    .chain(b.should.iter().map(|q| q.to_string()))
                    .chain(b.must_not.iter().map(|q| format!("-{q}")))
                    .collect::<Vec<_>>();
                write!(f, "({})", clauses.join(" "))
            }
        }
    }
}
