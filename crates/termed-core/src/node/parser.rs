//! Node query language.
//!
//! Turns the query strings accepted by node search into a
//! [`NodeSpecification`]:
//!
//! ```text
//! query  := term (" OR " term)*
//! term   := factor (" AND " factor)*
//! factor := ["NOT "] (value | "(" query ")") ["^" digits]
//! ```
//!
//! AND binds tighter than OR. Operators are upper case and separated by
//! single spaces.
//!
//! | Value | Criterion |
//! |-------|-----------|
//! | `id:<uuid>`, `nodeId:<uuid>`, `node.id:<uuid>`, `urn:uuid:<uuid>` | `Id` |
//! | `code:<code>` | `Code` |
//! | `uri:<uri>` | `Uri` |
//! | `createdDate:[<date> TO <date>]` | `CreatedDate` |
//! | `lastModifiedDate:[<date> TO <date>]` | `LastModified` |
//! | `graph.id:<uuid>`, `graphId:<uuid>`, `type.graph.id:<uuid>` | `Graph` |
//! | `type.id:<code>`, `typeId:<code>` | `TypeName` |
//! | `p.<attr>[.<lang>]:<word>`, `p.<attr>[.<lang>]:"<phrase>"` | `PropertyText` |
//! | `p.<attr>[.<lang>]:<prefix>*` | `PropertyPrefix` |
//! | `p.<attr>[.<lang>].string:<value>`, `….string:"<value>"` | `Property` |
//! | `p.<attr>[.<lang>].string:<prefix>*` | `PropertyPrefix` |
//! | `p.<attr>[.<lang>].string:[<lower> TO <upper>]` | `PropertyRange` |
//! | `r.<attr>.id:<uuid>` | `Reference` |
//! | `r.<attr>.id:null` | `WithoutReferences` |
//! | `r.<attr>.<value>` | `ReferencePath` |
//!
//! `properties`, `props` and `p` are interchangeable, as are `references`,
//! `refs` and `r`. A `*` range bound is open. Boosts are accepted and
//! ignored. Fields a node document does not carry (`number`, graph code and
//! uri, type uri) are rejected with [`ParseError::UnsupportedField`].
//!
//! Reference paths are resolved while parsing: the nested value is handed to
//! the caller's resolver and replaced by the ids it returns.

use super::criteria::{resolve_reference_path, NodeCriterion, NodeSpecification};
use crate::specification::Specification;
use crate::types::{GraphId, NodeId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected {expected} at offset {offset}, found {found:?}")]
    Unexpected { offset: usize, expected: &'static str, found: String },

    #[error("`{field}` is not searchable on nodes (offset {offset})")]
    UnsupportedField { offset: usize, field: String },

    #[error("invalid date {value:?} at offset {offset}")]
    InvalidDate { offset: usize, value: String },

    #[error("could not resolve reference path `{attr}`: {reason}")]
    Resolve { attr: String, reason: String },
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

const UUID: &str = "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";
const CODE: &str = "[A-Za-z0-9_-]+";
const DATE: &str = r"\d{4}-\d{2}-\d{2}(?:T\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:\d{2})?)?";
const PROPERTY: &str = r"(?:properties|props|p)\.({CODE})(?:\.([a-z]{2}))?";
const REFERENCE: &str = r"(?:references|refs|r)\.({CODE})";

/// Expand the named fragments and anchor at the cursor.
fn pattern(template: &str) -> Regex {
    let expanded = template
        .replace("{PROP}", PROPERTY)
        .replace("{REF}", REFERENCE)
        .replace("{UUID}", UUID)
        .replace("{CODE}", CODE)
        .replace("{DATE}", DATE);
    Regex::new(&format!("^(?:{expanded})")).expect("node query patterns are valid")
}

macro_rules! patterns {
    ($($name:ident = $template:expr;)*) => {
        $(static $name: LazyLock<Regex> = LazyLock::new(|| pattern($template));)*
    };
}

patterns! {
    ID = r"(?:node\.id|nodeId|id):({UUID})";
    URN = r"urn:uuid:({UUID})";
    CODE_VALUE = r"code:({CODE})";
    URI = r"uri:([^\s)]+)";
    NUMBER = r"(?:number|n):[0-9]*";
    CREATED = r"createdDate:\[(\*|{DATE}) TO (\*|{DATE})\]";
    LAST_MODIFIED = r"lastModifiedDate:\[(\*|{DATE}) TO (\*|{DATE})\]";
    GRAPH_ID = r"(?:type\.graph\.id|graph\.id|graphId):({UUID})";
    GRAPH_CODE = r"(?:type\.graph\.code|graph\.code|graphCode):{CODE}";
    GRAPH_URI = r"(?:type\.graph\.uri|graph\.uri|graphUri):[^\s)]+";
    TYPE_ID = r"(?:type\.id|typeId):({CODE})";
    TYPE_URI = r"(?:type\.uri|typeUri):[^\s)]+";
    STRING_RANGE = r"{PROP}\.string:\[(\S+) TO ([^\]\s]+)\]";
    STRING_QUOTED = r#"{PROP}\.string:"([^"]*)""#;
    STRING_PREFIX = r#"{PROP}\.string:([^\s()*^"]*)\*"#;
    STRING_VALUE = r#"{PROP}\.string:([^\s()*^"]+)"#;
    PHRASE = r#"{PROP}:"([^"]*)""#;
    PREFIX = r#"{PROP}:([^\s()*^"]*)\*"#;
    WORD = r#"{PROP}:([^\s()*^"]+)"#;
    REFERENCE_ID = r"{REF}\.id:({UUID})";
    REFERENCE_NULL = r"{REF}\.id:null";
    REFERENCE_PATH = r"{REF}\.";
    BOOST = r"\^([0-9]+)";
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse a query that contains no reference paths. A reference path fails
/// with [`ParseError::Resolve`].
pub fn parse_node_query(input: &str) -> Result<NodeSpecification, ParseError> {
    parse_node_query_with(input, |_| Err(anyhow::anyhow!("no resolver for reference paths")))
}

/// Parse a query, resolving each reference path's nested value to node ids
/// with `resolve`.
pub fn parse_node_query_with<R>(input: &str, mut resolve: R) -> Result<NodeSpecification, ParseError>
where
    R: FnMut(&NodeSpecification) -> anyhow::Result<Vec<NodeId>>,
{
    let input = input.trim();
    let mut parser = Parser { input, pos: 0, resolve: &mut resolve };
    let spec = parser.query()?;
    if parser.pos < input.len() {
        return Err(parser.unexpected("` AND `, ` OR ` or end of query"));
    }
    tracing::debug!(query = input, spec = %spec, "specification: parsed node query");
    Ok(spec)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a, 'r> {
    input: &'a str,
    pos: usize,
    resolve: &'r mut dyn FnMut(&NodeSpecification) -> anyhow::Result<Vec<NodeId>>,
}

impl<'a> Parser<'a, '_> {
    fn rest(&self) -> &'a str {
        let input = self.input;
        &input[self.pos..]
    }

    fn eat(&mut self, literal: &str) -> bool {
        let matched = self.rest().starts_with(literal);
        if matched {
            self.pos += literal.len();
        }
        matched
    }

    fn eat_pattern(&mut self, pattern: &Regex) -> Option<Captures<'a>> {
        let captures = pattern.captures(self.rest())?;
        self.pos += captures.get(0).map_or(0, |m| m.end());
        Some(captures)
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let found = self.rest().split_whitespace().next().unwrap_or("end of query");
        ParseError::Unexpected { offset: self.pos, expected, found: found.to_string() }
    }

    fn query(&mut self) -> Result<NodeSpecification, ParseError> {
        let mut terms = vec![self.term()?];
        while self.eat(" OR ") {
            terms.push(self.term()?);
        }
        Ok(combine(terms, Specification::Or))
    }

    fn term(&mut self) -> Result<NodeSpecification, ParseError> {
        let mut factors = vec![self.factor()?];
        while self.eat(" AND ") {
            factors.push(self.factor()?);
        }
        Ok(combine(factors, Specification::And))
    }

    fn factor(&mut self) -> Result<NodeSpecification, ParseError> {
        let negated = self.eat("NOT ");
        let inner = if self.eat("(") {
            let inner = self.query()?;
            if !self.eat(")") {
                return Err(self.unexpected("`)`"));
            }
            inner
        } else {
            self.value()?
        };
        if let Some(boost) = self.eat_pattern(&BOOST) {
            tracing::trace!(boost = &boost[1], "specification: ignoring query boost");
        }
        Ok(if negated { Specification::not(inner) } else { inner })
    }

    fn value(&mut self) -> Result<NodeSpecification, ParseError> {
        let start = self.pos;
        let leaf = |criterion: NodeCriterion| Ok(Specification::leaf(criterion));

        if let Some(c) = self.eat_pattern(&ID).or_else(|| self.eat_pattern(&URN)) {
            return leaf(NodeCriterion::Id(parse_uuid(&c[1], start)?));
        }
        if let Some(c) = self.eat_pattern(&CODE_VALUE) {
            return leaf(NodeCriterion::Code(c[1].to_string()));
        }
        if let Some(c) = self.eat_pattern(&URI) {
            return leaf(NodeCriterion::Uri(c[1].to_string()));
        }
        if let Some(c) = self.eat_pattern(&CREATED) {
            let (lower, upper) = (parse_date(&c[1], start)?, parse_date(&c[2], start)?);
            return leaf(NodeCriterion::CreatedDate { lower, upper });
        }
        if let Some(c) = self.eat_pattern(&LAST_MODIFIED) {
            let (lower, upper) = (parse_date(&c[1], start)?, parse_date(&c[2], start)?);
            return leaf(NodeCriterion::LastModified { lower, upper });
        }
        if let Some(c) = self.eat_pattern(&GRAPH_ID) {
            return leaf(NodeCriterion::Graph(GraphId::new(parse_uuid(&c[1], start)?)));
        }
        if let Some(c) = self.eat_pattern(&TYPE_ID) {
            return leaf(NodeCriterion::TypeName(c[1].to_string()));
        }
        for unsupported in [&NUMBER, &GRAPH_CODE, &GRAPH_URI, &TYPE_URI] {
            if let Some(c) = self.eat_pattern(unsupported) {
                let field = c[0].split(':').next().unwrap_or_default().to_string();
                return Err(ParseError::UnsupportedField { offset: start, field });
            }
        }

        // Ranges and prefixes first: their brackets and `*` are value characters otherwise.
        if let Some(c) = self.eat_pattern(&STRING_RANGE) {
            let (attr, lang) = property_of(&c);
            let (lower, upper) = (open_bound(&c[3]), open_bound(&c[4]));
            return leaf(NodeCriterion::PropertyRange { attr, lang, lower, upper });
        }
        if let Some(c) = self.eat_pattern(&STRING_PREFIX).or_else(|| self.eat_pattern(&PREFIX)) {
            let (attr, lang) = property_of(&c);
            return leaf(NodeCriterion::PropertyPrefix { attr, lang, prefix: c[3].to_string() });
        }
        if let Some(c) = self.eat_pattern(&STRING_QUOTED).or_else(|| self.eat_pattern(&STRING_VALUE)) {
            let (attr, lang) = property_of(&c);
            return leaf(NodeCriterion::Property { attr, lang, value: c[3].to_string() });
        }
        if let Some(c) = self.eat_pattern(&PHRASE).or_else(|| self.eat_pattern(&WORD)) {
            let (attr, lang) = property_of(&c);
            return leaf(NodeCriterion::PropertyText { attr, lang, text: c[3].to_string() });
        }

        if let Some(c) = self.eat_pattern(&REFERENCE_ID) {
            let target = parse_uuid(&c[2], start)?;
            return leaf(NodeCriterion::Reference { attr: c[1].to_string(), target });
        }
        if let Some(c) = self.eat_pattern(&REFERENCE_NULL) {
            return leaf(NodeCriterion::WithoutReferences { attr: c[1].to_string() });
        }
        if let Some(c) = self.eat_pattern(&REFERENCE_PATH) {
            let attr = c[1].to_string();
            let inner = self.value()?;
            let resolve = &mut *self.resolve;
            return resolve_reference_path(attr.clone(), &inner, |spec| resolve(spec))
                .map_err(|e| ParseError::Resolve { attr, reason: format!("{e:#}") });
        }

        Err(self.unexpected("a node query value"))
    }
}

fn combine(mut parts: Vec<NodeSpecification>, join: fn(Vec<NodeSpecification>) -> NodeSpecification) -> NodeSpecification {
    if parts.len() == 1 {
        parts.swap_remove(0)
    } else {
        join(parts)
    }
}

fn property_of(c: &Captures<'_>) -> (String, Option<String>) {
    (c[1].to_string(), c.get(2).map(|m| m.as_str().to_string()))
}

fn open_bound(raw: &str) -> Option<String> {
    (raw != "*").then(|| raw.to_string())
}

fn parse_uuid(raw: &str, offset: usize) -> Result<Uuid, ParseError> {
    Uuid::parse_str(raw).map_err(|_| ParseError::Unexpected { offset, expected: "a uuid", found: raw.to_string() })
}

/// `*` is an open bound. Dates without an offset are UTC, and a bare date is
/// midnight.
fn parse_date(raw: &str, offset: usize) -> Result<Option<DateTime<Utc>>, ParseError> {
    if raw == "*" {
        return Ok(None);
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(at.with_timezone(&Utc)));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().and_then(|d| d.and_hms_opt(0, 0, 0)));
    match naive {
        Some(at) => Ok(Some(at.and_utc())),
        None => Err(ParseError::InvalidDate { offset, value: raw.to_string() }),
    }
}
