//! Specification algebra — composable predicates over `(key, value)` pairs.
//!
//! A [`Specification`] is an immutable tree of AND / OR / NOT composites
//! whose leaves are [`Criterion`] values. The same tree has three readings
//! which must agree:
//!
//! - [`Specification::test`] evaluates it in memory (the ground truth);
//! - [`Specification::to_sql`] compiles it to a `WHERE` fragment for the row
//!   store;
//! - [`Specification::to_index_query`] compiles it to an [`IndexQuery`].
//!
//! A leaf that has no rendering for a backend makes the whole compilation
//! fail with [`CompileError::Unsupported`]. Clauses are never dropped.
//!
//! # Identities
//!
//! | Spec | `test` | SQL | Index |
//! |------|--------|-----|-------|
//! | `MatchAll` / empty AND | true | `1 = 1` | `*:*` |
//! | `MatchNone` / empty OR | false | `1 = 0` | empty boolean |
//! | `NOT x` | `!x` | `NOT (x)` | `+*:* -x` |

mod error;
mod filter;
mod index_query;
mod simplify;
mod sql;

pub use error::CompileError;
pub use filter::filter_tree;
pub use index_query::{BooleanQuery, IndexQuery};
pub use simplify::{simplify, to_cnf, to_dnf, to_nnf};
pub use sql::{SqlQuery, SqlValue};

use std::fmt;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// Engines and criteria
// ---------------------------------------------------------------------------

/// Execution backend a query is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Engine {
    RowStore,
    Index,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::RowStore => write!(f, "row store"),
            Engine::Index => write!(f, "index"),
        }
    }
}

/// A leaf predicate. Backends it cannot be compiled for return `None`.
pub trait Criterion: Clone + fmt::Debug + fmt::Display + Eq + Hash {
    type Key;
    type Value;

    fn test(&self, key: &Self::Key, value: &Self::Value) -> bool;

    fn to_sql(&self) -> Option<SqlQuery> {
        None
    }

    fn to_index_query(&self) -> Option<IndexQuery> {
        None
    }
}

// ---------------------------------------------------------------------------
// Specification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Specification<C> {
    MatchAll,
    MatchNone,
    Leaf(C),
    And(Vec<Specification<C>>),
    Or(Vec<Specification<C>>),
    Not(Box<Specification<C>>),
}

impl<C> From<C> for Specification<C> {
    fn from(criterion: C) -> Self {
        Specification::Leaf(criterion)
    }
}

impl<C> Specification<C> {
    pub fn leaf(criterion: C) -> Self {
        Specification::Leaf(criterion)
    }

    pub fn and(children: impl IntoIterator<Item = Specification<C>>) -> Self {
        Specification::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = Specification<C>>) -> Self {
        Specification::Or(children.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Specification<C>) -> Self {
        Specification::Not(Box::new(child))
    }

    /// Leaves in depth-first order.
    pub fn leaves(&self) -> Vec<&C> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(spec) = stack.pop() {
            match spec {
                Specification::Leaf(c) => out.push(c),
                Specification::And(children) | Specification::Or(children) => {
                    stack.extend(children.iter().rev());
                }
                Specification::Not(child) => stack.push(child),
                Specification::MatchAll | Specification::MatchNone => {}
            }
        }
        out
    }
}

impl<C: Criterion> Specification<C> {
    pub fn test(&self, key: &C::Key, value: &C::Value) -> bool {
        match self {
            Specification::MatchAll => true,
            Specification::MatchNone => false,
            Specification::Leaf(c) => c.test(key, value),
            Specification::And(children) => children.iter().all(|s| s.test(key, value)),
            Specification::Or(children) => children.iter().any(|s| s.test(key, value)),
            Specification::Not(child) => !child.test(key, value),
        }
    }

    pub fn to_sql(&self) -> Result<SqlQuery, CompileError> {
        let sql = match self {
            Specification::MatchAll => SqlQuery::match_all(),
            Specification::MatchNone => SqlQuery::match_none(),
            Specification::Leaf(c) => c.to_sql().ok_or_else(|| unsupported(Engine::RowStore, c))?,
            Specification::And(children) => {
                SqlQuery::and(children.iter().map(Self::to_sql).collect::<Result<_, _>>()?)
            }
            Specification::Or(children) => {
                SqlQuery::or(children.iter().map(Self::to_sql).collect::<Result<_, _>>()?)
            }
            Specification::Not(child) => SqlQuery::not(child.to_sql()?),
        };
        Ok(sql)
    }

    pub fn to_index_query(&self) -> Result<IndexQuery, CompileError> {
        let query = match self {
            Specification::MatchAll => IndexQuery::All,
            Specification::MatchNone => IndexQuery::none(),
            Specification::Leaf(c) => c.to_index_query().ok_or_else(|| unsupported(Engine::Index, c))?,
            Specification::And(children) if children.is_empty() => IndexQuery::All,
            Specification::And(children) => {
                IndexQuery::must(children.iter().map(Self::to_index_query).collect::<Result<_, _>>()?)
            }
            Specification::Or(children) => {
                IndexQuery::should(children.iter().map(Self::to_index_query).collect::<Result<_, _>>()?)
            }
            Specification::Not(child) => IndexQuery::all_except(child.to_index_query()?),
        };
        Ok(query)
    }

    /// Whether every leaf compiles for `engine`.
    pub fn supports(&self, engine: Engine) -> bool {
        self.leaves().into_iter().all(|c| match engine {
            Engine::RowStore => c.to_sql().is_some(),
            Engine::Index => c.to_index_query().is_some(),
        })
    }
}

fn unsupported<C: fmt::Display>(engine: Engine, criterion: &C) -> CompileError {
    tracing::debug!(%engine, %criterion, "specification: unsupported criterion");
    CompileError::Unsupported { engine, criterion: criterion.to_string() }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl<C: fmt::Display> fmt::Display for Specification<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn child<C: fmt::Display>(f: &mut fmt::Formatter<'_>, spec: &Specification<C>) -> fmt::Result {
            match spec {
                Specification::And(c) | Specification::Or(c) if c.len() > 1 => write!(f, "({spec})"),
                _ => write!(f, "{spec}"),
            }
        }

        fn join<C: fmt::Display>(
            f: &mut fmt::Formatter<'_>,
            children: &[Specification<C>],
            op: &str,
            empty: &str,
        ) -> fmt::Result {
            if children.is_empty() {
                return f.write_str(empty);
            }
            for (i, c) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {op} ")?;
                }
                child(f, c)?;
            }
            Ok(())
        }

        match self {
            Specification::MatchAll => f.write_str("ALL"),
            Specification::MatchNone => f.write_str("NONE"),
            Specification::Leaf(c) => write!(f, "{c}"),
            Specification::And(children) => join(f, children, "AND", "ALL"),
            Specification::Or(children) => join(f, children, "OR", "NONE"),
            Specification::Not(inner) => {
                f.write_str("NOT ")?;
                child(f, inner)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
