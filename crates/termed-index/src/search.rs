//! Query execution against a snapshot, and lazy result streams.
//!
//! Scoring is deliberately simple: a matching term-like clause scores its
//! inverse document frequency `1 + ln(N / (df + 1))`, `All` scores 1, and
//! booleans sum the scores of their matching positive clauses.

use crate::error::Result;
use crate::snapshot::{Snapshot, SnapshotGuard};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use termed_core::document::analyze;
use termed_core::{Document, IndexQuery, SortField};

type Scores = BTreeMap<u32, f32>;

fn idf(snapshot: &Snapshot, df: usize) -> f32 {
    1.0 + (snapshot.len() as f32 / (df as f32 + 1.0)).ln()
}

fn scored(snapshot: &Snapshot, ordinals: impl ExactSizeIterator<Item = u32>) -> Scores {
    let score = idf(snapshot, ordinals.len());
    ordinals.map(|o| (o, score)).collect()
}

/// Matching ordinals with their scores.
pub(crate) fn evaluate(snapshot: &Snapshot, query: &IndexQuery) -> Scores {
    match query {
        IndexQuery::All => (0..snapshot.len() as u32).map(|o| (o, 1.0)).collect(),
        IndexQuery::Term { field, value } => scored(snapshot, snapshot.term(field, value).iter().copied()),
        IndexQuery::Prefix { field, prefix } => scored(snapshot, snapshot.prefix(field, prefix).into_iter()),
        IndexQuery::Range { field, lower, upper } => {
            scored(snapshot, snapshot.range(field, lower.as_deref(), upper.as_deref()).into_iter())
        }
        IndexQuery::Text { field, text } => {
            let tokens = analyze(text);
            if tokens.is_empty() {
                return evaluate(snapshot, &IndexQuery::All);
            }
            let mut result: Option<Scores> = None;
            for token in &tokens {
                let matches = scored(snapshot, snapshot.token(field, token).iter().copied());
                result = Some(match result {
                    None => matches,
                    Some(acc) => intersect(acc, &matches),
                });
            }
            result.unwrap_or_default()
        }
        IndexQuery::Boolean(b) => {
            let mut result = if !b.must.is_empty() {
                let mut musts = b.must.iter().map(|q| evaluate(snapshot, q));
                let first = musts.next().unwrap_or_default();
                let mut acc = musts.fold(first, |acc, m| intersect(acc, &m));
                for should in &b.should {
                    for (o, s) in evaluate(snapshot, should) {
                        if let Some(score) = acc.get_mut(&o) {
                            *score += s;
                        }
                    }
                }
                acc
            } else {
                let mut acc = Scores::new();
                for should in &b.should {
                    for (o, s) in evaluate(snapshot, should) {
                        *acc.entry(o).or_insert(0.0) += s;
                    }
                }
                acc
            };
            for excluded in &b.must_not {
                let excluded: BTreeSet<u32> = evaluate(snapshot, excluded).into_keys().collect();
                result.retain(|o, _| !excluded.contains(o));
            }
            result
        }
    }
}

fn intersect(acc: Scores, other: &Scores) -> Scores {
    acc.into_iter()
        .filter_map(|(o, s)| other.get(&o).map(|t| (o, s + t)))
        .collect()
}

/// Order matches: by relevance when `sort` is empty, else by the sort
/// fields. Ties fall back to key order. Returns all matches; the caller
/// truncates.
pub(crate) fn rank(snapshot: &Snapshot, scores: Scores, sort: &[SortField]) -> Vec<u32> {
    let mut hits: Vec<(u32, f32)> = scores.into_iter().collect();
    if sort.is_empty() {
        // Ordinals are in key order, so a stable sort keeps ties by key.
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
    } else {
        hits.sort_by(|a, b| {
            compare_fields(snapshot.document(a.0), snapshot.document(b.0), sort).then(a.0.cmp(&b.0))
        });
    }
    hits.into_iter().map(|(o, _)| o).collect()
}

fn compare_fields(a: &Document, b: &Document, sort: &[SortField]) -> Ordering {
    for field in sort {
        let ordering = match (a.first(&field.field), b.first(&field.field)) {
            (Some(x), Some(y)) if field.descending => y.cmp(x),
            (Some(x), Some(y)) => x.cmp(y),
            // Missing values sort last in either direction.
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

// ---------------------------------------------------------------------------
// Hits
// ---------------------------------------------------------------------------

pub(crate) type Decoder<T> = Box<dyn Fn(&Document) -> Result<T> + Send + Sync>;

/// Lazy search results. Each item is decoded when it is pulled. The
/// snapshot stays leased until the stream is dropped.
pub struct Hits<T> {
    snapshot: SnapshotGuard,
    ordinals: std::vec::IntoIter<u32>,
    total: usize,
    decode: Decoder<T>,
}

impl<T> Hits<T> {
    pub(crate) fn new(snapshot: SnapshotGuard, ordinals: Vec<u32>, total: usize, decode: Decoder<T>) -> Self {
        Self { snapshot, ordinals: ordinals.into_iter(), total, decode }
    }

    /// Matches before the result limit was applied.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Generation of the snapshot these hits come from.
    pub fn generation(&self) -> u64 {
        self.snapshot.generation()
    }
}

impl<T> Iterator for Hits<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        let ordinal = self.ordinals.next()?;
        Some((self.decode)(self.snapshot.document(ordinal)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ordinals.size_hint()
    }
}

impl<T> ExactSizeIterator for Hits<T> {}

impl<T> std::fmt::Debug for Hits<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hits")
            .field("generation", &self.snapshot.generation())
            .field("remaining", &self.ordinals.len())
            .field("total", &self.total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use termed_core::specification::BooleanQuery;

    fn snapshot() -> Snapshot {
        let docs = [("a", "red apple", "2"), ("b", "green apple", "1"), ("c", "red cherry", "")]
            .into_iter()
            .map(|(key, label, rank)| {
                let mut stored = BTreeMap::from([("label".to_string(), label.to_string())]);
                if !rank.is_empty() {
                    stored.insert("rank".to_string(), rank.to_string());
                }
                Arc::new(Document::from_flat(key, stored).unwrap())
            })
            .collect();
        Snapshot::build(1, docs).unwrap()
    }

    fn matches(query: &IndexQuery) -> Vec<u32> {
        evaluate(&snapshot(), query).into_keys().collect()
    }

    #[test]
    fn text_requires_all_tokens() {
        assert_eq!(matches(&IndexQuery::text("label", "RED apple")), [0]);
        assert_eq!(matches(&IndexQuery::text("label", "  ")), [0, 1, 2]);
    }

    #[test]
    fn boolean_semantics() {
        let red = IndexQuery::text("label", "red");
        let apple = IndexQuery::text("label", "apple");

        assert_eq!(matches(&IndexQuery::must(vec![red.clone(), apple.clone()])), [0]);
        assert_eq!(matches(&IndexQuery::should(vec![red.clone(), apple.clone()])), [0, 1, 2]);
        assert_eq!(matches(&IndexQuery::all_except(red.clone())), [1]);
        // SHOULD is optional next to MUST.
        let q = IndexQuery::Boolean(BooleanQuery { must: vec![apple.clone()], should: vec![red.clone()], must_not: vec![] });
        assert_eq!(matches(&q), [0, 1]);
        // No positive clause matches nothing.
        let q = IndexQuery::Boolean(BooleanQuery { must: vec![], should: vec![], must_not: vec![red] });
        assert!(matches(&q).is_empty());
    }

    #[test]
    fn rarer_terms_score_higher() {
        let s = snapshot();
        let scores = evaluate(&s, &IndexQuery::should(vec![IndexQuery::text("label", "red"), IndexQuery::text("label", "cherry")]));
        assert_eq!(rank(&s, scores, &[]), [2, 0]);
    }

    #[test]
    fn sort_puts_missing_values_last() {
        let s = snapshot();
        let all = evaluate(&s, &IndexQuery::All);
        assert_eq!(rank(&s, all.clone(), &[SortField::asc("rank")]), [1, 0, 2]);
        assert_eq!(rank(&s, all, &[SortField::desc("rank")]), [0, 1, 2]);
    }
}
