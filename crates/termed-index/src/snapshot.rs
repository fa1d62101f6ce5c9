//! Immutable reader snapshots and the manager that swaps them.
//!
//! A [`Snapshot`] is built from the writer's documents at one generation.
//! Per indexed field it holds two FST term dictionaries: one over exact
//! values and one over analysed tokens. Each FST maps a term to a slot in a
//! posting table listing the ordinals of documents containing it. Ordinals
//! follow key order.
//!
//! Readers hold an `Arc<Snapshot>` through a [`SnapshotGuard`]; refreshing
//! builds a new snapshot beside the old one and swaps the pointer, so
//! readers never block the writer or each other.

use crate::error::{IndexError, Result};
use crate::writer::IndexWriter;
use fst::automaton::Str;
use fst::{Automaton, IntoStreamer, Map, MapBuilder, Streamer};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use termed_core::document::analyze;
use termed_core::Document;

// ---------------------------------------------------------------------------
// Term dictionaries
// ---------------------------------------------------------------------------

struct TermDictionary {
    terms: Map<Vec<u8>>,
    postings: Vec<Vec<u32>>,
}

impl TermDictionary {
    fn build(terms: BTreeMap<String, BTreeSet<u32>>) -> Result<Self> {
        let mut builder = MapBuilder::memory();
        let mut postings = Vec::with_capacity(terms.len());
        for (slot, (term, ordinals)) in terms.into_iter().enumerate() {
            builder.insert(term.as_bytes(), slot as u64)?;
            postings.push(ordinals.into_iter().collect());
        }
        let terms = Map::new(builder.into_inner()?)?;
        Ok(Self { terms, postings })
    }

    fn term(&self, term: &str) -> &[u32] {
        match self.terms.get(term) {
            Some(slot) => &self.postings[slot as usize],
            None => &[],
        }
    }

    fn prefix(&self, prefix: &str) -> BTreeSet<u32> {
        let mut stream = self.terms.search(Str::new(prefix).starts_with()).into_stream();
        let mut ordinals = BTreeSet::new();
        while let Some((_, slot)) = stream.next() {
            ordinals.extend(self.postings[slot as usize].iter().copied());
        }
        ordinals
    }

    fn range(&self, lower: Option<&str>, upper: Option<&str>) -> BTreeSet<u32> {
        let mut builder = self.terms.range();
        if let Some(lower) = lower {
            builder = builder.ge(lower);
        }
        if let Some(upper) = upper {
            builder = builder.le(upper);
        }
        let mut stream = builder.into_stream();
        let mut ordinals = BTreeSet::new();
        while let Some((_, slot)) = stream.next() {
            ordinals.extend(self.postings[slot as usize].iter().copied());
        }
        ordinals
    }
}

struct FieldIndex {
    exact: TermDictionary,
    tokens: TermDictionary,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

pub struct Snapshot {
    generation: u64,
    documents: Vec<Arc<Document>>,
    fields: HashMap<String, FieldIndex>,
}

impl Snapshot {
    pub(crate) fn empty() -> Self {
        Self { generation: 0, documents: Vec::new(), fields: HashMap::new() }
    }

    /// `documents` must be in key order.
    pub(crate) fn build(generation: u64, documents: Vec<Arc<Document>>) -> Result<Self> {
        let started = Instant::now();
        let mut exact: HashMap<String, BTreeMap<String, BTreeSet<u32>>> = HashMap::new();
        let mut tokens: HashMap<String, BTreeMap<String, BTreeSet<u32>>> = HashMap::new();

        for (ordinal, doc) in documents.iter().enumerate() {
            let ordinal = ordinal as u32;
            for (field, values) in &doc.indexed {
                let exact_terms = exact.entry(field.clone()).or_default();
                let token_terms = tokens.entry(field.clone()).or_default();
                for value in values {
                    exact_terms.entry(value.clone()).or_default().insert(ordinal);
                    for token in analyze(value) {
                        token_terms.entry(token).or_default().insert(ordinal);
                    }
                }
            }
        }

        let mut fields = HashMap::with_capacity(exact.len());
        for (field, terms) in exact {
            let field_tokens = tokens.remove(&field).unwrap_or_default();
            fields.insert(
                field,
                FieldIndex { exact: TermDictionary::build(terms)?, tokens: TermDictionary::build(field_tokens)? },
            );
        }

        tracing::debug!(
            generation,
            documents = documents.len(),
            fields = fields.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot: built"
        );
        Ok(Self { generation, documents, fields })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn document(&self, ordinal: u32) -> &Document {
        &self.documents[ordinal as usize]
    }

    pub(crate) fn term(&self, field: &str, value: &str) -> &[u32] {
        self.fields.get(field).map(|f| f.exact.term(value)).unwrap_or(&[])
    }

    pub(crate) fn prefix(&self, field: &str, prefix: &str) -> BTreeSet<u32> {
        self.fields.get(field).map(|f| f.exact.prefix(prefix)).unwrap_or_default()
    }

    pub(crate) fn range(&self, field: &str, lower: Option<&str>, upper: Option<&str>) -> BTreeSet<u32> {
        self.fields.get(field).map(|f| f.exact.range(lower, upper)).unwrap_or_default()
    }

    /// Ordinals whose analysed `field` contains `token`.
    pub(crate) fn token(&self, field: &str, token: &str) -> &[u32] {
        self.fields.get(field).map(|f| f.tokens.term(token)).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Guards and manager
// ---------------------------------------------------------------------------

/// A leased snapshot. Dropping it releases the lease.
pub struct SnapshotGuard {
    snapshot: Arc<Snapshot>,
    active: Arc<AtomicUsize>,
}

impl Deref for SnapshotGuard {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

impl Drop for SnapshotGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct SnapshotManager {
    current: RwLock<Arc<Snapshot>>,
    refresh_lock: Mutex<()>,
    active: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl SnapshotManager {
    pub(crate) fn new(initial: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            refresh_lock: Mutex::new(()),
            active: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) fn acquire(&self) -> Result<SnapshotGuard> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed);
        }
        let snapshot = Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner));
        self.active.fetch_add(1, Ordering::AcqRel);
        Ok(SnapshotGuard { snapshot, active: Arc::clone(&self.active) })
    }

    /// Snapshots currently leased out.
    pub(crate) fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.current.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    /// Refresh unless another refresh is running. Returns whether a new
    /// snapshot was published.
    pub(crate) fn maybe_refresh(&self, writer: &Mutex<IndexWriter>) -> Result<bool> {
        let Ok(_refreshing) = self.refresh_lock.try_lock() else {
            tracing::trace!("snapshot: refresh already running, skipped");
            return Ok(false);
        };
        self.refresh_locked(writer)
    }

    /// Wait for any running refresh, then refresh. Writes applied before
    /// the call are visible to snapshots acquired after it returns.
    pub(crate) fn refresh_blocking(&self, writer: &Mutex<IndexWriter>) -> Result<bool> {
        let _refreshing = self.refresh_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.refresh_locked(writer)
    }

    fn refresh_locked(&self, writer: &Mutex<IndexWriter>) -> Result<bool> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed);
        }
        let (generation, documents) = {
            let writer = writer.lock().unwrap_or_else(PoisonError::into_inner);
            if writer.generation() == self.generation() {
                return Ok(false);
            }
            (writer.generation(), writer.documents())
        };

        let snapshot = Snapshot::build(generation, documents)?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);
        tracing::debug!(generation, "snapshot: published");
        Ok(true)
    }

    /// Stop handing out snapshots. Leased ones stay valid until dropped.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::debug!(active = self.active(), "snapshot: manager closed");
    }
}
