use crate::error::{IndexError, Result};
use crate::store::{IndexLocation, Store};
use std::collections::BTreeMap;
use std::sync::Arc;
use termed_core::Document;

/// The single writer. Holds the live document set; every mutation bumps the
/// generation so readers and the committer can tell when they are stale.
#[derive(Debug)]
pub(crate) struct IndexWriter {
    store: Store,
    documents: BTreeMap<String, Arc<Document>>,
    generation: u64,
    committed: u64,
    closed: bool,
}

impl IndexWriter {
    pub(crate) fn open(location: IndexLocation) -> Result<Self> {
        let (store, commit) = Store::open(location)?;
        let commit = commit.unwrap_or_default();
        let documents = commit
            .documents
            .into_iter()
            .map(|doc| (doc.key.clone(), Arc::new(doc)))
            .collect();
        Ok(Self { store, documents, generation: commit.generation, committed: commit.generation, closed: false })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(IndexError::Closed);
        }
        Ok(())
    }

    /// Insert or replace the document with the same key.
    pub(crate) fn upsert(&mut self, document: Document) -> Result<()> {
        self.ensure_open()?;
        self.documents.insert(document.key.clone(), Arc::new(document));
        self.generation += 1;
        Ok(())
    }

    /// Returns whether a document was removed.
    pub(crate) fn delete(&mut self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        let removed = self.documents.remove(key).is_some();
        if removed {
            self.generation += 1;
        }
        Ok(removed)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn has_uncommitted(&self) -> bool {
        self.generation != self.committed
    }

    /// Documents in key order.
    pub(crate) fn documents(&self) -> Vec<Arc<Document>> {
        self.documents.values().cloned().collect()
    }

    /// Capture the current document set for a commit that is persisted
    /// after the caller lets go of the writer. `None` when nothing changed
    /// since the last commit.
    pub(crate) fn pending_commit(&self) -> Result<Option<PendingCommit>> {
        self.ensure_open()?;
        if !self.has_uncommitted() {
            return Ok(None);
        }
        Ok(Some(PendingCommit {
            store: self.store.clone(),
            generation: self.generation,
            documents: self.documents(),
        }))
    }

    /// Record that everything up to `generation` is durable.
    pub(crate) fn mark_committed(&mut self, generation: u64) {
        self.committed = self.committed.max(generation);
    }

    /// Persist applied writes while holding the writer. Returns `false` when
    /// there was nothing to do.
    pub(crate) fn commit(&mut self) -> Result<bool> {
        let Some(pending) = self.pending_commit()? else {
            return Ok(false);
        };
        pending.persist()?;
        self.mark_committed(pending.generation);
        Ok(true)
    }

    /// Final commit, then refuse further work.
    pub(crate) fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.commit().map(|_| ());
        self.closed = true;
        tracing::debug!(location = ?self.store.location(), generation = self.generation, "writer: closed");
        result
    }
}

/// A document set captured at one generation, ready to be written out.
#[derive(Debug)]
pub(crate) struct PendingCommit {
    store: Store,
    generation: u64,
    documents: Vec<Arc<Document>>,
}

impl PendingCommit {
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn persist(&self) -> Result<()> {
        self.store.write(self.generation, self.documents.iter().map(Arc::as_ref))
    }
}
