//! [`SearchIndex`] — the long-lived index handle.
//!
//! # Lifecycle
//!
//! ```text
//! open ──► (index / delete / index_all / search ...) ──► close
//!            │                 │
//!            │                 └──► bulk worker task (one job at a time)
//!            ├──► refresh scheduler (every refresh_interval)
//!            └──► commit scheduler  (every commit_interval)
//! ```
//!
//! Writes go to the single writer immediately but become visible to
//! searches only after a refresh. They become durable after a commit.
//! [`SearchIndex::refresh_blocking`] makes everything written so far
//! visible before it returns.
//!
//! [`SearchIndex::close`] shuts down in a fixed order: stop the bulk worker
//! between items, stop the schedulers, stop handing out snapshots, then
//! commit and close the writer.

use crate::bulk::{run_worker, BulkJob, BulkSink, BulkStats, BulkStatsSnapshot, ValueProvider};
use crate::error::{IndexError, Result};
use crate::search::{evaluate, rank, Decoder, Hits};
use crate::snapshot::{Snapshot, SnapshotManager};
use crate::store::IndexLocation;
use crate::writer::IndexWriter;
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use termed_core::config::IndexConfig;
use termed_core::document::KEY_FIELD;
use termed_core::specification::{Criterion, Engine, Specification};
use termed_core::{Document, DocumentMapper, IndexKey, IndexQuery, Query, SortField};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Shared core
// ---------------------------------------------------------------------------

/// State shared by the handle, the bulk worker and the schedulers.
struct IndexCore<V> {
    writer: Mutex<IndexWriter>,
    /// Serialises commits so commit points are written in generation order.
    commits: Mutex<()>,
    readers: SnapshotManager,
    mapper: Box<dyn DocumentMapper<V>>,
}

impl<V> IndexCore<V> {
    fn index(&self, key: &str, value: &V) -> Result<()> {
        // Mapping happens outside the writer lock.
        let document = self
            .mapper
            .to_document(key, value)
            .map_err(|source| IndexError::Encode { key: key.to_string(), source })?;
        lock(&self.writer).upsert(document)
    }

    fn delete(&self, key: &str) -> Result<bool> {
        lock(&self.writer).delete(key)
    }

    fn decode(&self, document: &Document) -> Result<V> {
        self.mapper
            .from_document(document)
            .map_err(|source| IndexError::Decode { key: document.key.clone(), source })
    }

    fn refresh(&self) -> Result<bool> {
        self.readers.maybe_refresh(&self.writer)
    }

    /// Captures the document set under the writer lock and persists it
    /// outside the lock.
    fn commit(&self) -> Result<bool> {
        let _serial = lock(&self.commits);
        let Some(pending) = lock(&self.writer).pending_commit()? else {
            return Ok(false);
        };
        pending.persist()?;
        lock(&self.writer).mark_committed(pending.generation());
        Ok(true)
    }

    /// Shutdown tail shared by `close` and `Drop`: release readers, then
    /// make the final commit and close the writer.
    fn release(&self) -> Result<()> {
        self.readers.close();
        let _serial = lock(&self.commits);
        lock(&self.writer).close()
    }
}

struct CoreSink<K, V> {
    core: Arc<IndexCore<V>>,
    _key: PhantomData<fn(&K)>,
}

impl<K: IndexKey, V: Send + Sync> BulkSink<K, V> for CoreSink<K, V> {
    fn apply(&self, key: &K, value: Option<&V>) -> Result<()> {
        match value {
            Some(value) => self.core.index(&key.encode(), value),
            None => self.core.delete(&key.encode()).map(|_| ()),
        }
    }
}

struct BackgroundTasks {
    worker: JoinHandle<()>,
    refresh: JoinHandle<()>,
    commit: JoinHandle<()>,
}

fn spawn_scheduler<V: Send + Sync + 'static>(
    runtime: &Handle,
    name: &'static str,
    period: Duration,
    core: Arc<IndexCore<V>>,
    cancel: CancellationToken,
    task: fn(&IndexCore<V>) -> Result<bool>,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let core = Arc::clone(&core);
                    match tokio::task::spawn_blocking(move || task(&core)).await {
                        Ok(Ok(true)) => tracing::trace!(task = name, "index: scheduled task ran"),
                        Ok(Ok(false)) => {}
                        Ok(Err(IndexError::Closed)) => break,
                        Ok(Err(e)) => tracing::warn!(task = name, error = %e, "index: scheduled task failed"),
                        Err(e) => tracing::error!(task = name, error = %e, "index: scheduled task panicked"),
                    }
                }
            }
        }

        tracing::debug!(task = name, "index: scheduler stopped");
    })
}

// ---------------------------------------------------------------------------
// SearchIndex
// ---------------------------------------------------------------------------

/// A searchable, eventually consistent index of `V` values keyed by `K`.
pub struct SearchIndex<K, V> {
    core: Arc<IndexCore<V>>,
    bulk: Mutex<Option<mpsc::Sender<BulkJob<K, V>>>>,
    stats: Arc<BulkStats>,
    next_job: AtomicU64,
    worker_cancel: CancellationToken,
    scheduler_cancel: CancellationToken,
    tasks: Mutex<Option<BackgroundTasks>>,
    closed: AtomicBool,
}

impl<K, V> SearchIndex<K, V>
where
    K: IndexKey + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Open (or create) the index described by `config` and start its
    /// background tasks. Must be called inside a tokio runtime.
    pub fn open<M>(config: &IndexConfig, mapper: M) -> Result<Self>
    where
        M: DocumentMapper<V> + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| IndexError::NoRuntime)?;
        let location = IndexLocation::from_directory(config.directory.as_deref());

        let writer = IndexWriter::open(location.clone())?;
        let initial = Snapshot::build(writer.generation(), writer.documents())?;
        let documents = initial.len();
        let core = Arc::new(IndexCore {
            writer: Mutex::new(writer),
            commits: Mutex::new(()),
            readers: SnapshotManager::new(initial),
            mapper: Box::new(mapper),
        });

        let stats = Arc::new(BulkStats::default());
        let worker_cancel = CancellationToken::new();
        let scheduler_cancel = CancellationToken::new();

        let (sender, receiver) = mpsc::channel(config.bulk_queue_capacity.max(1));
        let sink: Arc<dyn BulkSink<K, V>> = Arc::new(CoreSink { core: Arc::clone(&core), _key: PhantomData });
        let worker = runtime.spawn(run_worker(
            receiver,
            sink,
            Arc::clone(&stats),
            config.progress_interval,
            worker_cancel.clone(),
        ));
        let refresh = spawn_scheduler(
            &runtime,
            "refresh",
            config.refresh_interval(),
            Arc::clone(&core),
            scheduler_cancel.clone(),
            |core| core.refresh(),
        );
        let commit = spawn_scheduler(
            &runtime,
            "commit",
            config.commit_interval(),
            Arc::clone(&core),
            scheduler_cancel.clone(),
            |core| core.commit(),
        );

        tracing::info!(
            location = ?location,
            documents,
            refresh_ms = config.refresh_interval_ms,
            commit_ms = config.commit_interval_ms,
            "index: opened"
        );

        Ok(Self {
            core,
            bulk: Mutex::new(Some(sender)),
            stats,
            next_job: AtomicU64::new(0),
            worker_cancel,
            scheduler_cancel,
            tasks: Mutex::new(Some(BackgroundTasks { worker, refresh, commit })),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed);
        }
        Ok(())
    }

    // -- writes -------------------------------------------------------------

    /// Insert or replace the value stored under `key`. Blocks until the
    /// writer has applied it; visible after the next refresh.
    pub fn index(&self, key: &K, value: &V) -> Result<()> {
        self.ensure_open()?;
        self.core.index(&key.encode(), value)
    }

    pub fn delete(&self, key: &K) -> Result<()> {
        self.ensure_open()?;
        let removed = self.core.delete(&key.encode())?;
        tracing::trace!(key = ?key, removed, "index: delete");
        Ok(())
    }

    /// Queue a bulk job reindexing `keys` with values from `provider`.
    /// Returns the job id once the job is queued; waits while the queue is
    /// full.
    pub async fn index_all(&self, keys: Vec<K>, provider: ValueProvider<K, V>) -> Result<u64> {
        self.ensure_open()?;
        let sender = lock(&self.bulk).clone().ok_or(IndexError::Closed)?;
        let id = self.next_job.fetch_add(1, Ordering::AcqRel) + 1;
        let keys_len = keys.len();

        self.stats.submitted();
        if sender.send(BulkJob { id, keys, provider }).await.is_err() {
            self.stats.rejected();
            return Err(IndexError::Closed);
        }
        tracing::debug!(job = id, keys = keys_len, "index: bulk job queued");
        Ok(id)
    }

    /// Resolve once every queued bulk job has finished.
    pub async fn wait_for_bulk(&self) {
        self.stats.wait_idle().await
    }

    pub fn bulk_stats(&self) -> BulkStatsSnapshot {
        self.stats.snapshot()
    }

    // -- freshness ----------------------------------------------------------

    /// Refresh reader visibility unless a refresh is already running.
    pub fn refresh(&self) -> Result<bool> {
        self.ensure_open()?;
        self.core.refresh()
    }

    /// Make every write applied so far visible to snapshots acquired after
    /// this returns.
    pub fn refresh_blocking(&self) -> Result<()> {
        self.ensure_open()?;
        self.core.readers.refresh_blocking(&self.core.writer).map(|_| ())
    }

    /// Persist every write applied so far.
    pub fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        self.core.commit().map(|_| ())
    }

    // -- reads --------------------------------------------------------------

    pub fn search(&self, query: &IndexQuery, sort: &[SortField], max: Option<usize>) -> Result<Hits<V>> {
        let core = Arc::clone(&self.core);
        self.execute::<V>(query, sort, max, Box::new(move |doc: &Document| core.decode(doc)))
    }

    /// Like [`search`](Self::search) but yields keys without decoding values.
    pub fn keys(&self, query: &IndexQuery, sort: &[SortField], max: Option<usize>) -> Result<Hits<K>> {
        self.execute::<K>(
            query,
            sort,
            max,
            Box::new(|doc: &Document| {
                K::decode(&doc.key).map_err(|source| IndexError::Decode { key: doc.key.clone(), source })
            }),
        )
    }

    /// Compile `spec` for the index and search with it.
    pub fn get_by_spec<C>(&self, spec: &Specification<C>, sort: &[SortField], max: Option<usize>) -> Result<Hits<V>>
    where
        C: Criterion<Key = K, Value = V>,
    {
        let query = spec.to_index_query()?;
        tracing::trace!(spec = %spec, query = %query, "specification: compiled to index query");
        self.search(&query, sort, max)
    }

    pub fn query<C>(&self, query: &Query<C>) -> Result<Hits<V>>
    where
        C: Criterion<Key = K, Value = V>,
    {
        if query.engine != Engine::Index {
            return Err(IndexError::WrongEngine(query.engine));
        }
        self.get_by_spec(&query.specification, &query.sort, query.max)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let query = IndexQuery::term(KEY_FIELD, key.encode());
        self.search(&query, &[], Some(1))?.next().transpose()
    }

    /// Values for `keys`, in the order of `keys`. Missing keys are skipped.
    pub fn get_many(&self, keys: &[K]) -> Result<Vec<V>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_open()?;
        let encoded: Vec<String> = keys.iter().map(IndexKey::encode).collect();
        let query = IndexQuery::should(encoded.iter().map(|k| IndexQuery::term(KEY_FIELD, k.clone())).collect());

        let snapshot = self.core.readers.acquire()?;
        let found: HashMap<&str, u32> = evaluate(&snapshot, &query)
            .into_keys()
            .map(|ordinal| (snapshot.document(ordinal).key.as_str(), ordinal))
            .collect();

        encoded
            .iter()
            .filter_map(|k| found.get(k.as_str()))
            .map(|&ordinal| self.core.decode(snapshot.document(ordinal)))
            .collect()
    }

    /// Number of matches, without decoding anything.
    pub fn count(&self, query: &IndexQuery) -> Result<usize> {
        self.ensure_open()?;
        let snapshot = self.core.readers.acquire()?;
        Ok(evaluate(&snapshot, query).len())
    }

    /// Whether the visible snapshot holds no documents.
    pub fn is_empty(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.core.readers.acquire()?.is_empty())
    }

    pub fn len(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.core.readers.acquire()?.len())
    }

    /// Generation of the snapshot searches currently see.
    pub fn visible_generation(&self) -> u64 {
        self.core.readers.generation()
    }

    /// Snapshots leased by live result streams.
    pub fn active_readers(&self) -> usize {
        self.core.readers.active()
    }

    fn execute<T>(&self, query: &IndexQuery, sort: &[SortField], max: Option<usize>, decode: Decoder<T>) -> Result<Hits<T>> {
        self.ensure_open()?;
        let started = Instant::now();
        let snapshot = self.core.readers.acquire()?;

        let scores = evaluate(&snapshot, query);
        let total = scores.len();
        let mut ordinals = rank(&snapshot, scores, sort);
        if let Some(max) = max {
            ordinals.truncate(max);
        }

        tracing::debug!(
            query = %query,
            total,
            returned = ordinals.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "index: search"
        );
        Ok(Hits::new(snapshot, ordinals, total, decode))
    }

    // -- shutdown -----------------------------------------------------------

    /// Stop background work and close the index. Queued bulk jobs that have
    /// not started are dropped; a running one stops after its current item.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!("index: closing");
        let tasks = lock(&self.tasks).take();

        drop(lock(&self.bulk).take());
        self.worker_cancel.cancel();
        self.scheduler_cancel.cancel();
        if let Some(BackgroundTasks { worker, refresh, commit }) = tasks {
            wait_for("bulk worker", worker).await;
            wait_for("refresh scheduler", refresh).await;
            wait_for("commit scheduler", commit).await;
        }

        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || core.release()).await??;
        tracing::info!("index: closed");
        Ok(())
    }
}

async fn wait_for(name: &'static str, task: JoinHandle<()>) {
    if let Err(e) = task.await {
        tracing::error!(task = name, error = %e, "index: background task ended abnormally");
    }
}

impl<K, V> Drop for SearchIndex<K, V> {
    fn drop(&mut self) {
        self.worker_cancel.cancel();
        self.scheduler_cancel.cancel();
        if !self.closed.load(Ordering::Acquire) {
            // Best effort: keep what was written if the caller never closed.
            if let Err(e) = self.core.release() {
                tracing::error!(error = %e, "index: final commit on drop failed");
            }
            tracing::warn!("index: dropped without close");
        }
    }
}
