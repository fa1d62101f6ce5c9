//! Background bulk reindexing.
//!
//! One worker task drains a bounded FIFO of [`BulkJob`]s. Each job runs on
//! the blocking pool: for every key it asks the job's value provider for the
//! current value, upserting when there is one and deleting when there is
//! not. Cancellation is checked between items.
//!
//! A job that fails (index error or provider panic) stops where it is.
//! Items already applied stay applied; the worker logs the failure, counts
//! it in [`BulkStats`] and moves on to the next job.

use crate::error::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// Resolves a key to its current value; `None` means the value is gone.
pub type ValueProvider<K, V> = Arc<dyn Fn(&K) -> Option<V> + Send + Sync>;

pub struct BulkJob<K, V> {
    pub id: u64,
    pub keys: Vec<K>,
    pub provider: ValueProvider<K, V>,
}

/// What the bulk worker needs from the engine.
pub(crate) trait BulkSink<K, V>: Send + Sync {
    fn apply(&self, key: &K, value: Option<&V>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct BulkStats {
    jobs_submitted: AtomicU64,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    jobs_cancelled: AtomicU64,
    items_indexed: AtomicU64,
    finished: Notify,
}

/// Point-in-time copy of [`BulkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStatsSnapshot {
    pub jobs_submitted: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub jobs_cancelled: u64,
    pub items_indexed: u64,
}

impl BulkStatsSnapshot {
    /// Jobs submitted but not yet finished in any way.
    pub fn pending(&self) -> u64 {
        self.jobs_submitted
            .saturating_sub(self.jobs_completed + self.jobs_failed + self.jobs_cancelled)
    }
}

impl BulkStats {
    pub fn snapshot(&self) -> BulkStatsSnapshot {
        BulkStatsSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Acquire),
            jobs_completed: self.jobs_completed.load(Ordering::Acquire),
            jobs_failed: self.jobs_failed.load(Ordering::Acquire),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::Acquire),
            items_indexed: self.items_indexed.load(Ordering::Acquire),
        }
    }

    pub(crate) fn submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::AcqRel);
    }

    /// Undo [`submitted`](Self::submitted) for a job that never got queued.
    pub(crate) fn rejected(&self) {
        self.jobs_submitted.fetch_sub(1, Ordering::AcqRel);
    }

    fn finish(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::AcqRel);
        self.finished.notify_waiters();
    }

    /// Wait until every submitted job has finished.
    pub async fn wait_idle(&self) {
        loop {
            let finished = self.finished.notified();
            if self.snapshot().pending() == 0 {
                return;
            }
            finished.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Logs count, throughput and elapsed time every `interval` items.
pub struct ProgressReporter {
    job: u64,
    interval: u64,
    count: u64,
    started: Instant,
}

impl ProgressReporter {
    pub fn new(job: u64, interval: u64) -> Self {
        Self { job, interval: interval.max(1), count: 0, started: Instant::now() }
    }

    pub fn tick(&mut self) {
        self.count += 1;
        if self.count % self.interval == 0 {
            self.report("bulk: progress");
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 { self.count as f64 / secs } else { 0.0 }
    }

    fn report(&self, message: &'static str) {
        tracing::info!(
            job = self.job,
            indexed = self.count,
            per_sec = self.rate() as u64,
            elapsed_ms = self.elapsed().as_millis() as u64,
            "{message}"
        );
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

enum JobOutcome {
    Completed,
    Cancelled,
}

pub(crate) async fn run_worker<K, V>(
    mut jobs: mpsc::Receiver<BulkJob<K, V>>,
    sink: Arc<dyn BulkSink<K, V>>,
    stats: Arc<BulkStats>,
    progress_interval: u64,
    cancel: CancellationToken,
) where
    K: Send + Sync + std::fmt::Debug + 'static,
    V: Send + Sync + 'static,
{
    tracing::debug!("bulk: worker started");

    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let id = job.id;
        let total = job.keys.len();
        tracing::info!(job = id, keys = total, "bulk: job started");

        let (sink, stats_for_job, cancel_for_job) = (Arc::clone(&sink), Arc::clone(&stats), cancel.clone());
        let outcome = tokio::task::spawn_blocking(move || {
            run_job(job, sink.as_ref(), &stats_for_job, progress_interval, &cancel_for_job)
        })
        .await;

        match outcome {
            Ok(Ok(JobOutcome::Completed)) => stats.finish(&stats.jobs_completed),
            Ok(Ok(JobOutcome::Cancelled)) => {
                tracing::info!(job = id, "bulk: job cancelled");
                stats.finish(&stats.jobs_cancelled);
                break;
            }
            Ok(Err(e)) => {
                tracing::error!(job = id, error = %e, "bulk: job failed, index left partially updated");
                stats.finish(&stats.jobs_failed);
            }
            Err(e) => {
                tracing::error!(job = id, error = %e, "bulk: job panicked, index left partially updated");
                stats.finish(&stats.jobs_failed);
            }
        }
    }

    // Whatever is still queued will never run.
    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        tracing::debug!(job = job.id, "bulk: dropping queued job");
        stats.finish(&stats.jobs_cancelled);
    }
    stats.finished.notify_waiters();
    tracing::debug!("bulk: worker stopped");
}

fn run_job<K: std::fmt::Debug, V>(
    job: BulkJob<K, V>,
    sink: &dyn BulkSink<K, V>,
    stats: &BulkStats,
    progress_interval: u64,
    cancel: &CancellationToken,
) -> Result<JobOutcome> {
    let mut progress = ProgressReporter::new(job.id, progress_interval);

    for key in &job.keys {
        if cancel.is_cancelled() {
            progress.report("bulk: stopped before completion");
            return Ok(JobOutcome::Cancelled);
        }
        let value = (job.provider)(key);
        if let Err(e) = sink.apply(key, value.as_ref()) {
            tracing::error!(job = job.id, key = ?key, done = progress.count(), "bulk: item failed");
            return Err(e);
        }
        stats.items_indexed.fetch_add(1, Ordering::AcqRel);
        progress.tick();
    }

    progress.report("bulk: job completed");
    Ok(JobOutcome::Completed)
}
