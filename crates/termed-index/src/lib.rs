//! termed-index — an embedded, snapshot-isolated search index.
//!
//! # Architecture
//!
//! ```text
//!  index / delete ─────┐
//!  index_all ──► bulk worker ──► IndexWriter ──commit──► Store (segments.json)
//!                                    │
//!                                 refresh
//!                                    ▼
//!  search / get ◄── SnapshotGuard ◄── SnapshotManager (Arc<Snapshot> swap)
//! ```
//!
//! Values are flattened into [`Document`](termed_core::Document)s by a
//! [`DocumentMapper`](termed_core::DocumentMapper). Each refresh builds a
//! fresh [`Snapshot`](snapshot::Snapshot) of FST term dictionaries; searches
//! run against whichever snapshot was current when they started and keep it
//! alive until their [`Hits`] are dropped.
//!
//! Everything is owned by a [`SearchIndex`], which also runs the refresh and
//! commit schedulers and the single bulk worker on the ambient tokio runtime.

mod bulk;
mod engine;
mod error;
mod search;
mod snapshot;
mod store;
mod writer;

pub use bulk::{BulkJob, BulkStats, BulkStatsSnapshot, ProgressReporter, ValueProvider};
pub use engine::SearchIndex;
pub use error::{IndexError, Result};
pub use search::Hits;
pub use snapshot::{Snapshot, SnapshotGuard};
pub use store::{CommitPoint, IndexLocation, COMMIT_FILE};
