//! Persisted prediction history.
//!
//! # Architecture
//!
//! ```text
//! HistoryStore
//!   ├── records: newest-first PredictionRecord list (in memory, authoritative)
//!   └── storage: SnapshotStorage (durable copy, rewritten on every mutation)
//! ```
//!
//! The store comes up through [`HistoryStore::restore`], which never fails:
//! an unreadable snapshot is logged and replaced by an empty history.
//! Category-filtered views, trends and summaries are always computed from
//! the in-memory records.

pub mod persistence;
pub mod record;
pub mod store;
pub mod trends;

pub use persistence::{
    FileSnapshotStorage, MemorySnapshotStorage, Snapshot, SnapshotStorage, DEFAULT_STORAGE_KEY,
    SNAPSHOT_VERSION,
};
pub use record::{
    parse_assignment, validate_parameters, ParamValue, Parameters, PredictionRecord, RecordId,
};
pub use store::{HistoryStore, RestoreOutcome};
pub use trends::{CategorySummary, TrendPoint, DEFAULT_TREND_WINDOW};
