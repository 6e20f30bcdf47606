//! riskwatch - local disease-risk estimation with a persisted history
//!
//! Parameters go into an [`Estimator`], and the outcome is recorded in a
//! [`HistoryStore`]: an append-only, newest-first log of predictions that
//! survives restarts and can be filtered by [`Category`].
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`category`] - The closed set of disease categories
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Custom error types and handling
//! - [`estimator`] - Stateless risk heuristic
//! - [`history`] - Prediction records, snapshot persistence and the history store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use riskwatch::{Config, Estimator, HeuristicEstimator, HistoryStore};
//!
//! let config = Config::load(&data_dir)?;
//! let store = HistoryStore::restore(Arc::new(config.storage(&data_dir)));
//!
//! let estimate = HeuristicEstimator.estimate(category, &parameters);
//! store.add(category, estimate.at_risk, estimate.probability, parameters)?;
//!
//! for record in store.by_category(category) {
//!     println!("{}", record.summary());
//! }
//! ```

pub mod category;
pub mod config;
pub mod error;
pub mod estimator;
pub mod history;

// Re-export commonly used types
pub use category::Category;
pub use config::Config;
pub use error::{Result, RiskwatchError};
pub use estimator::{Estimate, Estimator, HeuristicEstimator};
pub use history::{
    CategorySummary, FileSnapshotStorage, HistoryStore, MemorySnapshotStorage, ParamValue,
    Parameters, PredictionRecord, RecordId, RestoreOutcome, Snapshot, SnapshotStorage,
    TrendPoint,
};
