//! The prediction history store.
//!
//! [`HistoryStore`] owns the authoritative, newest-first list of prediction
//! records and keeps the durable snapshot in step with it. It is built
//! explicitly with [`HistoryStore::restore`] and shared by reference (or
//! `Arc`) with whatever needs it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use riskwatch::history::{HistoryStore, MemorySnapshotStorage, Parameters};
//! use riskwatch::Category;
//!
//! let store = HistoryStore::restore(Arc::new(MemorySnapshotStorage::new()));
//! let record = store.add(Category::Heart, true, 0.73, Parameters::new()).unwrap();
//!
//! assert_eq!(store.len(), 1);
//! assert_eq!(store.by_category(Category::Heart)[0].id, record.id);
//! assert!(store.by_category(Category::Diabetes).is_empty());
//! ```

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::persistence::{Snapshot, SnapshotStorage};
use super::trends::{self, CategorySummary, TrendPoint};
use super::{validate_parameters, Parameters, PredictionRecord, RecordId};
use crate::category::Category;
use crate::error::{Result, RiskwatchError};

/// How the store came up at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// No snapshot existed; history starts empty.
    Fresh,
    /// A snapshot was loaded.
    Restored { records: usize },
    /// The snapshot could not be read; history starts empty.
    Recovered {
        reason: String,
        /// Where the unreadable snapshot was moved, if it was kept.
        preserved_at: Option<String>,
    },
}

impl RestoreOutcome {
    /// Whether stored history was discarded at startup.
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered { .. })
    }
}

#[derive(Debug, Default)]
struct HistoryState {
    /// Newest first.
    records: VecDeque<PredictionRecord>,
    /// The last snapshot write failed.
    dirty: bool,
}

/// Persisted, append-only history of prediction outcomes.
///
/// Mutations are serialized by an internal lock and the snapshot is written
/// while the lock is held, so an older state can never overwrite a newer one.
pub struct HistoryStore {
    storage: Arc<dyn SnapshotStorage>,
    state: Mutex<HistoryState>,
    outcome: RestoreOutcome,
}

impl HistoryStore {
    /// Load the history from `storage`, falling back to an empty history.
    ///
    /// Never fails: a missing snapshot starts a fresh history, and an
    /// unreadable one is moved aside (where the storage supports it) and
    /// logged before starting empty. Check [`HistoryStore::restore_outcome`]
    /// to tell the cases apart.
    pub fn restore(storage: Arc<dyn SnapshotStorage>) -> Self {
        let (records, outcome) = match storage.load() {
            Ok(None) => {
                info!("No history at {}; starting fresh", storage.location());
                (VecDeque::new(), RestoreOutcome::Fresh)
            }
            Ok(Some(snapshot)) => {
                let records = dedupe(snapshot.records);
                info!(
                    "Restored {} predictions from {}",
                    records.len(),
                    storage.location()
                );
                let count = records.len();
                (records, RestoreOutcome::Restored { records: count })
            }
            Err(e) => {
                warn!(
                    "Unreadable history at {}: {}. Starting with empty history.",
                    storage.location(),
                    e
                );
                let preserved_at = match storage.quarantine() {
                    Ok(path) => path,
                    Err(qe) => {
                        warn!("Could not move unreadable history aside: {}", qe);
                        None
                    }
                };
                (
                    VecDeque::new(),
                    RestoreOutcome::Recovered {
                        reason: e.to_string(),
                        preserved_at,
                    },
                )
            }
        };

        Self {
            storage,
            state: Mutex::new(HistoryState {
                records,
                dirty: false,
            }),
            outcome,
        }
    }

    /// How startup went.
    #[must_use]
    pub fn restore_outcome(&self) -> &RestoreOutcome {
        &self.outcome
    }

    /// Location of the durable snapshot.
    #[must_use]
    pub fn location(&self) -> String {
        self.storage.location()
    }

    // The lock is never held across a panic point that could leave the
    // records half-updated, so a poisoned lock still guards a valid history.
    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Record a new prediction at the head of the history.
    ///
    /// # Errors
    ///
    /// - [`RiskwatchError::InvalidProbability`] if `probability` is not a
    ///   finite number in [0, 1]; nothing is changed.
    /// - [`RiskwatchError::InvalidParameter`] if any number in `parameters`
    ///   (nested groups included) is NaN or infinite; nothing is changed.
    /// - [`RiskwatchError::PersistenceWrite`] if the snapshot write fails.
    ///   The record stays in the in-memory history and is carried by the
    ///   error (see [`RiskwatchError::applied_record`]).
    pub fn add(
        &self,
        category: Category,
        at_risk: bool,
        probability: f64,
        parameters: Parameters,
    ) -> Result<PredictionRecord> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(RiskwatchError::InvalidProbability { value: probability });
        }
        validate_parameters(&parameters)?;

        let mut state = self.state();

        // Random v4 ids are what keeps ids unique across clears; this check
        // only covers collisions with records still in the history.
        let mut id = RecordId::new();
        while state.records.iter().any(|r| r.id == id) {
            id = RecordId::new();
        }

        let now = Utc::now();
        let created_at = match state.records.front() {
            Some(head) if head.created_at > now => head.created_at,
            _ => now,
        };

        let record = PredictionRecord {
            id,
            category,
            at_risk,
            probability,
            created_at,
            parameters,
        };
        state.records.push_front(record.clone());
        debug!(
            "Added {} prediction {} (p={:.2}, history={})",
            category,
            record.id,
            probability,
            state.records.len()
        );

        match self.persist(&mut state) {
            Ok(()) => Ok(record),
            Err(RiskwatchError::PersistenceWrite {
                location, reason, ..
            }) => Err(RiskwatchError::PersistenceWrite {
                location,
                reason,
                record: Some(Box::new(record)),
            }),
            Err(e) => Err(e),
        }
    }

    /// Record a new prediction, parsing the category name first.
    ///
    /// # Errors
    ///
    /// Returns [`RiskwatchError::InvalidCategory`] before touching the
    /// history if `category` is not a known category; otherwise as
    /// [`HistoryStore::add`].
    pub fn add_named(
        &self,
        category: &str,
        at_risk: bool,
        probability: f64,
        parameters: Parameters,
    ) -> Result<PredictionRecord> {
        let category: Category = category.parse()?;
        self.add(category, at_risk, probability, parameters)
    }

    /// Remove every record. Clearing an empty history succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RiskwatchError::PersistenceWrite`] if the empty snapshot
    /// cannot be written; the in-memory history is still cleared.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.state();
        let removed = state.records.len();
        state.records.clear();
        debug!("Cleared {} predictions", removed);
        self.persist(&mut state)
    }

    /// Write the current in-memory history to storage.
    ///
    /// Used to retry after a failed write.
    ///
    /// # Errors
    ///
    /// Returns [`RiskwatchError::PersistenceWrite`] if the write fails again.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state();
        self.persist(&mut state)
    }

    /// Whether the in-memory history has changes the last write did not save.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.state().dirty
    }

    fn persist(&self, state: &mut HistoryState) -> Result<()> {
        let snapshot = Snapshot::new(state.records.iter().cloned().collect());
        match self.storage.save(&snapshot) {
            Ok(()) => {
                state.dirty = false;
                Ok(())
            }
            Err(e) => {
                state.dirty = true;
                warn!(
                    "Failed to persist history to {}: {}. Changes are kept for this session only.",
                    self.storage.location(),
                    e
                );
                Err(RiskwatchError::PersistenceWrite {
                    location: self.storage.location(),
                    reason: e.to_string(),
                    record: None,
                })
            }
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All records, newest first.
    #[must_use]
    pub fn history(&self) -> Vec<PredictionRecord> {
        self.state().records.iter().cloned().collect()
    }

    /// Records of one category, newest first. Empty when none match.
    #[must_use]
    pub fn by_category(&self, category: Category) -> Vec<PredictionRecord> {
        self.state()
            .records
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect()
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<PredictionRecord> {
        self.state().records.iter().find(|r| &r.id == id).cloned()
    }

    /// Newest record of a category.
    #[must_use]
    pub fn latest(&self, category: Category) -> Option<PredictionRecord> {
        self.state()
            .records
            .iter()
            .find(|r| r.category == category)
            .cloned()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state().records.len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state().records.is_empty()
    }

    /// Risk trend of the `window` most recent records of `category`, oldest first.
    #[must_use]
    pub fn trend(&self, category: Category, window: usize) -> Vec<TrendPoint> {
        trends::trend(&self.state().records, category, window)
    }

    /// Per-category summary of the whole history.
    #[must_use]
    pub fn summary(&self) -> Vec<CategorySummary> {
        trends::summarize(&self.state().records)
    }
}

impl fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryStore")
            .field("location", &self.storage.location())
            .field("records", &self.len())
            .field("outcome", &self.outcome)
            .finish()
    }
}

/// Drop records whose id was already seen, keeping the first (newest) one.
fn dedupe(records: Vec<PredictionRecord>) -> VecDeque<PredictionRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let total = records.len();
    let unique: VecDeque<PredictionRecord> =
        records.into_iter().filter(|r| seen.insert(r.id)).collect();
    if unique.len() != total {
        warn!(
            "Dropped {} predictions with duplicate ids from stored history",
            total - unique.len()
        );
    }
    unique
}
