//! Custom error types for riskwatch.
//!
//! Validation errors are raised before any state changes. Persistence errors
//! are reported after the in-memory mutation has already been applied, so the
//! caller can warn that history may not survive a restart.

use std::path::PathBuf;
use thiserror::Error;

use crate::history::PredictionRecord;

/// Main error type for riskwatch operations
#[derive(Error, Debug)]
pub enum RiskwatchError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Category outside the fixed set
    #[error("Invalid category '{value}' (expected one of: heart, diabetes, liver, kidney)")]
    InvalidCategory { value: String },

    /// Probability that is not a finite number in [0, 1]
    #[error("Invalid probability {value}: must be a finite number between 0 and 1")]
    InvalidProbability { value: f64 },

    /// Malformed parameter input
    #[error("Invalid parameter '{input}': {reason}")]
    InvalidParameter { input: String, reason: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Snapshot write failed; the in-memory mutation is still applied
    #[error("Failed to persist history to {location}: {reason}")]
    PersistenceWrite {
        location: String,
        reason: String,
        /// Record added by the mutation whose write failed, if any
        record: Option<Box<PredictionRecord>>,
    },

    /// Stored snapshot could not be parsed
    #[error("Corrupt history snapshot at {location}: {reason}")]
    CorruptSnapshot { location: String, reason: String },

    /// Stored snapshot written by a newer schema
    #[error("Unsupported snapshot version {found} (supported up to {supported})")]
    UnsupportedSnapshotVersion { found: u32, supported: u32 },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML error wrapper
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Generic error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RiskwatchError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create an invalid category error
    pub fn invalid_category(value: impl Into<String>) -> Self {
        Self::InvalidCategory {
            value: value.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            path: None,
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    // =========================================================================
    // Classification helpers
    // =========================================================================

    /// Check if this error was raised before any state was mutated
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCategory { .. }
                | Self::InvalidProbability { .. }
                | Self::InvalidParameter { .. }
        )
    }

    /// Check if this error concerns durable storage
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::PersistenceWrite { .. }
                | Self::CorruptSnapshot { .. }
                | Self::UnsupportedSnapshotVersion { .. }
        )
    }

    /// Record that was applied in memory despite a failed write.
    pub fn applied_record(&self) -> Option<&PredictionRecord> {
        match self {
            Self::PersistenceWrite { record, .. } => record.as_deref(),
            _ => None,
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidCategory { .. }
            | Self::InvalidProbability { .. }
            | Self::InvalidParameter { .. } => 2,
            Self::PersistenceWrite { .. } => 3,
            Self::CorruptSnapshot { .. } | Self::UnsupportedSnapshotVersion { .. } => 4,
            Self::Config { .. } | Self::Toml(_) => 7,
            _ => 1,
        }
    }
}

/// Type alias for riskwatch results
pub type Result<T> = std::result::Result<T, RiskwatchError>;
