//! Snapshot persistence for the prediction history.
//!
//! The whole history is stored as one snapshot under a fixed storage key.
//! File storage writes atomically (temp file + rename) under an exclusive
//! lock, so a crash mid-write leaves the previous snapshot intact.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::PredictionRecord;
use crate::error::{Result, RiskwatchError};

/// Current schema version for snapshots.
/// Increment when making breaking changes to the serialization format.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Default storage key; the snapshot file is `<key>.json`.
pub const DEFAULT_STORAGE_KEY: &str = "prediction-storage";

/// Temporary file suffix for atomic writes.
const TMP_SUFFIX: &str = ".tmp";

/// Lock file suffix for concurrent access prevention.
const LOCK_SUFFIX: &str = ".lock";

/// Suffix for snapshots moved aside after failing to load.
const CORRUPT_SUFFIX: &str = ".corrupt";

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Serialized state of the history at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Schema version of this snapshot.
    #[serde(default = "default_version")]
    pub version: u32,
    /// When the snapshot was written.
    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
    /// Records, newest first.
    #[serde(default)]
    pub records: Vec<PredictionRecord>,
}

impl Snapshot {
    /// Creates a snapshot of the given records, stamped now.
    #[must_use]
    pub fn new(records: Vec<PredictionRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            records,
        }
    }

    /// Parses a snapshot and checks its version.
    ///
    /// # Errors
    ///
    /// Returns [`RiskwatchError::CorruptSnapshot`] if the text is not a valid
    /// snapshot, or [`RiskwatchError::UnsupportedSnapshotVersion`] if it was
    /// written by a newer schema.
    pub fn from_json(location: &str, contents: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(contents).map_err(|e| RiskwatchError::CorruptSnapshot {
                location: location.to_string(),
                reason: e.to_string(),
            })?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(RiskwatchError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }

        Ok(snapshot)
    }
}

/// Durable storage for history snapshots.
///
/// The history store is the only writer; implementations only need to make
/// each individual `save` atomic.
pub trait SnapshotStorage: Send + Sync {
    /// Load the last saved snapshot.
    ///
    /// Returns `Ok(None)` if nothing has been saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (I/O error, quota, ...).
    fn save(&self, snapshot: &Snapshot) -> Result<()>;

    /// Move an unreadable snapshot out of the way.
    ///
    /// Returns a description of where it went, if it was kept anywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot could not be moved.
    fn quarantine(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Human-readable location for diagnostics.
    fn location(&self) -> String;
}

// ============================================================================
// File Storage
// ============================================================================

/// Snapshot storage backed by a JSON file in a data directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    /// Directory where the snapshot is stored.
    dir: PathBuf,
    /// Storage key naming the snapshot file.
    key: String,
}

impl FileSnapshotStorage {
    /// Creates file storage using the default storage key.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_key(dir, DEFAULT_STORAGE_KEY)
    }

    /// Creates file storage with a custom storage key.
    #[must_use]
    pub fn with_key(dir: impl AsRef<Path>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            key: key.into(),
        }
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    /// Returns the path to the temporary snapshot file.
    #[must_use]
    pub fn tmp_file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json{TMP_SUFFIX}", self.key))
    }

    /// Returns the path to the lock file.
    #[must_use]
    pub fn lock_file_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json{LOCK_SUFFIX}", self.key))
    }

    /// Returns an unused path to move an unreadable snapshot to.
    ///
    /// Names are `<key>.json.corrupt.<timestamp>`, with a counter appended if
    /// that name is already taken, so earlier preserved files are never replaced.
    #[must_use]
    pub fn next_corrupt_file_path(&self) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let base = format!("{}.json{CORRUPT_SUFFIX}.{stamp}", self.key);
        let mut candidate = self.dir.join(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.dir.join(format!("{base}.{n}"));
            n += 1;
        }
        candidate
    }

    /// Lists preserved unreadable snapshots, oldest name first.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory exists but cannot be read.
    pub fn corrupt_files(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}.json{CORRUPT_SUFFIX}.", self.key);
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Checks if a snapshot file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.snapshot_path().exists()
    }

    fn lock_error(e: std::io::Error) -> RiskwatchError {
        RiskwatchError::Other(anyhow::anyhow!("Failed to acquire history lock: {e}"))
    }
}

impl SnapshotStorage for FileSnapshotStorage {
    fn load(&self) -> Result<Option<Snapshot>> {
        let path = self.snapshot_path();

        if !path.exists() {
            return Ok(None);
        }

        // Held until the end of the read.
        let _lock = if self.lock_file_path().exists() {
            let lock_file = File::open(self.lock_file_path())?;
            FileExt::lock_shared(&lock_file).map_err(Self::lock_error)?;
            Some(lock_file)
        } else {
            None
        };

        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| RiskwatchError::CorruptSnapshot {
                location: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let snapshot = Snapshot::from_json(&path.display().to_string(), &contents)?;
        debug!(
            "Loaded {} records from {}",
            snapshot.records.len(),
            path.display()
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let lock_file = File::create(self.lock_file_path())?;
        FileExt::lock_exclusive(&lock_file).map_err(Self::lock_error)?;

        let tmp_path = self.tmp_file_path();
        let json = serde_json::to_string_pretty(snapshot)?;

        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(json.as_bytes())?;
        tmp_file.sync_all()?;

        fs::rename(&tmp_path, self.snapshot_path())?;

        Ok(())
    }

    fn quarantine(&self) -> Result<Option<String>> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let target = self.next_corrupt_file_path();
        fs::rename(&path, &target)?;
        warn!("Moved unreadable history to {}", target.display());
        Ok(Some(target.display().to_string()))
    }

    fn location(&self) -> String {
        self.snapshot_path().display().to_string()
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// Snapshot storage held in process memory.
///
/// Snapshots are kept serialized, so loading goes through the same parsing
/// path as file storage. Write failures can be injected for testing.
#[derive(Debug, Default)]
pub struct MemorySnapshotStorage {
    contents: Mutex<Option<String>>,
    write_failure: Mutex<Option<String>>,
}

impl MemorySnapshotStorage {
    /// Creates empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-populated with raw snapshot text.
    #[must_use]
    pub fn with_contents(raw: impl Into<String>) -> Self {
        Self {
            contents: Mutex::new(Some(raw.into())),
            write_failure: Mutex::new(None),
        }
    }

    /// Raw text of the stored snapshot, if any.
    #[must_use]
    pub fn contents(&self) -> Option<String> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Make every subsequent save fail with `reason`, or succeed again with `None`.
    pub fn set_write_failure(&self, reason: Option<String>) {
        *self
            .write_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason;
    }
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn load(&self) -> Result<Option<Snapshot>> {
        match self.contents() {
            Some(raw) => Snapshot::from_json(&self.location(), &raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(reason) = self
            .write_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(RiskwatchError::Io(std::io::Error::other(reason)));
        }
        let json = serde_json::to_string(snapshot)?;
        *self.contents.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }

    fn quarantine(&self) -> Result<Option<String>> {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(None)
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
