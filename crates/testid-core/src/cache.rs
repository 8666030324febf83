//! Change detection backed by a persisted per-file record
//!
//! The original cache is read once at start-up and never mutated. Records for the
//! current run are rebuilt in a separate map (unchanged files carry their old record
//! over, changed files get a fresh one) which replaces the cache file in a single write
//! at the end of a successful run.

use crate::error::{TestIdError, TestIdResult};
use crate::fsutil::write_replacing;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Persisted state of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Modification time in epoch milliseconds
    #[serde(rename = "mt")]
    pub mod_time: i64,
    /// Identifiers embedded in the file after the last run that touched it
    #[serde(default)]
    pub ids: BTreeSet<String>,
}

/// Whether a file has to be processed this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Changed,
    /// Identifiers recorded for the file by a previous run
    Unchanged(BTreeSet<String>),
}

/// Cache key for a walked path; separators are normalized to `/`
pub fn cache_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Compares walked files against the persisted records and collects the new ones
#[derive(Debug, Default)]
pub struct ChangeDetector {
    original: HashMap<String, FileRecord>,
    records: DashMap<String, FileRecord>,
}

impl ChangeDetector {
    /// Detector with no prior records: every file counts as changed
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_records(original: HashMap<String, FileRecord>) -> Self {
        Self {
            original,
            records: DashMap::new(),
        }
    }

    /// Read the persisted cache, falling back to an empty one on any problem
    pub async fn load(path: &Path) -> Self {
        match Self::read(path).await {
            Ok(Some(original)) => {
                tracing::debug!(
                    cache_path = %path.display(),
                    files = original.len(),
                    "Loaded identifier cache"
                );
                Self::from_records(original)
            }
            Ok(None) => {
                tracing::debug!(cache_path = %path.display(), "No identifier cache yet");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!(
                    cache_path = %path.display(),
                    error = %e,
                    "Ignoring unreadable identifier cache; all files will be processed"
                );
                Self::empty()
            }
        }
    }

    async fn read(path: &Path) -> TestIdResult<Option<HashMap<String, FileRecord>>> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TestIdError::io("read", path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| TestIdError::cache(format!("{}: {}", path.display(), e)))
    }

    /// Classify a walked file; unchanged files keep their record for the next cache
    pub fn detect(&self, key: &str, mod_time: i64) -> FileState {
        match self.original.get(key) {
            Some(record) if record.mod_time == mod_time => {
                self.records.insert(key.to_string(), record.clone());
                FileState::Unchanged(record.ids.clone())
            }
            _ => FileState::Changed,
        }
    }

    /// Store the rebuilt record of a processed file
    pub fn record(&self, key: impl Into<String>, record: FileRecord) {
        self.records.insert(key.into(), record);
    }

    /// Rebuilt records sorted by path
    pub fn snapshot(&self) -> BTreeMap<String, FileRecord> {
        self.records
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Number of records in the previous cache
    pub fn original_len(&self) -> usize {
        self.original.len()
    }

    /// Replace the cache file with the rebuilt records
    pub async fn persist(&self, path: &Path) -> TestIdResult<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_string(&snapshot)
            .map_err(|e| TestIdError::cache(format!("can not serialize cache: {}", e)))?;
        write_replacing(path, &json).await?;

        tracing::debug!(
            cache_path = %path.display(),
            files = snapshot.len(),
            "Wrote identifier cache"
        );
        Ok(())
    }
}
