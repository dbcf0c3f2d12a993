//! Retry ledger for clips whose delivery failed after they were renamed.
//!
//! Renaming happens before delivery, so without the ledger a clip that fails
//! to post is never looked at again. When enabled, the ledger remembers each
//! processed clip by canonical path and modification time, and lets the
//! scanner re-admit failed ones until they run out of attempts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Errors that can occur while loading or saving the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    Delivered,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Modification time in whole seconds since the epoch.
    pub mtime: i64,
    pub attempts: u32,
    pub status: LedgerStatus,
}

/// Persisted processing state keyed by canonical clip path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    entries: BTreeMap<PathBuf, LedgerEntry>,
}

/// Whole seconds since the epoch, negative for pre-epoch times.
pub fn mtime_secs(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

impl Ledger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the ledger to `path` via a temporary file and a rename.
    ///
    /// Entries whose files no longer exist are dropped first.
    pub fn save(&mut self, path: &Path) -> Result<(), LedgerError> {
        self.entries.retain(|clip, _| clip.exists());

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_string_pretty(self)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, clip: &Path) -> Option<&LedgerEntry> {
        self.entries.get(clip)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one processing attempt for the clip at `clip`.
    ///
    /// Attempts accumulate only while the modification time is unchanged;
    /// a different mtime means a different recording under the same name.
    pub fn record(&mut self, clip: &Path, modified: SystemTime, status: LedgerStatus) {
        let mtime = mtime_secs(modified);
        let attempts = match self.entries.get(clip) {
            Some(prev) if prev.mtime == mtime => prev.attempts + 1,
            _ => 1,
        };
        self.entries.insert(
            clip.to_path_buf(),
            LedgerEntry {
                mtime,
                attempts,
                status,
            },
        );
    }

    /// Paths of failed clips that may be tried again.
    ///
    /// A clip qualifies while its file still has the recorded mtime and it
    /// has used fewer than `retry_limit` attempts.
    pub fn retry_candidates(&self, retry_limit: u32) -> HashSet<PathBuf> {
        self.entries
            .iter()
            .filter(|(_, e)| e.status == LedgerStatus::Failed && e.attempts < retry_limit)
            .filter(|(path, e)| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map(|t| mtime_secs(t) == e.mtime)
                    .unwrap_or(false)
            })
            .map(|(path, _)| path.clone())
            .collect()
    }
}
