//! Retention sweep: delete clips older than the configured number of days.
//!
//! Runs once per sweep before discovery and ignores the processed marker:
//! renamed and untouched clips age out alike.

use crate::scan::{age_secs, walk_clip_files};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::{error, info};

const SECS_PER_DAY: f64 = 86_400.0;

/// Counts from one housekeeping pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HousekeepReport {
    pub removed: usize,
    pub failed: usize,
}

/// Delete every clip under `root` older than `max_days_to_keep` days.
///
/// In dry-run mode the removals are only logged. A file that cannot be
/// removed is logged and counted, and the pass carries on.
pub fn housekeep(
    root: &Path,
    extensions: &[String],
    max_days_to_keep: f64,
    now: SystemTime,
    dry_run: bool,
) -> HousekeepReport {
    let mut report = HousekeepReport::default();

    for entry in walk_clip_files(root, extensions) {
        let path = entry.path();
        let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) else {
            continue;
        };
        let age_days = age_secs(modified, now) / SECS_PER_DAY;
        if age_days <= max_days_to_keep {
            continue;
        }

        let shown = path.strip_prefix(root).unwrap_or(path);
        info!("Removing {} which is {:.2} days old", shown.display(), age_days);
        if dry_run {
            report.removed += 1;
            continue;
        }
        match fs::remove_file(path) {
            Ok(()) => report.removed += 1,
            Err(e) => {
                error!("Failed to remove {}: {}", path.display(), e);
                report.failed += 1;
            }
        }
    }

    report
}
