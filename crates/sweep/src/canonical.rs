//! Canonical renaming of discovered clips.
//!
//! Each clip is renamed in place to a name derived from its modification
//! time, e.g. `Saturday-03-April@06:18.21.mp4`. The `@` doubles as the
//! processed marker the scanner looks for on the next sweep.

use crate::scan::{Clip, PROCESSED_MARKER};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// strftime pattern of the canonical stem; must contain [`PROCESSED_MARKER`].
pub const CANONICAL_PATTERN: &str = "%A-%d-%B@%H:%M.%S";

/// Extension given to every canonical clip name.
pub const CANONICAL_EXTENSION: &str = "mp4";

/// Canonical file name for a clip modified at `modified`.
///
/// `attempt` 0 is the plain name; higher attempts add a `-N` suffix (starting
/// at `-2`) used when two clips in one directory share a second.
pub fn canonical_name(modified: DateTime<Local>, attempt: u32) -> String {
    let stem = modified.format(CANONICAL_PATTERN);
    if attempt == 0 {
        format!("{}.{}", stem, CANONICAL_EXTENSION)
    } else {
        format!("{}-{}.{}", stem, attempt + 1, CANONICAL_EXTENSION)
    }
}

/// Renames clips to their canonical names, once per clip per sweep.
///
/// Tracks names handed out during the sweep so that collisions are avoided
/// in dry-run mode too, where nothing lands on disk.
#[derive(Debug, Default)]
pub struct Canonicalizer {
    dry_run: bool,
    claimed: HashSet<PathBuf>,
}

impl Canonicalizer {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            claimed: HashSet::new(),
        }
    }

    /// Pick a free canonical path in `dir` for a clip modified at `modified`.
    fn target_path(&self, dir: &Path, current: &Path, modified: DateTime<Local>) -> PathBuf {
        let mut attempt = 0;
        loop {
            let candidate = dir.join(canonical_name(modified, attempt));
            let taken = candidate != current
                && (self.claimed.contains(&candidate) || candidate.exists());
            if !taken {
                return candidate;
            }
            attempt += 1;
        }
    }

    /// Rename `clip` in place and update its `path` and `name`.
    ///
    /// A clip whose name already carries the marker (re-admitted by the retry
    /// ledger) keeps its name. In dry-run mode only `name` changes; the file
    /// and `path` are left untouched.
    pub fn canonicalize(&mut self, clip: &mut Clip) -> io::Result<()> {
        info!(
            "Found '{}', modified {:.2} seconds ago, {:.2} Mbytes",
            clip.name,
            clip.age_secs,
            clip.mbytes()
        );

        let current_name = clip
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if current_name.contains(PROCESSED_MARKER) {
            clip.name = current_name;
            self.claimed.insert(clip.path.clone());
            return Ok(());
        }

        let dir = clip.path.parent().unwrap_or_else(|| Path::new("."));
        let modified: DateTime<Local> = clip.modified.into();
        let target = self.target_path(dir, &clip.path, modified);

        info!("Moving {}", clip.path.display());
        info!("to :   {}", target.display());

        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !self.dry_run {
            fs::rename(&clip.path, &target)?;
            clip.path = target.clone();
        }
        clip.name = target_name;
        self.claimed.insert(target);
        Ok(())
    }
}
