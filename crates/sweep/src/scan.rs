//! Scanner module for discovering freshly recorded clips.
//!
//! Recursively walks the camera root for clip files, drops anything that
//! already carries the canonical-name marker, and keeps only clips inside the
//! age window, oldest first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;
use walkdir::WalkDir;

/// Character embedded in every canonical name; its presence means "handled".
pub const PROCESSED_MARKER: char = '@';

const BYTES_PER_MBYTE: f64 = 1_048_576.0;

/// A clip discovered during scanning.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Full path to the clip file.
    pub path: PathBuf,
    /// Camera owning the clip: first path component below the root.
    pub camera: String,
    /// Path relative to the root until renamed, then the canonical file name.
    pub name: String,
    /// Last modified time of the file.
    pub modified: SystemTime,
    /// Seconds between `modified` and discovery.
    pub age_secs: f64,
    /// File size in bytes at discovery time.
    pub size_bytes: u64,
}

impl Clip {
    /// Size in (binary) megabytes, as used for every budget comparison.
    pub fn mbytes(&self) -> f64 {
        bytes_to_mbytes(self.size_bytes)
    }

    /// File name without its extension, used in captions.
    pub fn base_name(&self) -> &str {
        let file = self.name.rsplit('/').next().unwrap_or(&self.name);
        match file.rfind('.') {
            Some(dot) if dot > 0 => &file[..dot],
            _ => file,
        }
    }
}

/// Convert a byte count to fractional megabytes (2^20 bytes).
pub fn bytes_to_mbytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MBYTE
}

/// Age window a clip must fall into to be processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeWindow {
    /// Younger clips may still be written.
    pub min_secs: f64,
    /// Older clips are stale.
    pub max_secs: f64,
}

/// Where a clip's age falls relative to an [`AgeWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeClass {
    TooYoung,
    Eligible,
    Stale,
}

impl AgeWindow {
    pub fn classify(&self, age_secs: f64) -> AgeClass {
        if age_secs > self.max_secs {
            AgeClass::Stale
        } else if age_secs < self.min_secs {
            AgeClass::TooYoung
        } else {
            AgeClass::Eligible
        }
    }
}

/// Seconds elapsed from `modified` to `now`; a timestamp in the future counts as zero.
pub fn age_secs(modified: SystemTime, now: SystemTime) -> f64 {
    now.duration_since(modified)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Checks if a file has one of the given extensions (case-insensitive, no dot).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Checks if the file name (not the directories above it) carries the marker.
pub fn has_processed_marker(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.contains(PROCESSED_MARKER))
        .unwrap_or(false)
}

/// Camera name for a clip: the first component of its path below `root`.
///
/// Clips stored directly in the root belong to the root directory itself.
pub fn camera_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut components = relative.components();
    let first = components.next();
    match (first, components.next()) {
        (Some(dir), Some(_)) => dir.as_os_str().to_string_lossy().into_owned(),
        _ => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// Walk `root` for files with a clip extension, skipping hidden directories.
pub fn walk_clip_files<'a>(
    root: &Path,
    extensions: &'a [String],
) -> impl Iterator<Item = walkdir::DirEntry> + 'a {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            // Allow the root directory even if it starts with '.'
            !(entry.file_type().is_dir()
                && entry.depth() > 0
                && entry
                    .file_name()
                    .to_str()
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false))
        })
        .filter_map(|e| e.ok())
        .filter(move |e| e.file_type().is_file() && has_extension(e.path(), extensions))
}

/// Finds clips that are ready to be delivered.
///
/// This function:
/// - Recursively walks `root` for files with one of `extensions`
/// - Excludes files whose name carries [`PROCESSED_MARKER`], unless listed in `readmit`
/// - Warns about and skips clips outside `window` (too young or stale)
/// - Returns the survivors oldest first
///
/// An empty result is a normal "nothing to do".
pub fn find_new_clips(
    root: &Path,
    extensions: &[String],
    window: AgeWindow,
    now: SystemTime,
    readmit: &HashSet<PathBuf>,
) -> Vec<Clip> {
    let mut clips = Vec::new();

    for entry in walk_clip_files(root, extensions) {
        let path = entry.path();

        if has_processed_marker(path) && !readmit.contains(path) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                continue;
            }
        };
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let age = age_secs(modified, now);

        match window.classify(age) {
            AgeClass::Stale => {
                warn!("{} is too old to process ({:.2} seconds old)", path.display(), age);
                continue;
            }
            AgeClass::TooYoung => {
                warn!("{} is too young to process ({:.2} seconds old)", path.display(), age);
                continue;
            }
            AgeClass::Eligible => {}
        }

        let name = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        clips.push(Clip {
            path: path.to_path_buf(),
            camera: camera_for(root, path),
            name,
            modified,
            age_secs: age,
            size_bytes: metadata.len(),
        });
    }

    sort_oldest_first(&mut clips);
    clips
}

/// Sort clips by descending age so a backlog drains in recording order.
pub fn sort_oldest_first(clips: &mut [Clip]) {
    clips.sort_by(|a, b| b.age_secs.total_cmp(&a.age_secs));
}
