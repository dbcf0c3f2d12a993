//! Resolution selector for over-budget clips.
//!
//! Picks the next step down in the configured catalog that keeps the clip's
//! aspect ratio, and re-encodes the clip at that size into scratch storage.

use crate::config::Resolution;
use crate::media::{MediaTool, TransformOp};
use crate::scan::bytes_to_mbytes;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Outcome of a downscale attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Downscale {
    /// Nothing changed: probe failed, no smaller catalog entry, or the
    /// transform failed. The caller carries on with the original clip.
    Unchanged,
    /// A smaller copy was written to scratch storage.
    Scaled {
        path: PathBuf,
        size_bytes: u64,
        scale: Resolution,
    },
}

/// Largest catalog entry with the same aspect ratio and strictly fewer pixels.
///
/// Returns the smallest step down rather than the most aggressive shrink, so
/// 1920:1080 against {1920:1080, 1280:720, 854:480} gives 1280:720.
pub fn select_lower_resolution(current: Resolution, catalog: &[Resolution]) -> Option<Resolution> {
    let mut eligible: Vec<Resolution> = catalog
        .iter()
        .copied()
        .filter(|r| r.same_aspect(&current) && r.pixels() < current.pixels())
        .collect();
    eligible.sort_by_key(Resolution::pixels);
    eligible.last().copied()
}

/// Scratch path for the downscaled copy of `clip_path`.
pub fn scaled_path(scratch: &Path, clip_path: &Path, scale: Resolution) -> PathBuf {
    let stem = clip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    let ext = clip_path
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mp4".to_string());
    scratch.join(format!("{}-{}x{}.{}", stem, scale.width, scale.height, ext))
}

/// Try one downscale step for `clip_path`.
///
/// Failures are logged and reported as [`Downscale::Unchanged`]; they never
/// escalate past the caller.
pub async fn downscale<M: MediaTool>(
    media: &M,
    clip_path: &Path,
    scratch: &Path,
    catalog: &[Resolution],
) -> Downscale {
    let current = match media.probe(clip_path).await.and_then(|info| info.dimensions()) {
        Ok(dims) => dims,
        Err(e) => {
            error!("Cannot read dimensions of {}: {}", clip_path.display(), e);
            return Downscale::Unchanged;
        }
    };
    debug!("{} scale is currently {}", clip_path.display(), current);

    let Some(scale) = select_lower_resolution(current, catalog) else {
        warn!("No lower resolutions with same aspect ratio as {}", current);
        return Downscale::Unchanged;
    };

    info!("Downscaling from {} to {}", current, scale);
    let output = scaled_path(scratch, clip_path, scale);
    if let Err(e) = media
        .transform(clip_path, &output, &TransformOp::Scale(scale))
        .await
    {
        error!("Downscale of {} failed: {}", clip_path.display(), e);
        return Downscale::Unchanged;
    }

    match tokio::fs::metadata(&output).await {
        Ok(metadata) => {
            info!("New size is {:.2}Mb", bytes_to_mbytes(metadata.len()));
            Downscale::Scaled {
                path: output,
                size_bytes: metadata.len(),
                scale,
            }
        }
        Err(e) => {
            error!("Downscaled file {} is unreadable: {}", output.display(), e);
            Downscale::Unchanged
        }
    }
}
