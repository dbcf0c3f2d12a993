//! Chunker module for splitting over-budget clips into byte-budgeted segments.
//!
//! Segments are cut by stream-copying from an advancing time offset with a
//! byte cap, measuring each segment's real duration and advancing by it
//! until the whole clip is covered.

use crate::media::{MediaError, MediaTool, TransformOp};
use crate::scan::bytes_to_mbytes;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Segments under this size at the end of a clip are dropped.
pub const NEGLIGIBLE_SEGMENT_BYTES: u64 = 1_048_576;

/// Error type for chunking; any of these abandons the whole clip.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// Probe or transform failed
    #[error("media tool failed: {0}")]
    Media(#[from] MediaError),

    /// A segment reported no playable duration, so the offset cannot advance
    #[error("segment {index} at {offset_secs:.2}s has no duration")]
    Stalled { index: usize, offset_secs: f64 },

    /// Scratch storage error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One ordered fragment of a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 0-based position within the clip; equals temporal order.
    pub index: usize,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Offset into the source clip where this segment starts.
    pub start_secs: f64,
    pub duration_secs: f64,
}

impl Segment {
    /// 1-based position for "i of N" captions.
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    pub fn mbytes(&self) -> f64 {
        bytes_to_mbytes(self.size_bytes)
    }
}

/// Limits applied while chunking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkLimits {
    /// Byte cap handed to the transform for every segment.
    pub max_segment_bytes: u64,
    /// Segment-count ceiling for one clip.
    pub max_segments: usize,
}

/// Result of chunking a clip.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// The clip is fully covered by these segments, in order.
    Segments(Vec<Segment>),
    /// More than `max_segments` would be needed; all segments were discarded.
    CeilingExceeded {
        /// Rough total segment count the clip would need.
        estimated_total: usize,
        duration_secs: f64,
    },
}

/// Scratch file name for segment `index` of a clip with stem `stem`.
///
/// The index is an explicit field on [`Segment`]; the zero padding only keeps
/// directory listings readable.
pub fn segment_file_name(stem: &str, index: usize) -> String {
    format!("{}.part{:03}.mp4", stem, index)
}

/// Estimate how many segments a clip needs from the segments cut so far.
pub fn estimate_total_segments(duration_secs: f64, covered_secs: f64, produced: usize) -> usize {
    if produced == 0 || covered_secs <= 0.0 {
        return produced + 1;
    }
    let mean = covered_secs / produced as f64;
    let estimate = (duration_secs / mean).ceil() as usize;
    estimate.max(produced + 1)
}

async fn remove_scratch(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
}

async fn discard(segments: &[Segment]) {
    for segment in segments {
        remove_scratch(&segment.path).await;
    }
}

/// Split `clip_path` into segments of at most `limits.max_segment_bytes`.
///
/// Segments are written to `scratch`. A trailing segment under
/// [`NEGLIGIBLE_SEGMENT_BYTES`] is dropped. If the clip needs more than
/// `limits.max_segments` segments, everything produced so far is removed and
/// [`ChunkOutcome::CeilingExceeded`] is returned. Any media failure removes
/// the produced segments and is returned as an error: a clip is never
/// delivered partially chunked.
pub async fn chunk_clip<M: MediaTool>(
    media: &M,
    clip_path: &Path,
    scratch: &Path,
    limits: ChunkLimits,
) -> Result<ChunkOutcome, ChunkError> {
    let stem = clip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());

    let duration = media.probe(clip_path).await?.duration_secs()?;
    info!(
        "Chunking {} ({:.2} seconds) into segments of at most {:.2}Mb",
        stem,
        duration,
        bytes_to_mbytes(limits.max_segment_bytes)
    );

    let mut segments: Vec<Segment> = Vec::new();
    let mut offset = 0.0;

    while offset < duration {
        let index = segments.len();
        if index >= limits.max_segments {
            let estimated_total = estimate_total_segments(duration, offset, index);
            warn!(
                "{} needs about {} segments, more than the limit of {}",
                stem, estimated_total, limits.max_segments
            );
            discard(&segments).await;
            return Ok(ChunkOutcome::CeilingExceeded {
                estimated_total,
                duration_secs: duration,
            });
        }

        let path = scratch.join(segment_file_name(&stem, index));
        let op = TransformOp::Segment {
            start_secs: offset,
            max_bytes: limits.max_segment_bytes,
        };

        let produced = async {
            media.transform(clip_path, &path, &op).await?;
            let seg_duration = media.probe(&path).await?.duration_secs()?;
            let size_bytes = tokio::fs::metadata(&path).await?.len();
            Ok::<_, ChunkError>((seg_duration, size_bytes))
        }
        .await;

        let (seg_duration, size_bytes) = match produced {
            Ok(v) => v,
            Err(e) => {
                discard(&segments).await;
                remove_scratch(&path).await;
                return Err(e);
            }
        };

        // A negligible tail may probe with no duration at all.
        if size_bytes < NEGLIGIBLE_SEGMENT_BYTES {
            info!(
                "Dropping {:.2}Mb tail of {} after {:.2} seconds",
                bytes_to_mbytes(size_bytes),
                stem,
                offset
            );
            remove_scratch(&path).await;
            break;
        }

        if seg_duration <= 0.0 {
            discard(&segments).await;
            remove_scratch(&path).await;
            return Err(ChunkError::Stalled {
                index,
                offset_secs: offset,
            });
        }

        let start_secs = offset;
        offset += seg_duration;

        segments.push(Segment {
            index,
            path,
            size_bytes,
            start_secs,
            duration_secs: seg_duration,
        });
    }

    Ok(ChunkOutcome::Segments(segments))
}
