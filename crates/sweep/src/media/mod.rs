//! Media probe and transform capability.
//!
//! The decision engine only needs two things from a media toolkit: read a
//! clip's dimensions and duration, and write a transformed copy of it. Both
//! sit behind [`MediaTool`] so the pipeline can be driven without ffmpeg.

pub mod ffmpeg;

pub use ffmpeg::{build_ffmpeg_command, build_ffprobe_command, parse_ffprobe_output, Ffmpeg};

use crate::config::Resolution;
use std::future::Future;
use std::path::Path;
use thiserror::Error;

/// Error type for probe and transform operations
#[derive(Debug, Error)]
pub enum MediaError {
    /// The tool could not be started at all
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    /// Tool output could not be understood
    #[error("failed to parse probe output: {0}")]
    Parse(String),

    /// Probe succeeded but the field we need is absent
    #[error("probe result has no {0}")]
    Missing(&'static str),
}

/// What a probe reports about a clip.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MediaInfo {
    /// Dimensions of the first video stream.
    pub dimensions: Option<Resolution>,
    /// Container duration in seconds.
    pub duration_secs: Option<f64>,
}

impl MediaInfo {
    pub fn dimensions(&self) -> Result<Resolution, MediaError> {
        self.dimensions.ok_or(MediaError::Missing("video dimensions"))
    }

    pub fn duration_secs(&self) -> Result<f64, MediaError> {
        self.duration_secs.ok_or(MediaError::Missing("duration"))
    }
}

/// A single transform that writes one new file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    /// Re-encode the whole clip at a lower resolution.
    Scale(Resolution),
    /// Stream-copy from `start_secs` until the output reaches `max_bytes`.
    Segment { start_secs: f64, max_bytes: u64 },
    /// Emit frame number `index` as a still image.
    Frame { index: u32 },
}

/// Probe/transform capability used by the selector, chunker and frame extractor.
pub trait MediaTool {
    /// Read dimensions and duration of `path`.
    fn probe(&self, path: &Path) -> impl Future<Output = Result<MediaInfo, MediaError>> + Send;

    /// Write the result of `op` applied to `input` at `output`.
    fn transform(
        &self,
        input: &Path,
        output: &Path,
        op: &TransformOp,
    ) -> impl Future<Output = Result<(), MediaError>> + Send;
}
