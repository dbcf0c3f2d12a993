//! In-memory media and delivery fakes shared by the unit tests.

use crate::config::Resolution;
use crate::deliver::{DeliveryChannel, DeliveryError, MediaKind};
use crate::media::{MediaError, MediaInfo, MediaTool, TransformOp};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const MB: u64 = 1_048_576;

/// Create a sparse file of `bytes` bytes at `path`.
pub fn write_sized(path: &Path, bytes: u64) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    File::create(path).unwrap().set_len(bytes).unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub input: PathBuf,
    pub output: PathBuf,
    pub op: TransformOp,
}

/// Scripted [`MediaTool`].
///
/// Probing an input returns the configured source info; probing a file the
/// fake produced returns what it was scripted with. Segment transforms follow
/// `segments` in order, repeating the last entry once the script runs out.
#[derive(Debug, Default)]
pub struct FakeMedia {
    dimensions: Option<Resolution>,
    duration_secs: Option<f64>,
    scaled_bytes: u64,
    segments: Vec<(u64, f64)>,
    probe_fails: bool,
    transforms_fail: bool,
    fail_segment_at: Option<usize>,
    produced: Mutex<HashMap<PathBuf, MediaInfo>>,
    log: Mutex<Vec<Transform>>,
}

impl FakeMedia {
    pub fn new() -> Self {
        Self {
            scaled_bytes: 4 * MB,
            ..Self::default()
        }
    }

    pub fn with_dimensions(mut self, dims: Resolution) -> Self {
        self.dimensions = Some(dims);
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_scaled_bytes(mut self, bytes: u64) -> Self {
        self.scaled_bytes = bytes;
        self
    }

    pub fn with_segments(mut self, plan: &[(u64, f64)]) -> Self {
        self.segments = plan.to_vec();
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.probe_fails = true;
        self
    }

    pub fn failing_transforms(mut self) -> Self {
        self.transforms_fail = true;
        self
    }

    pub fn failing_segment_at(mut self, index: usize) -> Self {
        self.fail_segment_at = Some(index);
        self
    }

    pub fn transforms(&self) -> Vec<Transform> {
        self.log.lock().unwrap().clone()
    }

    fn segment_count(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|t| matches!(t.op, TransformOp::Segment { .. }))
            .count()
    }

    fn failure(&self) -> MediaError {
        MediaError::Failed {
            tool: "ffmpeg",
            status: "exit status: 1".to_string(),
            stderr: "scripted failure".to_string(),
        }
    }
}

impl MediaTool for FakeMedia {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        if self.probe_fails {
            return Err(MediaError::Failed {
                tool: "ffprobe",
                status: "exit status: 1".to_string(),
                stderr: "scripted failure".to_string(),
            });
        }
        if let Some(info) = self.produced.lock().unwrap().get(path) {
            return Ok(*info);
        }
        Ok(MediaInfo {
            dimensions: self.dimensions,
            duration_secs: self.duration_secs,
        })
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        op: &TransformOp,
    ) -> Result<(), MediaError> {
        let segment_index = self.segment_count();
        self.log.lock().unwrap().push(Transform {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            op: *op,
        });

        if self.transforms_fail {
            return Err(self.failure());
        }

        let info = match op {
            TransformOp::Scale(res) => {
                write_sized(output, self.scaled_bytes);
                MediaInfo {
                    dimensions: Some(*res),
                    duration_secs: self.duration_secs,
                }
            }
            TransformOp::Segment { .. } => {
                if self.fail_segment_at == Some(segment_index) {
                    return Err(self.failure());
                }
                let (bytes, secs) = self
                    .segments
                    .get(segment_index)
                    .or_else(|| self.segments.last())
                    .copied()
                    .unwrap_or((0, 0.0));
                write_sized(output, bytes);
                MediaInfo {
                    dimensions: self.dimensions,
                    duration_secs: Some(secs),
                }
            }
            TransformOp::Frame { .. } => {
                write_sized(output, 64 * 1024);
                MediaInfo::default()
            }
        };

        self.produced
            .lock()
            .unwrap()
            .insert(output.to_path_buf(), info);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Posted {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub caption: String,
    /// Whether the file existed when it was handed over.
    pub existed: bool,
}

/// [`DeliveryChannel`] that records every call and optionally fails them.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    fail: bool,
    posted: Mutex<Vec<Posted>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.posted.lock().unwrap().clone()
    }

    pub fn captions(&self) -> Vec<String> {
        self.posted().into_iter().map(|p| p.caption).collect()
    }
}

impl DeliveryChannel for RecordingChannel {
    async fn deliver(&self, kind: MediaKind, path: &Path, caption: &str) -> Result<(), DeliveryError> {
        self.posted.lock().unwrap().push(Posted {
            kind,
            path: path.to_path_buf(),
            caption: caption.to_string(),
            existed: path.exists(),
        });
        if self.fail {
            return Err(DeliveryError::Rejected("Bad Request: scripted".to_string()));
        }
        Ok(())
    }
}
