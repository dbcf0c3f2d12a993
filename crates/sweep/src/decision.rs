//! Decision engine: deliver, downscale, chunk or degrade.
//!
//! Every clip is classified against the delivery budget once and takes
//! exactly one path through the tree below; nothing loops back.
//!
//! ```text
//! size < min                  -> TooSmall (skip)
//! min <= size <= max          -> deliver unchanged
//! size > max                  -> downscale one step (if enabled)
//!     fits now                -> deliver downscaled copy
//!     unchanged / still big   -> chunk
//!         segments            -> deliver each, "i of N"
//!         ceiling exceeded    -> deliver one still frame
//!         media failure       -> abandon
//! ```

use crate::chunker::{chunk_clip, ChunkLimits, ChunkOutcome, Segment};
use crate::config::{Config, Resolution};
use crate::deliver::{DeliveryChannel, MediaKind};
use crate::downscale::{downscale, Downscale};
use crate::frame::extract_frame;
use crate::media::MediaTool;
use crate::scan::{bytes_to_mbytes, Clip};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Where a size falls relative to the delivery budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    TooSmall,
    WithinBudget,
    OverBudget,
}

/// Classify `mbytes` against `[min, max]`; both bounds are inclusive.
pub fn classify_size(mbytes: f64, min_mbytes: f64, max_mbytes: f64) -> SizeClass {
    if mbytes < min_mbytes {
        SizeClass::TooSmall
    } else if mbytes <= max_mbytes {
        SizeClass::WithinBudget
    } else {
        SizeClass::OverBudget
    }
}

/// Terminal outcome for one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClipOutcome {
    /// Below the minimum deliverable size; nothing posted.
    TooSmall,
    /// Posted unchanged.
    Delivered { delivered: bool },
    /// Posted as a downscaled copy.
    Downscaled {
        scale: Resolution,
        mbytes: f64,
        delivered: bool,
    },
    /// Posted as an ordered series of segments.
    Chunked {
        segments: usize,
        failed_deliveries: usize,
        scale: Option<Resolution>,
    },
    /// Too many segments needed; a still frame was posted instead.
    Degraded {
        estimated_segments: usize,
        delivered: bool,
    },
    /// Probe/transform failure; nothing posted.
    Abandoned { reason: String },
}

impl ClipOutcome {
    /// Whether any intended delivery for the clip did not go through.
    pub fn is_failure(&self) -> bool {
        match self {
            ClipOutcome::TooSmall => false,
            ClipOutcome::Delivered { delivered }
            | ClipOutcome::Downscaled { delivered, .. }
            | ClipOutcome::Degraded { delivered, .. } => !delivered,
            ClipOutcome::Chunked {
                failed_deliveries, ..
            } => *failed_deliveries > 0,
            ClipOutcome::Abandoned { .. } => true,
        }
    }
}

/// Uppercase the first character and lowercase the rest (`FRONT` -> `Front`).
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn scale_note(scale: Option<Resolution>) -> String {
    scale.map(|s| format!(" ({})", s)).unwrap_or_default()
}

/// Caption for a whole clip, optionally annotated with its new scale.
pub fn clip_caption(camera: &str, base: &str, mbytes: f64, scale: Option<Resolution>) -> String {
    format!(
        "{} - {}, {:.2}Mb{}",
        capitalize(camera),
        base,
        mbytes,
        scale_note(scale)
    )
}

/// Caption for segment `ordinal` of `total`.
pub fn segment_caption(
    camera: &str,
    base: &str,
    ordinal: usize,
    total: usize,
    mbytes: f64,
    scale: Option<Resolution>,
) -> String {
    format!(
        "{} - {} [{} of {}], {:.2}Mb{}",
        capitalize(camera),
        base,
        ordinal,
        total,
        mbytes,
        scale_note(scale)
    )
}

/// Caption for the still posted when a clip needs too many segments.
pub fn overflow_caption(
    camera: &str,
    base: &str,
    estimated: usize,
    max_chunks: usize,
    mbytes: f64,
) -> String {
    format!(
        "{} - {} too long to post: ~{} clips needed, limit is {}, {:.2}Mb",
        capitalize(camera),
        base,
        estimated,
        max_chunks,
        mbytes
    )
}

/// Settings the engine needs, lifted out of [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub min_mbytes: f64,
    pub max_mbytes: f64,
    pub max_chunks: usize,
    pub fallback_frame: u32,
    /// Catalog to downscale from; `None` when downscaling is disabled.
    pub resolutions: Option<Vec<Resolution>>,
    pub dry_run: bool,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_mbytes: config.delivery.min_mbytes,
            max_mbytes: config.delivery.max_mbytes,
            max_chunks: config.delivery.max_chunks,
            fallback_frame: config.delivery.fallback_frame,
            resolutions: config
                .downscale
                .enabled
                .then(|| config.downscale.resolutions.clone()),
            dry_run: config.dry_run,
        }
    }

    /// Byte cap for a single segment.
    pub fn max_segment_bytes(&self) -> u64 {
        (self.max_mbytes * 1_048_576.0).floor() as u64
    }

    fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_segment_bytes: self.max_segment_bytes(),
            max_segments: self.max_chunks,
        }
    }
}

/// Runs the per-clip decision tree against a media tool and a channel.
pub struct DecisionEngine<'a, M, D> {
    settings: &'a EngineSettings,
    media: &'a M,
    channel: &'a D,
    scratch: &'a Path,
}

impl<'a, M: MediaTool, D: DeliveryChannel> DecisionEngine<'a, M, D> {
    pub fn new(settings: &'a EngineSettings, media: &'a M, channel: &'a D, scratch: &'a Path) -> Self {
        Self {
            settings,
            media,
            channel,
            scratch,
        }
    }

    /// Take one clip through the decision tree.
    pub async fn process(&self, clip: &Clip) -> ClipOutcome {
        let mbytes = clip.mbytes();
        let base = clip.base_name();

        match classify_size(mbytes, self.settings.min_mbytes, self.settings.max_mbytes) {
            SizeClass::TooSmall => {
                warn!("{} is too small to post [{:.2}]Mb", base, mbytes);
                ClipOutcome::TooSmall
            }
            SizeClass::WithinBudget => {
                let caption = clip_caption(&clip.camera, base, mbytes, None);
                let delivered = self.post(MediaKind::Video, &clip.path, &caption).await;
                ClipOutcome::Delivered { delivered }
            }
            SizeClass::OverBudget => self.process_over_budget(clip).await,
        }
    }

    async fn process_over_budget(&self, clip: &Clip) -> ClipOutcome {
        let base = clip.base_name();
        let max = self.settings.max_mbytes;

        let downscaled = match &self.settings.resolutions {
            Some(catalog) => {
                info!("{:.2}Mb > {}Mb so trying to downscale", clip.mbytes(), max);
                downscale(self.media, &clip.path, self.scratch, catalog).await
            }
            None => Downscale::Unchanged,
        };

        let (source, mbytes, scale, temp): (PathBuf, f64, Option<Resolution>, Option<PathBuf>) =
            match downscaled {
                Downscale::Scaled {
                    path,
                    size_bytes,
                    scale,
                } => (path.clone(), bytes_to_mbytes(size_bytes), Some(scale), Some(path)),
                Downscale::Unchanged => (clip.path.clone(), clip.mbytes(), None, None),
            };

        if let Some(scale) = scale {
            if mbytes <= max {
                let caption = clip_caption(&clip.camera, base, mbytes, Some(scale));
                let delivered = self.post(MediaKind::Video, &source, &caption).await;
                self.remove_scratch(&source).await;
                return ClipOutcome::Downscaled {
                    scale,
                    mbytes,
                    delivered,
                };
            }
            info!("Still {:.2}Mb after downscaling to {}, chunking", mbytes, scale);
        }

        let outcome = match chunk_clip(self.media, &source, self.scratch, self.settings.chunk_limits()).await {
            Ok(ChunkOutcome::Segments(segments)) if segments.is_empty() => ClipOutcome::Abandoned {
                reason: "chunking produced no segments".to_string(),
            },
            Ok(ChunkOutcome::Segments(segments)) => self.deliver_segments(clip, &segments, scale).await,
            Ok(ChunkOutcome::CeilingExceeded {
                estimated_total, ..
            }) => self.deliver_still(clip, &source, estimated_total).await,
            Err(e) => {
                error!("Chunking {} failed: {}", base, e);
                ClipOutcome::Abandoned {
                    reason: e.to_string(),
                }
            }
        };

        if let Some(temp) = temp {
            self.remove_scratch(&temp).await;
        }
        outcome
    }

    async fn deliver_segments(
        &self,
        clip: &Clip,
        segments: &[Segment],
        scale: Option<Resolution>,
    ) -> ClipOutcome {
        let total = segments.len();
        let mut failed_deliveries = 0;

        for segment in segments {
            let caption = segment_caption(
                &clip.camera,
                clip.base_name(),
                segment.ordinal(),
                total,
                segment.mbytes(),
                scale,
            );
            if !self.post(MediaKind::Video, &segment.path, &caption).await {
                failed_deliveries += 1;
            }
            self.remove_scratch(&segment.path).await;
        }

        ClipOutcome::Chunked {
            segments: total,
            failed_deliveries,
            scale,
        }
    }

    async fn deliver_still(&self, clip: &Clip, source: &Path, estimated_segments: usize) -> ClipOutcome {
        let caption = overflow_caption(
            &clip.camera,
            clip.base_name(),
            estimated_segments,
            self.settings.max_chunks,
            clip.mbytes(),
        );

        let delivered = match extract_frame(self.media, source, self.scratch, self.settings.fallback_frame).await {
            Some(frame) => {
                let delivered = self.post(MediaKind::Photo, &frame, &caption).await;
                self.remove_scratch(&frame).await;
                delivered
            }
            None => false,
        };

        ClipOutcome::Degraded {
            estimated_segments,
            delivered,
        }
    }

    /// Hand a file to the channel; log and swallow failures.
    ///
    /// Returns true when the channel accepted the file, or in dry-run mode.
    async fn post(&self, kind: MediaKind, path: &Path, caption: &str) -> bool {
        info!("Posting {} {} '{}'", kind, path.display(), caption);
        if self.settings.dry_run {
            return true;
        }
        match self.channel.deliver(kind, path, caption).await {
            Ok(()) => true,
            Err(e) => {
                error!("Delivery of {} failed: {}", path.display(), e);
                false
            }
        }
    }

    async fn remove_scratch(&self, path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
