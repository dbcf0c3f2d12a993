//! Motion Sweep
//!
//! Periodic sweeper for a motion-camera recording tree: picks up freshly
//! finished clips, renames them to a canonical timestamped name and posts
//! them to a chat channel, downscaling, splitting or degrading to a still
//! frame when a clip is over the channel's size budget.

pub mod canonical;
pub mod chunker;
pub mod decision;
pub mod deliver;
pub mod downscale;
pub mod frame;
pub mod housekeep;
pub mod ledger;
pub mod media;
pub mod report;
pub mod scan;
pub mod startup;
pub mod sweep;

#[cfg(test)]
mod test_support;

pub use motion_sweep_config as config;
pub use motion_sweep_config::{Config, ConfigError, Resolution};
pub use canonical::{canonical_name, Canonicalizer, CANONICAL_PATTERN};
pub use chunker::{chunk_clip, ChunkError, ChunkLimits, ChunkOutcome, Segment};
pub use decision::{ClipOutcome, DecisionEngine, EngineSettings};
pub use deliver::{DeliveryChannel, DeliveryError, MediaKind, TelegramChannel};
pub use downscale::{downscale, select_lower_resolution, Downscale};
pub use frame::extract_frame;
pub use housekeep::{housekeep, HousekeepReport};
pub use ledger::{Ledger, LedgerError, LedgerStatus};
pub use media::{Ffmpeg, MediaError, MediaInfo, MediaTool, TransformOp};
pub use report::SweepReport;
pub use scan::{find_new_clips, AgeWindow, Clip, PROCESSED_MARKER};
pub use startup::{check_tool_available, run_startup_checks, StartupError};
pub use sweep::{Sweep, SweepError};
