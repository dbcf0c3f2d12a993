//! Per-sweep summary.

use crate::decision::ClipOutcome;
use chrono::{DateTime, Local};
use serde::Serialize;
use uuid::Uuid;

/// Counts and identity for one sweep, logged at the end and optionally
/// written out as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    /// Serialized as RFC 3339.
    pub started_at: DateTime<Local>,
    pub dry_run: bool,
    pub housekept: usize,
    pub discovered: usize,
    pub delivered: usize,
    pub downscaled: usize,
    pub chunked: usize,
    pub degraded: usize,
    pub too_small: usize,
    pub abandoned: usize,
    pub failed_deliveries: usize,
    /// Set when a catastrophic error ended the sweep early.
    pub aborted: Option<String>,
}

impl SweepReport {
    pub fn new(started_at: DateTime<Local>, dry_run: bool) -> Self {
        Self {
            sweep_id: Uuid::new_v4(),
            started_at,
            dry_run,
            housekept: 0,
            discovered: 0,
            delivered: 0,
            downscaled: 0,
            chunked: 0,
            degraded: 0,
            too_small: 0,
            abandoned: 0,
            failed_deliveries: 0,
            aborted: None,
        }
    }

    /// Fold one clip outcome into the counters.
    pub fn record(&mut self, outcome: &ClipOutcome) {
        match outcome {
            ClipOutcome::TooSmall => self.too_small += 1,
            ClipOutcome::Delivered { delivered } => {
                self.delivered += 1;
                if !delivered {
                    self.failed_deliveries += 1;
                }
            }
            ClipOutcome::Downscaled { delivered, .. } => {
                self.downscaled += 1;
                if !delivered {
                    self.failed_deliveries += 1;
                }
            }
            ClipOutcome::Chunked {
                failed_deliveries, ..
            } => {
                self.chunked += 1;
                self.failed_deliveries += failed_deliveries;
            }
            ClipOutcome::Degraded { delivered, .. } => {
                self.degraded += 1;
                if !delivered {
                    self.failed_deliveries += 1;
                }
            }
            ClipOutcome::Abandoned { .. } => self.abandoned += 1,
        }
    }

    /// Clips that reached a terminal outcome.
    pub fn processed(&self) -> usize {
        self.too_small + self.delivered + self.downscaled + self.chunked + self.degraded + self.abandoned
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// One-line summary for the log.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} of {} clips processed: {} delivered, {} downscaled, {} chunked, {} degraded, {} too small, {} abandoned; {} failed deliveries; {} housekept",
            self.processed(),
            self.discovered,
            self.delivered,
            self.downscaled,
            self.chunked,
            self.degraded,
            self.too_small,
            self.abandoned,
            self.failed_deliveries,
            self.housekept,
        );
        if let Some(reason) = &self.aborted {
            line.push_str(&format!(" (aborted: {})", reason));
        }
        line
    }
}
