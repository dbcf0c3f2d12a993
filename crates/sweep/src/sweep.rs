//! One sweep over the watched tree.
//!
//! Housekeeping first, then discovery, then every eligible clip in turn:
//! rename to its canonical name, then hand it to the decision engine. Clips
//! are processed strictly one after another so deliveries arrive in
//! recording order.

use crate::canonical::Canonicalizer;
use crate::config::Config;
use crate::decision::{ClipOutcome, DecisionEngine, EngineSettings};
use crate::deliver::DeliveryChannel;
use crate::housekeep::housekeep;
use crate::ledger::{Ledger, LedgerError, LedgerStatus};
use crate::media::MediaTool;
use crate::report::SweepReport;
use crate::scan::{find_new_clips, AgeWindow, Clip};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

/// Errors that end a sweep early.
///
/// Everything else (unrenamable clips, probe failures, rejected deliveries,
/// undeletable files) is logged where it happens and the sweep moves on.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("scratch directory: {0}")]
    Scratch(#[from] std::io::Error),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Ledger status recorded for a clip outcome.
pub fn ledger_status(outcome: &ClipOutcome) -> LedgerStatus {
    match outcome {
        ClipOutcome::TooSmall => LedgerStatus::Skipped,
        o if o.is_failure() => LedgerStatus::Failed,
        _ => LedgerStatus::Delivered,
    }
}

/// A configured sweep bound to a media tool and a delivery channel.
pub struct Sweep<M, D> {
    config: Config,
    media: M,
    channel: D,
}

impl<M: MediaTool, D: DeliveryChannel> Sweep<M, D> {
    pub fn new(config: Config, media: M, channel: D) -> Self {
        Self {
            config,
            media,
            channel,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn channel(&self) -> &D {
        &self.channel
    }

    /// Run one full sweep as of `now`.
    ///
    /// Never fails: a catastrophic error is logged and recorded in the
    /// report's `aborted` field.
    pub async fn run(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::new(DateTime::<Local>::from(now), self.config.dry_run);
        let span = info_span!("sweep", id = %report.sweep_id);

        async {
            if let Err(e) = self.sweep(now, &mut report).await {
                error!("Sweep aborted: {}", e);
                report.aborted = Some(e.to_string());
            }
            info!("{}", report.summary());
        }
        .instrument(span)
        .await;

        report
    }

    async fn sweep(&self, now: SystemTime, report: &mut SweepReport) -> Result<(), SweepError> {
        let cfg = &self.config;
        let root = &cfg.scan.root;

        info!(
            "Sweeping {} for clips aged {}s to {}s{}",
            root.display(),
            cfg.scan.min_age_seconds,
            cfg.scan.max_age_seconds,
            if cfg.dry_run { " (dry run)" } else { "" }
        );

        let kept = housekeep(
            root,
            &cfg.scan.extensions,
            cfg.housekeeping.max_days_to_keep,
            now,
            cfg.dry_run,
        );
        report.housekept = kept.removed;

        let ledger_path = root.join(&cfg.ledger.file_name);
        let mut ledger = if cfg.ledger.enabled() {
            match Ledger::load(&ledger_path) {
                Ok(ledger) => Some(ledger),
                Err(e) => {
                    warn!("Ignoring unreadable ledger {}: {}", ledger_path.display(), e);
                    Some(Ledger::default())
                }
            }
        } else {
            None
        };
        let readmit = ledger
            .as_ref()
            .map(|l| l.retry_candidates(cfg.ledger.retry_limit))
            .unwrap_or_else(HashSet::new);

        let window = AgeWindow {
            min_secs: cfg.scan.min_age_seconds,
            max_secs: cfg.scan.max_age_seconds,
        };
        let clips = find_new_clips(root, &cfg.scan.extensions, window, now, &readmit);
        report.discovered = clips.len();
        if clips.is_empty() {
            info!("No new clips");
            return Ok(());
        }
        info!("{} new clip(s) to process", clips.len());

        let result = self.process_clips(clips, ledger.as_mut(), report).await;

        if let Some(ledger) = ledger.as_mut() {
            if !cfg.dry_run {
                ledger.save(&ledger_path)?;
            }
        }
        result
    }

    async fn process_clips(
        &self,
        clips: Vec<Clip>,
        mut ledger: Option<&mut Ledger>,
        report: &mut SweepReport,
    ) -> Result<(), SweepError> {
        let scratch = tempfile::Builder::new().prefix("motion-sweep-").tempdir()?;
        let settings = EngineSettings::from_config(&self.config);
        let engine = DecisionEngine::new(&settings, &self.media, &self.channel, scratch.path());
        let mut canonicalizer = Canonicalizer::new(self.config.dry_run);

        for mut clip in clips {
            let span = info_span!("clip", name = %clip.name);
            let renamed = span.in_scope(|| canonicalizer.canonicalize(&mut clip));
            if let Err(e) = renamed {
                // Left under its original name, so the next sweep sees it again.
                span.in_scope(|| error!("Failed to rename {}: {}", clip.path.display(), e));
                report.record(&ClipOutcome::Abandoned {
                    reason: format!("rename failed: {}", e),
                });
                continue;
            }

            let outcome = engine.process(&clip).instrument(span).await;

            report.record(&outcome);
            if let Some(ledger) = ledger.as_deref_mut() {
                if !self.config.dry_run {
                    ledger.record(&clip.path, clip.modified, ledger_status(&outcome));
                }
            }
        }

        scratch.close()?;
        Ok(())
    }
}
