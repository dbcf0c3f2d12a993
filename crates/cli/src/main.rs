//! CLI entry point for Motion Sweep
//!
//! Parses command line arguments, sets up logging and runs one sweep.
//! Meant to be started periodically (cron, systemd timer).

use motion_sweep::{run_startup_checks, Config, Ffmpeg, Sweep, TelegramChannel};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::SystemTime;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Motion Sweep - post fresh motion-camera clips to a chat channel
#[derive(Parser, Debug)]
#[command(name = "motion-sweep")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "sweep.toml")]
    config: PathBuf,

    /// Root of the recording tree (overrides scan.root)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Try a lower resolution before splitting clips over the size budget
    #[arg(long)]
    downscale: bool,

    /// Log every decision without renaming, deleting or posting anything
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Write the sweep report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Skip startup checks (ffmpeg, ffprobe). For testing only.
    #[arg(long, default_value = "false")]
    skip_checks: bool,
}

impl Args {
    /// Fold command line overrides into the loaded configuration.
    fn apply_to(&self, config: &mut Config) {
        if let Some(root) = &self.root {
            config.scan.root = root.clone();
        }
        if self.downscale {
            config.downscale.enabled = true;
        }
        if self.dry_run {
            config.dry_run = true;
        }
    }
}

/// `MOTION_SWEEP_LOG`, then `RUST_LOG`, then `info` (or `debug` with `--debug`).
fn build_env_filter(debug: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var("MOTION_SWEEP_LOG") {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(if debug { "debug" } else { "info" })
}

fn init_logging(debug: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(debug))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.debug);

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", args.config.display(), e);
            return ExitCode::FAILURE;
        }
    };
    args.apply_to(&mut config);

    if args.skip_checks {
        warn!("Skipping startup checks (--skip-checks enabled)");
    } else if let Err(e) = run_startup_checks() {
        error!("Startup check failed: {}", e);
        return ExitCode::FAILURE;
    }

    let channel = TelegramChannel::new(&config.telegram);
    let sweep = Sweep::new(config, Ffmpeg::new(), channel);
    let report = sweep.run(SystemTime::now()).await;

    if let Some(path) = &args.report {
        match report.to_json() {
            Ok(json) => match std::fs::write(path, json) {
                Ok(()) => info!("Report written to {}", path.display()),
                Err(e) => error!("Failed to write report to {}: {}", path.display(), e),
            },
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["motion-sweep"]).unwrap();
        assert_eq!(args.config, PathBuf::from("sweep.toml"));
        assert!(args.root.is_none());
        assert!(!args.dry_run);
        assert!(!args.skip_checks);
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = Args::try_parse_from([
            "motion-sweep",
            "--root",
            "/srv/cams",
            "--downscale",
            "--dry-run",
            "--report",
            "/tmp/report.json",
        ])
        .unwrap();

        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.scan.root, PathBuf::from("/srv/cams"));
        assert!(config.downscale.enabled);
        assert!(config.dry_run);
        assert_eq!(args.report, Some(PathBuf::from("/tmp/report.json")));
    }

    #[test]
    fn test_flags_do_not_disable_config_settings() {
        let args = Args::try_parse_from(["motion-sweep"]).unwrap();
        let mut config = Config::default();
        config.downscale.enabled = true;
        config.dry_run = true;
        args.apply_to(&mut config);

        assert!(config.downscale.enabled);
        assert!(config.dry_run);
    }
}
