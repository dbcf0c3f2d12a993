//! Preflight checks run before the first sweep.
//!
//! The sweep shells out to `ffprobe` for every clip and to `ffmpeg` for every
//! downscale, segment and still; both must be runnable before we start
//! renaming anything.

use std::process::Command;
use thiserror::Error;

/// External tools the sweep depends on.
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{tool} not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },
}

/// Build `<tool> -version`.
pub fn build_version_command(tool: &str) -> Command {
    let mut cmd = Command::new(tool);
    cmd.arg("-version");
    cmd
}

/// Pull the version token out of the first line of `-version` output.
///
/// Handles `"ffmpeg version 6.1.1 Copyright ..."` as well as git builds
/// such as `"ffprobe version n6.1-3-gabcdef ..."`.
pub fn parse_tool_version(output: &str) -> Option<&str> {
    let line = output.lines().next()?;
    let mut words = line.split_whitespace();
    words.find(|w| *w == "version")?;
    words.next()
}

/// Check that `tool -version` runs and exits successfully.
///
/// Returns the reported version string, or `"unknown"` if the output does
/// not follow the usual format.
pub fn check_tool_available(tool: &str) -> Result<String, StartupError> {
    let output = build_version_command(tool)
        .output()
        .map_err(|e| StartupError::ToolUnavailable {
            tool: tool.to_string(),
            reason: format!("{} -version failed; is it installed and in PATH? Error: {}", tool, e),
        })?;

    if !output.status.success() {
        return Err(StartupError::ToolUnavailable {
            tool: tool.to_string(),
            reason: format!("{} -version exited with {}", tool, output.status),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_tool_version(&stdout).unwrap_or("unknown").to_string())
}

/// Run all startup checks in order, stopping at the first failure.
pub fn run_startup_checks() -> Result<(), StartupError> {
    for tool in REQUIRED_TOOLS {
        let version = check_tool_available(tool)?;
        tracing::debug!("{} version {}", tool, version);
    }
    Ok(())
}
