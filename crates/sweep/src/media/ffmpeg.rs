//! ffprobe / ffmpeg implementation of [`MediaTool`].
//!
//! Command lines are built by pure functions so their arguments can be
//! checked without the binaries installed; execution goes through
//! `tokio::process`.

use super::{MediaError, MediaInfo, MediaTool, TransformOp};
use crate::config::Resolution;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Raw ffprobe JSON structures for parsing.
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        pub streams: Option<Vec<Stream>>,
        pub format: Option<Format>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub width: Option<u32>,
        pub height: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub duration: Option<String>,
    }
}

/// Media toolkit backed by the `ffprobe` and `ffmpeg` binaries on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct Ffmpeg;

impl Ffmpeg {
    pub fn new() -> Self {
        Self
    }
}

/// Build the ffprobe invocation for `path`.
///
/// Runs `ffprobe -v error -print_format json -show_streams -show_format <path>`.
pub fn build_ffprobe_command(path: &Path) -> Command {
    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_streams",
        "-show_format",
    ]);
    cmd.arg(path);
    cmd
}

/// Build the ffmpeg invocation that applies `op` to `input`, writing `output`.
pub fn build_ffmpeg_command(input: &Path, output: &Path, op: &TransformOp) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-hide_banner", "-loglevel", "error", "-y"]);

    match op {
        TransformOp::Scale(res) => {
            cmd.arg("-i").arg(input);
            cmd.arg("-vf").arg(format!("scale={}", res));
        }
        TransformOp::Segment {
            start_secs,
            max_bytes,
        } => {
            // -ss before -i seeks the input, so the segment starts at the offset
            cmd.arg("-ss").arg(start_secs.to_string());
            cmd.arg("-i").arg(input);
            cmd.arg("-fs").arg(max_bytes.to_string());
            cmd.arg("-c").arg("copy");
        }
        TransformOp::Frame { index } => {
            cmd.arg("-i").arg(input);
            cmd.arg("-vf").arg(format!("select=eq(n\\,{})", index));
            cmd.arg("-vframes").arg("1");
        }
    }

    cmd.arg(output);
    cmd
}

/// Parses ffprobe JSON output into a MediaInfo.
pub fn parse_ffprobe_output(json_str: &str) -> Result<MediaInfo, MediaError> {
    let ffprobe: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json_str).map_err(|e| MediaError::Parse(e.to_string()))?;

    let dimensions = ffprobe
        .streams
        .unwrap_or_default()
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .and_then(|s| match (s.width, s.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(Resolution::new(w, h)),
            _ => None,
        });

    let duration_secs = ffprobe
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok());

    Ok(MediaInfo {
        dimensions,
        duration_secs,
    })
}

fn command_line(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

async fn run(tool: &'static str, cmd: Command) -> Result<Vec<u8>, MediaError> {
    debug!("{}", command_line(&cmd));

    let output = tokio::process::Command::from(cmd)
        .output()
        .await
        .map_err(|source| MediaError::Spawn { tool, source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::Failed {
            tool,
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(output.stdout)
}

impl MediaTool for Ffmpeg {
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaError> {
        let stdout = run("ffprobe", build_ffprobe_command(path)).await?;
        parse_ffprobe_output(&String::from_utf8_lossy(&stdout))
    }

    async fn transform(
        &self,
        input: &Path,
        output: &Path,
        op: &TransformOp,
    ) -> Result<(), MediaError> {
        run("ffmpeg", build_ffmpeg_command(input, output, op)).await?;
        Ok(())
    }
}
