//! Still-frame extraction for the degraded delivery path.

use crate::media::{MediaTool, TransformOp};
use std::path::{Path, PathBuf};
use tracing::error;

/// Scratch path of the still extracted from `clip_path`.
pub fn frame_path(scratch: &Path, clip_path: &Path) -> PathBuf {
    let stem = clip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".to_string());
    scratch.join(format!("{}.frame.png", stem))
}

/// Extract frame `index` of `clip_path` as a PNG in `scratch`.
///
/// Returns `None` when no frame could be produced; the caller skips the
/// still-image delivery in that case.
pub async fn extract_frame<M: MediaTool>(
    media: &M,
    clip_path: &Path,
    scratch: &Path,
    index: u32,
) -> Option<PathBuf> {
    let output = frame_path(scratch, clip_path);
    match media
        .transform(clip_path, &output, &TransformOp::Frame { index })
        .await
    {
        Ok(()) if output.exists() => Some(output),
        Ok(()) => {
            error!("No frame {} written for {}", index, clip_path.display());
            None
        }
        Err(e) => {
            error!("Frame extraction from {} failed: {}", clip_path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeMedia;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_frame() {
        let scratch = TempDir::new().unwrap();
        let media = FakeMedia::new();
        let clip = Path::new("/cams/front/Saturday-03-April@06:18.21.mp4");

        let frame = extract_frame(&media, clip, scratch.path(), 24).await;

        let frame = frame.expect("frame should be produced");
        assert_eq!(frame, scratch.path().join("Saturday-03-April@06:18.21.frame.png"));
        assert!(frame.exists());
        assert_eq!(media.transforms()[0].op, TransformOp::Frame { index: 24 });
    }

    #[tokio::test]
    async fn test_extract_frame_failure_is_none() {
        let scratch = TempDir::new().unwrap();
        let media = FakeMedia::new().failing_transforms();

        let frame = extract_frame(&media, Path::new("/cams/a.mp4"), scratch.path(), 0).await;
        assert!(frame.is_none());
    }
}
