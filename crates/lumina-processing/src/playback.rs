//! Playback encoding seam for video media.
//!
//! The codec itself is external; the worker only needs "produce a playback
//! file at this path" behind a trait so tests never shell out.

use std::path::Path;

use async_trait::async_trait;

use crate::DerivativeError;

#[async_trait]
pub trait PlaybackEncoder: Send + Sync {
    async fn encode(&self, source: &Path, target: &Path) -> Result<(), DerivativeError>;

    /// Container extension of the files this encoder produces.
    fn target_ext(&self) -> &'static str;

    fn content_type(&self) -> &'static str;
}

/// H.264/AAC MP4 playback profile via the system ffmpeg.
pub struct FfmpegPlaybackEncoder {
    ffmpeg_path: String,
}

impl FfmpegPlaybackEncoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

#[async_trait]
impl PlaybackEncoder for FfmpegPlaybackEncoder {
    async fn encode(&self, source: &Path, target: &Path) -> Result<(), DerivativeError> {
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args([
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-crf",
                "23",
                "-vf",
                "scale='min(1920,iw)':-2",
                "-c:a",
                "aac",
                "-b:a",
                "128k",
                "-movflags",
                "+faststart",
            ])
            .arg(target)
            .output()
            .await
            .map_err(|e| DerivativeError::Transcode(format!("spawn ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(DerivativeError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }

        tracing::info!(
            source = %source.display(),
            target = %target.display(),
            "Encoded playback derivative"
        );
        Ok(())
    }

    fn target_ext(&self) -> &'static str {
        "mp4"
    }

    fn content_type(&self) -> &'static str {
        "video/mp4"
    }
}
