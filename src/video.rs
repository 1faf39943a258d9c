use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, StageName};

/// Subtitle embedding stage executor.
///
/// Muxes an SRT file into a copy of the source video as a soft subtitle
/// track, without re-encoding audio or video. The source video is never
/// modified. Embedding failure is degradable: the job still completes
/// with the standalone SRT.
#[derive(Debug, Clone, Default)]
pub struct SubtitleEmbedder;

impl SubtitleEmbedder {
    pub fn new() -> Self {
        Self
    }

    /// Embed subtitles into `output_path`, a new file alongside the
    /// other artifacts.
    pub async fn embed(
        &self,
        video_path: &Path,
        srt_path: &Path,
        output_path: &Path,
    ) -> Result<PathBuf, PipelineError> {
        info!(
            "🎬 Embedding subtitles into video: {}",
            output_path.display()
        );

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i",
                &video_path.to_string_lossy(),
                "-i",
                &srt_path.to_string_lossy(),
                "-c:v",
                "copy", // Keep video stream untouched
                "-c:a",
                "copy", // Keep audio stream untouched
                "-c:s",
                "mov_text",
                "-metadata:s:s:0",
                "language=eng",
                "-y",
                &output_path.to_string_lossy(),
            ])
            .status()
            .await
            .map_err(|e| {
                PipelineError::degradable(
                    StageName::SubtitleEmbedding,
                    format!("failed to run ffmpeg: {}", e),
                )
            })?;

        if !status.success() {
            return Err(PipelineError::degradable(
                StageName::SubtitleEmbedding,
                format!("ffmpeg exited with {} while embedding subtitles", status),
            ));
        }

        info!("✅ Subtitled video created: {}", output_path.display());
        Ok(output_path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_failure_is_degradable() {
        let embedder = SubtitleEmbedder::new();
        let result = embedder
            .embed(
                Path::new("/nonexistent/video.mp4"),
                Path::new("/nonexistent/subs.srt"),
                Path::new("/nonexistent/out.mp4"),
            )
            .await;
        match result {
            Err(PipelineError::Degradable {
                stage: StageName::SubtitleEmbedding,
                ..
            }) => {}
            other => panic!("expected degradable embedding error, got {:?}", other),
        }
    }
}
