use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{PipelineError, StageName};

/// Audio extractor for the transcription stage.
///
/// Demuxes the audio track of a video into a mono 16 kHz WAV via ffmpeg,
/// the format Whisper expects. Extraction failure is fatal to the job.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    /// Target sample rate (16 kHz optimal for Whisper)
    pub target_sample_rate: u32,
}

impl AudioExtractor {
    pub fn new() -> Self {
        Self {
            target_sample_rate: 16000,
        }
    }

    /// Extract audio from a video with optimal settings for transcription.
    ///
    /// The WAV lands in `output_dir`, which the caller owns exclusively for
    /// the duration of the job.
    pub async fn extract_audio(
        &self,
        video_path: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let filename = video_path
            .file_stem()
            .ok_or_else(|| {
                PipelineError::fatal(StageName::AudioExtraction, "invalid video filename")
            })?
            .to_string_lossy();

        let audio_path = output_dir.join(format!("{}.wav", filename));

        info!("🎵 Extracting audio for transcription: {}", video_path.display());

        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            PipelineError::fatal(
                StageName::AudioExtraction,
                format!("cannot create output directory: {}", e),
            )
        })?;

        let status = tokio::process::Command::new("ffmpeg")
            .args([
                "-i",
                &video_path.to_string_lossy(),
                "-vn", // No video stream
                "-acodec",
                "pcm_s16le", // 16-bit PCM
                "-ar",
                &self.target_sample_rate.to_string(),
                "-ac",
                "1", // Mono channel
                "-f",
                "wav",
                "-y", // Overwrite existing
                &audio_path.to_string_lossy(),
            ])
            .status()
            .await
            .map_err(|e| {
                PipelineError::fatal(
                    StageName::AudioExtraction,
                    format!("failed to run ffmpeg: {}", e),
                )
            })?;

        if !status.success() {
            return Err(PipelineError::fatal(
                StageName::AudioExtraction,
                format!("ffmpeg exited with {} for {}", status, video_path.display()),
            ));
        }

        info!("✅ Audio extracted: {}", audio_path.display());
        Ok(audio_path)
    }

    /// Remove a temporary audio file after the pipeline is done with it.
    pub async fn cleanup(&self, audio_path: &Path) {
        if let Err(e) = tokio::fs::remove_file(audio_path).await {
            warn!("Failed to remove temp audio {}: {}", audio_path.display(), e);
        }
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}
