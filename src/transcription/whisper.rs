use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use super::ModelSize;
use crate::config::TranscriptionConfig;
use crate::error::{PipelineError, StageName};
use crate::transcript::{Segment, Transcript};

/// Raw whisper JSON output shape (subset we consume).
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
    language: Option<String>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Speech-to-text stage executor backed by the whisper CLI.
///
/// The engine is a black box: audio bytes in, timestamped segments out.
/// A transcriber is configured for one model size and may be cached and
/// reused across jobs (loading large models is expensive); it is never
/// mutated after construction.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    config: TranscriptionConfig,
    model: ModelSize,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriptionConfig) -> Self {
        let model = config.model;
        Self { config, model }
    }

    /// Override the model size (used by the per-model transcriber cache).
    pub fn with_model(mut self, model: ModelSize) -> Self {
        self.model = model;
        self
    }

    pub fn model(&self) -> ModelSize {
        self.model
    }

    /// Transcribe an audio file into a timestamped transcript.
    ///
    /// Blocking external call issued with an explicit timeout; a timeout
    /// here is fatal to the job (no internal recovery path).
    pub async fn transcribe(
        &self,
        audio_path: &Path,
        output_dir: &Path,
    ) -> Result<Transcript, PipelineError> {
        info!(
            "🎤 Starting Whisper transcription: {} (model: {})",
            audio_path.display(),
            self.model
        );

        let mut cmd = Command::new("whisper");
        cmd.arg(audio_path.as_os_str())
            .arg("--model")
            .arg(self.model.as_str())
            .arg("--output_dir")
            .arg(output_dir.as_os_str())
            .arg("--output_format")
            .arg("json")
            .arg("--verbose")
            .arg("False")
            .arg("--fp16")
            .arg("False");

        if let Some(language) = &self.config.language {
            cmd.arg("--language").arg(language);
        }

        debug!("Executing command: {:?}", cmd);

        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let status = tokio::time::timeout(timeout, cmd.status())
            .await
            .map_err(|_| {
                PipelineError::fatal(
                    StageName::Transcription,
                    format!("whisper timed out after {}s", self.config.timeout_seconds),
                )
            })?
            .map_err(|e| {
                PipelineError::fatal(
                    StageName::Transcription,
                    format!("failed to run whisper: {}", e),
                )
            })?;

        if !status.success() {
            return Err(PipelineError::fatal(
                StageName::Transcription,
                format!("whisper exited with {}", status),
            ));
        }

        // Whisper writes <audio_stem>.json next to the other outputs.
        let stem = audio_path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let json_path = output_dir.join(format!("{}.json", stem));

        let json_str = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            PipelineError::fatal(
                StageName::Transcription,
                format!("missing whisper output {}: {}", json_path.display(), e),
            )
        })?;

        let output: WhisperOutput = serde_json::from_str(&json_str).map_err(|e| {
            PipelineError::fatal(
                StageName::Transcription,
                format!("unparseable whisper output: {}", e),
            )
        })?;

        let transcript = Self::into_transcript(output);

        info!(
            "✅ Transcription completed: {} characters, {} segments, language: {}",
            transcript.text.len(),
            transcript.segments.len(),
            transcript.language
        );

        Ok(transcript)
    }

    fn into_transcript(output: WhisperOutput) -> Transcript {
        let segments = output
            .segments
            .into_iter()
            .map(|s| Segment::new(s.start, s.end, s.text.trim()))
            .collect();

        Transcript::new(
            segments,
            output.language.unwrap_or_else(|| "unknown".to_string()),
            output.text.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_output_parsing() {
        let raw = r#"{
            "text": " Welcome to this lecture. Today we cover sorting.",
            "language": "en",
            "segments": [
                {"id": 0, "start": 0.0, "end": 2.4, "text": " Welcome to this lecture."},
                {"id": 1, "start": 2.4, "end": 5.1, "text": " Today we cover sorting."}
            ]
        }"#;

        let output: WhisperOutput = serde_json::from_str(raw).unwrap();
        let transcript = WhisperTranscriber::into_transcript(output);

        assert_eq!(transcript.language, "en");
        assert_eq!(transcript.segments.len(), 2);
        assert_eq!(transcript.segments[0].text, "Welcome to this lecture.");
        assert!((transcript.segments[1].end - 5.1).abs() < f64::EPSILON);
        assert_eq!(
            transcript.text,
            "Welcome to this lecture. Today we cover sorting."
        );
    }

    #[test]
    fn test_whisper_output_without_language() {
        let raw = r#"{"text": "hello", "segments": []}"#;
        let output: WhisperOutput = serde_json::from_str(raw).unwrap();
        let transcript = WhisperTranscriber::into_transcript(output);
        assert_eq!(transcript.language, "unknown");
        assert!(transcript.is_empty());
    }
}
