use thiserror::Error;

/// Pipeline stage names, used for progress reporting and error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    AudioExtraction,
    Transcription,
    Analysis,
    SubtitleGeneration,
    SubtitleEmbedding,
    Assembly,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::AudioExtraction => "audio_extraction",
            StageName::Transcription => "transcription",
            StageName::Analysis => "analysis",
            StageName::SubtitleGeneration => "subtitle_generation",
            StageName::SubtitleEmbedding => "subtitle_embedding",
            StageName::Assembly => "assembly",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation failures produced by the analysis normalizer.
///
/// The upstream generation service returns best-effort structured text;
/// these cover every way that text can fall short of the output schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// No parseable JSON object could be extracted from the raw response.
    #[error("malformed response: no JSON object found in model output")]
    MalformedResponse,

    /// The response parsed but is missing required analysis fields.
    #[error("incomplete analysis: {0}")]
    IncompleteAnalysis(String),

    /// A quiz item whose correct_answer matches neither an option nor a label.
    #[error("invalid quiz item {index}: {reason}")]
    InvalidQuizItem { index: usize, reason: String },
}

/// Errors raised by pipeline stages, classified by criticality.
///
/// Fatal errors abort the job; degradable errors are absorbed into a
/// partial completion with the error recorded in the job diagnostics.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Audio extraction or transcription failed. No artifacts are produced.
    #[error("{stage} failed: {message}")]
    Fatal { stage: StageName, message: String },

    /// Analysis or subtitle embedding failed. The job completes with a
    /// reduced artifact set.
    #[error("{stage} degraded: {message}")]
    Degradable { stage: StageName, message: String },

    /// Malformed upstream analysis response that survived the retry policy.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Rejected at submission time; never enters the pipeline.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn fatal(stage: StageName, message: impl Into<String>) -> Self {
        PipelineError::Fatal {
            stage,
            message: message.into(),
        }
    }

    pub fn degradable(stage: StageName, message: impl Into<String>) -> Self {
        PipelineError::Degradable {
            stage,
            message: message.into(),
        }
    }

    /// Whether this error terminates the job with `failed` status.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::Fatal { .. } | PipelineError::Configuration(_)
        )
    }

    /// Stable error code exposed to polling clients.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::Fatal { stage, .. } => match stage {
                StageName::AudioExtraction => "audio_extraction_failed",
                StageName::Transcription => "transcription_failed",
                _ => "stage_failed",
            },
            PipelineError::Degradable { stage, .. } => match stage {
                StageName::Analysis => "analysis_degraded",
                StageName::SubtitleGeneration => "subtitle_generation_degraded",
                StageName::SubtitleEmbedding => "embedding_degraded",
                StageName::Assembly => "assembly_degraded",
                _ => "stage_degraded",
            },
            PipelineError::Validation(_) => "analysis_degraded",
            PipelineError::Configuration(_) => "invalid_configuration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let err = PipelineError::fatal(StageName::Transcription, "whisper timed out");
        assert!(err.is_fatal());
        assert_eq!(err.code(), "transcription_failed");

        let err = PipelineError::Configuration("unsupported model size".into());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_degradable_classification() {
        let err = PipelineError::degradable(StageName::Analysis, "ollama unreachable");
        assert!(!err.is_fatal());
        assert_eq!(err.code(), "analysis_degraded");

        let err = PipelineError::from(ValidationError::MalformedResponse);
        assert!(!err.is_fatal());

        let err = PipelineError::degradable(StageName::SubtitleGeneration, "disk full");
        assert!(!err.is_fatal());
        assert_eq!(err.code(), "subtitle_generation_degraded");

        let err = PipelineError::degradable(StageName::Assembly, "disk full");
        assert!(!err.is_fatal());
        assert_eq!(err.code(), "assembly_degraded");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(StageName::AudioExtraction.to_string(), "audio_extraction");
        assert_eq!(StageName::SubtitleEmbedding.to_string(), "subtitle_embedding");
    }
}
