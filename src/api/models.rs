//! API data models

use serde::{Deserialize, Serialize};

/// Response to a job submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: String,
}

/// Body of `POST /api/analyze`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

/// Processing options accepted as multipart form fields alongside the
/// video upload. Absent fields fall back to the server configuration.
#[derive(Debug, Default, Clone)]
pub struct SubmitOptions {
    pub whisper_model: Option<String>,
    pub ollama_model: Option<String>,
    pub generate_subtitles: Option<bool>,
    pub generate_word_doc: Option<bool>,
    pub embed_subtitles: Option<bool>,
}

/// Downloadable artifact names. `doc` and `docx` are aliases for the
/// analysis report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Srt,
    Report,
    Json,
    Video,
    Transcription,
}

impl ArtifactKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "srt" => Some(ArtifactKind::Srt),
            "doc" | "docx" => Some(ArtifactKind::Report),
            "json" => Some(ArtifactKind::Json),
            "video" => Some(ArtifactKind::Video),
            "transcription" | "txt" => Some(ArtifactKind::Transcription),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::Srt => "application/x-subrip",
            ArtifactKind::Report => "text/markdown",
            ArtifactKind::Json => "application/json",
            ArtifactKind::Video => "video/mp4",
            ArtifactKind::Transcription => "text/plain",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_response_shape() {
        let response = SubmitResponse {
            job_id: "abc123".to_string(),
            status: "queued".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["job_id"], "abc123");
        assert_eq!(json["status"], "queued");
    }

    #[test]
    fn test_artifact_kind_parsing() {
        assert_eq!(ArtifactKind::parse("srt"), Some(ArtifactKind::Srt));
        assert_eq!(ArtifactKind::parse("doc"), Some(ArtifactKind::Report));
        assert_eq!(ArtifactKind::parse("DOCX"), Some(ArtifactKind::Report));
        assert_eq!(ArtifactKind::parse("video"), Some(ArtifactKind::Video));
        assert_eq!(ArtifactKind::parse("exe"), None);
    }
}
