/// Video Lecture Assistant
///
/// Turns a lecture recording into study materials: a timestamped
/// transcript, an AI-generated summary with insights and a quiz,
/// subtitles, and an analysis report. Available as a synchronous CLI
/// and as a polled asynchronous job API.

pub mod analysis;
pub mod api;
pub mod audio;
pub mod config;
pub mod document;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod transcript;
pub mod transcription;
pub mod video;

// Re-export main types for easy access
pub use crate::analysis::{AnalysisResult, ContentAnalyzer, OllamaClient, QuizItem};
pub use crate::audio::AudioExtractor;
pub use crate::config::Config;
pub use crate::document::{AnalysisDocument, ReportGenerator};
pub use crate::error::{PipelineError, StageName, ValidationError};
pub use crate::jobs::{Job, JobRegistry, JobState};
pub use crate::pipeline::{ArtifactSet, Pipeline, PipelineOptions, PipelineOutcome};
pub use crate::transcript::{Segment, Transcript};
pub use crate::transcription::{ModelSize, SrtGenerator, WhisperTranscriber};
pub use crate::video::SubtitleEmbedder;
