use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::analysis::{AnalysisResult, ContentAnalyzer};
use crate::audio::AudioExtractor;
use crate::config::Config;
use crate::document::{AnalysisDocument, ReportGenerator};
use crate::error::{PipelineError, StageName};
use crate::transcript::Transcript;
use crate::transcription::{ModelSize, SrtGenerator, WhisperTranscriber};
use crate::video::SubtitleEmbedder;

/// Progress observer invoked at fixed checkpoints. Receives the percent
/// complete and the stage that just finished.
pub type ProgressFn = Arc<dyn Fn(u8, StageName) + Send + Sync>;

/// Per-run overrides on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Whisper model override for this run
    pub whisper_model: Option<ModelSize>,
    /// Ollama model override for this run
    pub ollama_model: Option<String>,
    /// Base name for artifacts (defaults to the video file stem)
    pub output_name: Option<String>,
    /// Per-run overrides of the configured output toggles
    pub generate_subtitles: Option<bool>,
    pub generate_word_doc: Option<bool>,
    pub embed_subtitles: Option<bool>,
}

/// One recorded non-fatal failure, surfaced in the job result.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: &'static str,
    pub stage: StageName,
    pub message: String,
}

impl Diagnostic {
    fn from_error(error: &PipelineError) -> Self {
        let stage = match error {
            PipelineError::Fatal { stage, .. } | PipelineError::Degradable { stage, .. } => *stage,
            PipelineError::Validation(_) => StageName::Analysis,
            PipelineError::Configuration(_) => StageName::Assembly,
        };
        Self {
            code: error.code(),
            stage,
            message: error.to_string(),
        }
    }
}

/// Paths of the artifacts a run produced. Every field is optional; the
/// set shrinks when stages are disabled or degrade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArtifactSet {
    pub transcription_path: Option<PathBuf>,
    pub srt_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub json_path: Option<PathBuf>,
    pub subtitled_video_path: Option<PathBuf>,
}

/// Everything a completed run hands back to its caller.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub transcript: Transcript,
    pub analysis: AnalysisResult,
    /// True when any degradable stage failed and was absorbed
    pub partial: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub artifacts: ArtifactSet,
}

/// The processing pipeline: audio extraction, transcription, content
/// analysis, subtitle generation, optional embedding, artifact assembly.
///
/// Stage order is strict. Extraction and transcription failures abort
/// the run with no artifacts; analysis and embedding failures degrade
/// the run to a partial completion with the error recorded.
pub struct Pipeline {
    config: Config,
    extractor: AudioExtractor,
    embedder: SubtitleEmbedder,
    report: ReportGenerator,
    /// One transcriber per model size, shared read-only across workers.
    transcribers: RwLock<HashMap<ModelSize, Arc<WhisperTranscriber>>>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            extractor: AudioExtractor::new(),
            embedder: SubtitleEmbedder::new(),
            report: ReportGenerator::new(),
            transcribers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the full pipeline for one video.
    ///
    /// `workdir` is owned exclusively by this run; all artifacts land
    /// there. Progress is reported at 10/40/70/90/100.
    pub async fn process(
        &self,
        video_path: &Path,
        workdir: &Path,
        options: &PipelineOptions,
        progress: ProgressFn,
    ) -> Result<PipelineOutcome, PipelineError> {
        if !video_path.exists() {
            return Err(PipelineError::Configuration(format!(
                "video file not found: {}",
                video_path.display()
            )));
        }

        let stem = options
            .output_name
            .clone()
            .unwrap_or_else(|| {
                video_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "output".to_string())
            });

        info!("🚀 Processing video: {}", video_path.display());

        tokio::fs::create_dir_all(workdir).await.map_err(|e| {
            PipelineError::fatal(
                StageName::AudioExtraction,
                format!("cannot create working directory: {}", e),
            )
        })?;

        let mut diagnostics = Vec::new();
        let mut artifacts = ArtifactSet::default();

        // Stage 1: audio extraction (fatal on failure)
        let audio_path = self.extractor.extract_audio(video_path, workdir).await?;
        progress(10, StageName::AudioExtraction);

        // Stage 2: transcription (fatal on failure)
        let transcriber = self.transcriber(options).await;
        let transcript = transcriber.transcribe(&audio_path, workdir).await?;
        progress(40, StageName::Transcription);

        if self.config.output.save_transcription {
            let path = workdir.join(format!("{}_transcription.txt", stem));
            match tokio::fs::write(&path, &transcript.text).await {
                Ok(()) => artifacts.transcription_path = Some(path),
                Err(e) => warn!("Failed to save transcription text: {}", e),
            }
        }

        // Stage 3: content analysis (degradable)
        let analysis = absorb_analysis_failure(
            self.analyze(options, &transcript.text).await,
            &mut diagnostics,
        )?;
        progress(70, StageName::Analysis);

        // Stage 4: subtitle generation, then optional embedding (degradable)
        let generate_subtitles = options
            .generate_subtitles
            .unwrap_or(self.config.output.generate_subtitles);
        let embed_subtitles = options
            .embed_subtitles
            .unwrap_or(self.config.output.embed_subtitles);
        let mut embedding_attempted = false;
        if generate_subtitles && !transcript.segments.is_empty() {
            let srt_path = workdir.join(format!("{}.srt", stem));
            let generator = SrtGenerator::from_transcript(&transcript);
            match generator.save_to_file(&srt_path).await {
                Ok(()) => {
                    info!("✅ Subtitles generated: {}", srt_path.display());

                    if embed_subtitles {
                        embedding_attempted = true;
                        let out = workdir.join(format!("{}_subtitled.mp4", stem));
                        match self.embedder.embed(video_path, &srt_path, &out).await {
                            Ok(path) => artifacts.subtitled_video_path = Some(path),
                            Err(e) => {
                                warn!("⚠️ Subtitle embedding degraded: {}", e);
                                diagnostics.push(Diagnostic::from_error(&e));
                            }
                        }
                    }

                    artifacts.srt_path = Some(srt_path);
                }
                Err(e) => {
                    // Embedding needs the SRT, so both artifacts are skipped.
                    warn!("⚠️ Subtitle generation degraded: {}", e);
                    diagnostics.push(Diagnostic::from_error(&e));
                }
            }
        }
        progress(90, subtitle_checkpoint_stage(embedding_attempted));

        // Stage 5: assembly of report and JSON artifacts
        let generate_word_doc = options
            .generate_word_doc
            .unwrap_or(self.config.output.generate_word_doc);
        if generate_word_doc && !analysis.is_placeholder() {
            let path = workdir.join(format!("{}_analysis.md", stem));
            match self.report.save_to_file(&analysis, &path).await {
                Ok(()) => artifacts.report_path = Some(path),
                Err(e) => {
                    warn!("⚠️ Report generation degraded: {}", e);
                    diagnostics.push(Diagnostic::from_error(&e));
                }
            }
        }

        let video_file = video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let json_path = workdir.join(format!("{}_results.json", stem));
        match AnalysisDocument::new(video_file, &transcript, &analysis)
            .save_json(&json_path)
            .await
        {
            Ok(()) => artifacts.json_path = Some(json_path),
            Err(e) => {
                warn!("⚠️ Results JSON degraded: {}", e);
                diagnostics.push(Diagnostic::from_error(&e));
            }
        }

        if self.config.output.cleanup_temp_files {
            self.extractor.cleanup(&audio_path).await;
        }

        progress(100, StageName::Assembly);
        let partial = !diagnostics.is_empty();
        if partial {
            info!("✅ Processing completed with {} degraded stage(s)", diagnostics.len());
        } else {
            info!("✅ Processing completed successfully");
        }

        Ok(PipelineOutcome {
            transcript,
            analysis,
            partial,
            diagnostics,
            artifacts,
        })
    }

    /// Run only extraction and transcription for one video. No analysis,
    /// subtitles, or artifacts; the transcript is returned directly.
    pub async fn transcribe_only(
        &self,
        video_path: &Path,
        workdir: &Path,
        options: &PipelineOptions,
    ) -> Result<Transcript, PipelineError> {
        if !video_path.exists() {
            return Err(PipelineError::Configuration(format!(
                "video file not found: {}",
                video_path.display()
            )));
        }

        tokio::fs::create_dir_all(workdir).await.map_err(|e| {
            PipelineError::fatal(
                StageName::AudioExtraction,
                format!("cannot create working directory: {}", e),
            )
        })?;

        let audio_path = self.extractor.extract_audio(video_path, workdir).await?;
        let transcriber = self.transcriber(options).await;
        let transcript = transcriber.transcribe(&audio_path, workdir).await;

        if self.config.output.cleanup_temp_files {
            self.extractor.cleanup(&audio_path).await;
        }

        transcript
    }

    /// Run only the analysis stage against already-transcribed text.
    pub async fn analyze_text(
        &self,
        text: &str,
        options: &PipelineOptions,
    ) -> Result<AnalysisResult, PipelineError> {
        self.analyze(options, text).await
    }

    async fn transcriber(&self, options: &PipelineOptions) -> Arc<WhisperTranscriber> {
        let model = options
            .whisper_model
            .unwrap_or(self.config.transcription.model);

        if let Some(transcriber) = self.transcribers.read().await.get(&model) {
            return transcriber.clone();
        }

        let mut cache = self.transcribers.write().await;
        cache
            .entry(model)
            .or_insert_with(|| {
                Arc::new(WhisperTranscriber::new(self.config.transcription.clone()).with_model(model))
            })
            .clone()
    }

    async fn analyze(
        &self,
        options: &PipelineOptions,
        text: &str,
    ) -> Result<AnalysisResult, PipelineError> {
        let mut analyzer = ContentAnalyzer::new(&self.config.analysis)?;
        if let Some(model) = &options.ollama_model {
            analyzer = analyzer.with_model(model.clone());
        }

        if !analyzer.is_available().await {
            return Err(PipelineError::degradable(
                StageName::Analysis,
                format!(
                    "generation service unreachable at {}",
                    self.config.analysis.endpoint
                ),
            ));
        }

        analyzer.analyze(text).await
    }
}

/// Absorb a non-fatal analysis failure into a placeholder result plus a
/// recorded diagnostic; fatal errors pass through untouched.
fn absorb_analysis_failure(
    result: Result<AnalysisResult, PipelineError>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<AnalysisResult, PipelineError> {
    match result {
        Ok(analysis) => Ok(analysis),
        Err(e) if !e.is_fatal() => {
            warn!("⚠️ Analysis degraded, continuing without it: {}", e);
            diagnostics.push(Diagnostic::from_error(&e));
            Ok(AnalysisResult::placeholder())
        }
        Err(e) => Err(e),
    }
}

/// Stage reported at the 90% checkpoint: embedding when it actually ran,
/// otherwise subtitle generation.
fn subtitle_checkpoint_stage(embedding_attempted: bool) -> StageName {
    if embedding_attempted {
        StageName::SubtitleEmbedding
    } else {
        StageName::SubtitleGeneration
    }
}

/// No-op progress callback for callers that do not track progress.
pub fn noop_progress() -> ProgressFn {
    Arc::new(|_, _| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_diagnostic_from_degradable_error() {
        let err = PipelineError::degradable(StageName::Analysis, "ollama unreachable");
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.code, "analysis_degraded");
        assert_eq!(diag.stage, StageName::Analysis);
        assert!(diag.message.contains("ollama unreachable"));
    }

    #[test]
    fn test_diagnostic_from_validation_error() {
        let err = PipelineError::from(ValidationError::MalformedResponse);
        let diag = Diagnostic::from_error(&err);
        assert_eq!(diag.code, "analysis_degraded");
        assert_eq!(diag.stage, StageName::Analysis);
    }

    #[tokio::test]
    async fn test_missing_video_rejected_before_any_stage() {
        let pipeline = Pipeline::new(Config::default());
        let result = pipeline
            .process(
                Path::new("/nonexistent/lecture.mp4"),
                Path::new("/tmp/lecture-assistant-test"),
                &PipelineOptions::default(),
                noop_progress(),
            )
            .await;
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_transcriber_cached_per_model() {
        let pipeline = Pipeline::new(Config::default());
        let options = PipelineOptions {
            whisper_model: Some(ModelSize::Tiny),
            ..Default::default()
        };

        let first = pipeline.transcriber(&options).await;
        let second = pipeline.transcriber(&options).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.model(), ModelSize::Tiny);

        let default = pipeline.transcriber(&PipelineOptions::default()).await;
        assert_eq!(default.model(), ModelSize::Base);
    }

    #[test]
    fn test_analysis_failure_absorbed_into_placeholder() {
        let mut diagnostics = Vec::new();
        let failed = Err(PipelineError::degradable(
            StageName::Analysis,
            "analysis failed after retry: request timed out",
        ));

        let analysis = absorb_analysis_failure(failed, &mut diagnostics).unwrap();
        assert!(analysis.is_placeholder());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "analysis_degraded");
        // Partial flag derives from the recorded diagnostics
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn test_fatal_error_passes_through_absorption() {
        let mut diagnostics = Vec::new();
        let failed = Err(PipelineError::fatal(StageName::Transcription, "whisper died"));
        assert!(absorb_analysis_failure(failed, &mut diagnostics).is_err());
        assert!(diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_analysis_service_degrades() {
        let mut config = Config::default();
        // Discard port, nothing listens there
        config.analysis.endpoint = "http://127.0.0.1:9".to_string();
        let pipeline = Pipeline::new(config);

        let text = "a transcript that is comfortably longer than fifty characters of content";
        let err = pipeline
            .analyze_text(text, &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(err.code(), "analysis_degraded");
    }

    #[test]
    fn test_subtitle_checkpoint_stage_reflects_what_ran() {
        assert_eq!(
            subtitle_checkpoint_stage(true),
            StageName::SubtitleEmbedding
        );
        assert_eq!(
            subtitle_checkpoint_stage(false),
            StageName::SubtitleGeneration
        );
    }

    #[test]
    fn test_artifact_set_defaults_empty() {
        let artifacts = ArtifactSet::default();
        assert!(artifacts.srt_path.is_none());
        assert!(artifacts.json_path.is_none());
    }
}
