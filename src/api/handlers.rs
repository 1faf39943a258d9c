//! API request handlers

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::models::{ArtifactKind, SubmitOptions, SubmitResponse};
use crate::analysis::ContentAnalyzer;
use crate::jobs::{Job, JobRegistry, ResultLookup};
use crate::pipeline::PipelineOptions;
use crate::transcription::ModelSize;

/// Handle health check requests, probing the generation service.
pub async fn health_check(registry: &Arc<JobRegistry>) -> Result<Value> {
    let config = registry.pipeline().config();
    let ollama = match ContentAnalyzer::new(&config.analysis) {
        Ok(analyzer) => {
            if analyzer.is_available().await {
                "running"
            } else {
                "not_running"
            }
        }
        Err(_) => "not_running",
    };

    Ok(serde_json::json!({
        "status": "ok",
        "service": "lecture-assistant",
        "version": env!("CARGO_PKG_VERSION"),
        "ollama": ollama,
        "jobs": registry.job_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Translate form options into per-run pipeline overrides. An invalid
/// model size is rejected here, before the job exists.
pub fn build_pipeline_options(options: &SubmitOptions) -> Result<PipelineOptions> {
    let whisper_model = match &options.whisper_model {
        Some(raw) => Some(raw.parse::<ModelSize>().map_err(|e| anyhow!("{}", e))?),
        None => None,
    };

    Ok(PipelineOptions {
        whisper_model,
        ollama_model: options.ollama_model.clone(),
        output_name: None,
        generate_subtitles: options.generate_subtitles,
        generate_word_doc: options.generate_word_doc,
        embed_subtitles: options.embed_subtitles,
    })
}

/// Register the uploaded video as a new job.
pub async fn submit_job(
    registry: &Arc<JobRegistry>,
    job_id: String,
    video_path: PathBuf,
    options: PipelineOptions,
) -> SubmitResponse {
    info!("📥 API submission: {} -> job {}", video_path.display(), job_id);
    let job_id = registry.submit_with_id(job_id, video_path, options).await;
    SubmitResponse {
        job_id,
        status: "queued".to_string(),
    }
}

/// Transcribe an uploaded video synchronously, with no analysis or
/// artifact generation. The caller owns cleanup of the staged upload.
pub async fn transcribe_upload(
    registry: &Arc<JobRegistry>,
    filename: &str,
    video_path: &std::path::Path,
    workdir: &std::path::Path,
    options: PipelineOptions,
) -> Result<Value> {
    let transcript = registry
        .pipeline()
        .transcribe_only(video_path, workdir, &options)
        .await?;

    Ok(serde_json::json!({
        "video_file": filename,
        "language": transcript.language,
        "transcription": transcript.text,
    }))
}

/// Snapshot a job for the status endpoint.
pub async fn job_status(registry: &Arc<JobRegistry>, job_id: &str) -> Option<Value> {
    registry.get(job_id).await.map(|job| {
        serde_json::json!({
            "job_id": job.id,
            "status": job.state.as_str(),
            "progress": job.progress,
            "stage": job.stage,
            "error": job.error,
            "updated_at": job.updated_at.to_rfc3339(),
        })
    })
}

/// Result lookup outcome plus the payload when ready.
pub async fn job_result(registry: &Arc<JobRegistry>, job_id: &str) -> (ResultLookup, Option<Value>) {
    let lookup = registry.result_state(job_id).await;
    match lookup {
        ResultLookup::Ready => {
            let payload = registry
                .get(job_id)
                .await
                .and_then(|job| job.result.map(|r| serde_json::to_value(r).ok()))
                .flatten();
            (lookup, payload)
        }
        ResultLookup::Failed => {
            let payload = registry.get(job_id).await.map(|job| {
                serde_json::json!({
                    "job_id": job.id,
                    "status": job.state.as_str(),
                    "error": job.error,
                })
            });
            (lookup, payload)
        }
        _ => (lookup, None),
    }
}

/// Resolve a download request to a path on disk. The job must be
/// complete and the artifact must have been produced.
pub fn artifact_path(job: &Job, kind: ArtifactKind) -> Option<PathBuf> {
    let artifacts = &job.artifacts;
    match kind {
        ArtifactKind::Srt => artifacts.srt_path.clone(),
        ArtifactKind::Report => artifacts.report_path.clone(),
        ArtifactKind::Json => artifacts.json_path.clone(),
        ArtifactKind::Video => artifacts.subtitled_video_path.clone(),
        ArtifactKind::Transcription => artifacts.transcription_path.clone(),
    }
}

/// Run only the analysis path over caller-provided text.
pub async fn analyze_text(registry: &Arc<JobRegistry>, text: &str) -> Result<Value> {
    let result = registry
        .pipeline()
        .analyze_text(text, &PipelineOptions::default())
        .await?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pipeline_options_parses_model() {
        let options = SubmitOptions {
            whisper_model: Some("small".to_string()),
            ollama_model: Some("mistral".to_string()),
            embed_subtitles: Some(true),
            ..Default::default()
        };
        let pipeline_options = build_pipeline_options(&options).unwrap();
        assert_eq!(pipeline_options.whisper_model, Some(ModelSize::Small));
        assert_eq!(pipeline_options.ollama_model.as_deref(), Some("mistral"));
        assert_eq!(pipeline_options.embed_subtitles, Some(true));
    }

    #[test]
    fn test_build_pipeline_options_rejects_bad_model() {
        let options = SubmitOptions {
            whisper_model: Some("enormous".to_string()),
            ..Default::default()
        };
        assert!(build_pipeline_options(&options).is_err());
    }
}
