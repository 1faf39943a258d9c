//! HTTP server implementation for the job API

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use super::{handlers, models::{AnalyzeRequest, ArtifactKind, SubmitOptions}};
use crate::jobs::{JobRegistry, JobState, ResultLookup};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
}

/// Configure and start the HTTP server
pub async fn start_http_server(registry: Arc<JobRegistry>, port: u16) -> Result<()> {
    info!("🚀 Starting HTTP server on port {}", port);

    let max_upload = registry.pipeline().config().server.max_upload_bytes;
    let app_state = AppState { registry };

    // Configure CORS to allow browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        // Health check endpoints (both paths for compatibility)
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        // Job lifecycle endpoints
        .route("/api/process", post(process_handler))
        // Synchronous transcription-only endpoint
        .route("/api/transcribe", post(transcribe_handler))
        .route("/api/status/:job_id", get(status_handler))
        .route("/api/result/:job_id", get(result_handler))
        .route("/api/download/:job_id/:artifact", get(download_handler))
        // Text-only analysis endpoint
        .route("/api/analyze", post(analyze_handler))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🌐 Job API listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    match handlers::health_check(&state.registry).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// One parsed video upload: original filename, payload, option fields.
struct VideoUpload {
    filename: String,
    bytes: Vec<u8>,
    options: SubmitOptions,
}

/// Drain the multipart stream into a video payload plus option fields.
async fn parse_upload(mut multipart: Multipart) -> Result<VideoUpload, String> {
    let mut video: Option<(String, Vec<u8>)> = None;
    let mut options = SubmitOptions::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(e.to_string()),
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .unwrap_or_default();
                if filename.is_empty() {
                    return Err("Empty filename".to_string());
                }
                match field.bytes().await {
                    Ok(bytes) => video = Some((filename, bytes.to_vec())),
                    Err(e) => return Err(e.to_string()),
                }
            }
            "whisper_model" => options.whisper_model = read_text_field(field).await,
            "ollama_model" => options.ollama_model = read_text_field(field).await,
            "generate_subtitles" => options.generate_subtitles = read_bool_field(field).await,
            "generate_word_doc" => options.generate_word_doc = read_bool_field(field).await,
            "embed_subtitles" => options.embed_subtitles = read_bool_field(field).await,
            other => warn!("Ignoring unknown form field: {}", other),
        }
    }

    let (filename, bytes) = video.ok_or_else(|| "No video file provided".to_string())?;
    Ok(VideoUpload {
        filename,
        bytes,
        options,
    })
}

/// Stage an upload on disk under the given id so concurrent uploads of
/// the same filename never collide.
async fn stage_upload(
    state: &AppState,
    id: &str,
    upload: &VideoUpload,
) -> Result<std::path::PathBuf, String> {
    let upload_dir = state.registry.pipeline().config().server.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| e.to_string())?;
    let video_path = upload_dir.join(format!("{}_{}", id, upload.filename));
    tokio::fs::write(&video_path, &upload.bytes)
        .await
        .map_err(|e| e.to_string())?;
    Ok(video_path)
}

/// Video submission handler: multipart upload plus option fields.
async fn process_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let upload = match parse_upload(multipart).await {
        Ok(upload) => upload,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let pipeline_options = match handlers::build_pipeline_options(&upload.options) {
        Ok(pipeline_options) => pipeline_options,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let job_id = JobRegistry::new_job_id();
    let video_path = match stage_upload(&state, &job_id, &upload).await {
        Ok(path) => path,
        Err(message) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &message),
    };

    let data = handlers::submit_job(&state.registry, job_id, video_path, pipeline_options).await;
    (StatusCode::ACCEPTED, Json(data)).into_response()
}

/// Transcription-only handler: blocks until the transcript is ready,
/// then removes the staged upload and scratch directory.
async fn transcribe_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let upload = match parse_upload(multipart).await {
        Ok(upload) => upload,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, &message),
    };

    let pipeline_options = match handlers::build_pipeline_options(&upload.options) {
        Ok(pipeline_options) => pipeline_options,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let id = JobRegistry::new_job_id();
    let video_path = match stage_upload(&state, &id, &upload).await {
        Ok(path) => path,
        Err(message) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, &message),
    };
    let workdir = state.registry.job_workdir(&id);

    let result = handlers::transcribe_upload(
        &state.registry,
        &upload.filename,
        &video_path,
        &workdir,
        pipeline_options,
    )
    .await;

    if let Err(e) = tokio::fs::remove_file(&video_path).await {
        warn!("Failed to remove upload {}: {}", video_path.display(), e);
    }
    if let Err(e) = tokio::fs::remove_dir_all(&workdir).await {
        warn!("Failed to remove scratch dir {}: {}", workdir.display(), e);
    }

    match result {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

/// Job status handler
async fn status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match handlers::job_status(&state.registry, &job_id).await {
        Some(data) => (StatusCode::OK, Json(data)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Job not found"),
    }
}

/// Job result handler
async fn result_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    match handlers::job_result(&state.registry, &job_id).await {
        (ResultLookup::Ready, Some(data)) => (StatusCode::OK, Json(data)).into_response(),
        (ResultLookup::Failed, Some(data)) => (StatusCode::OK, Json(data)).into_response(),
        (ResultLookup::NotReady, _) => error_response(StatusCode::CONFLICT, "Job not complete"),
        _ => error_response(StatusCode::NOT_FOUND, "Job not found"),
    }
}

/// Artifact download handler
async fn download_handler(
    State(state): State<AppState>,
    Path((job_id, artifact)): Path<(String, String)>,
) -> impl IntoResponse {
    let kind = match ArtifactKind::parse(&artifact) {
        Some(kind) => kind,
        None => return error_response(StatusCode::NOT_FOUND, "Unknown artifact type"),
    };

    let job = match state.registry.get(&job_id).await {
        Some(job) => job,
        None => return error_response(StatusCode::NOT_FOUND, "Job not found"),
    };

    if job.state != JobState::Complete {
        return error_response(StatusCode::CONFLICT, "Job not complete");
    }

    let path = match handlers::artifact_path(&job, kind) {
        Some(path) => path,
        None => return error_response(StatusCode::NOT_FOUND, "Artifact not produced"),
    };

    match tokio::fs::read(&path).await {
        Ok(content) => {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| artifact.clone());
            (
                StatusCode::OK,
                [
                    ("content-type", kind.content_type().to_string()),
                    (
                        "content-disposition",
                        format!("attachment; filename=\"{}\"", filename),
                    ),
                ],
                content,
            )
                .into_response()
        }
        Err(e) => {
            warn!("Failed to read artifact {}: {}", path.display(), e);
            error_response(StatusCode::NOT_FOUND, "Artifact file missing")
        }
    }
}

/// Text-only analysis handler
async fn analyze_handler(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    if payload.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No text provided");
    }
    match handlers::analyze_text(&state.registry, &payload.text).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Option<String> {
    field.text().await.ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

async fn read_bool_field(field: axum::extract::multipart::Field<'_>) -> Option<bool> {
    read_text_field(field)
        .await
        .map(|s| s.eq_ignore_ascii_case("true"))
}

/// Strip any path components from an uploaded filename.
fn sanitize_filename(raw: &str) -> String {
    std::path::Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
