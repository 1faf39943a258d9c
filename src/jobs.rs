use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tracing::{error, info};

use crate::analysis::QuizItem;
use crate::error::{PipelineError, StageName};
use crate::pipeline::{ArtifactSet, Diagnostic, Pipeline, PipelineOptions, PipelineOutcome};

/// Lifecycle of an asynchronous job. Transitions are linear:
/// queued → running → complete | failed. There is no cancellation and
/// no path out of a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }
}

/// Failure summary exposed to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct JobError {
    pub code: &'static str,
    pub message: String,
}

/// Final analysis payload of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    pub video_file: String,
    pub language: String,
    pub transcription: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub quiz: Vec<QuizItem>,
    /// True when a degradable stage failed and its output was replaced
    pub partial: bool,
    pub diagnostics: Vec<Diagnostic>,
    /// Which artifacts this run actually produced
    pub artifacts: ArtifactSet,
}

/// One tracked job. Snapshots of this struct are what status reads
/// return; readers never observe a half-applied transition.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub video_file: String,
    pub state: JobState,
    /// Percent complete at the last checkpoint (0/10/40/70/90/100)
    pub progress: u8,
    /// Stage that most recently finished
    pub stage: Option<StageName>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Artifact paths on disk, used by the download routes
    #[serde(skip)]
    pub artifacts: ArtifactSet,
}

impl Job {
    fn new(id: String, video_file: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            video_file,
            state: JobState::Queued,
            progress: 0,
            stage: None,
            created_at: now,
            updated_at: now,
            error: None,
            result: None,
            artifacts: ArtifactSet::default(),
        }
    }
}

/// Outcome of a status lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultLookup {
    Ready,
    NotReady,
    NotFound,
    Failed,
}

/// In-memory job registry and worker pool.
///
/// Jobs live in a map behind an async RwLock and are retained until
/// process exit. A semaphore bounds how many pipelines run at once;
/// queued jobs wait on a permit, not in an explicit queue.
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    semaphore: Arc<Semaphore>,
    pipeline: Arc<Pipeline>,
}

impl JobRegistry {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let max_workers = pipeline.config().performance.max_workers;
        info!("📋 Job registry initialized with {} worker(s)", max_workers);
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            semaphore: Arc::new(Semaphore::new(max_workers)),
            pipeline,
        }
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Working directory owned exclusively by one job.
    pub fn job_workdir(&self, job_id: &str) -> PathBuf {
        self.pipeline
            .config()
            .output
            .base_dir
            .join("jobs")
            .join(job_id)
    }

    /// Allocate a fresh job id. Callers that stage an upload under the
    /// job id obtain it before submitting.
    pub fn new_job_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Register a new job and spawn its worker. Returns immediately with
    /// the job id; the caller polls for progress.
    pub async fn submit(self: &Arc<Self>, video_path: PathBuf, options: PipelineOptions) -> String {
        let job_id = Self::new_job_id();
        self.submit_with_id(job_id, video_path, options).await
    }

    /// Submit under a pre-allocated id from [`new_job_id`](Self::new_job_id).
    pub async fn submit_with_id(
        self: &Arc<Self>,
        job_id: String,
        video_path: PathBuf,
        options: PipelineOptions,
    ) -> String {
        let video_file = video_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| video_path.display().to_string());

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(job_id.clone(), Job::new(job_id.clone(), video_file));
        }
        info!("📥 Job {} queued: {}", job_id, video_path.display());

        let registry = Arc::clone(self);
        let id = job_id.clone();
        tokio::spawn(async move {
            registry.run_job(id, video_path, options).await;
        });

        job_id
    }

    async fn run_job(self: &Arc<Self>, job_id: String, video_path: PathBuf, options: PipelineOptions) {
        // Permit acquisition is the queue; jobs stay `queued` until one
        // frees up. The semaphore is never closed while the registry lives.
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.mark_failed(
                    &job_id,
                    &PipelineError::Configuration("worker pool shut down".into()),
                )
                .await;
                return;
            }
        };

        self.mark_running(&job_id).await;

        let workdir = self.job_workdir(&job_id);
        let progress_registry = Arc::clone(self);
        let progress_job = job_id.clone();
        let progress = Arc::new(move |percent: u8, stage: StageName| {
            let registry = Arc::clone(&progress_registry);
            let id = progress_job.clone();
            tokio::spawn(async move {
                registry.record_progress(&id, percent, stage).await;
            });
        });

        let outcome = self
            .pipeline
            .process(&video_path, &workdir, &options, progress)
            .await;

        match outcome {
            Ok(outcome) => self.mark_complete(&job_id, outcome).await,
            Err(e) => {
                error!("❌ Job {} failed: {}", job_id, e);
                self.mark_failed(&job_id, &e).await;
            }
        }

        drop(permit);
    }

    /// Snapshot of a job, or None for unknown ids. Pure read; repeated
    /// calls between transitions return identical snapshots.
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Classify a result request without copying the job.
    pub async fn result_state(&self, job_id: &str) -> ResultLookup {
        match self.jobs.read().await.get(job_id) {
            None => ResultLookup::NotFound,
            Some(job) => match job.state {
                JobState::Complete => ResultLookup::Ready,
                JobState::Failed => ResultLookup::Failed,
                _ => ResultLookup::NotReady,
            },
        }
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }

    async fn mark_running(&self, job_id: &str) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.state = JobState::Running;
            job.updated_at = Utc::now();
        }
    }

    async fn record_progress(&self, job_id: &str, percent: u8, stage: StageName) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            // Checkpoints are monotonic; a late-arriving update never
            // rewinds the reported progress.
            if percent > job.progress && !job.state.is_terminal() {
                job.progress = percent;
                job.stage = Some(stage);
                job.updated_at = Utc::now();
            }
        }
    }

    async fn mark_complete(&self, job_id: &str, outcome: PipelineOutcome) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.state = JobState::Complete;
            job.progress = 100;
            job.updated_at = Utc::now();
            job.result = Some(JobResult {
                video_file: job.video_file.clone(),
                language: outcome.transcript.language.clone(),
                transcription: outcome.transcript.text.clone(),
                summary: outcome.analysis.summary.clone(),
                insights: outcome.analysis.insights.clone(),
                quiz: outcome.analysis.quiz.clone(),
                partial: outcome.partial,
                diagnostics: outcome.diagnostics,
                artifacts: outcome.artifacts.clone(),
            });
            job.artifacts = outcome.artifacts;
            info!("✅ Job {} complete (partial: {})", job_id, outcome.partial);
        }
    }

    async fn mark_failed(&self, job_id: &str, error: &PipelineError) {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.get_mut(job_id) {
            job.state = JobState::Failed;
            job.updated_at = Utc::now();
            job.error = Some(JobError {
                code: error.code(),
                message: error.to_string(),
            });
        }
    }
}
