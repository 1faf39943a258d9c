//! Job API for the Video Lecture Assistant
//!
//! Exposes the pipeline as an asynchronous polled HTTP service: submit a
//! video, poll its status, fetch the result and artifacts when done.

use anyhow::Result;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::jobs::JobRegistry;

pub mod handlers;
pub mod models;
pub mod server;

/// API server wrapping the job registry.
pub struct ApiServer {
    registry: Arc<JobRegistry>,
    port: u16,
}

impl ApiServer {
    pub fn new(registry: Arc<JobRegistry>, port: u16) -> Self {
        Self { registry, port }
    }

    /// Start the API server in the background
    pub fn start_background(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.start().await })
    }

    /// Start the API server and serve until shutdown
    pub async fn start(self) -> Result<()> {
        info!("🚀 Starting API server on port {}", self.port);
        server::start_http_server(self.registry, self.port).await
    }
}
