use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;

/// HTTP client for a local Ollama generation service.
///
/// Single-turn, non-streaming requests against `/api/generate`. The
/// service is treated as unreliable; callers decide whether a failure
/// degrades or aborts.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    model: String,
    options: GenerateOptions,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Sampling options sent with every generation request. Low temperature
/// keeps the JSON output consistent across calls.
#[derive(Debug, Clone, Copy, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: GenerateOptions {
                temperature: config.temperature,
                top_p: config.top_p,
                num_predict: config.num_predict,
            },
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the model for a single job without rebuilding the client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send a prompt and return the raw completion text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.endpoint);
        debug!("Sending generation request to {} (model: {})", url, self.model);

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self.options,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("generation request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "generation service returned {}",
                response.status()
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .context("unparseable generation response")?;

        debug!("Received {} characters from model", body.response.len());
        Ok(body.response)
    }

    /// Check whether the service is reachable. Used by the health endpoint
    /// and as a pre-flight before the analysis stage.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Ollama availability check failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trailing_slash_stripped() {
        let mut config = AnalysisConfig {
            model: "llama3.1".to_string(),
            endpoint: "http://localhost:11434/".to_string(),
            timeout_seconds: 600,
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 4096,
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:11434");

        config.endpoint = "http://localhost:11434".to_string();
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_model_override() {
        let config = AnalysisConfig {
            model: "llama3.1".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout_seconds: 600,
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 4096,
        };
        let client = OllamaClient::new(&config).unwrap().with_model("mistral");
        assert_eq!(client.model(), "mistral");
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            model: "llama3.1",
            prompt: "hello",
            stream: false,
            options: GenerateOptions {
                temperature: 0.3,
                top_p: 0.9,
                num_predict: 4096,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.1");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 4096);
    }
}
