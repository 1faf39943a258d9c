use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::transcription::ModelSize;

/// Configuration for the Video Lecture Assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Transcription settings
    pub transcription: TranscriptionConfig,

    /// Content analysis (Ollama) settings
    pub analysis: AnalysisConfig,

    /// Output and artifact settings
    pub output: OutputConfig,

    /// API server settings
    pub server: ServerConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Whisper model size (tiny/base/small/medium/large)
    pub model: ModelSize,

    /// Language hint for transcription (None = auto-detect)
    pub language: Option<String>,

    /// Timeout for a transcription run in seconds. Timeout is fatal;
    /// re-running with a smaller model is a caller-level retry.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Ollama model name (e.g. "llama3.1", "mistral")
    pub model: String,

    /// Ollama API base URL
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Sampling temperature (low for consistent JSON output)
    pub temperature: f32,

    /// Nucleus sampling parameter
    pub top_p: f32,

    /// Maximum tokens to generate
    pub num_predict: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Base output directory
    pub base_dir: PathBuf,

    /// Write the plain transcription to a .txt file
    pub save_transcription: bool,

    /// Generate the SRT subtitle file
    pub generate_subtitles: bool,

    /// Generate the analysis document
    pub generate_word_doc: bool,

    /// Mux subtitles into a copy of the video
    pub embed_subtitles: bool,

    /// Delete temporary audio files after processing
    pub cleanup_temp_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port for the job API
    pub port: u16,

    /// Directory for uploaded videos
    pub upload_dir: PathBuf,

    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of concurrently running jobs. Transcription and
    /// analysis are resource-intensive; keep this bounded.
    pub max_workers: usize,
}

impl Config {
    /// Load configuration from file, falling back to environment overrides.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "lecture-assistant.toml",
            "config/lecture-assistant.toml",
            "/etc/lecture-assistant/config.toml",
        ];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Build configuration from defaults plus environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("LECTURE_ASSISTANT_WHISPER_MODEL") {
            config.transcription.model = model.parse().map_err(|e| anyhow!("{}", e))?;
        }

        if let Ok(model) = std::env::var("LECTURE_ASSISTANT_OLLAMA_MODEL") {
            config.analysis.model = model;
        }

        if let Ok(endpoint) = std::env::var("LECTURE_ASSISTANT_OLLAMA_ENDPOINT") {
            config.analysis.endpoint = endpoint;
        }

        if let Ok(timeout) = std::env::var("LECTURE_ASSISTANT_OLLAMA_TIMEOUT") {
            config.analysis.timeout_seconds = timeout.parse().unwrap_or(600);
        }

        if let Ok(output_dir) = std::env::var("LECTURE_ASSISTANT_OUTPUT_DIR") {
            config.output.base_dir = PathBuf::from(output_dir);
        }

        if let Ok(workers) = std::env::var("LECTURE_ASSISTANT_WORKERS") {
            config.performance.max_workers = workers.parse().unwrap_or(2);
        }

        Ok(config)
    }

    /// Validate configuration. Rejections here never enter the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.analysis.timeout_seconds == 0 {
            return Err(anyhow!("analysis timeout must be greater than 0"));
        }

        if self.analysis.model.trim().is_empty() {
            return Err(anyhow!("analysis model name must not be empty"));
        }

        if !self.output.base_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&self.output.base_dir) {
                return Err(anyhow!("Cannot create output directory: {}", e));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcription: TranscriptionConfig {
                model: ModelSize::Base,
                language: None,
                timeout_seconds: 1800,
            },
            analysis: AnalysisConfig {
                model: "llama3.1".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                timeout_seconds: 600,
                temperature: 0.3,
                top_p: 0.9,
                num_predict: 4096,
            },
            output: OutputConfig {
                base_dir: PathBuf::from("outputs"),
                save_transcription: true,
                generate_subtitles: true,
                generate_word_doc: true,
                embed_subtitles: false,
                cleanup_temp_files: true,
            },
            server: ServerConfig {
                port: 8000,
                upload_dir: PathBuf::from("api_uploads"),
                max_upload_bytes: 1024 * 1024 * 1024, // 1GB
            },
            performance: PerformanceConfig {
                max_workers: num_cpus::get().min(4),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transcription.model, ModelSize::Base);
        assert_eq!(config.analysis.model, "llama3.1");
        assert_eq!(config.analysis.timeout_seconds, 600);
        assert!(config.output.generate_subtitles);
        assert!(!config.output.embed_subtitles);
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let mut config = Config::default();
        config.performance.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_model() {
        let mut config = Config::default();
        config.analysis.model = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
