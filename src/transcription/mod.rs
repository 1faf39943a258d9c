pub mod srt;
pub mod whisper;

pub use srt::{SrtEntry, SrtGenerator};
pub use whisper::WhisperTranscriber;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Whisper model sizes, trading latency for accuracy.
///
/// Selection is a pass-through configuration option; the only
/// orchestration-level logic is membership validation at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }

    pub const ALL: [ModelSize; 5] = [
        ModelSize::Tiny,
        ModelSize::Base,
        ModelSize::Small,
        ModelSize::Medium,
        ModelSize::Large,
    ];
}

impl FromStr for ModelSize {
    type Err = UnsupportedModelSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            other => Err(UnsupportedModelSize(other.to_string())),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected at submission time; the pipeline never sees an invalid size.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unsupported whisper model size: '{0}' (expected tiny/base/small/medium/large)")]
pub struct UnsupportedModelSize(pub String);
