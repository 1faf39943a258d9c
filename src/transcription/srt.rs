use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{PipelineError, StageName};
use crate::transcript::Transcript;

/// One timed subtitle cue (index + time range + text).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrtEntry {
    /// Sequential number, 1-based
    pub index: u32,
    /// Start time in milliseconds
    pub start_ms: u64,
    /// End time in milliseconds, always greater than start_ms
    pub end_ms: u64,
    /// Cue text
    pub text: String,
}

impl SrtEntry {
    /// Build a cue from float-second timestamps, rounding to the nearest
    /// millisecond. Degenerate zero-length cues are clamped to a 1 ms
    /// minimum duration rather than emitting an invalid cue.
    pub fn from_seconds(index: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        let start_ms = seconds_to_millis(start);
        let mut end_ms = seconds_to_millis(end);
        if end_ms <= start_ms {
            end_ms = start_ms + 1;
        }
        Self {
            index,
            start_ms,
            end_ms,
            text: text.into().trim().to_string(),
        }
    }
}

impl fmt::Display for SrtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            format_timestamp(self.start_ms),
            format_timestamp(self.end_ms),
            self.text
        )
    }
}

/// Subtitle-formatting stage executor.
///
/// Formats a transcript into the standard numbered-cue format with
/// millisecond-precision timestamps. Output uses LF line endings.
#[derive(Debug, Clone, Default)]
pub struct SrtGenerator {
    entries: Vec<SrtEntry>,
}

impl SrtGenerator {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Build cues from a transcript. Segments arrive ordered and
    /// non-overlapping; indices are assigned sequentially starting at 1.
    pub fn from_transcript(transcript: &Transcript) -> Self {
        let entries = transcript
            .segments
            .iter()
            .enumerate()
            .map(|(i, segment)| {
                SrtEntry::from_seconds((i + 1) as u32, segment.start, segment.end, &segment.text)
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SrtEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generate the full SRT file content.
    pub fn generate(&self) -> String {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.to_string());
            content.push('\n');
        }
        content
    }

    /// Write the SRT content to a file (UTF-8, LF).
    ///
    /// A write failure this late degrades the job: the transcript and
    /// analysis still stand on their own, only the subtitle artifacts
    /// are skipped.
    pub async fn save_to_file(&self, path: &Path) -> Result<(), PipelineError> {
        tokio::fs::write(path, self.generate()).await.map_err(|e| {
            PipelineError::degradable(
                StageName::SubtitleGeneration,
                format!("failed to write {}: {}", path.display(), e),
            )
        })
    }
}

/// Round float seconds to the nearest millisecond.
fn seconds_to_millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

/// Format milliseconds as an SRT timestamp (HH:MM:SS,mmm).
fn format_timestamp(total_ms: u64) -> String {
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}
