use serde::{Deserialize, Serialize};

/// One timestamped unit of transcribed speech.
///
/// Times are seconds from the start of the media. The transcription engine
/// guarantees `0 <= start < end` and that segments arrive ordered and
/// non-overlapping; downstream stages rely on that and never re-sort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    /// Segment duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Complete transcription of one media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Ordered, non-overlapping segments
    pub segments: Vec<Segment>,
    /// Detected language code (e.g. "en"), "unknown" when not reported
    pub language: String,
    /// Full transcription text
    pub text: String,
}

impl Transcript {
    pub fn new(segments: Vec<Segment>, language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            segments,
            language: language.into(),
            text: text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total spoken duration covered by the transcript, in seconds.
    pub fn duration(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_duration() {
        let segment = Segment::new(1.5, 4.0, "hello");
        assert!((segment.duration() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_transcript_duration_is_last_segment_end() {
        let transcript = Transcript::new(
            vec![
                Segment::new(0.0, 3.5, "Welcome to this video lecture."),
                Segment::new(3.5, 7.2, "Today we'll be discussing machine learning."),
            ],
            "en",
            "Welcome to this video lecture. Today we'll be discussing machine learning.",
        );
        assert!((transcript.duration() - 7.2).abs() < f64::EPSILON);
        assert!(!transcript.is_empty());
    }

    #[test]
    fn test_empty_transcript() {
        let transcript = Transcript::new(Vec::new(), "unknown", "");
        assert!(transcript.is_empty());
        assert_eq!(transcript.duration(), 0.0);
    }
}
