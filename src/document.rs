use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::analysis::AnalysisResult;
use crate::error::{PipelineError, StageName};
use crate::transcript::Transcript;

/// Full analysis payload written as the JSON artifact and returned by
/// the job result endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisDocument {
    pub video_file: String,
    pub language: String,
    pub transcription: String,
    pub summary: String,
    pub insights: Vec<String>,
    pub quiz: Vec<crate::analysis::QuizItem>,
}

impl AnalysisDocument {
    pub fn new(video_file: impl Into<String>, transcript: &Transcript, analysis: &AnalysisResult) -> Self {
        Self {
            video_file: video_file.into(),
            language: transcript.language.clone(),
            transcription: transcript.text.clone(),
            summary: analysis.summary.clone(),
            insights: analysis.insights.clone(),
            quiz: analysis.quiz.clone(),
        }
    }

    /// Write the JSON artifact.
    ///
    /// By the time this runs the transcript, subtitles, and report may
    /// already be on disk, so a failure here degrades the job rather
    /// than discarding everything that succeeded.
    pub async fn save_json(&self, path: &Path) -> Result<(), PipelineError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            PipelineError::degradable(
                StageName::Assembly,
                format!("cannot serialize results: {}", e),
            )
        })?;
        tokio::fs::write(path, json).await.map_err(|e| {
            PipelineError::degradable(
                StageName::Assembly,
                format!("failed to write {}: {}", path.display(), e),
            )
        })?;
        info!("✅ Results JSON saved: {}", path.display());
        Ok(())
    }
}

/// Human-readable analysis report generator.
///
/// Renders the terminal-style report layout as a monospace-friendly
/// document: banner header, then summary, key insights, and quiz
/// sections with the correct option marked.
#[derive(Debug, Clone, Default)]
pub struct ReportGenerator;

const SEPARATOR_LEN: usize = 60;

impl ReportGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Render the full report.
    pub fn render(&self, analysis: &AnalysisResult) -> String {
        let heavy = "=".repeat(SEPARATOR_LEN);
        let light = "-".repeat(SEPARATOR_LEN);
        let mut out = String::new();

        out.push_str(&heavy);
        out.push('\n');
        out.push_str("VIDEO LECTURE ANALYSIS RESULTS\n");
        out.push_str(&heavy);
        out.push_str("\n\n");

        out.push_str("📝 SUMMARY:\n");
        out.push_str(&light);
        out.push('\n');
        out.push_str(&analysis.summary);
        out.push_str("\n\n");

        out.push_str("💡 KEY INSIGHTS:\n");
        out.push_str(&light);
        out.push('\n');
        for (i, insight) in analysis.insights.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, insight));
        }
        out.push('\n');

        out.push_str("❓ QUIZ QUESTIONS:\n");
        out.push_str(&light);
        out.push('\n');
        for (i, item) in analysis.quiz.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("Question {}: {}\n", i + 1, item.question));
            for (j, (_, option)) in item.options.iter().enumerate() {
                let marker = if *option == item.correct_answer {
                    "[✓]"
                } else {
                    "[ ]"
                };
                out.push_str(&format!("  {} {}. {}\n", marker, j + 1, option));
            }
        }
        out.push('\n');
        out.push_str(&heavy);
        out.push('\n');

        out
    }

    /// Write the rendered report to a file. Failure here degrades the
    /// job rather than failing it; the structured JSON still carries
    /// the same content.
    pub async fn save_to_file(
        &self,
        analysis: &AnalysisResult,
        path: &Path,
    ) -> Result<(), PipelineError> {
        tokio::fs::write(path, self.render(analysis))
            .await
            .map_err(|e| {
                PipelineError::degradable(
                    StageName::Assembly,
                    format!("failed to write report {}: {}", path.display(), e),
                )
            })?;
        info!("✅ Analysis report saved: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::QuizItem;
    use std::collections::BTreeMap;

    fn sample_analysis() -> AnalysisResult {
        let mut options = BTreeMap::new();
        options.insert("A".to_string(), "A programming language".to_string());
        options.insert("B".to_string(), "A subset of AI".to_string());
        options.insert("C".to_string(), "A database system".to_string());
        options.insert("D".to_string(), "An operating system".to_string());

        AnalysisResult {
            summary: "This lecture covers the fundamentals of machine learning.".to_string(),
            insights: vec![
                "Machine learning enables computers to learn from data".to_string(),
                "Deep learning is a subset of machine learning".to_string(),
            ],
            quiz: vec![QuizItem {
                question: "What is machine learning?".to_string(),
                options,
                correct_answer: "A subset of AI".to_string(),
            }],
        }
    }

    #[test]
    fn test_report_layout() {
        let report = ReportGenerator::new().render(&sample_analysis());

        assert!(report.starts_with(&"=".repeat(60)));
        assert!(report.contains("VIDEO LECTURE ANALYSIS RESULTS"));
        assert!(report.contains("📝 SUMMARY:"));
        assert!(report.contains("💡 KEY INSIGHTS:"));
        assert!(report.contains("1. Machine learning enables computers to learn from data"));
        assert!(report.contains("❓ QUIZ QUESTIONS:"));
        assert!(report.contains("Question 1: What is machine learning?"));
    }

    #[test]
    fn test_correct_option_marked() {
        let report = ReportGenerator::new().render(&sample_analysis());
        assert!(report.contains("[✓] 2. A subset of AI"));
        assert!(report.contains("[ ] 1. A programming language"));
    }

    #[test]
    fn test_json_document_shape() {
        let transcript = Transcript::new(vec![], "en", "full transcript text");
        let doc = AnalysisDocument::new("lecture.mp4", &transcript, &sample_analysis());
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["video_file"], "lecture.mp4");
        assert_eq!(json["language"], "en");
        assert_eq!(json["transcription"], "full transcript text");
        assert!(json["quiz"].as_array().unwrap().len() == 1);
        assert_eq!(json["quiz"][0]["correct_answer"], "A subset of AI");
    }

    #[tokio::test]
    async fn test_report_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analysis.md");
        ReportGenerator::new()
            .save_to_file(&sample_analysis(), &path)
            .await
            .unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.contains("VIDEO LECTURE ANALYSIS RESULTS"));
    }

    #[tokio::test]
    async fn test_json_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let transcript = Transcript::new(vec![], "en", "text");
        AnalysisDocument::new("lecture.mp4", &transcript, &sample_analysis())
            .save_json(&path)
            .await
            .unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(parsed["video_file"], "lecture.mp4");
    }

    #[tokio::test]
    async fn test_json_write_failure_is_degradable() {
        let transcript = Transcript::new(vec![], "en", "text");
        let doc = AnalysisDocument::new("lecture.mp4", &transcript, &sample_analysis());
        let err = doc
            .save_json(std::path::Path::new("/nonexistent-dir/results.json"))
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(
            err,
            PipelineError::Degradable {
                stage: StageName::Assembly,
                ..
            }
        ));
        assert_eq!(err.code(), "assembly_degraded");
    }

    #[tokio::test]
    async fn test_report_write_failure_is_degradable() {
        let err = ReportGenerator::new()
            .save_to_file(
                &sample_analysis(),
                std::path::Path::new("/nonexistent-dir/analysis.md"),
            )
            .await
            .unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_empty_quiz_still_renders() {
        let mut analysis = sample_analysis();
        analysis.quiz.clear();
        let report = ReportGenerator::new().render(&analysis);
        assert!(report.contains("❓ QUIZ QUESTIONS:"));
        assert!(!report.contains("Question 1:"));
    }
}
