pub mod normalize;
pub mod ollama;

pub use normalize::{normalize, AnalysisResult, QuizItem};
pub use ollama::OllamaClient;

use tracing::{info, warn};

use crate::config::AnalysisConfig;
use crate::error::{PipelineError, StageName};

/// Minimum transcript length worth sending to the model at all.
const MIN_TRANSCRIPT_CHARS: usize = 50;

const SYSTEM_INSTRUCTION: &str = "You are an expert educational assistant and curriculum designer. \
Your task is to analyze a provided lecture transcription and generate a structured set of learning aids. \
The output must be in a single, valid JSON object.

Rules:

Summary: The summary must be a single, concise paragraph (4-6 sentences) capturing the main argument and topics of the lecture.

Insights: The insights must be a list of 5-7 distinct, important facts, definitions, or concepts from the text. Each insight should be a single, clear sentence.

Quiz: The quiz must contain exactly 5 multiple-choice questions.

Quiz Structure: Each question must have:
  - A question text.
  - A list of 4 options.
  - The correct_answer (which must be one of the provided options).

Relevance: All summaries, insights, and questions must be 100% derived from the provided transcription. Do not introduce external information.";

/// Content-analysis stage executor.
///
/// Sends the transcript to the generation service and validates the
/// response through the normalizer. One bounded retry with a shortened
/// transcript and a stricter prompt; after that the caller degrades the
/// job rather than failing it.
#[derive(Debug, Clone)]
pub struct ContentAnalyzer {
    client: OllamaClient,
}

impl ContentAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self, PipelineError> {
        let client = OllamaClient::new(config)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.client = self.client.with_model(model);
        self
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    /// Analyze a transcription into summary, insights and quiz.
    ///
    /// All failures out of this method are degradable: the pipeline
    /// completes with placeholder analysis and records the diagnostic.
    pub async fn analyze(&self, transcription: &str) -> Result<AnalysisResult, PipelineError> {
        let transcription = transcription.trim();
        if transcription.chars().count() < MIN_TRANSCRIPT_CHARS {
            return Err(PipelineError::degradable(
                StageName::Analysis,
                "transcription too short or empty for meaningful analysis",
            ));
        }

        info!(
            "🧠 Analyzing transcription ({} characters) with model {}",
            transcription.len(),
            self.client.model()
        );

        match self.attempt(transcription, false).await {
            Ok(result) => Ok(result),
            Err(first) => {
                warn!("Analysis attempt failed ({}), retrying once with shortened transcript", first);
                let shortened = shorten_transcript(transcription);
                self.attempt(&shortened, true).await.map_err(|second| {
                    PipelineError::degradable(
                        StageName::Analysis,
                        format!("analysis failed after retry: {}", second),
                    )
                })
            }
        }
    }

    async fn attempt(&self, transcription: &str, strict: bool) -> anyhow::Result<AnalysisResult> {
        let prompt = build_prompt(transcription, strict);
        let response = self.client.generate(&prompt).await?;
        let result = normalize(&response)?;
        info!(
            "✅ Analysis completed: {} insights, {} quiz questions",
            result.insights.len(),
            result.quiz.len()
        );
        Ok(result)
    }
}

fn build_prompt(transcription: &str, strict: bool) -> String {
    let reminder = if strict {
        "\n\nIMPORTANT: Your previous response could not be parsed. \
         Return ONLY the raw JSON object with no markdown fences, no commentary, \
         and every field from the schema present."
    } else {
        "\n\nIMPORTANT: Return ONLY the JSON object, nothing else."
    };

    format!(
        "{system}\n\nHere is the transcription from an educational lecture. \
         Please analyze it and provide the summary, key insights, and a 5-question \
         multiple-choice quiz based on the rules.\n\n\
         Transcription:\n\n{transcription}\n\n\n\
         Output Format:\n\n\
         Provide your response as a single, valid JSON object using this exact schema:\n\n\
         {{\n\
         \x20 \"summary\": \"A single-paragraph summary of the lecture content...\",\n\
         \x20 \"insights\": [\n\
         \x20   \"The first key insight or definition.\",\n\
         \x20   \"The second key insight or fact.\"\n\
         \x20 ],\n\
         \x20 \"quiz\": [\n\
         \x20   {{\n\
         \x20     \"question\": \"The question text?\",\n\
         \x20     \"options\": [\"Option 1\", \"Option 2\", \"Option 3\", \"Option 4\"],\n\
         \x20     \"correct_answer\": \"Option 3\"\n\
         \x20   }}\n\
         \x20 ]\n\
         }}{reminder}",
        system = SYSTEM_INSTRUCTION,
        transcription = transcription,
        reminder = reminder,
    )
}

/// Halve the transcript for the retry attempt, respecting char boundaries.
fn shorten_transcript(transcription: &str) -> String {
    let half = transcription.chars().count() / 2;
    transcription.chars().take(half.max(MIN_TRANSCRIPT_CHARS)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_transcript_is_degradable() {
        let config = AnalysisConfig {
            model: "llama3.1".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout_seconds: 600,
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 4096,
        };
        let analyzer = ContentAnalyzer::new(&config).unwrap();

        let result = tokio_test::block_on(analyzer.analyze("too short"));
        assert!(matches!(
            result,
            Err(PipelineError::Degradable {
                stage: StageName::Analysis,
                ..
            })
        ));
    }

    #[test]
    fn test_prompt_contains_transcript_and_schema() {
        let prompt = build_prompt("the lecture covered binary search trees", false);
        assert!(prompt.contains("the lecture covered binary search trees"));
        assert!(prompt.contains("\"correct_answer\": \"Option 3\""));
        assert!(prompt.contains("Return ONLY the JSON object"));
    }

    #[test]
    fn test_strict_prompt_adds_reminder() {
        let prompt = build_prompt("some transcript text here", true);
        assert!(prompt.contains("could not be parsed"));
    }

    #[test]
    fn test_shorten_respects_char_boundaries() {
        let text = "é".repeat(200);
        let shortened = shorten_transcript(&text);
        assert_eq!(shortened.chars().count(), 100);
    }
}
