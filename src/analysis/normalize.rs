//! Analysis response normalizer.
//!
//! The generation service is not a contract partner: it returns best-effort
//! structured text that may wrap JSON in prose or markdown fences, ship quiz
//! options as a list in one call and a keyed mapping in the next, and supply
//! the correct answer as text, a label, or an index. Everything here is a
//! pure function over the raw response, validated structurally before any
//! field is trusted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::ValidationError;

/// Target quiz length after reconciliation.
pub const QUIZ_TARGET_LEN: usize = 5;

/// Minimum surviving items for the quiz to be kept at all. Below this the
/// quiz is replaced with an empty sequence rather than failing the stage.
pub const QUIZ_MIN_VALID: usize = 3;

/// Validated analysis output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Concise paragraph summary
    pub summary: String,
    /// Ordered key insights (5-7 expected)
    pub insights: Vec<String>,
    /// Multiple-choice quiz; optional output, may be empty
    pub quiz: Vec<QuizItem>,
}

impl AnalysisResult {
    /// Explicit empty value used when the analysis stage degrades.
    pub fn placeholder() -> Self {
        Self {
            summary: String::new(),
            insights: Vec::new(),
            quiz: Vec::new(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.summary.is_empty() && self.insights.is_empty() && self.quiz.is_empty()
    }
}

/// One normalized quiz question. Option labels are drawn from the fixed
/// alphabet A, B, C, D, …; `correct_answer` always holds the option text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: String,
}

/// Raw upstream shapes, converted at the ingestion boundary. Downstream
/// code never branches on shape.
#[derive(Debug, Deserialize)]
struct RawAnalysis {
    summary: Option<String>,
    insights: Option<Vec<String>>,
    quiz: Option<Vec<RawQuizItem>>,
}

#[derive(Debug, Deserialize)]
struct RawQuizItem {
    question: Option<String>,
    options: Option<RawQuizOptions>,
    correct_answer: Option<serde_json::Value>,
}

/// Quiz options arrive either as an ordered list of option strings or as a
/// label-to-text mapping.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawQuizOptions {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

/// Normalize a raw generation-service response into the fixed schema.
///
/// Missing summary/insights surface as `IncompleteAnalysis` so the caller
/// can retry the upstream call once with an adjusted prompt; quiz problems
/// never fail the stage (items are dropped, the quiz may empty out).
pub fn normalize(raw_response: &str) -> Result<AnalysisResult, ValidationError> {
    let json = extract_json(raw_response).ok_or(ValidationError::MalformedResponse)?;

    let raw: RawAnalysis =
        serde_json::from_str(&json).map_err(|_| ValidationError::MalformedResponse)?;

    let summary = raw
        .summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError::IncompleteAnalysis("missing or empty summary".into()))?;

    let insights: Vec<String> = raw
        .insights
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if insights.is_empty() {
        return Err(ValidationError::IncompleteAnalysis(
            "missing or empty insights".into(),
        ));
    }

    let quiz = normalize_quiz(raw.quiz.unwrap_or_default());

    Ok(AnalysisResult {
        summary,
        insights,
        quiz,
    })
}

/// Extract the JSON object substring from a possibly prose-wrapped response.
fn extract_json(text: &str) -> Option<String> {
    let mut candidate = text.trim();

    // The model may wrap JSON in markdown code fences.
    if let Some(fenced) = candidate.split("```json").nth(1) {
        candidate = fenced.split("```").next().unwrap_or(fenced).trim();
    } else if let Some(fenced) = candidate.split("```").nth(1) {
        candidate = fenced.trim();
    }

    // Or in explanatory prose around the object itself.
    let start = candidate.find('{')?;
    let end = candidate.rfind('}')?;
    if end <= start {
        return None;
    }

    Some(candidate[start..=end].to_string())
}

/// Reconcile the raw quiz into at most `QUIZ_TARGET_LEN` validated items.
fn normalize_quiz(raw: Vec<RawQuizItem>) -> Vec<QuizItem> {
    let considered = raw.len().min(QUIZ_TARGET_LEN);
    let mut items = Vec::with_capacity(considered);

    for (index, raw_item) in raw.into_iter().take(QUIZ_TARGET_LEN).enumerate() {
        match normalize_quiz_item(index, raw_item) {
            Ok(item) => items.push(item),
            Err(e) => warn!("Dropping quiz item: {}", e),
        }
    }

    if items.len() < QUIZ_MIN_VALID {
        if !items.is_empty() {
            warn!(
                "Only {} of {} quiz items survived validation, dropping quiz",
                items.len(),
                QUIZ_TARGET_LEN
            );
        }
        return Vec::new();
    }

    items
}

fn normalize_quiz_item(index: usize, raw: RawQuizItem) -> Result<QuizItem, ValidationError> {
    let invalid = |reason: &str| ValidationError::InvalidQuizItem {
        index,
        reason: reason.to_string(),
    };

    let question = raw
        .question
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| invalid("missing question text"))?;

    // Convert to the canonical label->text form, remembering label order so
    // an index-valued correct_answer can be resolved deterministically.
    let ordered: Vec<(String, String)> = match raw.options {
        Some(RawQuizOptions::List(options)) => options
            .into_iter()
            .enumerate()
            .map(|(i, text)| (option_label(i), text.trim().to_string()))
            .collect(),
        Some(RawQuizOptions::Map(options)) => options
            .into_iter()
            .map(|(label, text)| (label.trim().to_ascii_uppercase(), text.trim().to_string()))
            .collect(),
        None => return Err(invalid("missing options")),
    };

    if ordered.len() < 2 {
        return Err(invalid("fewer than two options"));
    }
    if ordered.iter().any(|(_, text)| text.is_empty()) {
        return Err(invalid("empty option text"));
    }

    let correct_raw = raw.correct_answer.ok_or_else(|| invalid("missing correct_answer"))?;
    let correct_answer = resolve_correct_answer(&ordered, &correct_raw)
        .ok_or_else(|| invalid("correct_answer matches neither an option nor a label"))?;

    Ok(QuizItem {
        question,
        options: ordered.into_iter().collect(),
        correct_answer,
    })
}

/// Resolve a raw correct_answer value to the canonical option text.
///
/// Accepted forms: the option text itself (matched case-insensitively after
/// trimming), a single-letter label, or a zero-based index into the option
/// order. Anything else, including an out-of-range index, is a mismatch and
/// the item is dropped by the caller.
fn resolve_correct_answer(
    ordered: &[(String, String)],
    raw: &serde_json::Value,
) -> Option<String> {
    match raw {
        serde_json::Value::Number(n) => {
            let index = n.as_u64()? as usize;
            ordered.get(index).map(|(_, text)| text.clone())
        }
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }

            // Exact or case-insensitive text match wins first, so an option
            // that happens to be a single letter is not mistaken for a label.
            let lowered = trimmed.to_lowercase();
            if let Some((_, text)) = ordered
                .iter()
                .find(|(_, text)| text.trim().to_lowercase() == lowered)
            {
                return Some(text.clone());
            }

            // Single-letter label form ("B" or "b").
            if trimmed.chars().count() == 1 {
                let label = trimmed.to_ascii_uppercase();
                if let Some((_, text)) = ordered.iter().find(|(l, _)| *l == label) {
                    return Some(text.clone());
                }
            }

            None
        }
        _ => None,
    }
}

/// Label for the option at `index`: A, B, C, D, …
fn option_label(index: usize) -> String {
    // 26 options is far beyond anything the prompt asks for; fall back to
    // a numbered label rather than panicking on absurd input.
    if index < 26 {
        ((b'A' + index as u8) as char).to_string()
    } else {
        format!("Z{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiz_json(items: &[&str]) -> String {
        format!(
            r#"{{"summary": "A lecture on geography.",
                 "insights": ["Capitals are cities.", "Europe has many countries."],
                 "quiz": [{}]}}"#,
            items.join(",")
        )
    }

    const VALID_ITEM: &str = r#"{
        "question": "What is the capital of the UK?",
        "options": ["Paris", "London", "Rome", "Berlin"],
        "correct_answer": "London"
    }"#;

    #[test]
    fn test_pure_json_response() {
        let result = normalize(&quiz_json(&[VALID_ITEM])).unwrap();
        assert_eq!(result.summary, "A lecture on geography.");
        assert_eq!(result.insights.len(), 2);
    }

    #[test]
    fn test_fenced_json_response() {
        let raw = format!("```json\n{}\n```", quiz_json(&[VALID_ITEM]));
        assert!(normalize(&raw).is_ok());
    }

    #[test]
    fn test_prose_wrapped_json_response() {
        let raw = format!(
            "Sure! Here is the analysis you asked for:\n\n{}\n\nLet me know if you need more.",
            quiz_json(&[VALID_ITEM])
        );
        assert!(normalize(&raw).is_ok());
    }

    #[test]
    fn test_no_json_is_malformed() {
        assert_eq!(
            normalize("I could not process the transcription."),
            Err(ValidationError::MalformedResponse)
        );
    }

    #[test]
    fn test_unbalanced_braces_is_malformed() {
        assert_eq!(
            normalize("{\"summary\": \"truncated"),
            Err(ValidationError::MalformedResponse)
        );
    }

    #[test]
    fn test_missing_summary_is_incomplete() {
        let raw = r#"{"insights": ["a fact"], "quiz": []}"#;
        assert!(matches!(
            normalize(raw),
            Err(ValidationError::IncompleteAnalysis(_))
        ));
    }

    #[test]
    fn test_empty_insights_is_incomplete() {
        let raw = r#"{"summary": "ok", "insights": [], "quiz": []}"#;
        assert!(matches!(
            normalize(raw),
            Err(ValidationError::IncompleteAnalysis(_))
        ));
    }

    #[test]
    fn test_list_options_get_labels_in_order() {
        let result = normalize(&quiz_json(&[VALID_ITEM, VALID_ITEM, VALID_ITEM])).unwrap();
        let item = &result.quiz[0];

        let expected: Vec<(&str, &str)> = vec![
            ("A", "Paris"),
            ("B", "London"),
            ("C", "Rome"),
            ("D", "Berlin"),
        ];
        let actual: Vec<(&str, &str)> = item
            .options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(actual, expected);
        assert_eq!(item.correct_answer, "London");
    }

    #[test]
    fn test_map_options_used_as_is() {
        let item = r#"{
            "question": "Pick one.",
            "options": {"A": "Paris", "B": "London", "C": "Rome", "D": "Berlin"},
            "correct_answer": "B"
        }"#;
        let result = normalize(&quiz_json(&[item, item, item])).unwrap();
        assert_eq!(result.quiz[0].correct_answer, "London");
        assert_eq!(result.quiz[0].options.len(), 4);
    }

    #[test]
    fn test_correct_answer_as_index() {
        let item = r#"{
            "question": "Pick one.",
            "options": ["Paris", "London", "Rome", "Berlin"],
            "correct_answer": 2
        }"#;
        let result = normalize(&quiz_json(&[item, item, item])).unwrap();
        assert_eq!(result.quiz[0].correct_answer, "Rome");
    }

    #[test]
    fn test_out_of_range_index_drops_item() {
        let bad = r#"{
            "question": "Pick one.",
            "options": ["Paris", "London"],
            "correct_answer": 9
        }"#;
        let result = normalize(&quiz_json(&[bad, VALID_ITEM, VALID_ITEM, VALID_ITEM])).unwrap();
        assert_eq!(result.quiz.len(), 3);
    }

    #[test]
    fn test_case_insensitive_text_match() {
        let item = r#"{
            "question": "Pick one.",
            "options": ["Paris", "London", "Rome", "Berlin"],
            "correct_answer": " london "
        }"#;
        let result = normalize(&quiz_json(&[item, item, item])).unwrap();
        assert_eq!(result.quiz[0].correct_answer, "London");
    }

    #[test]
    fn test_unmatched_answer_drops_item_and_threshold_empties_quiz() {
        let bad = r#"{
            "question": "Pick one.",
            "options": ["Paris", "London"],
            "correct_answer": "Madrid"
        }"#;
        // 3 bad + 2 good: fewer than 3 survive, quiz becomes empty
        let result = normalize(&quiz_json(&[bad, bad, bad, VALID_ITEM, VALID_ITEM])).unwrap();
        assert!(result.quiz.is_empty());
        // The stage itself still succeeded
        assert_eq!(result.summary, "A lecture on geography.");
    }

    #[test]
    fn test_three_survivors_keep_quiz() {
        let bad = r#"{"question": "q", "options": ["a", "b"], "correct_answer": "zzz"}"#;
        let result =
            normalize(&quiz_json(&[bad, bad, VALID_ITEM, VALID_ITEM, VALID_ITEM])).unwrap();
        assert_eq!(result.quiz.len(), 3);
    }

    #[test]
    fn test_more_than_five_items_truncated() {
        let items = vec![VALID_ITEM; 8];
        let result = normalize(&quiz_json(&items)).unwrap();
        assert_eq!(result.quiz.len(), QUIZ_TARGET_LEN);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let first = normalize(&quiz_json(&[VALID_ITEM, VALID_ITEM, VALID_ITEM])).unwrap();
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = normalize(&reserialized).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_option_text_that_is_a_letter_beats_label() {
        // Text match has priority over label interpretation.
        let item = r#"{
            "question": "Which grade?",
            "options": ["A", "B", "C", "D"],
            "correct_answer": "B"
        }"#;
        let result = normalize(&quiz_json(&[item, item, item])).unwrap();
        assert_eq!(result.quiz[0].correct_answer, "B");
    }

    #[test]
    fn test_missing_quiz_yields_empty_quiz() {
        let raw = r#"{"summary": "ok", "insights": ["one fact"]}"#;
        let result = normalize(raw).unwrap();
        assert!(result.quiz.is_empty());
    }

    #[test]
    fn test_placeholder_is_empty() {
        let placeholder = AnalysisResult::placeholder();
        assert!(placeholder.is_placeholder());
        assert!(placeholder.summary.is_empty());
    }
}
