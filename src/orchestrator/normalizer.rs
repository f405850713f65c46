//! Parsing of raw provider output into typed task results.
//!
//! One pure function per task kind. Any output that fails structural or semantic
//! validation is reported as [`MalformedOutput`], which the orchestrator treats as a
//! failed tier rather than an error for the caller.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::intent::{Intent, ParsedIntent, DEFAULT_TIMER_SECONDS};
use crate::tasks::{Diagnosis, FoodSafetyReport, LiveFeedback, Severity};

const FENCE: &str = "```";

/// Provider output that could not be turned into a valid task result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed output: {reason}")]
pub struct MalformedOutput {
    pub reason: String,
}

impl MalformedOutput {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Remove a surrounding code fence, including an optional language hint.
///
/// Raw JSON is returned as-is (trimmed). Otherwise the body of the first fenced block
/// is returned; a missing closing fence takes the remainder of the text.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    let Some(open) = trimmed.find(FENCE) else {
        return trimmed;
    };

    let after_open = &trimmed[open + FENCE.len()..];
    let hint_len = after_open
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(after_open.len());
    let body = &after_open[hint_len..];

    match body.find(FENCE) {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// Decode a fenced or bare JSON payload.
pub fn decode_json<T: DeserializeOwned>(raw: &str) -> Result<T, MalformedOutput> {
    let payload = strip_fences(raw);
    if payload.is_empty() {
        return Err(MalformedOutput::new("empty structured payload"));
    }
    serde_json::from_str(payload).map_err(|e| MalformedOutput::new(format!("invalid JSON: {}", e)))
}

/// Free-text output: trimmed, never empty.
pub fn normalize_text(raw: &str) -> Result<String, MalformedOutput> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(MalformedOutput::new("empty text response"));
    }
    Ok(text.to_string())
}

/// Step tip task.
pub fn normalize_tip(raw: &str) -> Result<String, MalformedOutput> {
    normalize_text(raw)
}

/// Mentor chat task.
pub fn normalize_chat_reply(raw: &str) -> Result<String, MalformedOutput> {
    normalize_text(raw)
}

#[derive(Deserialize)]
struct RawIntent {
    intent: Intent,
    #[serde(default)]
    duration_seconds: Option<u32>,
}

/// Voice intent task.
///
/// The intent name must belong to the closed set. A TIMER without a duration gets the
/// default; a zero duration is rejected. Durations on other intents are dropped.
pub fn normalize_intent(raw: &str) -> Result<ParsedIntent, MalformedOutput> {
    let parsed: RawIntent = decode_json(raw)?;
    match parsed.intent {
        Intent::Timer => match parsed.duration_seconds {
            Some(0) => Err(MalformedOutput::new("timer duration must be positive")),
            Some(secs) => Ok(ParsedIntent::timer(secs)),
            None => Ok(ParsedIntent::timer(DEFAULT_TIMER_SECONDS)),
        },
        other => Ok(ParsedIntent::new(other)),
    }
}

#[derive(Deserialize)]
struct RawFoodSafety {
    safe: bool,
    #[serde(default)]
    warnings: Vec<String>,
}

/// Food safety task.
pub fn normalize_food_safety(raw: &str) -> Result<FoodSafetyReport, MalformedOutput> {
    let parsed: RawFoodSafety = decode_json(raw)?;
    Ok(FoodSafetyReport {
        safe: parsed.safe,
        warnings: clean_list(parsed.warnings),
    })
}

#[derive(Deserialize)]
struct RawDiagnosis {
    root_cause: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    tips: Vec<String>,
    severity: Severity,
    confidence: f64,
}

/// Failure diagnosis task.
pub fn normalize_diagnosis(raw: &str) -> Result<Diagnosis, MalformedOutput> {
    let parsed: RawDiagnosis = decode_json(raw)?;

    let root_cause = parsed.root_cause.trim();
    if root_cause.is_empty() {
        return Err(MalformedOutput::new("root_cause is empty"));
    }
    if !(0.0..=1.0).contains(&parsed.confidence) {
        return Err(MalformedOutput::new(format!(
            "confidence {} outside [0, 1]",
            parsed.confidence
        )));
    }

    Ok(Diagnosis {
        root_cause: root_cause.to_string(),
        explanation: parsed.explanation.trim().to_string(),
        tips: clean_list(parsed.tips),
        severity: parsed.severity,
        confidence: parsed.confidence,
    })
}

#[derive(Deserialize)]
struct RawLiveFeedback {
    feedback: String,
    is_on_track: bool,
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Live cooking feedback task.
pub fn normalize_live_feedback(raw: &str) -> Result<LiveFeedback, MalformedOutput> {
    let parsed: RawLiveFeedback = decode_json(raw)?;
    let feedback = normalize_text(&parsed.feedback)?;
    Ok(LiveFeedback {
        feedback,
        is_on_track: parsed.is_on_track,
        suggestions: clean_list(parsed.suggestions),
    })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_fences_with_language_hint() {
        let raw = "```json\n{\"safe\": true}\n```";
        assert_eq!(strip_fences(raw), "{\"safe\": true}");
    }

    #[test]
    fn test_strip_fences_without_hint() {
        assert_eq!(strip_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_fences("```{\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_with_surrounding_prose() {
        let raw = "Here is the result:\n```json\n{\"a\": 1}\n```\nHope it helps";
        assert_eq!(strip_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_passthrough() {
        assert_eq!(strip_fences("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(strip_fences("plain words"), "plain words");
    }

    #[test]
    fn test_strip_fences_unclosed() {
        assert_eq!(strip_fences("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_tip_trims_and_rejects_blank() {
        assert_eq!(normalize_tip("  Listen for the sizzle.\n").unwrap(), "Listen for the sizzle.");
        assert!(normalize_tip("   \n\t").is_err());
    }

    #[test]
    fn test_intent_fenced_timer() {
        let raw = "```json\n{\"intent\": \"TIMER\", \"duration_seconds\": 600}\n```";
        assert_eq!(normalize_intent(raw).unwrap(), ParsedIntent::timer(600));
    }

    #[test]
    fn test_intent_timer_defaults_and_rejects_zero() {
        assert_eq!(
            normalize_intent("{\"intent\": \"TIMER\"}").unwrap(),
            ParsedIntent::timer(300)
        );
        assert!(normalize_intent("{\"intent\": \"TIMER\", \"duration_seconds\": 0}").is_err());
        assert!(normalize_intent("{\"intent\": \"TIMER\", \"duration_seconds\": -5}").is_err());
    }

    #[test]
    fn test_intent_drops_duration_on_other_intents() {
        let parsed = normalize_intent("{\"intent\": \"NEXT\", \"duration_seconds\": 10}").unwrap();
        assert_eq!(parsed, ParsedIntent::new(Intent::Next));
    }

    #[test]
    fn test_intent_unrecognized_name_is_malformed() {
        assert!(normalize_intent("{\"intent\": \"DANCE\"}").is_err());
        assert!(normalize_intent("{\"intent\": \"next\"}").is_err());
        assert!(normalize_intent("NEXT").is_err());
    }

    #[test]
    fn test_food_safety_parses_warnings() {
        let raw = "```json\n{\"safe\": false, \"warnings\": [\"Cook chicken to 74C\", \"  \"]}\n```";
        let report = normalize_food_safety(raw).unwrap();
        assert!(!report.safe);
        assert_eq!(report.warnings, vec!["Cook chicken to 74C".to_string()]);
    }

    #[test]
    fn test_food_safety_missing_safe_is_malformed() {
        assert!(normalize_food_safety("{\"warnings\": []}").is_err());
    }

    #[test]
    fn test_diagnosis_valid() {
        let raw = r#"```json
{
    "root_cause": "burnt",
    "explanation": "Heat was too high.",
    "tips": ["Lower the heat", "Stir more often"],
    "severity": "moderate",
    "confidence": 0.85
}
```"#;
        let diagnosis = normalize_diagnosis(raw).unwrap();
        assert_eq!(diagnosis.root_cause, "burnt");
        assert_eq!(diagnosis.severity, Severity::Moderate);
        assert_eq!(diagnosis.tips.len(), 2);
        assert!((diagnosis.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_diagnosis_unrecognized_severity_is_malformed() {
        let raw = "```json\n{\"root_cause\": \"burnt\", \"explanation\": \"x\", \"tips\": [], \"severity\": \"catastrophic\", \"confidence\": 0.9}\n```";
        let err = normalize_diagnosis(raw).unwrap_err();
        assert!(err.reason.contains("invalid JSON"));
    }

    #[test]
    fn test_diagnosis_severity_is_not_case_coerced() {
        let raw = "{\"root_cause\": \"burnt\", \"severity\": \"Major\", \"confidence\": 0.9}";
        assert!(normalize_diagnosis(raw).is_err());
    }

    #[test]
    fn test_diagnosis_confidence_range() {
        let raw = "{\"root_cause\": \"burnt\", \"severity\": \"minor\", \"confidence\": 1.5}";
        assert!(normalize_diagnosis(raw).is_err());
        let raw = "{\"root_cause\": \"  \", \"severity\": \"minor\", \"confidence\": 0.5}";
        assert!(normalize_diagnosis(raw).is_err());
    }

    #[test]
    fn test_live_feedback() {
        let raw = "{\"feedback\": \"Onions look golden\", \"is_on_track\": true, \"suggestions\": [\"Add garlic now\"]}";
        let feedback = normalize_live_feedback(raw).unwrap();
        assert!(feedback.is_on_track);
        assert_eq!(feedback.suggestions, vec!["Add garlic now".to_string()]);

        assert!(normalize_live_feedback("{\"feedback\": \"\", \"is_on_track\": true}").is_err());
    }
}
