//! Reply interpretation.
//!
//! Assistants are asked for JSON but do not always comply. A reply is
//! structured when a JSON object can be found in it (the whole text, a
//! fenced ```json block, or the outermost braces). Anything else is prose
//! and goes through the text extractor.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use colophon_core::{
    detect_classification_range, normalize_subject_value, AiResult, FieldError, SubjectHeadingObject, TextExtractor,
};

/// Tag that classification-range errors are reported against.
pub const CLASSIFICATION_TAG: &str = "050";

lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").unwrap();
}

/// Non-patch suggestions recovered from a reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    /// Single classification number; `None` whenever a range was proposed
    pub classification: Option<String>,

    pub subjects: Vec<SubjectHeadingObject>,

    pub confidence_percent: Option<u8>,

    pub assistant_message: Option<String>,

    pub field_errors: Vec<FieldError>,
}

/// A reply made ready for the guardrail.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    /// What the guardrail validates
    pub value: Value,

    /// Whether the assistant answered with JSON
    pub structured: bool,

    pub suggestions: Suggestions,
}

/// Interpret raw reply text for the request identified by `request_id`.
///
/// Prose replies carry no patches and cannot echo an id, so they adopt the
/// id the transport answered for.
pub fn interpret_reply(text: &str, request_id: &str, subject_subfield_cap: usize) -> Interpretation {
    if let Some(value) = find_json_object(text) {
        let suggestions = match serde_json::from_value::<AiResult>(value.clone()) {
            Ok(result) => structured_suggestions(result, subject_subfield_cap),
            // Undecodable objects are the guardrail's to reject
            Err(_) => Suggestions::default(),
        };
        return Interpretation {
            value,
            structured: true,
            suggestions,
        };
    }

    tracing::debug!(request_id, "Reply is not JSON, falling back to text extraction");
    let extracted = TextExtractor::new(subject_subfield_cap).extract(text);
    let message = text.trim();
    let assistant_message = (!message.is_empty()).then(|| message.to_string());

    let result = AiResult {
        request_id: Some(request_id.to_string()),
        assistant_message: assistant_message.clone(),
        ..Default::default()
    };
    let value = serde_json::to_value(&result).unwrap_or(Value::Null);

    let field_errors = extracted
        .range_rejection
        .map(|message| vec![FieldError::classification_range(CLASSIFICATION_TAG, message)])
        .unwrap_or_default();

    Interpretation {
        value,
        structured: false,
        suggestions: Suggestions {
            classification: extracted.classification,
            subjects: extracted.subjects,
            confidence_percent: extracted.confidence_percent,
            assistant_message,
            field_errors,
        },
    }
}

fn structured_suggestions(result: AiResult, cap: usize) -> Suggestions {
    let mut field_errors = result.errors;
    let classification = match result.classification.map(|c| c.trim().to_string()) {
        Some(c) if c.is_empty() => None,
        Some(c) => match detect_classification_range(&c) {
            Some(message) => {
                field_errors.push(FieldError::classification_range(CLASSIFICATION_TAG, message));
                None
            }
            None => Some(c),
        },
        None => None,
    };

    let subjects = result
        .subjects
        .unwrap_or_default()
        .iter()
        .filter_map(|v| normalize_subject_value(v, cap))
        .collect();

    Suggestions {
        classification,
        subjects,
        confidence_percent: result.confidence_percent.and_then(percent),
        assistant_message: result.assistant_message,
        field_errors,
    }
}

/// Fractions in `0..=1` are scaled; everything is clamped to `0..=100`.
fn percent(raw: f64) -> Option<u8> {
    if !raw.is_finite() {
        return None;
    }
    let scaled = if raw <= 1.0 { raw * 100.0 } else { raw };
    Some(scaled.clamp(0.0, 100.0).round() as u8)
}

fn find_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let fenced = FENCED_JSON
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim());
    let braced = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    };

    [Some(trimmed), fenced, braced]
        .into_iter()
        .flatten()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .find(Value::is_object)
}
