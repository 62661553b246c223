//! AI request/response payloads.
//!
//! The core consumes these shapes but never performs the network call.
//! Decoding is deliberately lenient (missing fields default) so that a
//! structurally odd answer reaches the guardrail and is rejected there with
//! a specific reason instead of failing as an opaque parse error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{Field, Record};

/// The only patch operation an assistant may propose.
pub const REPLACE_SUBFIELD_OP: &str = "replace_subfield";

/// Which kinds of help are being asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub punctuation_explain: bool,
    pub subject_guidance: bool,
    pub call_number_guidance: bool,
}

impl Features {
    pub fn all() -> Self {
        Self {
            punctuation_explain: true,
            subject_guidance: true,
            call_number_guidance: true,
        }
    }
}

/// Outbound request for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRequest {
    pub request_id: String,

    /// The field being asked about, with the values as sent
    pub tag_context: Field,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_context: Option<Record>,

    #[serde(default)]
    pub features: Features,
}

/// A patch as an assistant proposes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiPatch {
    pub op: String,
    pub tag: String,
    /// Subfield code, with or without a leading `$`
    pub subfield: String,
    pub occurrence: Option<usize>,
    pub original_text: String,
    pub replacement_text: String,
}

impl AiPatch {
    /// The single subfield code this patch names, if it names one.
    pub fn subfield_code(&self) -> Option<char> {
        let raw = self.subfield.trim();
        let raw = raw.strip_prefix('$').unwrap_or(raw);
        let mut chars = raw.chars();
        match (chars.next(), chars.next()) {
            (Some(code), None) => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProposedFix {
    pub patch: Vec<AiPatch>,
}

/// A finding as an assistant reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFinding {
    pub code: String,
    pub message: String,
    pub rationale: String,
    pub subfield: Option<String>,
    pub proposed_fixes: Vec<ProposedFix>,
}

/// Typed field-level error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldErrorCode {
    /// A classification range was proposed where a single number is required
    ClassificationRange,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub code: FieldErrorCode,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub message: String,
}

impl FieldError {
    pub fn classification_range(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: FieldErrorCode::ClassificationRange,
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// Inbound response for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiResult {
    pub request_id: Option<String>,

    pub findings: Vec<AiFinding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    /// Headings as strings or loosely-shaped objects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subjects: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_message: Option<String>,

    /// Either a percentage or a fraction in `0..=1`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_percent: Option<f64>,

    pub errors: Vec<FieldError>,
}

impl AiResult {
    /// Every proposed patch in document order.
    pub fn patches(&self) -> impl Iterator<Item = &AiPatch> {
        self.findings
            .iter()
            .flat_map(|f| f.proposed_fixes.iter())
            .flat_map(|fix| fix.patch.iter())
    }
}
