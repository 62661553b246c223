//! Guardrail for AI-proposed edits.
//!
//! Assistants produce SUGGESTIONS, not EDITS. A batch of proposed patches is
//! checked against the request it answers and the field state that was sent;
//! the first violation rejects the whole batch. Nothing is partially applied.
//!
//! # Validation Steps
//! 1. The result is an object echoing the pending `request_id`
//! 2. Every patch is a `replace_subfield`
//! 3. Every patch targets the requested tag and occurrence
//! 4. Every patch names a subfield code that was sent
//! 5. Every patch's `original_text` equals a value that was sent
//! 6. Only punctuation and whitespace differ between original and replacement
//! 7. The replacement agrees with the rule engine where a rule applies

use serde_json::Value;
use thiserror::Error;

use crate::assist::{AiPatch, AiRequest, AiResult, REPLACE_SUBFIELD_OP};
use crate::diagnostics::Diagnostics;
use crate::engine::RuleEngine;
use crate::types::{Field, Patch};

/// Why a batch was rejected. `Display` is the user-facing reason.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailRejection {
    #[error("AI response is malformed")]
    MalformedResult,

    #[error("AI response does not match the pending request")]
    RequestMismatch,

    #[error("AI patch uses an unsupported operation")]
    UnsupportedOperation,

    #[error("AI patch scope violation")]
    ScopeViolation,

    #[error("AI patch targets an unknown subfield")]
    UnknownSubfield,

    #[error("AI patch is stale: the field changed since the request was sent")]
    StaleOriginal,

    #[error("AI patch contains non-punctuation edits")]
    NonPunctuationEdit,

    #[error("AI patch conflicts with deterministic rules")]
    RuleConflict,
}

/// Validates AI patch batches against one request.
pub struct GuardrailValidator<'a> {
    engine: &'a RuleEngine,
}

impl<'a> GuardrailValidator<'a> {
    pub fn new(engine: &'a RuleEngine) -> Self {
        Self { engine }
    }

    /// Validate an undecoded response.
    pub fn validate_value(
        &self,
        request: &AiRequest,
        value: &Value,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Patch>, GuardrailRejection> {
        if !value.is_object() {
            return Err(GuardrailRejection::MalformedResult);
        }
        let result: AiResult =
            serde_json::from_value(value.clone()).map_err(|_| GuardrailRejection::MalformedResult)?;
        self.validate(request, &result, diagnostics)
    }

    /// Validate a decoded response. On success, returns the accepted patches
    /// converted to core patches (empty when the result proposes none).
    pub fn validate(
        &self,
        request: &AiRequest,
        result: &AiResult,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Patch>, GuardrailRejection> {
        if result.request_id.as_deref() != Some(request.request_id.as_str()) {
            return Err(GuardrailRejection::RequestMismatch);
        }

        let field = &request.tag_context;
        let accepted = result
            .patches()
            .map(|patch| self.check_patch(field, patch, diagnostics))
            .collect::<Result<Vec<_>, _>>();

        match &accepted {
            Ok(patches) => tracing::debug!(
                request_id = %request.request_id,
                patches = patches.len(),
                "AI patch batch accepted"
            ),
            Err(reason) => tracing::debug!(
                request_id = %request.request_id,
                reason = %reason,
                "AI patch batch rejected"
            ),
        }
        accepted
    }

    fn check_patch(
        &self,
        field: &Field,
        patch: &AiPatch,
        diagnostics: &mut Diagnostics,
    ) -> Result<Patch, GuardrailRejection> {
        if patch.op != REPLACE_SUBFIELD_OP {
            return Err(GuardrailRejection::UnsupportedOperation);
        }

        if patch.tag != field.tag || patch.occurrence.unwrap_or(0) != field.occurrence {
            return Err(GuardrailRejection::ScopeViolation);
        }

        let code = patch.subfield_code().ok_or(GuardrailRejection::UnknownSubfield)?;
        let positions: Vec<usize> = field
            .subfields
            .iter()
            .enumerate()
            .filter(|(_, s)| s.code == code)
            .map(|(i, _)| i)
            .collect();
        if positions.is_empty() {
            return Err(GuardrailRejection::UnknownSubfield);
        }

        let position = positions
            .into_iter()
            .find(|&i| field.subfields[i].value == patch.original_text)
            .ok_or(GuardrailRejection::StaleOriginal)?;

        if letters_and_digits(&patch.original_text) != letters_and_digits(&patch.replacement_text) {
            return Err(GuardrailRejection::NonPunctuationEdit);
        }

        let expected = self.engine.expected_values(field, position, diagnostics);
        if !expected.is_empty() && !expected.contains(&patch.replacement_text) {
            return Err(GuardrailRejection::RuleConflict);
        }

        Ok(Patch::replace_subfield(field, position, code, patch.replacement_text.clone()))
    }
}

fn letters_and_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}
