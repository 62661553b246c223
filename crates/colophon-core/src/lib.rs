//! # colophon-core
//!
//! Deterministic AACR2 punctuation checking for MARC-style fields, plus the
//! safety layer for AI-assisted cataloging.
//!
//! This crate answers three questions about a field:
//! - What should its punctuation be? ([`RuleEngine`])
//! - What did the assistant suggest, if it answered in prose? ([`TextExtractor`])
//! - May the assistant's proposed edit be applied? ([`GuardrailValidator`])
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same field and rules always produce the same findings
//! 2. **No network calls**: The AI transport lives outside this crate
//! 3. **Explainable**: Every finding cites its rule id and, where a neighbour
//!    decided the outcome, a rendered condition
//! 4. **Fail-closed**: One bad AI patch rejects the whole batch
//!
//! ## Example
//!
//! ```rust,ignore
//! use colophon_core::{Diagnostics, EngineConfig, Field, RuleEngine, RulePack};
//!
//! let engine = RuleEngine::new(&RulePack::builtin()?, EngineConfig::default());
//! let field = Field::new("245", '1', '0').subfield('a', "The great Gatsby");
//!
//! let mut diagnostics = Diagnostics::new();
//! for finding in engine.validate_field(&field, &mut diagnostics).findings {
//!     println!("{}: {}", finding.code, finding.explanation());
//! }
//! ```

pub mod assist;
pub mod diagnostics;
pub mod engine;
pub mod extract;
pub mod guardrail;
pub mod rules;
pub mod types;

// Re-export main types at crate root
pub use assist::{AiFinding, AiPatch, AiRequest, AiResult, Features, FieldError, FieldErrorCode, ProposedFix};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use engine::{is_field_covered, validate_field, validate_record, EngineConfig, RuleEngine, NO_RULE_DEFINED};
pub use extract::{
    detect_classification_range, extract_classification_from_text, extract_confidence_percent_from_text,
    extract_subject_headings_from_text, normalize_subject_value, ClassificationCandidate, ExtractedSuggestions,
    SubjectHeadingObject, SubjectSubfields, TextExtractor,
};
pub use guardrail::{GuardrailRejection, GuardrailValidator};
pub use rules::{Check, Rule, RulePack, RulePackError};
pub use types::{
    Condition, ConditionAction, Coverage, Field, FieldValidation, Finding, Patch, PatchOp, Record,
    RecordValidation, Severity, Subfield,
};
