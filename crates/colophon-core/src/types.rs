//! Core types for Colophon.
//!
//! Fields and records are transient views built by the caller for one
//! validation pass. Findings and patches are produced fresh on every
//! evaluation and never mutated afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single labelled value slot within a field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subfield {
    /// Single alphanumeric subfield code (e.g. `a`)
    pub code: char,

    /// Current value as entered by the cataloger
    #[serde(default)]
    pub value: String,
}

impl Subfield {
    pub fn new(code: char, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }

    /// Whether the value carries any non-whitespace content.
    pub fn is_populated(&self) -> bool {
        !self.value.trim().is_empty()
    }
}

/// A tagged data field with indicators and ordered subfields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    /// Three-character tag (e.g. "245")
    pub tag: String,

    /// First indicator, space when absent
    #[serde(default = "blank_indicator", deserialize_with = "indicator")]
    pub ind1: char,

    /// Second indicator, space when absent
    #[serde(default = "blank_indicator", deserialize_with = "indicator")]
    pub ind2: char,

    /// Disambiguates repeated tags within one record
    #[serde(default)]
    pub occurrence: usize,

    /// Subfields in entry order
    #[serde(default)]
    pub subfields: Vec<Subfield>,
}

impl Field {
    /// Create an empty field with the given tag and indicators.
    pub fn new(tag: impl Into<String>, ind1: char, ind2: char) -> Self {
        Self {
            tag: tag.into(),
            ind1,
            ind2,
            occurrence: 0,
            subfields: Vec::new(),
        }
    }

    /// Set the occurrence key.
    pub fn with_occurrence(mut self, occurrence: usize) -> Self {
        self.occurrence = occurrence;
        self
    }

    /// Append a subfield.
    pub fn subfield(mut self, code: char, value: impl Into<String>) -> Self {
        self.subfields.push(Subfield::new(code, value));
        self
    }

    /// Value of the first subfield with the given code.
    pub fn first_value(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }

    /// Whether a populated subfield with `code` exists at a position other than `skip`.
    pub fn has_populated_other(&self, code: char, skip: usize) -> bool {
        self.subfields
            .iter()
            .enumerate()
            .any(|(i, s)| i != skip && s.code == code && s.is_populated())
    }

    /// Write a patch's value into the addressed subfield.
    ///
    /// Returns `false` when the patch does not address this field or the
    /// position no longer holds the expected code.
    pub fn apply_patch(&mut self, patch: &Patch) -> bool {
        if patch.tag != self.tag || patch.occurrence != self.occurrence {
            return false;
        }
        match self.subfields.get_mut(patch.position) {
            Some(sub) if sub.code == patch.code => {
                sub.value = patch.value.clone();
                true
            }
            _ => false,
        }
    }
}

fn blank_indicator() -> char {
    ' '
}

fn indicator<'de, D>(deserializer: D) -> Result<char, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.chars().next()).unwrap_or(' '))
}

/// A whole bibliographic record, used for coverage scans.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Record {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// The only supported mutation primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PatchOp {
    #[default]
    ReplaceSubfield,
}

/// A single-subfield replacement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Patch {
    pub op: PatchOp,
    pub tag: String,
    /// Subfield code
    pub code: char,
    /// Field occurrence
    pub occurrence: usize,
    /// Index of the subfield within the field
    pub position: usize,
    /// Replacement value
    pub value: String,
}

impl Patch {
    pub fn replace_subfield(field: &Field, position: usize, code: char, value: impl Into<String>) -> Self {
        Self {
            op: PatchOp::ReplaceSubfield,
            tag: field.tag.clone(),
            code,
            occurrence: field.occurrence,
            position,
            value: value.into(),
        }
    }
}

/// What a following-dependent suffix resolution did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionAction {
    TrimBecauseFollowerPresent,
    AddBecauseFollowerAbsent,
}

/// Explains why terminal punctuation was trimmed or added.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Condition {
    pub action: ConditionAction,

    /// Follower codes considered; empty means any subfield
    #[serde(default)]
    pub followers: Vec<char>,
}

impl Condition {
    pub fn trim(followers: &[char]) -> Self {
        Self {
            action: ConditionAction::TrimBecauseFollowerPresent,
            followers: followers.to_vec(),
        }
    }

    pub fn add(followers: &[char]) -> Self {
        Self {
            action: ConditionAction::AddBecauseFollowerAbsent,
            followers: followers.to_vec(),
        }
    }

    fn follower_phrase(&self) -> String {
        let codes: Vec<String> = self.followers.iter().map(|c| format!("${c}")).collect();
        match codes.len() {
            0 => "another subfield".to_string(),
            1 => codes[0].clone(),
            n => format!("{} or {}", codes[..n - 1].join(", "), codes[n - 1]),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            ConditionAction::TrimBecauseFollowerPresent => write!(
                f,
                "Terminal punctuation omitted because {} follows.",
                self.follower_phrase()
            ),
            ConditionAction::AddBecauseFollowerAbsent if self.followers.is_empty() => {
                write!(f, "Terminal punctuation added because no other subfield follows.")
            }
            ConditionAction::AddBecauseFollowerAbsent => write!(
                f,
                "Terminal punctuation added because no {} follows.",
                self.follower_phrase()
            ),
        }
    }
}

/// A discrepancy between a subfield's current and expected form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub severity: Severity,

    /// Rule identifier, or `no_rule_defined` for coverage findings
    pub code: String,

    pub message: String,

    #[serde(default)]
    pub rationale: String,

    pub tag: String,
    pub subfield: char,
    pub occurrence: usize,
    pub position: usize,

    pub current_value: String,

    /// Never equal to `current_value` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    #[serde(default)]
    pub proposed_fixes: Vec<Patch>,
}

impl Finding {
    /// Human-readable explanation: message followed by the condition, if any.
    pub fn explanation(&self) -> String {
        match &self.condition {
            Some(condition) => format!("{} {}", self.message, condition),
            None => self.message.clone(),
        }
    }
}

/// Whether any rule matched a field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coverage {
    pub covered: bool,
    pub rule_ids: Vec<String>,
}

/// Result of validating one field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FieldValidation {
    pub findings: Vec<Finding>,
    pub coverage: Coverage,
}

/// Result of validating a whole record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecordValidation {
    pub findings: Vec<Finding>,
}
