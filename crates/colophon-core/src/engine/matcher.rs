//! Rule predicate matching.
//!
//! Tag and subfield patterns are compiled once when the engine is built.
//! Patterns that are excessively long or structurally prone to catastrophic
//! backtracking are rejected up front and behave as "never matches"; the
//! first time a rejected pattern is consulted a diagnostic is recorded.

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::rules::{RepeatPolicy, Rule};
use crate::types::Field;

/// Compiled program size cap for rule patterns.
const PATTERN_SIZE_LIMIT: usize = 1 << 16;

lazy_static! {
    /// A quantified group whose body already contains a quantifier, e.g. `(a+)+`.
    static ref NESTED_QUANTIFIER: Regex = Regex::new(
        r"\((?:[^()\\]|\\.)*(?:[+*]|\{\d+,?\d*\})(?:[^()\\]|\\.)*\)(?:[+*]|\{\d+,?\d*\})"
    ).unwrap();

    static ref BACKREFERENCE: Regex = Regex::new(r"\\[1-9]").unwrap();
}

/// A rule pattern after compilation.
#[derive(Debug, Clone)]
pub(crate) enum CompiledPattern {
    Ready(Regex),
    Rejected {
        pattern: String,
        kind: DiagnosticKind,
        reason: String,
    },
}

impl CompiledPattern {
    pub(crate) fn compile(pattern: &str, max_length: usize) -> Self {
        let reject = |kind, reason: String| CompiledPattern::Rejected {
            pattern: pattern.to_string(),
            kind,
            reason,
        };

        if pattern.len() > max_length {
            return reject(
                DiagnosticKind::UnsafePattern,
                format!("Pattern exceeds {} characters", max_length),
            );
        }
        if NESTED_QUANTIFIER.is_match(pattern) {
            return reject(
                DiagnosticKind::UnsafePattern,
                "Pattern nests quantifiers and may backtrack catastrophically".to_string(),
            );
        }
        if BACKREFERENCE.is_match(pattern) {
            return reject(
                DiagnosticKind::UnsafePattern,
                "Pattern uses backreferences".to_string(),
            );
        }

        match RegexBuilder::new(pattern).size_limit(PATTERN_SIZE_LIMIT).build() {
            Ok(regex) => CompiledPattern::Ready(regex),
            Err(e) => reject(DiagnosticKind::InvalidPattern, format!("Pattern does not compile: {}", e)),
        }
    }

    pub(crate) fn is_match(&self, text: &str, diagnostics: &mut Diagnostics) -> bool {
        match self {
            CompiledPattern::Ready(regex) => regex.is_match(text),
            CompiledPattern::Rejected {
                pattern,
                kind,
                reason,
            } => {
                diagnostics.warn_once(*kind, pattern.clone(), reason.clone());
                false
            }
        }
    }
}

/// A rule together with its compiled patterns.
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: Rule,
    tag_pattern: Option<CompiledPattern>,
    subfield_pattern: Option<CompiledPattern>,
}

impl CompiledRule {
    pub(crate) fn new(rule: Rule, max_pattern_length: usize) -> Self {
        let tag_pattern = match (&rule.tag, &rule.tag_pattern) {
            (None, Some(p)) => Some(CompiledPattern::compile(p, max_pattern_length)),
            _ => None,
        };
        let subfield_pattern = match (rule.subfields.is_empty(), &rule.subfield_pattern) {
            (true, Some(p)) => Some(CompiledPattern::compile(p, max_pattern_length)),
            _ => None,
        };

        Self {
            rule,
            tag_pattern,
            subfield_pattern,
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.rule.id
    }

    pub(crate) fn is_fallback(&self) -> bool {
        self.rule.only_when_no_other_rule
    }

    /// Value-independent part of the predicate: tag, indicators, code.
    pub(crate) fn matches_static(
        &self,
        tag: &str,
        code: char,
        ind1: char,
        ind2: char,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        if let Some(spec) = &self.rule.ind1 {
            if !spec.matches(ind1) {
                return false;
            }
        }
        if let Some(spec) = &self.rule.ind2 {
            if !spec.matches(ind2) {
                return false;
            }
        }
        self.matches_tag(tag, diagnostics) && self.matches_code(code, diagnostics)
    }

    fn matches_tag(&self, tag: &str, diagnostics: &mut Diagnostics) -> bool {
        match (&self.rule.tag, &self.tag_pattern) {
            (Some(exact), _) => exact == tag,
            (None, Some(pattern)) => pattern.is_match(tag, diagnostics),
            (None, None) => false,
        }
    }

    fn matches_code(&self, code: char, diagnostics: &mut Diagnostics) -> bool {
        if !self.rule.subfields.is_empty() {
            return self.rule.subfields.contains(&code);
        }
        match &self.subfield_pattern {
            Some(pattern) => {
                let mut buf = [0u8; 4];
                pattern.is_match(code.encode_utf8(&mut buf), diagnostics)
            }
            None => true,
        }
    }

    /// Full predicate for the subfield at `index`.
    pub(crate) fn matches_at(&self, field: &Field, index: usize, diagnostics: &mut Diagnostics) -> bool {
        let Some(subfield) = field.subfields.get(index) else {
            return false;
        };

        self.matches_static(&field.tag, subfield.code, field.ind1, field.ind2, diagnostics)
            && self.matches_co_occurrence(field, index)
            && self.matches_adjacency(field, index)
            && self.matches_repeat_policy(field, index)
    }

    fn matches_co_occurrence(&self, field: &Field, index: usize) -> bool {
        self.rule
            .requires_subfields
            .iter()
            .all(|&code| field.has_populated_other(code, index))
            && !self
                .rule
                .forbids_subfields
                .iter()
                .any(|&code| field.has_populated_other(code, index))
    }

    fn matches_adjacency(&self, field: &Field, index: usize) -> bool {
        if !self.rule.next_subfield_is.is_empty() {
            match next_populated(field, index) {
                Some(code) if self.rule.next_subfield_is.contains(&code) => {}
                _ => return false,
            }
        }
        if !self.rule.previous_subfield_is.is_empty() {
            match previous_populated(field, index) {
                Some(code) if self.rule.previous_subfield_is.contains(&code) => {}
                _ => return false,
            }
        }
        true
    }

    fn matches_repeat_policy(&self, field: &Field, index: usize) -> bool {
        let code = field.subfields[index].code;
        let mut positions = field
            .subfields
            .iter()
            .enumerate()
            .filter(|(_, s)| s.code == code)
            .map(|(i, _)| i);

        match self.rule.repeat_policy {
            RepeatPolicy::All => true,
            RepeatPolicy::FirstOnly => positions.next() == Some(index),
            RepeatPolicy::LastOnly => positions.last() == Some(index),
        }
    }
}

/// Code of the nearest populated subfield after `index`.
fn next_populated(field: &Field, index: usize) -> Option<char> {
    field.subfields[index + 1..]
        .iter()
        .find(|s| s.is_populated())
        .map(|s| s.code)
}

/// Code of the nearest populated subfield before `index`.
fn previous_populated(field: &Field, index: usize) -> Option<char> {
    field.subfields[..index]
        .iter()
        .rev()
        .find(|s| s.is_populated())
        .map(|s| s.code)
}

/// Drop fallback rules when a non-fallback rule also matched.
pub(crate) fn apply_fallback_policy(matched: Vec<&CompiledRule>) -> Vec<&CompiledRule> {
    if matched.len() <= 1 {
        return matched;
    }
    let primary: Vec<&CompiledRule> = matched.iter().copied().filter(|r| !r.is_fallback()).collect();
    if primary.is_empty() {
        matched
    } else {
        primary
    }
}
