//! The deterministic punctuation rule engine.
//!
//! One generic interpreter evaluates declarative rules against a field's
//! subfields. Evaluation is a pure function of (field, config, rules): input
//! is never mutated, and the only side channel is the caller's
//! [`Diagnostics`].
//!
//! ## Per-subfield flow
//!
//! ```text
//! subfield ──► matching rules ──► fallback filter ──► checks (in order) ──► Finding?
//! ```

mod checks;
mod matcher;
pub mod text;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::rules::RulePack;
use crate::types::{Coverage, Field, FieldValidation, Finding, Patch, Record, RecordValidation, Severity};
use checks::evaluate_checks;
use matcher::{apply_fallback_policy, CompiledRule};

/// Finding code for strict-coverage reports.
pub const NO_RULE_DEFINED: &str = "no_rule_defined";

/// Default cap on rule pattern length.
pub const DEFAULT_MAX_PATTERN_LENGTH: usize = 128;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Longer `tag_pattern`/`subfield_pattern` values are rejected
    pub max_pattern_length: usize,

    /// Rule ids skipped at engine construction
    pub disabled_rules: BTreeSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pattern_length: DEFAULT_MAX_PATTERN_LENGTH,
            disabled_rules: BTreeSet::new(),
        }
    }
}

/// Compiled rule set. Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    config: EngineConfig,
}

impl RuleEngine {
    pub fn new(pack: &RulePack, config: EngineConfig) -> Self {
        let rules = pack
            .rules()
            .iter()
            .filter(|r| !config.disabled_rules.contains(&r.id))
            .map(|r| CompiledRule::new(r.clone(), config.max_pattern_length))
            .collect();

        Self { rules, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of active rules.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn matching_rules(&self, field: &Field, index: usize, diagnostics: &mut Diagnostics) -> Vec<&CompiledRule> {
        let matched = self
            .rules
            .iter()
            .filter(|rule| rule.matches_at(field, index, diagnostics))
            .collect();
        apply_fallback_policy(matched)
    }

    /// Evaluate every subfield of one field.
    pub fn validate_field(&self, field: &Field, diagnostics: &mut Diagnostics) -> FieldValidation {
        let mut findings = Vec::new();
        let mut rule_ids: Vec<String> = Vec::new();

        for (index, subfield) in field.subfields.iter().enumerate() {
            for rule in self.matching_rules(field, index, diagnostics) {
                if !rule_ids.iter().any(|id| id == rule.id()) {
                    rule_ids.push(rule.id().to_string());
                }
                if !subfield.is_populated() {
                    continue;
                }

                let evaluation = evaluate_checks(&rule.rule.checks, field, index);
                if evaluation.expected == subfield.value {
                    continue;
                }

                let patch = Patch::replace_subfield(field, index, subfield.code, evaluation.expected.clone());
                findings.push(Finding {
                    severity: rule.rule.severity,
                    code: rule.id().to_string(),
                    message: finding_message(rule, field, subfield.code),
                    rationale: rule.rule.rationale.clone(),
                    tag: field.tag.clone(),
                    subfield: subfield.code,
                    occurrence: field.occurrence,
                    position: index,
                    current_value: subfield.value.clone(),
                    expected_value: Some(evaluation.expected),
                    condition: evaluation.condition,
                    proposed_fixes: vec![patch],
                });
            }
        }

        tracing::debug!(
            tag = %field.tag,
            occurrence = field.occurrence,
            findings = findings.len(),
            rules = rule_ids.len(),
            "Validated field"
        );

        FieldValidation {
            findings,
            coverage: Coverage {
                covered: !rule_ids.is_empty(),
                rule_ids,
            },
        }
    }

    /// Evaluate every field of a record.
    ///
    /// With `strict_coverage`, each populated subfield that no rule matched
    /// also yields an informational `no_rule_defined` finding without a fix.
    pub fn validate_record(
        &self,
        record: &Record,
        strict_coverage: bool,
        diagnostics: &mut Diagnostics,
    ) -> RecordValidation {
        let mut findings = Vec::new();

        for field in &record.fields {
            findings.extend(self.validate_field(field, diagnostics).findings);

            if !strict_coverage {
                continue;
            }
            for (index, subfield) in field.subfields.iter().enumerate() {
                if !subfield.is_populated() || !self.matching_rules(field, index, diagnostics).is_empty() {
                    continue;
                }
                findings.push(Finding {
                    severity: Severity::Info,
                    code: NO_RULE_DEFINED.to_string(),
                    message: format!("No punctuation rule defined for {}${}", field.tag, subfield.code),
                    rationale: String::new(),
                    tag: field.tag.clone(),
                    subfield: subfield.code,
                    occurrence: field.occurrence,
                    position: index,
                    current_value: subfield.value.clone(),
                    expected_value: None,
                    condition: None,
                    proposed_fixes: Vec::new(),
                });
            }
        }

        RecordValidation { findings }
    }

    /// Whether any rule could apply to a tag/code/indicator combination,
    /// independent of values and neighbouring subfields.
    pub fn is_field_covered(
        &self,
        tag: &str,
        code: char,
        ind1: char,
        ind2: char,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.matches_static(tag, code, ind1, ind2, diagnostics))
    }

    /// Distinct expected values the matching rules compute for one subfield.
    ///
    /// Values equal to the current value are included: a subfield that already
    /// satisfies its rules pins any replacement to that value.
    pub fn expected_values(&self, field: &Field, position: usize, diagnostics: &mut Diagnostics) -> Vec<String> {
        if position >= field.subfields.len() {
            return Vec::new();
        }

        let mut values: Vec<String> = Vec::new();
        for rule in self.matching_rules(field, position, diagnostics) {
            let expected = evaluate_checks(&rule.rule.checks, field, position).expected;
            if !values.contains(&expected) {
                values.push(expected);
            }
        }
        values
    }
}

fn finding_message(rule: &CompiledRule, field: &Field, code: char) -> String {
    if rule.rule.message.is_empty() {
        format!("{}${} does not follow rule {}", field.tag, code, rule.id())
    } else {
        rule.rule.message.clone()
    }
}

/// Validate one field against a rule pack.
pub fn validate_field(
    field: &Field,
    config: &EngineConfig,
    rules: &RulePack,
    diagnostics: &mut Diagnostics,
) -> FieldValidation {
    RuleEngine::new(rules, config.clone()).validate_field(field, diagnostics)
}

/// Validate a whole record against a rule pack.
pub fn validate_record(
    record: &Record,
    config: &EngineConfig,
    rules: &RulePack,
    strict_coverage: bool,
    diagnostics: &mut Diagnostics,
) -> RecordValidation {
    RuleEngine::new(rules, config.clone()).validate_record(record, strict_coverage, diagnostics)
}

/// Cheap coverage predicate for gating AI assistance.
pub fn is_field_covered(
    tag: &str,
    code: char,
    ind1: char,
    ind2: char,
    config: &EngineConfig,
    rules: &RulePack,
    diagnostics: &mut Diagnostics,
) -> bool {
    RuleEngine::new(rules, config.clone()).is_field_covered(tag, code, ind1, ind2, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(json: &str) -> RuleEngine {
        RuleEngine::new(&RulePack::from_json(json).unwrap(), EngineConfig::default())
    }

    const TITLE_RULES: &str = r#"[
        {
            "id": "245a-terminal",
            "tag": "245",
            "subfields": ["a"],
            "message": "Title proper ends with a period when nothing follows",
            "checks": [{
                "type": "punctuation",
                "suffix": ".",
                "suffix_mode": "when_last",
                "following_subfields": ["b", "c"],
                "trim_when_no_suffix": true
            }]
        },
        {
            "id": "generic-spacing",
            "tag_pattern": "^2",
            "only_when_no_other_rule": true,
            "severity": "info",
            "checks": [{ "type": "spacing" }]
        }
    ]"#;

    #[test]
    fn test_finding_and_patch() {
        let engine = engine(TITLE_RULES);
        let field = Field::new("245", '1', '0').subfield('a', "Title");
        let mut diagnostics = Diagnostics::new();

        let result = engine.validate_field(&field, &mut diagnostics);
        assert_eq!(result.findings.len(), 1);
        let finding = &result.findings[0];
        assert_eq!(finding.code, "245a-terminal");
        assert_eq!(finding.expected_value.as_deref(), Some("Title."));
        assert_eq!(finding.proposed_fixes[0].value, "Title.");
        assert_eq!(
            finding.explanation(),
            "Title proper ends with a period when nothing follows \
             Terminal punctuation added because no $b or $c follows."
        );
        assert_eq!(result.coverage.rule_ids, vec!["245a-terminal".to_string()]);
    }

    #[test]
    fn test_no_op_suppressed() {
        let engine = engine(TITLE_RULES);
        let field = Field::new("245", '1', '0').subfield('a', "Title.");
        let mut diagnostics = Diagnostics::new();
        let result = engine.validate_field(&field, &mut diagnostics);
        assert!(result.findings.is_empty());
        assert!(result.coverage.covered);
    }

    #[test]
    fn test_fallback_only_when_nothing_else() {
        let engine = engine(TITLE_RULES);
        let field = Field::new("245", '1', '0')
            .subfield('a', "Title.")
            .subfield('n', "Part  one");
        let mut diagnostics = Diagnostics::new();
        let result = engine.validate_field(&field, &mut diagnostics);

        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].code, "generic-spacing");
        assert_eq!(result.findings[0].severity, Severity::Info);
        assert_eq!(
            result.coverage.rule_ids,
            vec!["245a-terminal".to_string(), "generic-spacing".to_string()]
        );
    }

    #[test]
    fn test_blank_values_covered_without_findings() {
        let engine = engine(TITLE_RULES);
        let field = Field::new("245", '1', '0').subfield('a', "  ");
        let mut diagnostics = Diagnostics::new();
        let result = engine.validate_field(&field, &mut diagnostics);
        assert!(result.findings.is_empty());
        assert!(result.coverage.covered);
    }

    #[test]
    fn test_strict_coverage() {
        let engine = engine(TITLE_RULES);
        let record = Record::new(vec![
            Field::new("245", '1', '0').subfield('a', "Title."),
            Field::new("999", ' ', ' ').subfield('z', "local").subfield('y', ""),
        ]);
        let mut diagnostics = Diagnostics::new();

        assert!(engine.validate_record(&record, false, &mut diagnostics).findings.is_empty());

        let strict = engine.validate_record(&record, true, &mut diagnostics);
        assert_eq!(strict.findings.len(), 1);
        let finding = &strict.findings[0];
        assert_eq!(finding.code, NO_RULE_DEFINED);
        assert_eq!(finding.severity, Severity::Info);
        assert_eq!(finding.expected_value, None);
        assert!(finding.proposed_fixes.is_empty());
    }

    #[test]
    fn test_is_field_covered() {
        let engine = engine(TITLE_RULES);
        let mut diagnostics = Diagnostics::new();
        assert!(engine.is_field_covered("245", 'a', '1', '0', &mut diagnostics));
        assert!(engine.is_field_covered("250", 'a', ' ', ' ', &mut diagnostics));
        assert!(!engine.is_field_covered("650", 'a', ' ', '0', &mut diagnostics));
    }

    #[test]
    fn test_disabled_rules_config() {
        let pack = RulePack::from_json(TITLE_RULES).unwrap();
        let config = EngineConfig {
            disabled_rules: ["245a-terminal".to_string()].into_iter().collect(),
            ..Default::default()
        };
        let engine = RuleEngine::new(&pack, config);
        assert_eq!(engine.rule_count(), 1);
    }

    #[test]
    fn test_expected_values() {
        let engine = engine(TITLE_RULES);
        let field = Field::new("245", '1', '0').subfield('a', "Title :").subfield('c', "by Anon.");
        let mut diagnostics = Diagnostics::new();
        assert_eq!(engine.expected_values(&field, 0, &mut diagnostics), vec!["Title".to_string()]);
        assert!(engine.expected_values(&field, 9, &mut diagnostics).is_empty());
    }

    #[test]
    fn test_free_functions_match_engine() {
        let pack = RulePack::from_json(TITLE_RULES).unwrap();
        let config = EngineConfig::default();
        let field = Field::new("245", '1', '0').subfield('a', "Title");
        let mut diagnostics = Diagnostics::new();

        let result = validate_field(&field, &config, &pack, &mut diagnostics);
        assert_eq!(result.findings.len(), 1);
        assert!(is_field_covered("245", 'a', '1', '0', &config, &pack, &mut diagnostics));
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RuleEngine>();
    }
}
