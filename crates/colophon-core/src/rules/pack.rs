//! Rule pack loading from JSON/YAML and override merging.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

use super::definition::Rule;
use super::schema::validate_rules_schema;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Built-in AACR2 rule pack (embedded at compile time).
const BUILTIN_PACK_JSON: &str = include_str!("../../rules/aacr2.json");

/// Errors that can occur when loading rule packs.
#[derive(Error, Debug)]
pub enum RulePackError {
    #[error("Failed to read rule pack file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Rule pack failed schema validation: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Rule pack validation failed: {0}")]
    ValidationError(String),
}

/// An immutable set of rules, loaded once per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RulePack {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    rules: Vec<Rule>,
}

impl RulePack {
    /// Build a pack directly from rules.
    pub fn from_rules(rules: Vec<Rule>) -> Result<Self, RulePackError> {
        let pack = Self {
            name: String::new(),
            version: String::new(),
            rules,
        };
        pack.validate()?;
        Ok(pack)
    }

    /// The rule pack shipped with the crate.
    pub fn builtin() -> Result<Self, RulePackError> {
        Self::from_json(BUILTIN_PACK_JSON)
    }

    /// Parse a pack from JSON: either a rule array or `{ name, version, rules }`.
    pub fn from_json(json: &str) -> Result<Self, RulePackError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Parse a pack from YAML with the same shapes as JSON.
    pub fn from_yaml(yaml: &str) -> Result<Self, RulePackError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Load a pack from a file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RulePackError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, RulePackError> {
        let (name, version, rules_value) = split_pack_value(value)?;
        validate_rules_schema(&rules_value).map_err(RulePackError::SchemaViolation)?;

        let rules: Vec<Rule> = serde_json::from_value(rules_value)?;
        let pack = Self {
            name,
            version,
            rules: rules.into_iter().filter(|r| !r.disabled).collect(),
        };
        pack.validate()?;

        tracing::debug!(name = %pack.name, rules = pack.rules.len(), "Loaded rule pack");
        Ok(pack)
    }

    /// Ensure rule IDs are unique.
    fn validate(&self) -> Result<(), RulePackError> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.id.trim().is_empty() {
                return Err(RulePackError::ValidationError("Rule with empty id".to_string()));
            }
            if !seen.insert(rule.id.as_str()) {
                return Err(RulePackError::ValidationError(format!(
                    "Duplicate rule ID: {}",
                    rule.id
                )));
            }
        }
        Ok(())
    }

    /// Merge a user-supplied override set given as JSON text.
    ///
    /// Rules replace same-id rules, new ids are appended and `disabled: true`
    /// removes a rule. Malformed override text is treated as "no overrides"
    /// and reported through `diagnostics`.
    pub fn with_overrides_json(self, json: &str, diagnostics: &mut Diagnostics) -> Self {
        if json.trim().is_empty() {
            return self;
        }

        let overrides = serde_json::from_str::<serde_json::Value>(json)
            .map_err(RulePackError::from)
            .and_then(|value| {
                let (_, _, rules_value) = split_pack_value(value)?;
                validate_rules_schema(&rules_value).map_err(RulePackError::SchemaViolation)?;
                Ok(serde_json::from_value::<Vec<Rule>>(rules_value)?)
            });

        match overrides {
            Ok(rules) => self.merge(rules),
            Err(e) => {
                diagnostics.warn_once(
                    DiagnosticKind::MalformedOverrides,
                    "overrides",
                    format!("Ignoring override rules: {}", e),
                );
                self
            }
        }
    }

    /// Merge override rules into this pack.
    pub fn merge(mut self, overrides: Vec<Rule>) -> Self {
        for rule in overrides {
            let existing = self.rules.iter().position(|r| r.id == rule.id);
            match (existing, rule.disabled) {
                (Some(index), true) => {
                    self.rules.remove(index);
                }
                (Some(index), false) => self.rules[index] = rule,
                (None, true) => {}
                (None, false) => self.rules.push(rule),
            }
        }
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn split_pack_value(
    value: serde_json::Value,
) -> Result<(String, String, serde_json::Value), RulePackError> {
    match value {
        serde_json::Value::Array(_) => Ok((String::new(), String::new(), value)),
        serde_json::Value::Object(mut map) => {
            let text = |v: Option<serde_json::Value>| {
                v.and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default()
            };
            let name = text(map.remove("name"));
            let version = text(map.remove("version"));
            let rules = map.remove("rules").ok_or_else(|| {
                RulePackError::ValidationError("Rule pack object has no `rules` array".to_string())
            })?;
            Ok((name, version, rules))
        }
        _ => Err(RulePackError::ValidationError(
            "Rule pack must be an array of rules or an object with `rules`".to_string(),
        )),
    }
}
