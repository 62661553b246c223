//! Rule packs: declarative punctuation rules.
//!
//! Rule packs are structured data validated against JSON Schema. This module
//! handles parsing JSON/YAML packs, validating them and merging user
//! overrides.

mod definition;
mod pack;
mod schema;

pub use definition::{
    CaseTransform, Check, IndicatorSpec, PrefixMode, PunctuationCheck, RepeatPolicy, Rule,
    SuffixMode, SuffixOverride,
};
pub use pack::{RulePack, RulePackError};
pub use schema::validate_rules_schema;
