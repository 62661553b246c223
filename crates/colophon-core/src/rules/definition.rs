//! Declarative rule and check definitions.
//!
//! Rules are data, never code: one generic interpreter in
//! [`crate::engine`] evaluates them. Adding behavior for a new tag is a rule
//! pack change, not a code change.

use serde::{Deserialize, Serialize};

use crate::types::Severity;

/// Indicator constraint: a single token or a set of accepted tokens.
///
/// `"*"` matches anything. `"#"`, `"_"` and `""` stand for a blank (space)
/// indicator, following MARC documentation conventions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum IndicatorSpec {
    Single(String),
    Set(Vec<String>),
}

impl IndicatorSpec {
    pub fn matches(&self, indicator: char) -> bool {
        match self {
            IndicatorSpec::Single(token) => token_matches(token, indicator),
            IndicatorSpec::Set(tokens) => tokens.iter().any(|t| token_matches(t, indicator)),
        }
    }
}

fn token_matches(token: &str, indicator: char) -> bool {
    match token {
        "*" => true,
        "" | "#" | "_" | " " => indicator == ' ',
        _ => {
            let mut chars = token.chars();
            chars.next() == Some(indicator) && chars.next().is_none()
        }
    }
}

/// Which positional occurrence of a repeated subfield code a rule applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    #[default]
    All,
    FirstOnly,
    LastOnly,
}

/// A declarative punctuation rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    /// Unique identifier (e.g., "245a-terminal")
    pub id: String,

    /// Exact tag match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Regex searched in the tag when `tag` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_pattern: Option<String>,

    /// Subfield codes this rule applies to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subfields: Vec<char>,

    /// Regex searched in the subfield code when `subfields` is empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfield_pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ind1: Option<IndicatorSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ind2: Option<IndicatorSpec>,

    /// Codes that must be populated elsewhere in the field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires_subfields: Vec<char>,

    /// Codes that must not be populated elsewhere in the field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbids_subfields: Vec<char>,

    /// The nearest populated subfield after this one must have one of these codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_subfield_is: Vec<char>,

    /// The nearest populated subfield before this one must have one of these codes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_subfield_is: Vec<char>,

    #[serde(default)]
    pub repeat_policy: RepeatPolicy,

    /// Fallback rule: dropped when any other rule matched the same subfield
    #[serde(default)]
    pub only_when_no_other_rule: bool,

    /// Checks applied in order
    #[serde(default)]
    pub checks: Vec<Check>,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub rationale: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,

    /// Only meaningful in override sets: removes the same-id rule
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// A single check. Tagged by `type` in rule pack JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    Punctuation(PunctuationCheck),
    Separator {
        #[serde(default = "default_separator")]
        separator: String,
    },
    NoTerminalPunctuation,
    Spacing,
    NormalizePunctuation,
    /// Reserved; evaluates to the current value
    FixedField,
}

fn default_separator() -> String {
    "--".to_string()
}

/// Case transform applied by a punctuation check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseTransform {
    Lower,
    Sentence,
    InitialUpper,
    InitialLower,
    Title,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrefixMode {
    #[default]
    Always,
    /// Prefix only when no designated subfield precedes
    WhenFirst,
    /// `prefix_if_preceding` vs `prefix_if_first`
    ConditionalPreceding,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuffixMode {
    #[default]
    Always,
    /// Suffix only when a designated subfield follows
    WhenFollowing,
    /// `suffix_if_following` vs `suffix_if_last`
    ConditionalFollowing,
    /// Suffix only when no designated subfield follows
    WhenLast,
}

impl SuffixMode {
    /// Whether the resolved suffix depends on a following subfield.
    pub fn depends_on_follower(self) -> bool {
        !matches!(self, SuffixMode::Always)
    }
}

/// Suffix chosen by the content of the following subfield.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuffixOverride {
    pub following_starts_with: String,
    #[serde(default)]
    pub suffix: String,
}

/// Parameters of a `punctuation` check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PunctuationCheck {
    /// Replace `...` / `…` with `--`
    pub replace_ellipsis: bool,

    /// Replace square brackets with parentheses
    pub replace_brackets: bool,

    /// Leading text removed (case-insensitively) before other processing
    pub strip_prefixes: Vec<String>,

    /// Characters stripped from the end before other processing
    pub strip_trailing: String,

    pub case: Option<CaseTransform>,

    pub prefix: String,
    pub prefix_mode: PrefixMode,
    pub prefix_if_preceding: String,
    pub prefix_if_first: String,
    pub preceding_subfields: Vec<char>,

    /// Replaces the ordinary prefix when the value begins with `=`
    pub parallel_prefix: Option<String>,

    pub suffix: String,
    pub suffix_mode: SuffixMode,
    pub suffix_if_following: String,
    pub suffix_if_last: String,
    pub following_subfields: Vec<char>,
    pub suffix_overrides: Vec<SuffixOverride>,

    /// Endings that are respected as manual punctuation
    pub acceptable_endings: Vec<String>,

    /// Strip trailing punctuation when a follower-dependent suffix resolves empty
    pub trim_when_no_suffix: bool,

    /// Append the suffix without stripping existing trailing punctuation
    pub no_trim: bool,
}
