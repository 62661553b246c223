//! Check evaluation: current value in, expected value out.

use super::text;
use crate::rules::{Check, PrefixMode, PunctuationCheck, SuffixMode};
use crate::types::{Condition, Field};

/// The result of running a rule's checks over one subfield.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Evaluation {
    pub expected: String,
    pub condition: Option<Condition>,
}

/// Run `checks` in order over the subfield at `index`, each check seeing the
/// output of the previous one.
pub(crate) fn evaluate_checks(checks: &[Check], field: &Field, index: usize) -> Evaluation {
    let mut value = field.subfields[index].value.clone();
    let mut condition = None;

    for check in checks {
        match check {
            Check::Punctuation(params) => {
                let (next, cond) = punctuation(params, &value, field, index);
                value = next;
                if cond.is_some() {
                    condition = cond;
                }
            }
            Check::Separator { separator } => value = ensure_separator(&value, separator),
            Check::NoTerminalPunctuation => value = text::strip_terminal(&value),
            Check::Spacing => value = text::collapse_whitespace(&value),
            Check::NormalizePunctuation => value = text::normalize_punctuation(&value),
            Check::FixedField => {}
        }
    }

    Evaluation {
        expected: value,
        condition,
    }
}

fn punctuation(
    params: &PunctuationCheck,
    current: &str,
    field: &Field,
    index: usize,
) -> (String, Option<Condition>) {
    let mut value = current.to_string();

    if params.replace_ellipsis {
        value = text::replace_ellipsis(&value);
    }
    if params.replace_brackets {
        value = text::replace_brackets(&value);
    }
    for prefix in &params.strip_prefixes {
        if let Some(rest) = text::strip_prefix_ignore_case(&value, prefix) {
            value = rest.trim_start().to_string();
            break;
        }
    }
    if !params.strip_trailing.is_empty() {
        value = value
            .trim_end_matches(|c: char| c.is_whitespace() || params.strip_trailing.contains(c))
            .to_string();
    }
    if let Some(case) = params.case {
        value = text::apply_case(&value, case);
    }

    value = resolve_prefix(params, &value, field, index);
    resolve_suffix(params, &value, field, index)
}

fn resolve_prefix(params: &PunctuationCheck, value: &str, field: &Field, index: usize) -> String {
    if let Some(parallel) = &params.parallel_prefix {
        if let Some(body) = value.trim_start().strip_prefix('=') {
            return format!("{}{}", parallel, body.trim_start());
        }
    }

    let preceded = || {
        field.subfields[..index].iter().any(|s| {
            s.is_populated()
                && (params.preceding_subfields.is_empty() || params.preceding_subfields.contains(&s.code))
        })
    };

    let prefix = match params.prefix_mode {
        PrefixMode::Always => params.prefix.as_str(),
        PrefixMode::WhenFirst if preceded() => "",
        PrefixMode::WhenFirst => params.prefix.as_str(),
        PrefixMode::ConditionalPreceding if preceded() => params.prefix_if_preceding.as_str(),
        PrefixMode::ConditionalPreceding => params.prefix_if_first.as_str(),
    };

    attach_prefix(value, prefix)
}

fn attach_prefix(value: &str, prefix: &str) -> String {
    if prefix.is_empty() || value.starts_with(prefix) {
        return value.to_string();
    }
    let body = value.trim_start();
    let bare = prefix.trim();
    match body.strip_prefix(bare) {
        Some(rest) if !bare.is_empty() => format!("{}{}", prefix, rest.trim_start()),
        _ => format!("{}{}", prefix, body),
    }
}

fn resolve_suffix(
    params: &PunctuationCheck,
    value: &str,
    field: &Field,
    index: usize,
) -> (String, Option<Condition>) {
    // Scanning starts after the current subfield.
    let follower = field.subfields[index + 1..].iter().find(|s| {
        s.is_populated()
            && (params.following_subfields.is_empty() || params.following_subfields.contains(&s.code))
    });

    let overridden = |default: &str| -> String {
        follower
            .and_then(|f| {
                let head = f.value.trim_start();
                params
                    .suffix_overrides
                    .iter()
                    .find(|o| head.starts_with(o.following_starts_with.as_str()))
                    .map(|o| o.suffix.clone())
            })
            .unwrap_or_else(|| default.to_string())
    };

    let suffix = match (params.suffix_mode, follower.is_some()) {
        (SuffixMode::Always, _) => params.suffix.clone(),
        (SuffixMode::WhenFollowing, true) => overridden(&params.suffix),
        (SuffixMode::WhenFollowing, false) => String::new(),
        (SuffixMode::ConditionalFollowing, true) => overridden(&params.suffix_if_following),
        (SuffixMode::ConditionalFollowing, false) => params.suffix_if_last.clone(),
        (SuffixMode::WhenLast, true) => String::new(),
        (SuffixMode::WhenLast, false) => params.suffix.clone(),
    };

    let trimmed_end = value.trim_end();
    if params
        .acceptable_endings
        .iter()
        .any(|ending| !ending.is_empty() && trimmed_end.ends_with(ending.as_str()))
    {
        return (value.to_string(), None);
    }

    let dependent = params.suffix_mode.depends_on_follower();

    if suffix.is_empty() {
        if dependent && params.trim_when_no_suffix {
            let condition = follower.map(|_| Condition::trim(&params.following_subfields));
            return (text::strip_terminal(value), condition);
        }
        return (value.to_string(), None);
    }

    let condition = if dependent && follower.is_none() {
        Some(Condition::add(&params.following_subfields))
    } else {
        None
    };
    (append_suffix(value, &suffix, params.no_trim), condition)
}

fn append_suffix(value: &str, suffix: &str, no_trim: bool) -> String {
    let base = value.trim_end();
    if base.ends_with(suffix) {
        return value.to_string();
    }
    if let Some(rest) = suffix.strip_prefix('.') {
        if base.ends_with('.') {
            return format!("{}{}", base, rest);
        }
    }
    if no_trim {
        format!("{}{}", base, suffix)
    } else {
        format!("{}{}", text::strip_terminal(base), suffix)
    }
}

fn ensure_separator(value: &str, separator: &str) -> String {
    let base = text::strip_terminal(value);
    if base.ends_with(separator) {
        return base;
    }
    let bare = separator.trim();
    match base.strip_suffix(bare) {
        Some(rest) if !bare.is_empty() => format!("{}{}", rest.trim_end(), separator),
        _ => format!("{}{}", base, separator),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{CaseTransform, SuffixOverride};

    fn title_field(a: &str) -> Field {
        Field::new("245", '1', '0').subfield('a', a)
    }

    fn when_last_period() -> PunctuationCheck {
        PunctuationCheck {
            suffix: ".".to_string(),
            suffix_mode: SuffixMode::WhenLast,
            following_subfields: vec!['b', 'c'],
            trim_when_no_suffix: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_when_last_adds_period_with_condition() {
        let field = title_field("The great Gatsby");
        let eval = evaluate_checks(&[Check::Punctuation(when_last_period())], &field, 0);
        assert_eq!(eval.expected, "The great Gatsby.");
        assert_eq!(eval.condition, Some(Condition::add(&['b', 'c'])));
    }

    #[test]
    fn test_when_last_trims_before_follower() {
        let field = title_field("The great Gatsby.").subfield('b', "a novel");
        let eval = evaluate_checks(&[Check::Punctuation(when_last_period())], &field, 0);
        assert_eq!(eval.expected, "The great Gatsby");
        assert_eq!(eval.condition, Some(Condition::trim(&['b', 'c'])));
    }

    #[test]
    fn test_blank_follower_is_ignored() {
        let field = title_field("The great Gatsby").subfield('b', "   ");
        let eval = evaluate_checks(&[Check::Punctuation(when_last_period())], &field, 0);
        assert_eq!(eval.expected, "The great Gatsby.");
    }

    #[test]
    fn test_acceptable_ending_is_respected() {
        let mut params = when_last_period();
        params.acceptable_endings = vec!["?".to_string(), "!".to_string()];
        let field = title_field("Who killed Roger?");
        let eval = evaluate_checks(&[Check::Punctuation(params)], &field, 0);
        assert_eq!(eval.expected, "Who killed Roger?");
        assert_eq!(eval.condition, None);
    }

    #[test]
    fn test_suffix_override_by_follower_content() {
        let params = PunctuationCheck {
            suffix: " :".to_string(),
            suffix_mode: SuffixMode::WhenFollowing,
            following_subfields: vec!['b'],
            suffix_overrides: vec![SuffixOverride {
                following_starts_with: "=".to_string(),
                suffix: " ".to_string(),
            }],
            ..Default::default()
        };
        let check = [Check::Punctuation(params)];

        let plain = title_field("Cataloging").subfield('b', "a primer");
        assert_eq!(evaluate_checks(&check, &plain, 0).expected, "Cataloging :");

        let parallel = title_field("Cataloging").subfield('b', "= Catalogage");
        assert_eq!(evaluate_checks(&check, &parallel, 0).expected, "Cataloging ");
    }

    #[test]
    fn test_conditional_following() {
        let params = PunctuationCheck {
            suffix_mode: SuffixMode::ConditionalFollowing,
            suffix_if_following: " ;".to_string(),
            suffix_if_last: ".".to_string(),
            following_subfields: vec!['c'],
            ..Default::default()
        };
        let check = [Check::Punctuation(params)];

        let field = Field::new("300", ' ', ' ').subfield('b', "col. maps").subfield('c', "24 cm");
        assert_eq!(evaluate_checks(&check, &field, 0).expected, "col. maps ;");

        let last = Field::new("300", ' ', ' ').subfield('b', "col. maps ;");
        assert_eq!(evaluate_checks(&check, &last, 0).expected, "col. maps.");
    }

    #[test]
    fn test_duplicate_period_avoided_and_no_trim() {
        assert_eq!(append_suffix("Smith, J.", ". --", false), "Smith, J. --");
        assert_eq!(append_suffix("Title :", ".", false), "Title.");
        assert_eq!(append_suffix("Title :", ".", true), "Title :.");
        assert_eq!(append_suffix("Title /", " /", false), "Title /");
    }

    #[test]
    fn test_prefix_modes_and_parallel_title() {
        let params = PunctuationCheck {
            prefix_mode: PrefixMode::ConditionalPreceding,
            prefix_if_preceding: "; ".to_string(),
            prefix_if_first: "".to_string(),
            preceding_subfields: vec!['a'],
            parallel_prefix: Some("= ".to_string()),
            ..Default::default()
        };
        let check = [Check::Punctuation(params)];

        let preceded = Field::new("490", '1', ' ').subfield('a', "Series").subfield('v', "v. 2");
        assert_eq!(evaluate_checks(&check, &preceded, 1).expected, "; v. 2");

        let first = Field::new("490", '1', ' ').subfield('v', "v. 2");
        assert_eq!(evaluate_checks(&check, &first, 0).expected, "v. 2");

        let parallel = Field::new("490", '1', ' ').subfield('a', "S").subfield('v', "=Serie");
        assert_eq!(evaluate_checks(&check, &parallel, 1).expected, "= Serie");
    }

    #[test]
    fn test_when_first_prefix() {
        let params = PunctuationCheck {
            prefix: "; ".to_string(),
            prefix_mode: PrefixMode::WhenFirst,
            preceding_subfields: vec!['a'],
            ..Default::default()
        };
        let check = [Check::Punctuation(params)];

        let alone = Field::new("490", '1', ' ').subfield('v', "v. 2");
        assert_eq!(evaluate_checks(&check, &alone, 0).expected, "; v. 2");

        let preceded = Field::new("490", '1', ' ').subfield('a', "Series").subfield('v', "v. 2");
        assert_eq!(evaluate_checks(&check, &preceded, 1).expected, "v. 2");

        let blank_before = Field::new("490", '1', ' ').subfield('a', "  ").subfield('v', "v. 2");
        assert_eq!(evaluate_checks(&check, &blank_before, 1).expected, "; v. 2");
    }

    #[test]
    fn test_always_prefix() {
        let params = PunctuationCheck {
            prefix: "ISBN ".to_string(),
            prefix_mode: PrefixMode::Always,
            ..Default::default()
        };
        let check = [Check::Punctuation(params)];

        for value in ["0-306-40615-2", "ISBN0-306-40615-2", "ISBN 0-306-40615-2"] {
            let field = Field::new("020", ' ', ' ').subfield('a', value);
            assert_eq!(evaluate_checks(&check, &field, 0).expected, "ISBN 0-306-40615-2", "{value:?}");
        }
    }

    #[test]
    fn test_always_suffix_ignores_followers() {
        let params = PunctuationCheck {
            suffix: ".".to_string(),
            suffix_mode: SuffixMode::Always,
            following_subfields: vec!['b'],
            ..Default::default()
        };
        let check = [Check::Punctuation(params)];

        let alone = Field::new("250", ' ', ' ').subfield('a', "2nd ed");
        let eval = evaluate_checks(&check, &alone, 0);
        assert_eq!(eval.expected, "2nd ed.");
        assert_eq!(eval.condition, None);

        let followed = alone.clone().subfield('b', "revised by J. Smith");
        let eval = evaluate_checks(&check, &followed, 0);
        assert_eq!(eval.expected, "2nd ed.");
        assert_eq!(eval.condition, None);

        let done = Field::new("250", ' ', ' ').subfield('a', "2nd ed.");
        assert_eq!(evaluate_checks(&check, &done, 0).expected, "2nd ed.");
    }

    #[test]
    fn test_no_terminal_punctuation() {
        let field = Field::new("246", '3', '0').subfield('a', "Alt title ; ");
        assert_eq!(
            evaluate_checks(&[Check::NoTerminalPunctuation], &field, 0).expected,
            "Alt title"
        );

        let clean = Field::new("246", '3', '0').subfield('a', "Alt title");
        assert_eq!(
            evaluate_checks(&[Check::NoTerminalPunctuation], &clean, 0).expected,
            "Alt title"
        );
    }

    #[test]
    fn test_prefix_canonicalized() {
        assert_eq!(attach_prefix(":subtitle", " : "), " : subtitle");
        assert_eq!(attach_prefix(" : subtitle", " : "), " : subtitle");
        assert_eq!(attach_prefix("subtitle", "= "), "= subtitle");
    }

    #[test]
    fn test_preprocessing_steps() {
        let params = PunctuationCheck {
            replace_ellipsis: true,
            replace_brackets: true,
            strip_prefixes: vec!["ISBN ".to_string()],
            strip_trailing: ".".to_string(),
            case: Some(CaseTransform::InitialUpper),
            ..Default::default()
        };
        let field = Field::new("500", ' ', ' ').subfield('a', "isbn includes index [sic]... .");
        let eval = evaluate_checks(&[Check::Punctuation(params)], &field, 0);
        assert_eq!(eval.expected, "Includes index (sic)--");
    }

    #[test]
    fn test_chained_checks() {
        let field = Field::new("650", ' ', '0').subfield('x', "History  ,");
        let checks = [
            Check::Spacing,
            Check::Separator {
                separator: " --".to_string(),
            },
        ];
        assert_eq!(evaluate_checks(&checks, &field, 0).expected, "History --");
        assert_eq!(ensure_separator("History--", " --"), "History --");
    }

    #[test]
    fn test_fixed_field_is_noop() {
        let field = Field::new("008", ' ', ' ').subfield('a', "  raw  ");
        assert_eq!(evaluate_checks(&[Check::FixedField], &field, 0).expected, "  raw  ");
    }
}
