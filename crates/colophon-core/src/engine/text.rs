//! String transforms shared by the check evaluators.

use lazy_static::lazy_static;
use regex::Regex;

use crate::rules::CaseTransform;

/// Punctuation stripped as "terminal" before a suffix is appended.
pub const TERMINAL_PUNCTUATION: &[char] = &['.', ',', ';', ':', '/', '='];

/// Characters after which no space is inserted by `normalize_punctuation`.
const NO_SPACE_BEFORE: &[char] = &[')', ']', '}', ',', '.', ';', ':', '!', '?', '/'];

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    static ref SPACE_BEFORE_CLOSING: Regex = Regex::new(r"\s+([,.)\]!?])").unwrap();

    static ref REPEATED_SEPARATORS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"/(?:\s*/)+").unwrap(), "/"),
        (Regex::new(r":(?:\s*:)+").unwrap(), ":"),
        (Regex::new(r";(?:\s*;)+").unwrap(), ";"),
    ];
}

/// Strip trailing whitespace and terminal punctuation.
pub fn strip_terminal(value: &str) -> String {
    value
        .trim_end_matches(|c: char| c.is_whitespace() || TERMINAL_PUNCTUATION.contains(&c))
        .to_string()
}

/// Collapse every whitespace run to a single space.
pub fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RUN.replace_all(value, " ").into_owned()
}

/// Marks of omission become dashes.
pub fn replace_ellipsis(value: &str) -> String {
    value.replace('…', "--").replace("...", "--")
}

/// Square brackets become parentheses.
pub fn replace_brackets(value: &str) -> String {
    value.replace('[', "(").replace(']', ")")
}

/// Remove `prefix` from the start of `value`, ignoring case.
pub fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let head = value.get(..prefix.len())?;
    if head.to_lowercase() == prefix.to_lowercase() {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// Apply a configured case transform.
pub fn apply_case(value: &str, case: CaseTransform) -> String {
    match case {
        CaseTransform::Lower => value.to_lowercase(),
        CaseTransform::Sentence => upper_first_alpha(&value.to_lowercase()),
        CaseTransform::InitialUpper => upper_first_alpha(value),
        CaseTransform::InitialLower => lower_first_alpha(value),
        CaseTransform::Title => value.split(' ').map(title_word).collect::<Vec<_>>().join(" "),
    }
}

fn upper_first_alpha(value: &str) -> String {
    map_first_alpha(value, |c| c.to_uppercase().collect())
}

fn lower_first_alpha(value: &str) -> String {
    map_first_alpha(value, |c| c.to_lowercase().collect())
}

fn map_first_alpha(value: &str, f: impl Fn(char) -> String) -> String {
    match value.char_indices().find(|(_, c)| c.is_alphabetic()) {
        Some((i, c)) => format!("{}{}{}", &value[..i], f(c), &value[i + c.len_utf8()..]),
        None => value.to_string(),
    }
}

fn is_short_acronym(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.len() <= 3 && letters.iter().all(|c| c.is_uppercase())
}

fn title_word(word: &str) -> String {
    if is_short_acronym(word) {
        return word.to_string();
    }

    let lower = word.to_lowercase();
    lower
        .split_inclusive(|c: char| c == '\'' || c == '’')
        .enumerate()
        .map(|(i, segment)| {
            let body = segment.trim_end_matches(|c: char| c == '\'' || c == '’');
            if i == 0 || body.chars().count() >= 2 {
                capitalize_name_segment(segment)
            } else {
                segment.to_string()
            }
        })
        .collect()
}

/// Capitalize a name segment; after a "Mc" prefix only the stem is capitalized.
fn capitalize_name_segment(segment: &str) -> String {
    match segment.strip_prefix("mc") {
        Some(stem) if stem.chars().next().is_some_and(char::is_alphabetic) => {
            format!("Mc{}", upper_first_alpha(stem))
        }
        _ => upper_first_alpha(segment),
    }
}

/// Tidy spacing around punctuation.
///
/// Repeated `/`, `:` and `;` collapse to one, whitespace before closing
/// punctuation is removed and `,`/`;`/`:` get one following space.
pub fn normalize_punctuation(value: &str) -> String {
    let mut out = value.to_string();
    for (pattern, replacement) in REPEATED_SEPARATORS.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out = SPACE_BEFORE_CLOSING.replace_all(&out, "$1").into_owned();
    space_after_separators(&out)
}

fn space_after_separators(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if !matches!(c, ',' | ';' | ':') {
            continue;
        }
        let Some(&next) = chars.get(i + 1) else {
            continue;
        };
        if next.is_whitespace() || NO_SPACE_BEFORE.contains(&next) {
            continue;
        }
        // Digit groups such as 1,000 or 3:45
        let prev = if i > 0 { chars.get(i - 1) } else { None };
        if prev.is_some_and(|p| p.is_ascii_digit()) && next.is_ascii_digit() {
            continue;
        }
        out.push(' ');
    }

    out
}
