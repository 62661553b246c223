//! Classification-number recovery from prose.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    static ref DASH_VARIANTS: Regex = Regex::new(r"[\u{2010}\u{2011}\u{2012}\u{2013}\u{2014}\u{2015}\u{2212}]").unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    /// `CLASS NUMBER - [CLASS] NUMBER`
    static ref RANGE: Regex =
        Regex::new(r"\b[A-Z]{1,3} ?\d+(?:\.\d+)? ?- ?(?:[A-Z]{1,3} ?)?\d+(?:\.\d+)?").unwrap();

    /// `CLASS NUMBER`
    static ref SINGLE: Regex = Regex::new(r"\b([A-Z]{1,3}) ?(\d+(?:\.\d+)?)\b").unwrap();

    static ref KEYWORD: Regex =
        Regex::new(r"(?i)\b(?:classification|lc class|lcc|call number|call no|lc)\b").unwrap();
}

const NEAR_KEYWORD: usize = 80;
const FAR_KEYWORD: usize = 200;
const MAX_BRACE_SPAN: usize = 400;

/// A scored classification-number candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCandidate {
    pub value: String,
    /// Byte offset in the normalized text
    pub start_offset: usize,
    pub score: u32,
}

fn normalize(text: &str) -> String {
    let dashed = DASH_VARIANTS.replace_all(text, "-");
    WHITESPACE_RUN.replace_all(&dashed, " ").into_owned()
}

/// All single classification candidates, best first.
///
/// Ranges are blanked out of a per-call working copy before the single-number
/// scan, so `QA76 - QA76.9` never yields `QA76` and `QA76.9`.
pub fn extract_classification_candidates(text: &str) -> Vec<ClassificationCandidate> {
    let normalized = normalize(text);

    let mut working = normalized.clone();
    let spans: Vec<(usize, usize)> = RANGE.find_iter(&normalized).map(|m| (m.start(), m.end())).collect();
    for (start, end) in spans {
        working.replace_range(start..end, &" ".repeat(end - start));
    }

    let keywords: Vec<usize> = KEYWORD.find_iter(&normalized).map(|m| m.start()).collect();
    let braces = brace_spans(&normalized);

    let mut candidates: Vec<ClassificationCandidate> = SINGLE
        .captures_iter(&working)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let start = whole.start();
            let value = format!("{}{}", &caps[1], &caps[2]);
            Some(ClassificationCandidate {
                score: score(start, &keywords, &braces),
                value,
                start_offset: start,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(a.start_offset.cmp(&b.start_offset)));

    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.value.to_lowercase()));
    candidates
}

fn score(start: usize, keywords: &[usize], braces: &[(usize, usize)]) -> u32 {
    let mut score = 0;
    for &keyword in keywords {
        let distance = start.abs_diff(keyword);
        if distance <= NEAR_KEYWORD {
            score += 3;
        } else if distance <= FAR_KEYWORD {
            score += 1;
        }
    }
    if braces.iter().any(|&(open, close)| open < start && start < close) {
        score += 1;
    }
    score
}

/// Matched `{ ... }` pairs no wider than `MAX_BRACE_SPAN`, nesting respected.
fn brace_spans(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    for (offset, c) in text.char_indices() {
        match c {
            '{' => open.push(offset),
            '}' => {
                if let Some(start) = open.pop() {
                    if offset - start <= MAX_BRACE_SPAN {
                        spans.push((start, offset));
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

/// The best single classification number, if any.
pub fn extract_classification_from_text(text: &str) -> Option<String> {
    extract_classification_candidates(text)
        .into_iter()
        .next()
        .map(|c| c.value)
}

/// A user-facing rejection message when the text contains a classification range.
pub fn detect_classification_range(text: &str) -> Option<String> {
    let normalized = normalize(text);
    RANGE.find(&normalized).map(|m| {
        format!(
            "Classification ranges are not allowed (found \"{}\"). Provide a single classification number.",
            m.as_str().trim()
        )
    })
}
