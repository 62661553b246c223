//! Subject-heading recovery from prose.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref BULLET: Regex = Regex::new(r"^\s*(?:[-*•·]|\d+[.)])\s+").unwrap();

    static ref LABEL: Regex = Regex::new(
        r"(?i)^(?:lcsh\s+)?(?:subject\s+headings?|subjects?|lcsh)(?:\s*:|\s+-|-\s)\s*(.*)$"
    ).unwrap();

    static ref INLINE_LABEL: Regex = Regex::new(
        r"(?i)\b(?:lcsh\s+)?(?:subject\s+headings?|subjects?|lcsh)(?:\s*:|\s+-|-\s)\s*([^\n]+)"
    ).unwrap();

    /// Labels that end a subject block
    static ref STOP_LABEL: Regex = Regex::new(
        r"(?i)^(?:(?:lc\s+)?classification|class\s+number|call\s+number|call\s+no\.?|lcc|confidence)\b"
    ).unwrap();

    static ref ENTRY_SEPARATOR: Regex = Regex::new(r"[;\n|]").unwrap();

    static ref DASH_SPACING: Regex = Regex::new(r"\s*--\s*").unwrap();

    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Subject headings listed in free text, normalized and de-duplicated.
pub fn extract_subject_headings_from_text(text: &str) -> Vec<String> {
    let captured = capture_block(text).or_else(|| {
        INLINE_LABEL
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| clean_line(m.as_str()))
    });

    let Some(captured) = captured else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    ENTRY_SEPARATOR
        .split(&captured)
        .flat_map(split_entry)
        .map(|heading| normalize_heading(&heading))
        .filter(|heading| !heading.is_empty())
        .filter(|heading| seen.insert(heading.to_lowercase()))
        .collect()
}

fn clean_line(line: &str) -> String {
    BULLET.replace(line, "").replace("**", "").trim().to_string()
}

/// Text after a subject label up to a blank line or a stop label.
fn capture_block(text: &str) -> Option<String> {
    let mut captured: Vec<String> = Vec::new();
    let mut capturing = false;

    for raw in text.lines() {
        let line = clean_line(raw);

        if capturing {
            if line.is_empty() {
                if captured.is_empty() {
                    continue;
                }
                break;
            }
            if STOP_LABEL.is_match(&line) {
                break;
            }
            captured.push(line);
        } else if let Some(caps) = LABEL.captures(&line) {
            capturing = true;
            let rest = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            if !rest.is_empty() {
                captured.push(rest.to_string());
            }
        }
    }

    capturing.then(|| captured.join("\n"))
}

/// Split one entry on commas when it looks like a plain list.
fn split_entry(entry: &str) -> Vec<String> {
    let entry = entry.trim();
    if entry.contains("--") {
        return vec![entry.to_string()];
    }

    let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
    match parts.len() {
        1 => vec![entry.to_string()],
        2 if !parts.iter().all(|p| is_single_token(p)) => vec![entry.to_string()],
        _ => parts.into_iter().map(str::to_string).collect(),
    }
}

fn is_single_token(part: &str) -> bool {
    !part.is_empty() && !part.chars().any(char::is_whitespace)
}

/// Canonical `--` spacing, collapsed whitespace, no trailing `--`.
pub fn normalize_heading(heading: &str) -> String {
    let dashed = heading.replace('—', "--");
    let spaced = DASH_SPACING.replace_all(&dashed, " -- ");
    let collapsed = WHITESPACE_RUN.replace_all(&spaced, " ");
    let mut out = collapsed.trim();
    while let Some(rest) = out.strip_suffix("--") {
        out = rest.trim_end();
    }
    out.to_string()
}
