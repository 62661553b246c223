//! Confidence-score recovery from prose.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    /// `confidence[ percent|score]: N[%]`
    static ref LABELLED: Regex = Regex::new(
        r"(?i)\bconfidence(?:\s+(?:percent|score))?\s*:\s*(\d+(?:\.\d+)?)\s*(%)?"
    ).unwrap();

    /// `N% confidence` / `N% confident`
    static ref PERCENT_FIRST: Regex =
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*%\s+confiden(?:ce|t)\b").unwrap();

    /// `confidence is N`, `confidence of N`, `confidence level N`
    static ref PHRASED: Regex = Regex::new(
        r"(?i)\bconfidence\s+(?:is|of|level|=)\s*(?:of\s+)?(\d+(?:\.\d+)?)\s*(%)?"
    ).unwrap();

    /// `confidence ... N/100`
    static ref OUT_OF_HUNDRED: Regex =
        Regex::new(r"(?i)\bconfidence\b[^\d\n]{0,30}(\d+(?:\.\d+)?)\s*/\s*100\b").unwrap();
}

/// Confidence as a whole percentage in `0..=100`, or `None` when the text
/// never states one.
pub fn extract_confidence_percent_from_text(text: &str) -> Option<u8> {
    let raw = LABELLED
        .captures(text)
        .and_then(|c| fraction_or_percent(&c))
        .or_else(|| PERCENT_FIRST.captures(text).and_then(|c| number(&c)))
        .or_else(|| PHRASED.captures(text).and_then(|c| fraction_or_percent(&c)))
        .or_else(|| OUT_OF_HUNDRED.captures(text).and_then(|c| number(&c)))?;

    Some(raw.clamp(0.0, 100.0).round() as u8)
}

fn number(caps: &Captures<'_>) -> Option<f64> {
    caps.get(1)?.as_str().parse().ok()
}

/// Without a `%` sign, values up to 1 are fractions.
fn fraction_or_percent(caps: &Captures<'_>) -> Option<f64> {
    let n = number(caps)?;
    if caps.get(2).is_none() && n <= 1.0 {
        Some(n * 100.0)
    } else {
        Some(n)
    }
}
