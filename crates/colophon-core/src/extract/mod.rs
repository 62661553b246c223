//! Free-text extraction.
//!
//! When an assistant answers in prose instead of structured JSON, these
//! functions recover the same shape of data a structured answer carries:
//! a classification number, subject headings and a confidence score.
//! Every function is total: a miss is `None` or an empty list, never an error.

mod classification;
mod confidence;
mod heading;
mod subjects;

pub use classification::{
    detect_classification_range, extract_classification_candidates, extract_classification_from_text,
    ClassificationCandidate,
};
pub use confidence::extract_confidence_percent_from_text;
pub use heading::{normalize_subject_value, SubjectHeadingObject, SubjectSubfields};
pub use subjects::{extract_subject_headings_from_text, normalize_heading};

use serde::{Deserialize, Serialize};

/// Default total subfield cap for recovered subject headings.
pub const DEFAULT_SUBJECT_SUBFIELD_CAP: usize = 6;

/// Everything recovered from one block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedSuggestions {
    /// Best single classification number; always `None` when a range was found
    pub classification: Option<String>,

    /// Set when the text proposes a classification range
    pub range_rejection: Option<String>,

    pub confidence_percent: Option<u8>,

    pub subjects: Vec<SubjectHeadingObject>,
}

impl ExtractedSuggestions {
    pub fn is_empty(&self) -> bool {
        self.classification.is_none()
            && self.range_rejection.is_none()
            && self.confidence_percent.is_none()
            && self.subjects.is_empty()
    }
}

/// Facade over the extraction functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtractor {
    pub subject_subfield_cap: usize,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            subject_subfield_cap: DEFAULT_SUBJECT_SUBFIELD_CAP,
        }
    }
}

impl TextExtractor {
    pub fn new(subject_subfield_cap: usize) -> Self {
        Self { subject_subfield_cap }
    }

    pub fn extract(&self, text: &str) -> ExtractedSuggestions {
        let range_rejection = detect_classification_range(text);
        let classification = match range_rejection {
            Some(_) => None,
            None => extract_classification_from_text(text),
        };

        let subjects = extract_subject_headings_from_text(text)
            .iter()
            .filter_map(|h| SubjectHeadingObject::from_heading(h))
            .map(|h| h.with_subfield_cap(self.subject_subfield_cap))
            .collect();

        ExtractedSuggestions {
            classification,
            range_rejection,
            confidence_percent: extract_confidence_percent_from_text(text),
            subjects,
        }
    }
}
