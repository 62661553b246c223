//! Canonical structured subject headings.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::subjects::normalize_heading;
use crate::types::Field;

lazy_static! {
    static ref CHRONOLOGICAL: Regex =
        Regex::new(r"(?i)\b\d{3,4}\b|\b\d{1,2}(?:st|nd|rd|th)\s+century\b").unwrap();
}

const DEFAULT_TAG: &str = "650";

/// Subdivision subfields of a subject heading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSubfields {
    pub a: String,
    /// Topical subdivisions
    #[serde(default)]
    pub x: Vec<String>,
    /// Chronological subdivisions
    #[serde(default)]
    pub y: Vec<String>,
    /// Geographic subdivisions
    #[serde(default)]
    pub z: Vec<String>,
    /// Form subdivisions
    #[serde(default)]
    pub v: Vec<String>,
}

/// A subject heading as a 6XX field would hold it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectHeadingObject {
    pub tag: String,
    pub ind1: char,
    pub ind2: char,
    pub subfields: SubjectSubfields,
}

impl SubjectHeadingObject {
    /// Parse a free-text heading such as `Cats -- History -- 20th century`.
    ///
    /// The first segment is the main heading; later segments go to `y` when
    /// chronological and to `x` otherwise.
    pub fn from_heading(heading: &str) -> Option<Self> {
        let normalized = normalize_heading(heading);
        let mut segments = normalized.split(" -- ").map(str::trim).filter(|s| !s.is_empty());

        let a = segments.next()?.to_string();
        let mut subfields = SubjectSubfields {
            a,
            ..Default::default()
        };
        for segment in segments {
            if CHRONOLOGICAL.is_match(segment) {
                subfields.y.push(segment.to_string());
            } else {
                subfields.x.push(segment.to_string());
            }
        }

        Some(Self {
            tag: DEFAULT_TAG.to_string(),
            ind1: ' ',
            ind2: '0',
            subfields,
        })
    }

    /// Keep at most `cap` subfields in total: `$a` plus the earliest
    /// subdivisions, filled in `x`, `z`, `y`, `v` order. A cap of 0 keeps all.
    pub fn with_subfield_cap(mut self, cap: usize) -> Self {
        if cap == 0 {
            return self;
        }
        let mut budget = cap.saturating_sub(1);
        for list in [
            &mut self.subfields.x,
            &mut self.subfields.z,
            &mut self.subfields.y,
            &mut self.subfields.v,
        ] {
            list.truncate(budget);
            budget -= list.len();
        }
        self
    }

    /// Render as a `--`-joined heading string.
    pub fn to_heading_string(&self) -> String {
        self.ordered_values()
            .into_iter()
            .map(|(_, value)| value)
            .collect::<Vec<_>>()
            .join(" -- ")
    }

    /// Build a field view so the heading can be run through the rule engine.
    pub fn to_field(&self, occurrence: usize) -> Field {
        let mut field = Field::new(self.tag.clone(), self.ind1, self.ind2).with_occurrence(occurrence);
        for (code, value) in self.ordered_values() {
            field = field.subfield(code, value);
        }
        field
    }

    fn ordered_values(&self) -> Vec<(char, &str)> {
        let s = &self.subfields;
        let mut values = vec![('a', s.a.as_str())];
        for (code, list) in [('x', &s.x), ('z', &s.z), ('y', &s.y), ('v', &s.v)] {
            values.extend(list.iter().map(|v| (code, v.as_str())));
        }
        values
    }
}

/// Coerce a JSON string or loosely-shaped object into a heading.
///
/// Scalars in subdivision slots become one-element lists, blank entries are
/// dropped and the subfield cap is applied. Returns `None` when no main
/// heading can be found.
pub fn normalize_subject_value(value: &Value, cap: usize) -> Option<SubjectHeadingObject> {
    let heading = match value {
        Value::String(text) => SubjectHeadingObject::from_heading(text)?,
        Value::Object(map) => {
            let subfields = map.get("subfields").and_then(Value::as_object).unwrap_or(map);

            let a = coerce_list(subfields.get("a")).into_iter().next()?;
            SubjectHeadingObject {
                tag: map
                    .get("tag")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(DEFAULT_TAG)
                    .to_string(),
                ind1: indicator(map.get("ind1"), ' '),
                ind2: indicator(map.get("ind2"), '0'),
                subfields: SubjectSubfields {
                    a,
                    x: coerce_list(subfields.get("x")),
                    y: coerce_list(subfields.get("y")),
                    z: coerce_list(subfields.get("z")),
                    v: coerce_list(subfields.get("v")),
                },
            }
        }
        _ => return None,
    };

    Some(heading.with_subfield_cap(cap))
}

fn coerce_list(value: Option<&Value>) -> Vec<String> {
    let scalar = |v: &Value| match v {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };

    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar).filter(|s| !s.is_empty()).collect(),
        Some(other) => scalar(other).filter(|s| !s.is_empty()).into_iter().collect(),
        None => Vec::new(),
    }
}

fn indicator(value: Option<&Value>, default: char) -> char {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.chars().next())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_heading_classifies_segments() {
        let heading = SubjectHeadingObject::from_heading("United States -- History -- Civil War, 1861-1865").unwrap();
        assert_eq!(heading.subfields.a, "United States");
        assert_eq!(heading.subfields.x, vec!["History"]);
        assert_eq!(heading.subfields.y, vec!["Civil War, 1861-1865"]);

        let century = SubjectHeadingObject::from_heading("Art -- 20th century").unwrap();
        assert_eq!(century.subfields.y, vec!["20th century"]);
        assert!(SubjectHeadingObject::from_heading("  -- ").is_none());
    }

    #[test]
    fn test_normalize_object_coerces_scalars() {
        let value = json!({
            "tag": "651",
            "ind2": "0",
            "subfields": { "a": " France ", "x": "Politics and government", "y": ["1789-1815", ""], "v": null }
        });
        let heading = normalize_subject_value(&value, 0).unwrap();
        assert_eq!(heading.tag, "651");
        assert_eq!(heading.ind1, ' ');
        assert_eq!(heading.subfields.a, "France");
        assert_eq!(heading.subfields.x, vec!["Politics and government"]);
        assert_eq!(heading.subfields.y, vec!["1789-1815"]);
        assert!(heading.subfields.v.is_empty());
    }

    #[test]
    fn test_subfield_cap_keeps_earliest() {
        let value = json!({ "a": "Cats", "x": ["Behavior", "Anatomy"], "z": ["Egypt"], "v": ["Juvenile literature"] });
        let heading = normalize_subject_value(&value, 3).unwrap();
        assert_eq!(heading.subfields.x, vec!["Behavior", "Anatomy"]);
        assert!(heading.subfields.z.is_empty());
        assert!(heading.subfields.v.is_empty());
    }

    #[test]
    fn test_unusable_values() {
        assert!(normalize_subject_value(&json!(42), 5).is_none());
        assert!(normalize_subject_value(&json!({ "x": ["History"] }), 5).is_none());
    }

    #[test]
    fn test_to_field_and_string() {
        let heading = SubjectHeadingObject::from_heading("Cats -- History -- 19th century").unwrap();
        assert_eq!(heading.to_heading_string(), "Cats -- History -- 19th century");

        let field = heading.to_field(2);
        assert_eq!(field.tag, "650");
        assert_eq!(field.occurrence, 2);
        let codes: Vec<char> = field.subfields.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec!['a', 'x', 'y']);
    }
}
