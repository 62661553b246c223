//! Caller-owned advisory collector.
//!
//! Configuration problems (unsafe rule patterns, malformed override sets)
//! degrade to advisories instead of errors. A `Diagnostics` value lives in
//! the caller's session and remembers what it has already reported, so each
//! distinct problem is surfaced once.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Kind of advisory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Pattern rejected as too long or prone to catastrophic backtracking
    UnsafePattern,
    /// Pattern failed to compile
    InvalidPattern,
    /// User override rule set could not be parsed
    MalformedOverrides,
}

/// A single advisory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,

    /// The offending pattern or source name
    pub subject: String,

    pub message: String,
}

/// De-duplicating advisory collector.
#[derive(Debug, Default)]
pub struct Diagnostics {
    seen: HashSet<(DiagnosticKind, String)>,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an advisory unless the same kind/subject was already recorded.
    ///
    /// Returns `true` when the advisory is new.
    pub fn warn_once(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> bool {
        let subject = subject.into();
        if !self.seen.insert((kind, subject.clone())) {
            return false;
        }

        let message = message.into();
        tracing::warn!(kind = ?kind, subject = %subject, "{}", message);
        self.entries.push(Diagnostic {
            kind,
            subject,
            message,
        });
        true
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
