//! Runtime configuration.
//!
//! Loadable from YAML with human-readable durations:
//!
//! ```yaml
//! model: cataloging-assistant
//! timeout: 20s
//! max_retries: 2
//! retry_min_delay: 250ms
//! require_coverage: true
//! subject_subfield_cap: 6
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use colophon_core::extract::DEFAULT_SUBJECT_SUBFIELD_CAP;

use crate::providers::CompletionConfig;
use crate::RuntimeError;

/// Configuration for an [`AssistSession`](crate::AssistSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Model name passed through to the provider
    pub model: String,

    pub max_tokens: u32,

    /// Deadline for one provider attempt
    #[serde(with = "human_duration")]
    pub timeout: Duration,

    /// Additional attempts after the first, for retryable errors only
    pub max_retries: usize,

    /// First backoff delay; later delays grow exponentially
    #[serde(with = "human_duration")]
    pub retry_min_delay: Duration,

    /// Refuse to ask about fields no rule covers
    pub require_coverage: bool,

    /// Total subfield cap for subject headings recovered from replies
    pub subject_subfield_cap: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: CompletionConfig::default().model,
            max_tokens: 800,
            timeout: Duration::from_secs(20),
            max_retries: 2,
            retry_min_delay: Duration::from_millis(250),
            require_coverage: true,
            subject_subfield_cap: DEFAULT_SUBJECT_SUBFIELD_CAP,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, RuntimeError> {
        serde_yaml::from_str(yaml).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Completion settings for one provider call.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: 0.0,
            timeout: self.timeout,
        }
    }
}

mod human_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
