//! # colophon-runtime
//!
//! Optional AI assistance for Colophon.
//!
//! ## Important
//!
//! This crate is OPTIONAL. Punctuation checking in `colophon-core` is fully
//! deterministic and never calls an assistant.
//!
//! An [`AssistSession`] wraps a caller-supplied [`AssistProvider`] and does
//! everything around the call:
//! - refuses to ask about fields no rule covers
//! - correlates replies with the latest request per field
//! - retries transient transport failures with exponential backoff
//! - interprets JSON or prose replies
//! - gates every proposed patch through the core guardrail
//!
//! ## Example
//!
//! ```rust,ignore
//! use colophon_runtime::{AssistSession, RuntimeConfig, Verdict};
//!
//! let session = AssistSession::new(engine, provider, RuntimeConfig::default());
//! let outcome = session.assist(&field, None, Features::all()).await?;
//! if let Verdict::Accepted { patches } = outcome.verdict {
//!     // offer patches to the cataloger
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod interpret;
pub mod pending;
pub mod prompts;
pub mod providers;
pub mod session;

pub use config::RuntimeConfig;
pub use interpret::{interpret_reply, Interpretation, Suggestions};
pub use pending::PendingRequests;
pub use providers::{AssistProvider, ChatMessage, CompletionConfig, CompletionResponse, ProviderError, TokenUsage};
pub use session::{AssistOutcome, AssistSession, Verdict};

/// Errors from the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Field {tag} is not covered by any punctuation rule")]
    Uncovered { tag: String },

    #[error("Assistant call failed: {0}")]
    Provider(ProviderError),

    #[error("Assistant did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<ProviderError> for RuntimeError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Timeout(after) => Self::Timeout(after),
            other => Self::Provider(other),
        }
    }
}
