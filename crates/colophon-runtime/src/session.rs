//! Assist session: one field in, gated suggestions out.
//!
//! # Flow
//! 1. `prepare`: coverage gate, request id, register as the field's latest request
//! 2. `dispatch`: provider call with per-attempt timeout and exponential retry
//! 3. `accept`: drop superseded replies, interpret, run the guardrail
//!
//! The session holds no lock across an `await`.

use backon::{ExponentialBuilder, Retryable};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use colophon_core::{
    AiRequest, Diagnostic, Diagnostics, Features, Field, GuardrailRejection, GuardrailValidator, Patch, Record,
    RuleEngine,
};

use crate::config::RuntimeConfig;
use crate::interpret::{interpret_reply, Suggestions};
use crate::pending::PendingRequests;
use crate::prompts::build_messages;
use crate::providers::{AssistProvider, CompletionResponse, ProviderError, TokenUsage};
use crate::RuntimeError;

/// What happened to a reply's proposed patches.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Every patch passed the guardrail (possibly none were proposed)
    Accepted { patches: Vec<Patch> },

    /// The batch was rejected; nothing may be applied
    Rejected { reason: GuardrailRejection },

    /// A newer request for the same field was sent; the reply was discarded
    Superseded,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Result of one assisted request.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistOutcome {
    pub request_id: String,

    pub verdict: Verdict,

    /// Whether the assistant answered with JSON
    pub structured: bool,

    /// Empty unless the verdict is `Accepted`
    pub suggestions: Suggestions,

    pub usage: TokenUsage,
}

/// Runs assisted requests against one provider and rule engine.
pub struct AssistSession {
    engine: Arc<RuleEngine>,
    provider: Arc<dyn AssistProvider>,
    config: RuntimeConfig,
    pending: PendingRequests,
    sequence: AtomicU64,
    diagnostics: Mutex<Diagnostics>,
}

impl AssistSession {
    pub fn new(engine: Arc<RuleEngine>, provider: Arc<dyn AssistProvider>, config: RuntimeConfig) -> Self {
        Self {
            engine,
            provider,
            config,
            pending: PendingRequests::new(),
            sequence: AtomicU64::new(0),
            diagnostics: Mutex::new(Diagnostics::new()),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Advisories collected so far (rejected rule patterns and the like).
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().entries().to_vec()
    }

    /// Build a request for `field` and make it the field's current request.
    pub fn prepare(
        &self,
        field: &Field,
        record: Option<&Record>,
        features: Features,
    ) -> Result<AiRequest, RuntimeError> {
        if self.config.require_coverage && !self.is_covered(field) {
            tracing::debug!(tag = %field.tag, "Refusing assistance for uncovered field");
            return Err(RuntimeError::Uncovered {
                tag: field.tag.clone(),
            });
        }

        let request_id = self.next_request_id(field);
        self.pending.register(&field.tag, field.occurrence, &request_id);

        Ok(AiRequest {
            request_id,
            tag_context: field.clone(),
            record_context: record.cloned(),
            features,
        })
    }

    /// Call the provider for a prepared request.
    pub async fn dispatch(&self, request: &AiRequest) -> Result<CompletionResponse, RuntimeError> {
        let messages = build_messages(request)?;
        let completion = self.config.completion_config();
        let provider = &self.provider;

        let attempt = || {
            let messages = messages.clone();
            let completion = completion.clone();
            async move {
                match tokio::time::timeout(completion.timeout, provider.complete(messages, &completion)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(completion.timeout)),
                }
            }
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.config.retry_min_delay)
            .with_max_times(self.config.max_retries);

        let response = attempt
            .retry(backoff)
            .when(ProviderError::is_retryable)
            .notify(|error: &ProviderError, delay| {
                tracing::warn!(
                    provider = provider.name(),
                    request_id = %request.request_id,
                    error = %error,
                    delay = ?delay,
                    "Assistant call failed, retrying"
                );
            })
            .await?;

        tracing::debug!(
            provider = self.provider.name(),
            request_id = %request.request_id,
            tokens = response.usage.total(),
            "Assistant replied"
        );
        Ok(response)
    }

    /// Gate a raw reply for `request`.
    pub fn accept(&self, request: &AiRequest, reply: &str) -> AssistOutcome {
        self.accept_with_usage(request, reply, TokenUsage::default())
    }

    /// Prepare, dispatch and accept in one step.
    pub async fn assist(
        &self,
        field: &Field,
        record: Option<&Record>,
        features: Features,
    ) -> Result<AssistOutcome, RuntimeError> {
        let request = self.prepare(field, record, features)?;
        let response = match self.dispatch(&request).await {
            Ok(response) => response,
            Err(error) => {
                self.pending.complete(&field.tag, field.occurrence, &request.request_id);
                return Err(error);
            }
        };
        Ok(self.accept_with_usage(&request, &response.content, response.usage))
    }

    fn accept_with_usage(&self, request: &AiRequest, reply: &str, usage: TokenUsage) -> AssistOutcome {
        let field = &request.tag_context;
        let outcome = |verdict, structured, suggestions| AssistOutcome {
            request_id: request.request_id.clone(),
            verdict,
            structured,
            suggestions,
            usage,
        };

        if !self.pending.complete(&field.tag, field.occurrence, &request.request_id) {
            tracing::warn!(request_id = %request.request_id, tag = %field.tag, "Discarding superseded reply");
            return outcome(Verdict::Superseded, false, Suggestions::default());
        }

        let interpretation = interpret_reply(reply, &request.request_id, self.config.subject_subfield_cap);
        let checked = {
            let mut diagnostics = self.diagnostics.lock();
            GuardrailValidator::new(&self.engine).validate_value(request, &interpretation.value, &mut diagnostics)
        };

        match checked {
            Ok(patches) => outcome(
                Verdict::Accepted { patches },
                interpretation.structured,
                interpretation.suggestions,
            ),
            Err(reason) => {
                tracing::warn!(request_id = %request.request_id, reason = %reason, "Assistant reply rejected");
                outcome(Verdict::Rejected { reason }, interpretation.structured, Suggestions::default())
            }
        }
    }

    fn is_covered(&self, field: &Field) -> bool {
        let mut diagnostics = self.diagnostics.lock();
        field.subfields.iter().any(|s| {
            self.engine
                .is_field_covered(&field.tag, s.code, field.ind1, field.ind2, &mut diagnostics)
        })
    }

    fn next_request_id(&self, field: &Field) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        format!(
            "{}-{}-{}-{}",
            field.tag,
            field.occurrence,
            Utc::now().timestamp_millis(),
            sequence
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig};
    use async_trait::async_trait;
    use colophon_core::{EngineConfig, FieldErrorCode, RulePack};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Scripted provider. `{request_id}` in a reply is replaced with the id
    /// found in the request payload.
    struct MockProvider {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::new(vec![])
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AssistProvider for MockProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let request: AiRequest = messages[1]
                .content
                .split_once("\n\n")
                .and_then(|(_, payload)| serde_json::from_str(payload).ok())
                .expect("request payload");
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::NotConfigured("no reply scripted".into())))?;

            Ok(CompletionResponse {
                content: reply.replace("{request_id}", &request.request_id),
                usage: TokenUsage {
                    prompt_tokens: 40,
                    completion_tokens: 10,
                },
                model: "mock".to_string(),
                stop_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn engine() -> Arc<RuleEngine> {
        Arc::new(RuleEngine::new(&RulePack::builtin().unwrap(), EngineConfig::default()))
    }

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            max_retries: 2,
            retry_min_delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    fn session(provider: Arc<MockProvider>) -> AssistSession {
        AssistSession::new(engine(), provider, config())
    }

    fn title_field() -> Field {
        Field::new("245", '1', '0').subfield('a', "Title")
    }

    const TITLE_FIX: &str = r#"{
        "request_id": "{request_id}",
        "findings": [{
            "message": "Title proper ends with a period",
            "proposed_fixes": [{ "patch": [{
                "op": "replace_subfield", "tag": "245", "subfield": "a", "occurrence": 0,
                "original_text": "Title", "replacement_text": "Title."
            }] }]
        }],
        "confidence_percent": 90
    }"#;

    #[tokio::test]
    async fn test_accepted_patch_round_trip() {
        let provider = Arc::new(MockProvider::new(vec![Ok(TITLE_FIX.to_string())]));
        let session = session(provider.clone());

        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        match &outcome.verdict {
            Verdict::Accepted { patches } => {
                assert_eq!(patches.len(), 1);
                assert_eq!(patches[0].value, "Title.");
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert!(outcome.structured);
        assert_eq!(outcome.suggestions.confidence_percent, Some(90));
        assert_eq!(outcome.usage.total(), 50);
        assert!(outcome.request_id.starts_with("245-0-"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_uncovered_field_is_refused() {
        let provider = Arc::new(MockProvider::new(vec![]));
        let session = session(provider.clone());
        let field = Field::new("999", ' ', ' ').subfield('a', "local note");

        let err = session.assist(&field, None, Features::all()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Uncovered { ref tag } if tag == "999"));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_superseded_reply_never_reaches_guardrail() {
        let provider = Arc::new(MockProvider::new(vec![]));
        let session = session(provider);

        let first = session.prepare(&title_field(), None, Features::all()).unwrap();
        let second = session.prepare(&title_field(), None, Features::all()).unwrap();
        assert_ne!(first.request_id, second.request_id);

        let stale = TITLE_FIX.replace("{request_id}", &first.request_id);
        assert_eq!(session.accept(&first, &stale).verdict, Verdict::Superseded);

        let fresh = TITLE_FIX.replace("{request_id}", &second.request_id);
        assert!(session.accept(&second, &fresh).verdict.is_accepted());

        // A reply is only accepted once
        assert_eq!(session.accept(&second, &fresh).verdict, Verdict::Superseded);
    }

    #[tokio::test]
    async fn test_guardrail_rejection_drops_suggestions() {
        let reply = TITLE_FIX.replace("\"Title.\"", "\"Titles.\"");
        let provider = Arc::new(MockProvider::new(vec![Ok(reply)]));
        let session = session(provider);

        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        assert_eq!(
            outcome.verdict,
            Verdict::Rejected {
                reason: GuardrailRejection::NonPunctuationEdit
            }
        );
        assert_eq!(outcome.suggestions, Suggestions::default());
    }

    #[tokio::test]
    async fn test_wrong_request_id_is_rejected() {
        let reply = TITLE_FIX.replace("{request_id}", "someone-else");
        let provider = Arc::new(MockProvider::new(vec![Ok(reply)]));
        let session = session(provider);

        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        assert_eq!(
            outcome.verdict,
            Verdict::Rejected {
                reason: GuardrailRejection::RequestMismatch
            }
        );
    }

    #[tokio::test]
    async fn test_structured_range_is_disqualified() {
        let reply = r#"{ "request_id": "{request_id}", "classification": "QA76-QA76.9" }"#;
        let provider = Arc::new(MockProvider::new(vec![Ok(reply.to_string())]));
        let session = session(provider);

        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted { patches: vec![] });
        assert_eq!(outcome.suggestions.classification, None);
        assert_eq!(outcome.suggestions.field_errors[0].code, FieldErrorCode::ClassificationRange);
    }

    #[tokio::test]
    async fn test_prose_reply_uses_extraction() {
        let reply = "I would suggest:\nSubjects: Gatsby, Jay (Fictitious character)\nLC classification: PS3511";
        let provider = Arc::new(MockProvider::new(vec![Ok(reply.to_string())]));
        let session = session(provider);

        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        assert_eq!(outcome.verdict, Verdict::Accepted { patches: vec![] });
        assert!(!outcome.structured);
        assert_eq!(outcome.suggestions.classification.as_deref(), Some("PS3511"));
        assert_eq!(outcome.suggestions.subjects.len(), 1);
    }

    #[tokio::test]
    async fn test_retryable_errors_are_retried() {
        let provider = Arc::new(MockProvider::new(vec![
            Err(ProviderError::HttpError("connection reset".into())),
            Err(ProviderError::ApiError {
                status: 503,
                message: "overloaded".into(),
            }),
            Ok(TITLE_FIX.to_string()),
        ]));
        let session = session(provider.clone());

        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        assert!(outcome.verdict.is_accepted());
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let provider = Arc::new(MockProvider::new(vec![Err(ProviderError::AuthError)]));
        let session = session(provider.clone());

        let err = session.assist(&title_field(), None, Features::all()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Provider(ProviderError::AuthError)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_dispatch_releases_pending_request() {
        let provider = Arc::new(MockProvider::new(vec![Err(ProviderError::AuthError)]));
        let session = session(provider);

        assert!(session.assist(&title_field(), None, Features::all()).await.is_err());
        assert!(session.pending.is_empty());
    }

    #[tokio::test]
    async fn test_field_recovers_after_failed_dispatch() {
        let provider = Arc::new(MockProvider::new(vec![
            Err(ProviderError::AuthError),
            Ok(TITLE_FIX.to_string()),
        ]));
        let session = session(provider);

        assert!(session.assist(&title_field(), None, Features::all()).await.is_err());
        let outcome = session.assist(&title_field(), None, Features::all()).await.unwrap();
        assert!(outcome.verdict.is_accepted());
        assert!(session.pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let provider = Arc::new(MockProvider::slow(Duration::from_secs(60)));
        let session = AssistSession::new(
            engine(),
            provider.clone(),
            RuntimeConfig {
                timeout: Duration::from_secs(1),
                max_retries: 1,
                retry_min_delay: Duration::from_millis(10),
                ..Default::default()
            },
        );

        let err = session.assist(&title_field(), None, Features::all()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Timeout(d) if d == Duration::from_secs(1)));
        assert_eq!(provider.calls(), 2);
        assert!(session.pending.is_empty());
    }

    #[test]
    fn test_request_ids_are_unique_per_call() {
        let session = session(Arc::new(MockProvider::new(vec![])));
        let field = title_field().with_occurrence(2);
        let a = session.prepare(&field, None, Features::default()).unwrap();
        let b = session.prepare(&field, None, Features::default()).unwrap();
        assert!(a.request_id.starts_with("245-2-"));
        assert!(a.request_id.ends_with("-1"));
        assert!(b.request_id.ends_with("-2"));
    }
}
