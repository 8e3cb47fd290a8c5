//! Integration tests for the provider chain.
//!
//! Hosted providers are pointed at a wiremock server through their base URL.
//! Chain behavior that does not need HTTP uses a scripted in-process backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chronicle::error::{ProviderError, SynthesisError};
use chronicle::llm::anthropic::AnthropicClient;
use chronicle::llm::gemini::GeminiClient;
use chronicle::llm::ollama::OllamaClient;
use chronicle::llm::openai::OpenAiClient;
use chronicle::llm::{
    Backend, Gateway, GenerationParams, Prompt, Provider, ProviderKind, RetryPolicy,
};
use chronicle::Length;

const LIGHT_ANSWER: &str = r#"{"summary": "Shipped login and an API token endpoint."}"#;

fn prompt() -> Prompt {
    Prompt {
        system: "Summarize the statistics.".to_string(),
        user: "## Numbers\n- 5 commits".to_string(),
        params: GenerationParams {
            max_tokens: 400,
            temperature: 0.3,
        },
    }
}

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(60)
}

/// Short waits so retries do not slow the suite down.
fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(20),
    }
}

fn anthropic(server: &MockServer, key: Option<&str>) -> Box<dyn Backend> {
    Box::new(Provider::Anthropic(AnthropicClient::new(
        "claude-sonnet-4-5".to_string(),
        key.map(str::to_string),
        "ANTHROPIC_API_KEY".to_string(),
        Some(server.uri()),
    )))
}

fn openai(server: &MockServer) -> Box<dyn Backend> {
    Box::new(Provider::OpenAi(OpenAiClient::new(
        "gpt-4o-mini".to_string(),
        Some("sk-test".to_string()),
        "OPENAI_API_KEY".to_string(),
        Some(server.uri()),
    )))
}

fn gemini(server: &MockServer) -> Box<dyn Backend> {
    Box::new(Provider::Gemini(GeminiClient::new(
        "gemini-2.0-flash".to_string(),
        Some("g-test".to_string()),
        "GEMINI_API_KEY".to_string(),
        Some(server.uri()),
    )))
}

fn ollama(server: &MockServer) -> Box<dyn Backend> {
    Box::new(Provider::Ollama(OllamaClient::new(
        "llama3.1".to_string(),
        Some(server.uri()),
    )))
}

fn anthropic_body(text: &str) -> serde_json::Value {
    json!({
        "id": "msg_01",
        "type": "message",
        "role": "assistant",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn"
    })
}

// =============================================================================
// HOSTED PROVIDERS OVER HTTP
// =============================================================================

#[tokio::test]
async fn test_anthropic_answer_becomes_narrative() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(LIGHT_ANSWER)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(vec![anthropic(&server, Some("test-key"))]);
    let synthesis = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap();

    assert_eq!(synthesis.provider, ProviderKind::Anthropic);
    assert_eq!(synthesis.model, "claude-sonnet-4-5");
    assert_eq!(
        synthesis.sections.get("summary"),
        Some("Shipped login and an API token endpoint.")
    );
    assert!(synthesis.failures.is_empty());
}

#[tokio::test]
async fn test_fenced_answer_from_openai_is_accepted() {
    let server = MockServer::start().await;
    let fenced = format!("Here you go:\n```json\n{}\n```", LIGHT_ANSWER);
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": fenced}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(vec![openai(&server)]);
    let synthesis = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap();

    assert_eq!(synthesis.provider, ProviderKind::OpenAi);
    assert!(synthesis.sections.has("summary"));
}

#[tokio::test]
async fn test_unauthorized_provider_is_skipped_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "g-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": LIGHT_ANSWER}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(vec![openai(&server), gemini(&server)]).with_policy(fast_policy(3));
    let synthesis = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap();

    assert_eq!(synthesis.provider, ProviderKind::Gemini);
    assert_eq!(synthesis.failures.len(), 1);
    let failure = &synthesis.failures[0];
    assert_eq!(failure.provider, ProviderKind::OpenAi);
    assert_eq!(failure.attempts, 1);
    assert!(matches!(failure.error, ProviderError::Unauthorized { status: 401 }));
}

#[tokio::test]
async fn test_server_error_is_retried_on_same_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(LIGHT_ANSWER)))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(vec![anthropic(&server, Some("test-key"))]).with_policy(fast_policy(3));
    let synthesis = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap();

    assert_eq!(synthesis.provider, ProviderKind::Anthropic);
    assert!(synthesis.failures.is_empty());
}

#[tokio::test]
async fn test_rate_limited_provider_exhausts_retries_then_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1",
            "message": {"role": "assistant", "content": LIGHT_ANSWER},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = Gateway::new(vec![anthropic(&server, Some("test-key")), ollama(&server)])
        .with_policy(fast_policy(2));
    let synthesis = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap();

    assert_eq!(synthesis.provider, ProviderKind::Ollama);
    assert_eq!(synthesis.failures.len(), 1);
    assert_eq!(synthesis.failures[0].attempts, 2);
    assert!(matches!(
        synthesis.failures[0].error,
        ProviderError::RateLimited { .. }
    ));
}

#[tokio::test]
async fn test_missing_credential_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_body(LIGHT_ANSWER)))
        .expect(0)
        .mount(&server)
        .await;

    let gateway = Gateway::new(vec![anthropic(&server, None)]);
    let err = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::Unavailable { .. }));
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0].error,
        ProviderError::MissingCredential(var) if var == "ANTHROPIC_API_KEY"
    ));
    assert!(err.to_string().contains("ANTHROPIC_API_KEY not set"));
}

// =============================================================================
// CHAIN BEHAVIOR
// =============================================================================

/// A backend that replays a fixed script of outcomes and counts calls.
struct ScriptedBackend {
    kind: ProviderKind,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: Arc<AtomicU32>,
}

impl ScriptedBackend {
    fn new(kind: ProviderKind, script: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            kind,
            script: Mutex::new(script.into()),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    fn boxed(self) -> (Box<dyn Backend>, Arc<AtomicU32>) {
        let calls = self.calls.clone();
        (Box::new(self), calls)
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> String {
        self.kind.default_model().to_string()
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("script exhausted".to_string())))
    }
}

#[tokio::test]
async fn test_prose_without_json_is_retried_then_skipped() {
    let prose = || Ok("I could not produce JSON, sorry.".to_string());
    let (first, first_calls) =
        ScriptedBackend::new(ProviderKind::ClaudeCode, vec![prose(), prose(), prose()]).boxed();
    let (second, second_calls) =
        ScriptedBackend::new(ProviderKind::Ollama, vec![Ok(LIGHT_ANSWER.to_string())]).boxed();

    let gateway = Gateway::new(vec![first, second]).with_policy(fast_policy(3));
    let synthesis = gateway
        .generate(&prompt(), Length::Light, deadline())
        .await
        .unwrap();

    assert_eq!(first_calls.load(Ordering::SeqCst), 3);
    assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    assert_eq!(synthesis.provider, ProviderKind::Ollama);
    assert!(matches!(
        synthesis.failures[0].error,
        ProviderError::InvalidResponse(_)
    ));
}

#[tokio::test]
async fn test_detailed_length_requires_every_section() {
    let short_only = r#"{"summary": "s", "highlights": ["a", "b"]}"#;
    let complete = r#"{
        "summary": "s",
        "highlights": ["a"],
        "categories": {"feature": "New login flow"},
        "risks": ["Session migration untested"]
    }"#;
    let (backend, calls) = ScriptedBackend::new(
        ProviderKind::Anthropic,
        vec![Ok(short_only.to_string()), Ok(complete.to_string())],
    )
    .boxed();

    let gateway = Gateway::new(vec![backend]).with_policy(fast_policy(3));
    let synthesis = gateway
        .generate(&prompt(), Length::Detailed, deadline())
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(synthesis.sections.get("categories.feature"), Some("New login flow"));
    assert_eq!(synthesis.sections.get("risks"), Some("- Session migration untested"));
}

#[tokio::test]
async fn test_every_provider_failing_reports_each_in_order() {
    let gateway = Gateway::new(vec![
        Box::new(ScriptedBackend::new(
            ProviderKind::Anthropic,
            vec![Err(ProviderError::Unauthorized { status: 403 })],
        )),
        Box::new(ScriptedBackend::new(
            ProviderKind::Gemini,
            vec![Err(ProviderError::InvalidRequest {
                status: 400,
                body: "bad model".to_string(),
            })],
        )),
    ]);

    let err = gateway
        .generate(&prompt(), Length::Short, deadline())
        .await
        .unwrap_err();

    let providers: Vec<ProviderKind> = err.failures().iter().map(|f| f.provider).collect();
    assert_eq!(providers, vec![ProviderKind::Anthropic, ProviderKind::Gemini]);
    let message = err.to_string();
    assert!(message.contains("Anthropic"));
    assert!(message.contains("request rejected (400)"));
}

#[tokio::test]
async fn test_passed_deadline_tries_no_provider() {
    let (backend, calls) =
        ScriptedBackend::new(ProviderKind::Anthropic, vec![Ok(LIGHT_ANSWER.to_string())]).boxed();
    let gateway = Gateway::new(vec![backend]);

    let err = gateway
        .generate(&prompt(), Length::Light, Instant::now())
        .await
        .unwrap_err();

    assert!(matches!(err, SynthesisError::DeadlineExceeded { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
