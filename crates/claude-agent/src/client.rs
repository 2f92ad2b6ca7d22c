use std::sync::Arc;
use std::time::Duration;

use crate::types::{ChatMessage, MessagesRequest, MessagesResponse, TokenUsage};
use crate::{ClaudeAgentError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

// ─── ClientConfig ─────────────────────────────────────────────────────────

/// Connection and sampling settings shared by every request a
/// [`ClaudeClient`] makes.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    /// Scheme + host, without a trailing slash. Overridden in tests.
    pub base_url: String,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Whole-request timeout, including reading the body.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: Some(DEFAULT_TEMPERATURE),
            timeout: Duration::from_secs(60),
        }
    }
}

// ─── CompletionRequest / Completion ───────────────────────────────────────

/// One model invocation: system instructions, prior turns, and the new query.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub query: String,
    /// Per-request override of [`ClientConfig::max_tokens`].
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            history: Vec::new(),
            query: query.into(),
            max_tokens: None,
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The reply text plus accounting for a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Model id as reported by the API (may differ from the requested alias).
    pub model: String,
    pub usage: TokenUsage,
}

// ─── ClaudeClient ─────────────────────────────────────────────────────────

/// Cheap-to-clone handle around a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl ClaudeClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build the wire request for `req` without sending it.
    pub fn build_request(&self, req: CompletionRequest) -> MessagesRequest {
        let mut messages = req.history;
        messages.push(ChatMessage::user(req.query));
        MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: req.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: self.config.temperature,
            system: req.system,
            messages,
        }
    }

    /// Send exactly one request to `POST /v1/messages`.
    ///
    /// Non-2xx responses become [`ClaudeAgentError::Api`] carrying the
    /// upstream status and raw body.
    pub async fn complete(&self, req: CompletionRequest) -> Result<Completion> {
        let body = self.build_request(req);
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));

        tracing::debug!(
            model = %body.model,
            max_tokens = body.max_tokens,
            history = body.messages.len() - 1,
            "calling Claude Messages API"
        );

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Claude API returned an error");
            return Err(ClaudeAgentError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|source| ClaudeAgentError::Parse {
                body: text.clone(),
                source,
            })?;

        let reply = parsed
            .text()
            .ok_or_else(|| ClaudeAgentError::EmptyResponse {
                model: parsed.model.clone(),
            })?
            .to_string();

        tracing::info!(
            model = %parsed.model,
            tokens_in = parsed.usage.input_tokens,
            tokens_out = parsed.usage.output_tokens,
            reply_len = reply.len(),
            "Claude response received"
        );

        Ok(Completion {
            text: reply,
            model: parsed.model,
            usage: parsed.usage,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const OK_BODY: &str = r#"{
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4-5-20250929",
        "content": [{"type": "text", "text": "Congrats on the launch!"}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 120, "output_tokens": 30}
    }"#;

    fn client_for(server: &mockito::ServerGuard) -> ClaudeClient {
        let mut cfg = ClientConfig::new("sk-ant-test");
        cfg.base_url = server.url();
        ClaudeClient::new(cfg).unwrap()
    }

    #[test]
    fn build_request_appends_query_after_history() {
        let client = ClaudeClient::new(ClientConfig::new("k")).unwrap();
        let req = CompletionRequest::new("sys", "third")
            .with_history(vec![ChatMessage::user("first"), ChatMessage::assistant("second")]);
        let wire = client.build_request(req);
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(wire.messages[2], ChatMessage::user("third"));
        assert_eq!(wire.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(wire.system, "sys");
    }

    #[test]
    fn build_request_honours_max_tokens_override() {
        let client = ClaudeClient::new(ClientConfig::new("k")).unwrap();
        let wire = client.build_request(CompletionRequest::new("sys", "hi").with_max_tokens(1024));
        assert_eq!(wire.max_tokens, 1024);
    }

    #[tokio::test]
    async fn complete_returns_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", DEFAULT_API_VERSION)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "system": "You are a publicist.",
                "messages": [{"role": "user", "content": "We launched"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(OK_BODY)
            .create_async()
            .await;

        let completion = client_for(&server)
            .complete(CompletionRequest::new("You are a publicist.", "We launched"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(completion.text, "Congrats on the launch!");
        assert_eq!(completion.usage.input_tokens, 120);
        assert_eq!(completion.usage.output_tokens, 30);
        assert_eq!(completion.model, "claude-sonnet-4-5-20250929");
    }

    #[tokio::test]
    async fn non_success_status_surfaces_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error"}}"#)
            .create_async()
            .await;

        let err = client_for(&server)
            .complete(CompletionRequest::new("sys", "hi"))
            .await
            .unwrap_err();

        match err {
            ClaudeAgentError::Api { status, ref body } => {
                assert_eq!(status, 529);
                assert!(body.contains("overloaded_error"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        assert_eq!(err.status(), Some(529));
    }

    #[tokio::test]
    async fn response_without_text_is_empty_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(
                r#"{"id":"m","model":"claude-x","content":[],"usage":{"input_tokens":1,"output_tokens":0}}"#,
            )
            .create_async()
            .await;

        let err = client_for(&server)
            .complete(CompletionRequest::new("sys", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaudeAgentError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client_for(&server)
            .complete(CompletionRequest::new("sys", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClaudeAgentError::Parse { .. }));
    }
}
