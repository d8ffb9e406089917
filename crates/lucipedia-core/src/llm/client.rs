//! Minimal client for OpenAI-compatible chat completion APIs.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::{Error, Result};

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Model-independent part of a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// Conversation so far.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Optional `response_format` object, passed through verbatim.
    pub response_format: Option<serde_json::Value>,
}

/// First choice of a completion, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    /// Message content, trimmed. May be empty.
    Content(String),
    /// The model declined, with its stated reason.
    Refusal(String),
    /// `finish_reason` was `content_filter`.
    ContentFiltered,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<&'a serde_json::Value>,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    finish_reason: Option<String>,
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

/// Chat completion client with ordered model fallback.
///
/// Models are tried in configuration order. A call moves on to the next
/// model only when the failure is recoverable (connection problems, timeouts,
/// server errors); client errors and refusals are returned immediately.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    completions_url: String,
    api_key: Option<String>,
    models: Vec<String>,
}

impl ChatClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the endpoint or the model list is empty,
    /// and [`Error::Network`] when the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout().saturating_add(Duration::from_secs(5)))
            .user_agent(concat!("lucipedia/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Self::with_http_client(http, config)
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_http_client(http: reqwest::Client, config: &LlmConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(Error::Config("llm endpoint is required".into()));
        }
        let models: Vec<String> = config
            .models
            .iter()
            .map(|model| model.trim().to_string())
            .filter(|model| !model.is_empty())
            .collect();
        if models.is_empty() {
            return Err(Error::Config("at least one llm model is required".into()));
        }

        Ok(Self {
            http,
            completions_url: format!("{endpoint}/chat/completions"),
            api_key: config
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            models,
        })
    }

    /// Models in fallback order.
    #[must_use]
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Run a completion, falling back across models on recoverable failures.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatReply> {
        let mut last_error = None;
        for (attempt, model) in self.models.iter().enumerate() {
            match self.complete_with(model, request).await {
                Ok(reply) => return Ok(reply),
                Err(err) if err.is_recoverable() && attempt + 1 < self.models.len() => {
                    warn!(model = %model, error = %err, "chat completion failed, trying next model");
                    last_error = Some(err);
                },
                Err(err) => return Err(err),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Config("no llm models configured".into())))
    }

    async fn complete_with(&self, model: &str, request: &ChatRequest) -> Result<ChatReply> {
        let body = CompletionBody {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.response_format.as_ref(),
        };

        let mut builder = self.http.post(&self.completions_url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(model, url = %self.completions_url, "requesting chat completion");
        let response = builder.send().await?.error_for_status()?;
        let text = response.text().await?;
        let completion: Completion = serde_json::from_str(&text)
            .map_err(|e| Error::Generation(format!("decoding chat completion: {e}")))?;

        classify(completion)
    }
}

fn classify(completion: Completion) -> Result<ChatReply> {
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::Generation("llm completion returned no choices".into()));
    };

    if choice
        .finish_reason
        .as_deref()
        .is_some_and(|reason| reason.trim().eq_ignore_ascii_case("content_filter"))
    {
        return Ok(ChatReply::ContentFiltered);
    }

    if let Some(refusal) = choice
        .message
        .refusal
        .as_deref()
        .map(str::trim)
        .filter(|refusal| !refusal.is_empty())
    {
        return Ok(ChatReply::Refusal(refusal.to_string()));
    }

    Ok(ChatReply::Content(
        choice.message.content.unwrap_or_default().trim().to_string(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": { "role": "assistant", "content": content }
            }]
        })
    }

    fn config(server: &MockServer, models: &[&str]) -> LlmConfig {
        LlmConfig {
            endpoint: format!("{}/v1/", server.uri()),
            api_key: Some("sk-test".to_string()),
            models: models.iter().map(|m| (*m).to_string()).collect(),
            ..LlmConfig::default()
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.4,
            response_format: None,
        }
    }

    #[tokio::test]
    async fn test_content_reply_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "m1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  <p>Hi</p>\n")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(&config(&server, &["m1"])).unwrap();
        let reply = client.complete(&request()).await.unwrap();

        assert_eq!(reply, ChatReply::Content("<p>Hi</p>".to_string()));
    }

    #[tokio::test]
    async fn test_content_filter_and_refusal_are_distinct() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "model": "filtered" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "finish_reason": "content_filter", "message": { "content": "" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(body_partial_json(json!({ "model": "refusing" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "finish_reason": "stop", "message": { "content": null, "refusal": "  no thanks " } }]
            })))
            .mount(&server)
            .await;

        let filtered = ChatClient::new(&config(&server, &["filtered"])).unwrap();
        let refusing = ChatClient::new(&config(&server, &["refusing"])).unwrap();

        assert_eq!(filtered.complete(&request()).await.unwrap(), ChatReply::ContentFiltered);
        assert_eq!(
            refusing.complete(&request()).await.unwrap(),
            ChatReply::Refusal("no thanks".to_string())
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "model": "primary" })))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(body_partial_json(json!({ "model": "backup" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(&config(&server, &["primary", "backup"])).unwrap();

        assert_eq!(
            client.complete(&request()).await.unwrap(),
            ChatReply::Content("ok".to_string())
        );
    }

    #[tokio::test]
    async fn test_client_error_does_not_fall_back() {
        let server = MockServer::start().await;
        Mock::given(body_partial_json(json!({ "model": "primary" })))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(body_partial_json(json!({ "model": "backup" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(0)
            .mount(&server)
            .await;

        let client = ChatClient::new(&config(&server, &["primary", "backup"])).unwrap();
        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.category(), "network");
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_no_choices_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = ChatClient::new(&config(&server, &["m1"])).unwrap();
        let err = client.complete(&request()).await.unwrap_err();

        assert_eq!(err.to_string(), "Generation error: llm completion returned no choices");
    }

    #[test]
    fn test_rejects_empty_configuration() {
        let no_models = LlmConfig {
            models: vec!["  ".to_string()],
            ..LlmConfig::default()
        };
        let no_endpoint = LlmConfig {
            endpoint: " ".to_string(),
            ..LlmConfig::default()
        };

        assert_eq!(ChatClient::new(&no_models).unwrap_err().category(), "config");
        assert_eq!(ChatClient::new(&no_endpoint).unwrap_err().category(), "config");
    }

    #[test]
    fn test_maximum_timeout_does_not_overflow() {
        let config = LlmConfig {
            timeout_secs: u64::MAX,
            ..LlmConfig::default()
        };

        assert!(ChatClient::new(&config).is_ok());
    }
}
