use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::Generator;
use super::client::{ChatClient, ChatMessage, ChatReply, ChatRequest};
use crate::config::LlmConfig;
use crate::types::Generation;
use crate::{Error, Result};

/// Built-in article system prompt.
pub const DEFAULT_ARTICLE_PROMPT: &str = "You are an expert historian who works on a wikipedia clone called Lucipedia. \
Write in standard encyclopedic tone and format, but present claims and statistics that are inflated or exaggerated versions of reality. \
State \"facts\" and convoluted statistics with the same matter-of-fact authority as a regular Wikipedia article. \
Make made-up claims about influence, scale, and impact that seem overstated, but present them neutrally without dramatic language. \
Produce detailed HTML articles with multiple internal backlinks using <a href=\"/wiki/...\"> links. \
Respond with valid HTML only. Include a title. Include a summary. Include a see also section. \
Do not include a references section. Max 300 words.";

/// How the model is asked to shape its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    /// Plain markup in the message content.
    #[default]
    Html,
    /// A JSON object `{"html": ..., "backlinks": [...]}` enforced through a
    /// JSON schema response format. The listed backlinks are validated like
    /// extracted ones.
    Structured,
}

#[derive(Deserialize)]
struct ArticlePayload {
    #[serde(default)]
    html: String,
    #[serde(default)]
    backlinks: Vec<String>,
}

/// [`Generator`] backed by a chat completion model.
#[derive(Debug, Clone)]
pub struct ChatGenerator {
    client: Arc<ChatClient>,
    system_prompt: String,
    temperature: f32,
    mode: ResponseMode,
}

impl ChatGenerator {
    /// Create a generator using the configured temperature and prompt.
    #[must_use]
    pub fn new(client: Arc<ChatClient>, config: &LlmConfig) -> Self {
        let system_prompt = config
            .system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(DEFAULT_ARTICLE_PROMPT)
            .to_string();
        let temperature = if config.generation_temperature > 0.0 {
            config.generation_temperature
        } else {
            0.4
        };
        Self {
            client,
            system_prompt,
            temperature,
            mode: ResponseMode::default(),
        }
    }

    /// Switch the response shape.
    #[must_use]
    pub const fn with_mode(mut self, mode: ResponseMode) -> Self {
        self.mode = mode;
        self
    }

    fn request(&self, slug: &str) -> ChatRequest {
        let (instruction, response_format) = match self.mode {
            ResponseMode::Html => ("Respond with only valid HTML.", None),
            ResponseMode::Structured => (
                "Return JSON that matches the provided schema.",
                Some(article_schema()),
            ),
        };
        ChatRequest {
            messages: vec![
                ChatMessage::system(&self.system_prompt),
                ChatMessage::user(format!(
                    "Write a Lucipedia article for the slug '{slug}'. {instruction}"
                )),
            ],
            temperature: self.temperature,
            response_format,
        }
    }

    fn parse(&self, content: String) -> Result<Generation> {
        if content.is_empty() {
            return Err(Error::Generation("llm response content is empty".into()));
        }
        match self.mode {
            ResponseMode::Html => Ok(Generation::content(content)),
            ResponseMode::Structured => {
                let payload: ArticlePayload = serde_json::from_str(&content)
                    .map_err(|e| Error::Generation(format!("decoding llm response json: {e}")))?;
                if payload.html.trim().is_empty() {
                    return Err(Error::Generation("llm response missing html field".into()));
                }
                Ok(Generation::Content {
                    text: payload.html,
                    declared_backlinks: payload.backlinks,
                })
            },
        }
    }
}

fn article_schema() -> serde_json::Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "lucipedia_article",
            "description": "Structured Lucipedia article payload",
            "strict": true,
            "schema": {
                "type": "object",
                "required": ["html", "backlinks"],
                "additionalProperties": false,
                "properties": {
                    "html": {
                        "type": "string",
                        "description": "HTML for the Lucipedia page."
                    },
                    "backlinks": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Slugs referenced within the article as /wiki/{slug} links."
                    }
                }
            }
        }
    })
}

#[async_trait]
impl Generator for ChatGenerator {
    async fn generate(&self, slug: &str) -> Result<Generation> {
        let slug = slug.trim();
        if slug.is_empty() {
            return Err(Error::InvalidInput("slug is required".into()));
        }

        match self.client.complete(&self.request(slug)).await? {
            ChatReply::Content(content) => self.parse(content),
            ChatReply::Refusal(reason) => {
                warn!(slug, reason = %reason, "generator refused");
                Ok(Generation::Refusal(reason))
            },
            ChatReply::ContentFiltered => {
                warn!(slug, "generator blocked by content filter");
                Ok(Generation::ContentFiltered)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn generator(server: &MockServer, body: serde_json::Value) -> ChatGenerator {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
        let config = LlmConfig {
            endpoint: server.uri(),
            models: vec!["test-model".to_string()],
            ..LlmConfig::default()
        };
        ChatGenerator::new(Arc::new(ChatClient::new(&config).unwrap()), &config)
    }

    fn reply(content: &str) -> serde_json::Value {
        json!({ "choices": [{ "finish_reason": "stop", "message": { "content": content } }] })
    }

    #[tokio::test]
    async fn test_html_mode_returns_raw_content() {
        let server = MockServer::start().await;
        Mock::given(body_string_contains(
            "Write a Lucipedia article for the slug 'ada-lovelace'. Respond with only valid HTML.",
        ))
        .and(body_partial_json(json!({ "temperature": 0.4 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply("```html\n<p>Ada</p>\n```")))
        .expect(1)
        .mount(&server)
        .await;
        let config = LlmConfig {
            endpoint: server.uri(),
            ..LlmConfig::default()
        };
        let generator = ChatGenerator::new(Arc::new(ChatClient::new(&config).unwrap()), &config);

        let generation = generator.generate("  ada-lovelace ").await.unwrap();

        assert_eq!(generation, Generation::content("```html\n<p>Ada</p>\n```"));
    }

    #[tokio::test]
    async fn test_structured_mode_declares_backlinks() {
        let server = MockServer::start().await;
        let payload = json!({
            "html": "<p><a href=\"/wiki/rome\">Rome</a></p>",
            "backlinks": ["rome"]
        })
        .to_string();
        let generator = generator(&server, reply(&payload))
            .await
            .with_mode(ResponseMode::Structured);

        let generation = generator.generate("italy").await.unwrap();

        assert_eq!(
            generation,
            Generation::Content {
                text: "<p><a href=\"/wiki/rome\">Rome</a></p>".to_string(),
                declared_backlinks: vec!["rome".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_structured_mode_requires_html() {
        let server = MockServer::start().await;
        let generator = generator(&server, reply(r#"{"html":"  ","backlinks":[]}"#))
            .await
            .with_mode(ResponseMode::Structured);

        let err = generator.generate("italy").await.unwrap_err();

        assert_eq!(err.to_string(), "Generation error: llm response missing html field");
    }

    #[tokio::test]
    async fn test_empty_content_is_error() {
        let server = MockServer::start().await;
        let generator = generator(&server, reply("   ")).await;

        let err = generator.generate("italy").await.unwrap_err();

        assert_eq!(err.to_string(), "Generation error: llm response content is empty");
    }

    #[tokio::test]
    async fn test_blocks_surface_as_outcomes() {
        let server = MockServer::start().await;
        let generator = generator(
            &server,
            json!({ "choices": [{ "finish_reason": "content_filter", "message": { "content": "" } }] }),
        )
        .await;

        assert_eq!(
            generator.generate("italy").await.unwrap(),
            Generation::ContentFiltered
        );
    }

    #[tokio::test]
    async fn test_blank_slug_is_rejected_without_calling_model() {
        let server = MockServer::start().await;
        let generator = generator(&server, reply("<p>x</p>")).await;

        let err = generator.generate("   ").await.unwrap_err();

        assert!(err.is_client_fault());
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
