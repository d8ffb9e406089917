use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::Searcher;
use super::client::{ChatClient, ChatMessage, ChatReply, ChatRequest};
use crate::config::LlmConfig;
use crate::{Error, Result};

/// Built-in search system prompt.
pub const DEFAULT_SEARCH_PROMPT: &str = "You write url slugs for a Wikipedia-like encyclopedia called Lucipedia. \
You are an expert at finding relevant pages for user queries. \
Given a user query, respond with the requested number of relevant slugs, separated by commas. \
Slugs must be lowercase, words separated by hyphens, and must not include any additional explanation. \
Example response: history-of-rome, world-war-ii, albert-einstein";

/// [`Searcher`] that asks a chat model for a comma separated slug list.
#[derive(Debug, Clone)]
pub struct ChatSearcher {
    client: Arc<ChatClient>,
    temperature: f32,
}

impl ChatSearcher {
    /// Create a searcher using the configured temperature.
    #[must_use]
    pub fn new(client: Arc<ChatClient>, config: &LlmConfig) -> Self {
        let temperature = if config.search_temperature > 0.0 {
            config.search_temperature
        } else {
            0.2
        };
        Self {
            client,
            temperature,
        }
    }
}

#[async_trait]
impl Searcher for ChatSearcher {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidInput("query is required".into()));
        }
        if limit == 0 {
            return Err(Error::InvalidInput("number of results must be positive".into()));
        }

        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(DEFAULT_SEARCH_PROMPT),
                ChatMessage::user(format!(
                    "Query: {query}\nReturn {limit} relevant url slugs separated by commas."
                )),
            ],
            temperature: self.temperature,
            response_format: None,
        };

        let content = match self.client.complete(&request).await? {
            ChatReply::Content(content) => content,
            ChatReply::Refusal(reason) => {
                warn!(query, reason = %reason, "search refused");
                return Err(Error::Refused(reason));
            },
            ChatReply::ContentFiltered => {
                warn!(query, "search blocked by content filter");
                return Err(Error::ContentFiltered);
            },
        };
        if content.is_empty() {
            return Err(Error::Generation("llm search response is empty".into()));
        }

        let raw = split_list(&content);
        if raw.is_empty() {
            return Err(Error::Generation("llm search returned no slugs".into()));
        }

        let slugs: Vec<String> = raw
            .iter()
            .map(|slug| normalize_slug(slug))
            .filter(|slug| !slug.is_empty())
            .collect();
        if slugs.is_empty() {
            return Err(Error::Generation("llm search returned no valid slugs".into()));
        }
        Ok(slugs)
    }
}

/// Split a model answer on commas, semicolons and newlines.
///
/// A surrounding fenced block is tolerated, closed or not.
pub(crate) fn split_list(content: &str) -> Vec<&str> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // The opening line is the fence plus an optional info string.
        text = rest.split_once('\n').map_or(rest, |(_, body)| body).trim();
        if let Some(rest) = text.strip_suffix("```") {
            text = rest.trim();
        }
    }

    text.split([',', ';', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Coerce a suggested slug into canonical form: lowercase, hyphen separated,
/// without quotes or trailing punctuation. Returns an empty string when nothing
/// is left.
#[must_use]
pub fn normalize_slug(slug: &str) -> String {
    let trimmed = slug.trim().trim_matches(['"', '\'']);
    if trimmed.is_empty() {
        return String::new();
    }

    let lowered = trimmed.to_lowercase().replace('_', "-");
    let mut joined = lowered
        .split([' ', '\n', '\t'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    joined = joined.trim_matches('-').to_string();
    while joined.contains("--") {
        joined = joined.replace("--", "-");
    }
    joined
        .trim_matches(['-', '.', ',', ';', ':', '!', '?'])
        .to_string()
}
