//! Model-provider capabilities used by the page pipeline.
//!
//! The orchestrator depends only on the [`Generator`] and [`Searcher`] traits.
//! [`ChatGenerator`] and [`ChatSearcher`] implement them on top of a shared
//! [`ChatClient`] speaking the OpenAI-compatible chat completion protocol.

use async_trait::async_trait;

use crate::Result;
use crate::types::Generation;

mod client;
mod generator;
mod searcher;

pub use client::{ChatClient, ChatMessage, ChatReply, ChatRequest};
pub use generator::{ChatGenerator, DEFAULT_ARTICLE_PROMPT, ResponseMode};
pub use searcher::{ChatSearcher, DEFAULT_SEARCH_PROMPT, normalize_slug};

/// Produces raw article text for a slug.
///
/// Refusals and content-filter blocks are returned as [`Generation`] variants
/// rather than errors, so callers can tell "blocked" from "broken".
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate untrusted article text for `slug`.
    async fn generate(&self, slug: &str) -> Result<Generation>;
}

/// Suggests ranked page slugs for a free-text query.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Return up to roughly `limit` slugs, best first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}
