//! Core data types shared by the pipeline, the store and the transport layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted encyclopedia page.
///
/// The slug is the unique key. Stored markup is always non-empty and already
/// sanitized; raw model text is never written.
///
/// ## Serialization
///
/// Uses `camelCase` field names, matching the on-disk page files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// URL-safe identifier, unique per page.
    pub slug: String,
    /// Sanitized markup fragment.
    pub markup: String,
    /// When the slug was first persisted.
    pub created_at: DateTime<Utc>,
    /// When the page was last re-saved.
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Create a page stamped with the current time.
    #[must_use]
    pub fn new(slug: impl Into<String>, markup: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            slug: slug.into(),
            markup: markup.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Override both timestamps.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }
}

/// Output of one generate-sanitize-extract cycle.
///
/// Transient: only `markup` survives, as part of a [`Page`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    /// Sanitized markup fragment.
    pub markup: String,
    /// Referenced slugs, unique, in first-occurrence order.
    pub backlinks: Vec<String>,
}

/// What the model provider returned for a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generation {
    /// Raw model text plus any backlinks the provider declared alongside it.
    Content {
        /// Untrusted model output, possibly fenced or a full document.
        text: String,
        /// Slugs the provider claims the text links to. Validated like
        /// extracted ones.
        declared_backlinks: Vec<String>,
    },
    /// The provider refused, with its stated reason.
    Refusal(String),
    /// The provider's content filter blocked the request.
    ContentFiltered,
}

impl Generation {
    /// Plain content without declared backlinks.
    #[must_use]
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content {
            text: text.into(),
            declared_backlinks: Vec::new(),
        }
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Slug of the suggested page.
    pub slug: String,
}
