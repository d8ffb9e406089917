//! # lucipedia-core
//!
//! Core functionality for Lucipedia, an encyclopedia whose pages are written
//! on demand by a language model and cached by slug.
//!
//! ## Architecture
//!
//! - **Markup pipeline**: [`sanitizer`] turns untrusted model output into one
//!   embeddable fragment; [`backlinks`] finds and validates the `/wiki/<slug>`
//!   links inside it
//! - **Orchestration**: [`WikiService`] serves cached pages and runs the
//!   generate-validate-persist flow on a miss
//! - **Admission control**: [`RateLimiter`] is a per-client token bucket for
//!   the transport layer
//! - **Capabilities**: [`store::PageStore`], [`llm::Generator`] and
//!   [`llm::Searcher`] are the seams to persistence and the model provider
//! - **Error Handling**: one [`Error`] type with categories and context chains
//!
//! ## Quick Start
//!
//! ```rust
//! use lucipedia_core::{backlinks, sanitizer};
//!
//! let raw = "```html\n<html><body><p>See <a href=\"/wiki/rome\">Rome</a>.</p></body></html>\n```";
//! let markup = sanitizer::sanitize(raw)?;
//! let links = backlinks::extract(&markup);
//! backlinks::validate(&markup, &links)?;
//!
//! assert_eq!(markup, "<div><p>See <a href=\"/wiki/rome\">Rome</a>.</p></div>");
//! assert_eq!(links, vec!["rome"]);
//! # Ok::<(), lucipedia_core::Error>(())
//! ```
//!
//! ## Thread Safety
//!
//! [`WikiService`] and [`RateLimiter`] are `Send + Sync` and meant to be shared
//! behind an `Arc` across request handlers.

/// Internal link extraction and validation
pub mod backlinks;
/// Configuration loading with environment overrides
pub mod config;
/// Error types and result aliases
pub mod error;
/// Chat-completion backed generation and search
pub mod llm;
/// Get-or-generate page orchestration
pub mod orchestrator;
/// Per-client token-bucket admission control
pub mod rate_limit;
/// Model output normalization
pub mod sanitizer;
/// Page persistence
pub mod store;
/// Core data types
pub mod types;

// Re-export commonly used types
pub use config::{
    Config, LlmConfig, LoggingConfig, PathsConfig, RateLimitConfig, ServerConfig,
};
pub use error::{BacklinkFault, Error, OperationContext, Result};
pub use orchestrator::WikiService;
pub use rate_limit::{RateLimitSettings, RateLimiter};
pub use store::{FilePageStore, MemoryPageStore, PageStore};
pub use types::*;
