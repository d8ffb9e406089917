//! Error types and handling for lucipedia-core operations.
//!
//! Every fallible operation in the crate returns [`Result<T, Error>`]. Errors are
//! grouped into the categories the transport layer needs to pick a status code
//! and a message:
//!
//! - **Input errors**: empty slugs or queries. Client fault, never retried.
//! - **Upstream generation errors**: transport failures, empty responses,
//!   explicit refusals and content-filter blocks. Refusals and blocks stay
//!   distinguishable via [`Error::is_blocked`].
//! - **Pipeline errors**: sanitization and backlink validation. These follow a
//!   nominally successful model call but still fail the generation.
//! - **Store errors**: persistence failures, wrapped with operation context.
//! - **No pages**: the distinguished empty-store condition, see
//!   [`Error::is_no_pages`].
//!
//! ## Context Chains
//!
//! Errors crossing a component boundary are wrapped with the operation name and
//! the identifier being processed, so a single log line carries the full cause:
//!
//! ```rust
//! use lucipedia_core::{Error, OperationContext, Result};
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::Storage("disk full".into()))
//! }
//!
//! let err = lookup().during("retrieving page", "alpha").unwrap_err();
//! assert_eq!(err.to_string(), "retrieving page 'alpha': Storage error: disk full");
//! assert_eq!(err.category(), "storage");
//! ```

use std::fmt;

use thiserror::Error;

/// Why a backlink slug was rejected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklinkFault {
    /// Slug is empty after trimming.
    Empty,
    /// Slug contains a `/`.
    PathSeparator,
    /// Slug contains a space, quote, `#`, `?`, `<`, `>` or backslash.
    DisallowedCharacter,
    /// No `/wiki/{slug}` reference exists in the markup.
    MissingFromMarkup,
}

impl fmt::Display for BacklinkFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Empty => "is empty",
            Self::PathSeparator => "contains invalid path separator",
            Self::DisallowedCharacter => "contains invalid characters",
            Self::MissingFromMarkup => "is missing from markup",
        };
        f.write_str(reason)
    }
}

/// The main error type for lucipedia-core operations.
///
/// `Display` renders the whole context chain; use [`Error::root`] to inspect the
/// innermost cause.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller supplied an empty or malformed slug or query.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The store holds no pages yet.
    ///
    /// Callers special-case this to render first-run guidance instead of a
    /// generic failure.
    #[error("no wiki pages available")]
    NoPages,

    /// The model provider explicitly refused to answer.
    #[error("model refused to generate content: {0}")]
    Refused(String),

    /// The model provider blocked the request through its content filter.
    #[error("model blocked the request via content filter")]
    ContentFiltered,

    /// The model call completed but produced nothing usable.
    ///
    /// Covers empty responses, missing choices and undecodable payloads.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Model output could not be turned into a safe markup fragment.
    #[error("Sanitize error: {0}")]
    Sanitize(String),

    /// A backlink failed syntax or presence validation.
    #[error("backlink slug '{slug}' {fault}")]
    InvalidBacklink {
        /// The offending slug, trimmed.
        slug: String,
        /// Which rule rejected it.
        fault: BacklinkFault,
    },

    /// Persisted data violates an invariant (empty slug or markup).
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Store operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP request to the model provider failed.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Operation exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An inner error annotated with the operation and identifier it belongs to.
    #[error("{operation}{}: {source}", quoted(.subject))]
    Context {
        /// What was being done, e.g. `"generating page"`.
        operation: &'static str,
        /// The slug or query being processed; may be empty.
        subject: String,
        /// The wrapped cause.
        #[source]
        source: Box<Error>,
    },
}

fn quoted(subject: &str) -> String {
    if subject.is_empty() {
        String::new()
    } else {
        format!(" '{subject}'")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Wrap this error with an operation name and the identifier it concerns.
    #[must_use]
    pub fn context(self, operation: &'static str, subject: impl Into<String>) -> Self {
        Self::Context {
            operation,
            subject: subject.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping every [`Error::Context`] layer.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// True when the store was empty.
    #[must_use]
    pub fn is_no_pages(&self) -> bool {
        matches!(self.root(), Self::NoPages)
    }

    /// True for provider refusals and content-filter blocks.
    ///
    /// These are "blocked" rather than "broken" and are messaged differently.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        matches!(self.root(), Self::Refused(_) | Self::ContentFiltered)
    }

    /// True when the caller sent bad input.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        matches!(self.root(), Self::InvalidInput(_))
    }

    /// Check if the error might succeed when retried, for example by another model.
    ///
    /// The pipeline itself never retries; this only informs transport-level
    /// policy and model fallback in the chat client.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self.root() {
            Self::Network(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|status| status.is_server_error())
            },
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category of the root cause as a string identifier.
    ///
    /// Used as a structured logging field and to pick transport status codes.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.root() {
            Self::InvalidInput(_) => "invalid_input",
            Self::NoPages => "no_pages",
            Self::Refused(_) | Self::ContentFiltered => "blocked",
            Self::Generation(_) => "generation",
            Self::Sanitize(_) => "sanitize",
            Self::InvalidBacklink { .. } => "backlink",
            Self::Integrity(_) => "integrity",
            Self::Storage(_) => "storage",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::Context { .. } => "other",
        }
    }
}

/// Extension for attaching operation context to results.
pub trait OperationContext<T> {
    /// Wrap the error, if any, with `operation` and `subject`.
    fn during(self, operation: &'static str, subject: impl Into<String>) -> Result<T>;
}

impl<T> OperationContext<T> for Result<T> {
    fn during(self, operation: &'static str, subject: impl Into<String>) -> Result<T> {
        self.map_err(|err| err.context(operation, subject))
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
