//! CLI error handling with semantic exit codes.
//!
//! | Code | Category | Description |
//! |------|----------|-------------|
//! | 0 | Success | Command completed successfully |
//! | 1 | `Internal` | Unexpected/internal error |
//! | 2 | `Usage` | Invalid arguments or configuration |
//! | 3 | `NotFound` | No pages stored yet |
//! | 4 | `InvalidQuery` | Empty slug or query |
//! | 5 | `Network` | Model provider unreachable or failing |
//! | 6 | `Timeout` | Generation exceeded its deadline |
//! | 7 | `Integrity` | Stored data violates an invariant |
//! | 8 | `Blocked` | Model refused or filtered the request |
//!
//! ```bash
//! lucipedia random
//! case $? in
//!     0) echo "ok" ;;
//!     3) echo "no pages yet" ;;
//!     *) echo "other error" ;;
//! esac
//! ```

use std::fmt;

use lucipedia_core::Error as CoreError;

/// Semantic error category determining the exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCategory {
    /// Unexpected or internal error (exit code 1).
    Internal = 1,
    /// Invalid arguments or configuration (exit code 2).
    Usage = 2,
    /// Requested resource not found (exit code 3).
    NotFound = 3,
    /// Empty or malformed slug or query (exit code 4).
    InvalidQuery = 4,
    /// Network or provider failure (exit code 5).
    Network = 5,
    /// Operation timed out (exit code 6).
    Timeout = 6,
    /// Data corruption (exit code 7).
    Integrity = 7,
    /// Provider refusal or content-filter block (exit code 8).
    Blocked = 8,
}

impl ErrorCategory {
    /// Get the exit code for this category.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        self as u8
    }

    /// Get a short description of this error category.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Internal => "internal error",
            Self::Usage => "usage error",
            Self::NotFound => "not found",
            Self::InvalidQuery => "invalid query",
            Self::Network => "network error",
            Self::Timeout => "timeout",
            Self::Integrity => "integrity error",
            Self::Blocked => "blocked",
        }
    }

    /// Map a library error onto an exit category using its root cause.
    #[must_use]
    pub fn from_core(err: &CoreError) -> Self {
        if err.is_no_pages() {
            return Self::NotFound;
        }
        if err.is_client_fault() {
            return Self::InvalidQuery;
        }
        if err.is_blocked() {
            return Self::Blocked;
        }
        match err.category() {
            "network" => Self::Network,
            "timeout" => Self::Timeout,
            "integrity" => Self::Integrity,
            "config" => Self::Usage,
            _ => Self::Internal,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A CLI error with a semantic category for exit code mapping.
#[derive(Debug)]
pub struct CliError {
    /// The semantic category of this error.
    pub category: ErrorCategory,
    /// The underlying error with full context.
    pub source: anyhow::Error,
}

impl CliError {
    /// Create a new CLI error with explicit category.
    pub fn new(category: ErrorCategory, source: impl Into<anyhow::Error>) -> Self {
        Self {
            category,
            source: source.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(source: impl Into<anyhow::Error>) -> Self {
        Self::new(ErrorCategory::Usage, source)
    }

    /// Get the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.category.exit_code()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Determine the exit code from an `anyhow::Error`.
///
/// Explicit [`CliError`]s win; otherwise the first library error in the chain
/// decides, and anything else is internal.
#[must_use]
pub fn exit_code_from_error(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }

    err.chain()
        .find_map(|cause| cause.downcast_ref::<CoreError>())
        .map_or(ErrorCategory::Internal, ErrorCategory::from_core)
        .exit_code()
}

/// Actionable follow-up for errors a user can fix themselves.
#[must_use]
pub fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    let core = err.chain().find_map(|cause| cause.downcast_ref::<CoreError>())?;
    if core.is_no_pages() {
        Some("No pages yet. Run `lucipedia get <slug>` to generate the first article.")
    } else if core.category() == "config" {
        Some("Check the configuration file or the LLM_* environment variables.")
    } else {
        None
    }
}
