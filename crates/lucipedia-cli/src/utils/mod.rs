//! Shared helpers for commands and the HTTP server.

pub mod logging;
pub mod service;

/// Output format for command results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text (default)
    Text,
    /// Single JSON document
    Json,
}

impl OutputFormat {
    /// True for machine-readable formats.
    #[must_use]
    pub const fn is_machine(self) -> bool {
        matches!(self, Self::Json)
    }
}
