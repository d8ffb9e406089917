//! Logging initialization.
//!
//! Logs always go to stderr so command output on stdout stays pipeable.

use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

/// Pick the filter directive for this invocation.
///
/// `--verbose` and `--quiet` win over the configured level. Machine-readable
/// output drops to errors only unless `--verbose` was given.
#[must_use]
pub fn filter_directive(cli: &Cli, configured: &str) -> String {
    if cli.verbose {
        return "debug".to_string();
    }
    if cli.quiet || cli.format().is_some_and(|format| format.is_machine()) {
        return "error".to_string();
    }
    let configured = configured.trim();
    if configured.is_empty() {
        "info".to_string()
    } else {
        configured.to_string()
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the computed directive when set.
///
/// # Errors
///
/// Returns an error if the directive is invalid or a global subscriber is
/// already installed.
pub fn initialize_logging(cli: &Cli, configured: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directive(cli, configured))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_configured_level_by_default() {
        let cli = parse(&["lucipedia", "serve"]);

        assert_eq!(filter_directive(&cli, "lucipedia_core=debug"), "lucipedia_core=debug");
        assert_eq!(filter_directive(&cli, "  "), "info");
    }

    #[test]
    fn test_flags_override_configuration() {
        assert_eq!(filter_directive(&parse(&["lucipedia", "-v", "list"]), "warn"), "debug");
        assert_eq!(filter_directive(&parse(&["lucipedia", "-q", "list"]), "debug"), "error");
    }

    #[test]
    fn test_json_output_silences_info_logs() {
        let cli = parse(&["lucipedia", "list", "--format", "json"]);

        assert_eq!(filter_directive(&cli, "info"), "error");
    }
}
