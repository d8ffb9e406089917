//! # CLI Structure and Argument Parsing
//!
//! `lucipedia` exposes the page orchestrator as subcommands and runs the HTTP
//! site through `serve`.
//!
//! ```bash
//! # Fetch (or generate on first visit) a page
//! lucipedia get history-of-rome
//!
//! # Ask the model for matching slugs
//! lucipedia search "punic wars" --limit 5 --format json
//!
//! # Serve the site
//! lucipedia serve --bind 127.0.0.1:8080
//! ```
//!
//! Global flags (`--verbose`, `--quiet`, `--config`) apply to every command.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::utils::OutputFormat;

/// Main CLI structure for the `lucipedia` command
#[derive(Parser, Clone, Debug)]
#[command(name = "lucipedia")]
#[command(version)]
#[command(about = "Lucipedia - an encyclopedia written on demand by a language model", long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the configuration file
    #[arg(long, global = true, env = "LUCIPEDIA_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Print the markup for a page, generating it on first request
    Get {
        /// Page slug, e.g. `history-of-rome`
        slug: String,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the slug of a random stored page
    Random {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the most recently created page
    Recent {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Ask the model for slugs relevant to a query
    Search {
        /// Free-text query
        query: String,

        /// Maximum number of slugs to return
        #[arg(short = 'l', long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
        limit: u16,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored pages ordered by slug
    List {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show page store statistics
    Stats {
        /// Output format
        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the HTTP site
    Serve {
        /// Address to listen on (host:port); overrides configuration
        #[arg(short = 'b', long)]
        bind: Option<String>,
    },
}

impl Cli {
    /// Output format requested by the selected command, if it has one.
    #[must_use]
    pub const fn format(&self) -> Option<OutputFormat> {
        match &self.command {
            Commands::Get { format, .. }
            | Commands::Random { format }
            | Commands::Recent { format }
            | Commands::Search { format, .. }
            | Commands::List { format }
            | Commands::Stats { format } => Some(*format),
            Commands::Serve { .. } => None,
        }
    }
}
