//! Command-line interface and HTTP site for Lucipedia.
//!
//! The binary is a thin shell around [`run`]; everything it does is reachable
//! from here so the router and commands can be exercised in tests.

pub mod cli;
pub mod commands;
pub mod error;
pub mod server;
pub mod utils;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::utils::logging::initialize_logging;
use crate::utils::service::{build_service, load_config, open_store};

/// Load configuration, install logging and dispatch the selected command.
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    initialize_logging(&cli, &config.logging.level)?;

    let store = open_store(&config);
    let service = build_service(&config, store)?;

    match cli.command {
        Commands::Get { slug, format } => commands::get_page(&service, &slug, format).await,
        Commands::Random { format } => commands::random_page(&service, format).await,
        Commands::Recent { format } => commands::most_recent_page(&service, format).await,
        Commands::Search {
            query,
            limit,
            format,
        } => commands::search(&service, &query, usize::from(limit), format).await,
        Commands::List { format } => commands::list_pages(&service, format).await,
        Commands::Stats { format } => {
            let data_dir = config.paths.data_dir.display().to_string();
            commands::show_stats(&service, &data_dir, format).await
        },
        Commands::Serve { bind } => commands::serve(&config, service, bind.as_deref()).await,
    }
}
