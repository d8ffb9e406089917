//! lucipedia CLI - an encyclopedia written on demand by a language model

use std::process::ExitCode;

use clap::Parser;
use lucipedia_cli::cli::Cli;
use lucipedia_cli::error::{exit_code_from_error, hint_for};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match lucipedia_cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            if let Some(hint) = hint_for(&err) {
                eprintln!("{hint}");
            }
            ExitCode::from(exit_code_from_error(&err))
        },
    }
}
