//! Command implementations.
//!
//! Each command writes its result to stdout in the requested
//! [`OutputFormat`](crate::utils::OutputFormat); diagnostics go to stderr via
//! `tracing`.

mod get;
mod list;
mod random;
mod recent;
mod search;
mod serve;
mod stats;

pub use get::execute as get_page;
pub use list::execute as list_pages;
pub use random::execute as random_page;
pub use recent::execute as most_recent_page;
pub use search::execute as search;
pub use serve::execute as serve;
pub use stats::execute as show_stats;

use anyhow::Result;
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
