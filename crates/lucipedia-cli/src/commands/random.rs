use anyhow::Result;
use lucipedia_core::{SearchResult, WikiService};

use super::print_json;
use crate::utils::OutputFormat;

/// Print the slug of a uniformly chosen stored page.
pub async fn execute(service: &WikiService, format: OutputFormat) -> Result<()> {
    let slug = service.random_slug().await?;

    match format {
        OutputFormat::Text => println!("{slug}"),
        OutputFormat::Json => print_json(&SearchResult { slug })?,
    }
    Ok(())
}
