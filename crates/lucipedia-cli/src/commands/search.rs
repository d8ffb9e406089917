//! Slug suggestions for a free-text query

use anyhow::Result;
use lucipedia_core::WikiService;
use tracing::info;

use super::print_json;
use crate::utils::OutputFormat;

/// Print up to `limit` slugs suggested for `query`, one per line.
pub async fn execute(
    service: &WikiService,
    query: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let results = service.search(query, limit).await?;
    info!(query = query.trim(), hits = results.len(), "search completed");

    match format {
        OutputFormat::Text => {
            for result in &results {
                println!("{}", result.slug);
            }
        },
        OutputFormat::Json => print_json(&results)?,
    }
    Ok(())
}
