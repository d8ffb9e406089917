//! Fetch or generate a single page

use anyhow::Result;
use lucipedia_core::WikiService;
use serde::Serialize;

use super::print_json;
use crate::utils::OutputFormat;

#[derive(Serialize)]
struct PageOutput<'a> {
    slug: &'a str,
    markup: &'a str,
}

/// Print the markup for `slug`, generating it on a miss.
pub async fn execute(service: &WikiService, slug: &str, format: OutputFormat) -> Result<()> {
    let markup = service.get_page(slug).await?;

    match format {
        OutputFormat::Text => println!("{markup}"),
        OutputFormat::Json => print_json(&PageOutput {
            slug: slug.trim(),
            markup: &markup,
        })?,
    }
    Ok(())
}
