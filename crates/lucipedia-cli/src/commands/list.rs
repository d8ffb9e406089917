use anyhow::Result;
use chrono::{DateTime, Utc};
use lucipedia_core::WikiService;
use serde::Serialize;

use super::print_json;
use crate::utils::OutputFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageSummary<'a> {
    slug: &'a str,
    url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Print every stored page ordered by slug.
///
/// JSON output omits markup; use `get` for the content.
pub async fn execute(service: &WikiService, format: OutputFormat) -> Result<()> {
    let pages = service.list_pages().await?;

    match format {
        OutputFormat::Text => {
            if pages.is_empty() {
                println!("No pages yet. Run `lucipedia get <slug>` to generate the first one.");
            }
            for page in &pages {
                println!("{:<40} {}", page.slug, page.created_at.format("%Y-%m-%d %H:%M:%S"));
            }
        },
        OutputFormat::Json => {
            let summaries: Vec<PageSummary<'_>> = pages
                .iter()
                .map(|page| PageSummary {
                    slug: &page.slug,
                    url: format!("/wiki/{}", page.slug),
                    created_at: page.created_at,
                    updated_at: page.updated_at,
                })
                .collect();
            print_json(&summaries)?;
        },
    }
    Ok(())
}
