//! Page store statistics command implementation

use anyhow::Result;
use chrono::{DateTime, Utc};
use lucipedia_core::WikiService;
use serde::Serialize;

use super::print_json;
use crate::utils::OutputFormat;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StoreStats {
    total_pages: usize,
    total_markup_bytes: usize,
    data_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    newest_page: Option<PageStamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    oldest_page: Option<PageStamp>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageStamp {
    slug: String,
    created_at: DateTime<Utc>,
}

/// Execute the stats command
pub async fn execute(service: &WikiService, data_dir: &str, format: OutputFormat) -> Result<()> {
    let pages = service.list_pages().await?;

    let stamp = |page: &lucipedia_core::Page| PageStamp {
        slug: page.slug.clone(),
        created_at: page.created_at,
    };
    let stats = StoreStats {
        total_pages: pages.len(),
        total_markup_bytes: pages.iter().map(|page| page.markup.len()).sum(),
        data_dir: data_dir.to_string(),
        newest_page: pages
            .iter()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.slug.cmp(&b.slug)))
            .map(stamp),
        oldest_page: pages
            .iter()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.slug.cmp(&b.slug)))
            .map(stamp),
    };

    match format {
        OutputFormat::Text => {
            println!("Lucipedia page store");
            println!("  Location: {}", stats.data_dir);
            println!("  Pages:    {}", stats.total_pages);
            println!("  Markup:   {} bytes", stats.total_markup_bytes);
            if let Some(newest) = &stats.newest_page {
                println!("  Newest:   {} ({})", newest.slug, newest.created_at.to_rfc3339());
            }
            if let Some(oldest) = &stats.oldest_page {
                println!("  Oldest:   {} ({})", oldest.slug, oldest.created_at.to_rfc3339());
            }
        },
        OutputFormat::Json => print_json(&stats)?,
    }
    Ok(())
}
