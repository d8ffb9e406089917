use anyhow::Result;
use lucipedia_core::WikiService;

use super::print_json;
use crate::utils::OutputFormat;

/// Print the most recently created page.
///
/// Text output is a `slug  created_at` header line, a blank line and the markup.
pub async fn execute(service: &WikiService, format: OutputFormat) -> Result<()> {
    let page = service.most_recent_page().await?;

    match format {
        OutputFormat::Text => {
            println!("{}  {}", page.slug, page.created_at.to_rfc3339());
            println!();
            println!("{}", page.markup);
        },
        OutputFormat::Json => print_json(&page)?,
    }
    Ok(())
}
