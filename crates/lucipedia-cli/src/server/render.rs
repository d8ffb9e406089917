//! HTML views for the site.
//!
//! Stored page markup is already sanitized and is embedded verbatim; every
//! other interpolated value is escaped here.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};
use url::Url;

/// Shown wherever an empty store would otherwise look like a failure.
pub const NO_PAGES_MESSAGE: &str =
    "Lucipedia doesn't have any pages yet. Follow a link to generate the first article.";

/// The one message every other failure collapses to.
pub const GENERIC_ERROR_MESSAGE: &str = "We couldn't process your request right now.";

/// Body of a rate-limited response.
pub const RATE_LIMIT_MESSAGE: &str =
    "You're exploring Lucipedia a bit too quickly. Please wait a moment and try again.";

const FOOTER_NOTE: &str = "Lucipedia pages are generated on demand. Internal links create new articles the first time they are visited.";

const STYLE: &str = "body{font-family:Georgia,serif;max-width:52rem;margin:0 auto;padding:0 1rem;color:#202122}\
header{display:flex;gap:1rem;align-items:center;border-bottom:1px solid #a2a9b1;padding:.5rem 0}\
header a{color:#3366cc;text-decoration:none}\
main{padding:1rem 0}\
footer{border-top:1px solid #a2a9b1;font-size:.85rem;color:#54595d;padding:.5rem 0}\
.notice{background:#f8f9fa;border:1px solid #c8ccd1;padding:1rem}";

/// Site-relative path of a page, with the slug percent-encoded as one
/// path segment.
#[must_use]
pub fn wiki_path(slug: &str) -> String {
    Url::parse("http://lucipedia.invalid/wiki/")
        .ok()
        .and_then(|mut url| {
            url.path_segments_mut().ok()?.pop_if_empty().push(slug);
            Some(url.path().to_string())
        })
        .unwrap_or_else(|| format!("/wiki/{slug}"))
}

/// Page title for a slug: `"{slug} • Lucipedia"`, or just the site name.
#[must_use]
pub fn title_for(slug: &str) -> String {
    let slug = slug.trim();
    if slug.is_empty() {
        "Lucipedia".to_string()
    } else {
        format!("{slug} • Lucipedia")
    }
}

/// Wrap `body` in the site chrome.
#[must_use]
pub fn layout(title: &str, query: &str, page_count: Option<usize>, body: &str) -> String {
    let mut html = String::with_capacity(body.len() + 2048);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
<header><a href=\"/\"><strong>Lucipedia</strong></a>\
<a href=\"/random\">Random page</a>\
<a href=\"/most-recent\">Most recent</a>\
<a href=\"/all\">All pages</a>\
<form action=\"/search\" method=\"get\"><input type=\"search\" name=\"q\" value=\"{query}\" placeholder=\"Search Lucipedia\"></form>\
</header>\n<main>\n{body}\n</main>\n<footer>",
        title = encode_text(title),
        query = encode_double_quoted_attribute(query),
    );
    if let Some(count) = page_count {
        let noun = if count == 1 { "page" } else { "pages" };
        let _ = write!(html, "<p>Lucipedia has {count} {noun}.</p>");
    }
    let _ = write!(html, "<p>{FOOTER_NOTE}</p></footer>\n</body>\n</html>\n");
    html
}

/// A stored page.
#[must_use]
pub fn wiki_page(slug: &str, markup: &str, page_count: Option<usize>) -> String {
    layout(
        &title_for(slug),
        "",
        page_count,
        &format!("<article>{markup}</article>"),
    )
}

/// A status page carrying a single message.
#[must_use]
pub fn message_page(status_label: &str, message: &str, page_count: Option<usize>) -> String {
    let body = format!(
        "<section class=\"notice\"><h1>{}</h1><p>{}</p></section>",
        encode_text(status_label),
        encode_text(message),
    );
    layout(&format!("{status_label} • Lucipedia"), "", page_count, &body)
}

/// First-run landing page.
#[must_use]
pub fn empty_home(page_count: Option<usize>) -> String {
    let body = format!(
        "<section class=\"notice\"><h1>Welcome to Lucipedia</h1><p>{}</p>\
<p>Try <a href=\"/wiki/lucipedia\">/wiki/lucipedia</a> or search for any topic.</p></section>",
        encode_text(NO_PAGES_MESSAGE),
    );
    layout("Lucipedia", "", page_count, &body)
}

/// Search form with optional results and an optional inline error.
#[must_use]
pub fn search_page(
    query: &str,
    results: &[String],
    error: Option<&str>,
    page_count: Option<usize>,
) -> String {
    let mut body = String::from("<h1>Search</h1>");
    if let Some(error) = error {
        let _ = write!(body, "<p class=\"notice\">{}</p>", encode_text(error));
    } else if !query.is_empty() {
        if results.is_empty() {
            let _ = write!(body, "<p>No suggestions for &quot;{}&quot;.</p>", encode_text(query));
        } else {
            body.push_str("<ul>");
            for slug in results {
                let _ = write!(
                    body,
                    "<li><a href=\"{}\">{}</a></li>",
                    encode_double_quoted_attribute(&wiki_path(slug)),
                    encode_text(slug),
                );
            }
            body.push_str("</ul>");
        }
    }
    layout("Search • Lucipedia", query, page_count, &body)
}

/// Every stored slug, linked.
#[must_use]
pub fn all_pages(slugs: &[String], page_count: Option<usize>) -> String {
    let mut body = String::from("<h1>All pages</h1>");
    if slugs.is_empty() {
        let _ = write!(body, "<p>{}</p>", encode_text(NO_PAGES_MESSAGE));
    } else {
        body.push_str("<ul>");
        for slug in slugs {
            let _ = write!(
                body,
                "<li><a href=\"{}\">{}</a></li>",
                encode_double_quoted_attribute(&wiki_path(slug)),
                encode_text(slug),
            );
        }
        body.push_str("</ul>");
    }
    layout("All pages • Lucipedia", "", page_count, &body)
}
