//! Normalizes raw model text into one embeddable markup fragment.
//!
//! Model output arrives in many shapes: a bare fragment, a full document with
//! doctype, head and body, or either of those wrapped in a fenced code block.
//! [`sanitize`] turns all of them into a single `<div>` rooted fragment:
//!
//! 1. A fenced block is unwrapped only when both the opening and a matching
//!    closing fence line are present. A lone opening fence is left alone so that
//!    literal backticks inside real content survive.
//! 2. The text is parsed with an HTML5 parser.
//! 3. The parsed document is rewritten into an owned tree: `head` is dropped,
//!    `html`/`body` are unwrapped, comments and doctypes are dropped, `header`
//!    becomes a plain `div`, everything else passes through. Whitespace-only text
//!    directly under a document boundary is dropped; whitespace between inline
//!    elements is kept.
//! 4. The result is wrapped in a `div`, unless it already is exactly one `div`.
//!
//! ```rust
//! use lucipedia_core::sanitizer::sanitize;
//!
//! let markup = sanitize("```html\n<html><body><p>Hi</p></body></html>\n```")?;
//! assert_eq!(markup, "<div><p>Hi</p></div>");
//! # Ok::<(), lucipedia_core::Error>(())
//! ```

use std::fmt::Write;

use ego_tree::NodeRef;
use scraper::Html;

use crate::{Error, Result};

const FENCE: &str = "```";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta",
    "param", "source", "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
    "script",
    "style",
    "xmp",
];

/// Node of the rewritten tree. Each sanitization call owns exactly one root.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn container(children: Vec<Node>) -> Self {
        Self {
            name: "div".to_string(),
            attrs: Vec::new(),
            children,
        }
    }
}

/// Turn raw model output into a single sanitized fragment.
///
/// # Errors
///
/// Returns [`Error::Sanitize`] when nothing usable remains after rewriting,
/// for example when the input is empty, whitespace, or only comments.
pub fn sanitize(raw: &str) -> Result<String> {
    let content = strip_code_fence(raw.trim());
    if content.is_empty() {
        return Err(Error::Sanitize("markup content is empty".into()));
    }

    let document = Html::parse_document(content);

    let mut children = Vec::new();
    append_sanitized_children(&mut children, document.tree.root());
    if children.is_empty() {
        return Err(Error::Sanitize("markup content empty after cleaning".into()));
    }

    let root = match single_div_child(children) {
        Ok(div) => div,
        Err(children) => Element::container(children),
    };

    let mut out = String::with_capacity(content.len());
    render_element(&mut out, &root);
    Ok(out)
}

/// Remove a surrounding fenced block, if and only if it is properly closed.
///
/// The opening fence may carry an info string (`` ```html ``) and must be
/// followed by a newline; the closing fence must sit on its own line.
pub(crate) fn strip_code_fence(content: &str) -> &str {
    let Some(after_open) = content.strip_prefix(FENCE) else {
        return content;
    };
    let Some(newline) = after_open.find('\n') else {
        return content;
    };
    let body = after_open[newline + 1..].trim_end();
    let Some(inner) = body.strip_suffix(FENCE) else {
        return content;
    };
    if !(inner.is_empty() || inner.ends_with('\n')) {
        return content;
    }
    inner.trim()
}

fn append_sanitized_children(dst: &mut Vec<Node>, src: NodeRef<'_, scraper::Node>) {
    let skip_whitespace = match src.value() {
        scraper::Node::Document | scraper::Node::Fragment => true,
        scraper::Node::Element(el) => {
            el.name().eq_ignore_ascii_case("html") || el.name().eq_ignore_ascii_case("body")
        },
        _ => false,
    };

    for child in src.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                let content: &str = text;
                if skip_whitespace && content.trim().is_empty() {
                    continue;
                }
                dst.push(Node::Text(content.to_string()));
            },
            scraper::Node::Element(el) => {
                let name = el.name().to_ascii_lowercase();
                match name.as_str() {
                    "head" => continue,
                    "html" | "body" => {
                        append_sanitized_children(dst, child);
                        continue;
                    },
                    _ => {},
                }

                let name = if name == "header" {
                    "div".to_string()
                } else {
                    el.name().to_string()
                };
                // Foreign-content attributes such as `xlink:href` keep their prefix.
                let mut attrs: Vec<(String, String)> = el
                    .attrs
                    .iter()
                    .map(|(key, value)| {
                        let key = key.prefix.as_ref().map_or_else(
                            || key.local.to_string(),
                            |prefix| format!("{prefix}:{}", key.local),
                        );
                        (key, value.to_string())
                    })
                    .collect();
                // Parser attribute order is not guaranteed; keep output stable.
                attrs.sort_by(|a, b| a.0.cmp(&b.0));

                let mut replacement = Element {
                    name,
                    attrs,
                    children: Vec::new(),
                };
                append_sanitized_children(&mut replacement.children, child);
                dst.push(Node::Element(replacement));
            },
            scraper::Node::Comment(_)
            | scraper::Node::Doctype(_)
            | scraper::Node::ProcessingInstruction(_) => {},
            scraper::Node::Document | scraper::Node::Fragment => {
                append_sanitized_children(dst, child);
            },
        }
    }
}

/// Returns the lone `div` child, or hands the children back untouched.
fn single_div_child(mut children: Vec<Node>) -> std::result::Result<Element, Vec<Node>> {
    let is_single_div = children.len() == 1
        && matches!(&children[0], Node::Element(el) if el.name.eq_ignore_ascii_case("div"));
    if !is_single_div {
        return Err(children);
    }
    match children.pop() {
        Some(Node::Element(div)) => Ok(div),
        Some(other) => Err(vec![other]),
        None => Err(Vec::new()),
    }
}

fn render_node(out: &mut String, node: &Node, raw_text: bool) {
    match node {
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => out.push_str(&html_escape::encode_text(text)),
        Node::Element(el) => render_element(out, el),
    }
}

fn render_element(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);
    for (key, value) in &el.attrs {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            " {key}=\"{}\"",
            html_escape::encode_double_quoted_attribute(value)
        );
    }
    out.push('>');

    let name = el.name.to_ascii_lowercase();
    if VOID_ELEMENTS.contains(&name.as_str()) {
        return;
    }

    // The parser swallows one newline directly after these start tags.
    if matches!(name.as_str(), "pre" | "textarea" | "listing")
        && matches!(el.children.first(), Some(Node::Text(text)) if text.starts_with('\n'))
    {
        out.push('\n');
    }

    let raw_text = RAW_TEXT_ELEMENTS.contains(&name.as_str());
    for child in &el.children {
        render_node(out, child, raw_text);
    }

    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_document_is_converted_to_div() {
        let input = r#"<html><body><header class="hero"><h1>Title</h1></header><main><p>Body</p></main></body></html>"#;

        let cleaned = sanitize(input).unwrap();

        assert_eq!(
            cleaned,
            r#"<div><div class="hero"><h1>Title</h1></div><main><p>Body</p></main></div>"#
        );
    }

    #[test]
    fn test_inline_whitespace_is_preserved() {
        let cleaned = sanitize("<body><p><span>Alpha</span> <span>Beta</span></p></body>").unwrap();

        assert_eq!(cleaned, "<div><p><span>Alpha</span> <span>Beta</span></p></div>");
    }

    #[test]
    fn test_single_top_level_div_is_not_double_wrapped() {
        let input = "<div>\n<p>Example about <a href=\"/wiki/alpha\">Alpha</a>.</p>\n</div>";

        let cleaned = sanitize(input).unwrap();

        assert_eq!(cleaned, input);
    }

    #[test]
    fn test_head_doctype_and_comments_are_dropped() {
        let input = "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n<title>Paris</title>\n</head>\n<body>\n<!-- generated -->\n<h1>Paris</h1>\n</body>\n</html>";

        let cleaned = sanitize(input).unwrap();

        assert_eq!(cleaned, "<div><h1>Paris</h1></div>");
    }

    #[test]
    fn test_fenced_document_is_unwrapped() {
        let input = "```html\n<!DOCTYPE html>\n<html>\n<body>\n    <h1>Paris</h1>\n    <p>The <a href=\"/wiki/Paris\">City of Light</a>.</p>\n</body>\n</html>\n```";

        let cleaned = sanitize(input).unwrap();

        assert!(!cleaned.contains(FENCE));
        assert!(cleaned.starts_with("<div>"));
        assert!(cleaned.contains("<h1>Paris</h1>"));
    }

    #[test]
    fn test_unclosed_fence_is_left_untouched() {
        assert_eq!(strip_code_fence("```html\n<p>x</p>"), "```html\n<p>x</p>");
        assert_eq!(strip_code_fence("```<p>x</p>```"), "```<p>x</p>```");
        assert_eq!(strip_code_fence("```\n<p>x</p>```"), "```\n<p>x</p>```");
        assert_eq!(strip_code_fence("```\n<p>x</p>\n```"), "<p>x</p>");
    }

    #[test]
    fn test_unclosed_fence_text_survives_sanitization() {
        let cleaned = sanitize("```html\n<p>x</p>").unwrap();

        assert!(cleaned.contains(FENCE));
        assert!(cleaned.contains("<p>x</p>"));
    }

    #[test]
    fn test_empty_inputs_fail() {
        assert!(matches!(sanitize(""), Err(Error::Sanitize(_))));
        assert!(matches!(sanitize("   \n\t"), Err(Error::Sanitize(_))));
        assert!(matches!(sanitize("<!-- nothing here -->"), Err(Error::Sanitize(_))));
        assert!(matches!(sanitize("```\n```"), Err(Error::Sanitize(_))));
    }

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let cleaned = sanitize(r#"<p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p>"#).unwrap();

        assert_eq!(
            cleaned,
            r#"<div><p title="a &quot;b&quot;">1 &lt; 2 &amp; 3</p></div>"#
        );
    }

    #[test]
    fn test_namespaced_attributes_keep_their_prefix() {
        let cleaned = sanitize(
            r##"<svg xmlns:xlink="http://www.w3.org/1999/xlink"><use xlink:href="#icon"></use></svg>"##,
        )
        .unwrap();

        assert!(cleaned.contains(r##"<use xlink:href="#icon"></use>"##), "{cleaned}");
        assert!(cleaned.contains(r#"xmlns:xlink="http://www.w3.org/1999/xlink""#), "{cleaned}");
    }

    #[test]
    fn test_void_elements_have_no_closing_tag() {
        let cleaned = sanitize("<p>line<br>next</p><hr>").unwrap();

        assert_eq!(cleaned, "<div><p>line<br>next</p><hr></div>");
    }

    #[test]
    fn test_plain_text_is_wrapped() {
        assert_eq!(sanitize("just words").unwrap(), "<div>just words</div>");
    }

    #[test]
    fn test_sanitize_is_idempotent_on_typical_output() {
        let once = sanitize("<h1>Rome</h1>\n<p>See <a href=\"/wiki/italy\">Italy</a>.</p>").unwrap();
        let twice = sanitize(&once).unwrap();

        assert_eq!(once, twice);
    }

    proptest! {
        #[test]
        fn prop_fence_wrapping_does_not_change_output(
            words in prop::collection::vec("[a-zA-Z0-9]{1,8}", 1..6),
            info in "(|html|HTML)",
        ) {
            let body = format!("<p>{}</p>\n<p><a href=\"/wiki/{}\">x</a></p>", words.join(" "), words[0]);
            let fenced = format!("```{info}\n{body}\n```");

            prop_assert_eq!(sanitize(&fenced).unwrap(), sanitize(&body).unwrap());
        }
    }
}
