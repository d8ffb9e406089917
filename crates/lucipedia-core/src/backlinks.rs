//! Discovery and validation of internal `/wiki/<slug>` links.
//!
//! Extraction is a syntactic scan over already-sanitized markup. The sanitizer
//! always re-serializes attributes with double quotes, so a single pattern is
//! enough.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{BacklinkFault, Error, Result};

/// Path prefix of every internal page reference.
pub const WIKI_PREFIX: &str = "/wiki/";

const DISALLOWED_CHARS: &[char] = &[' ', '"', '#', '?', '<', '>', '\\'];

static WIKI_LINK: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r##"href="/wiki/([^"#?]+)""##).expect("static wiki link pattern compiles")
});

/// Collect referenced slugs in first-occurrence order, without duplicates.
///
/// Slugs are taken verbatim (no case folding) and trimmed; a link whose
/// target is blank is skipped.
#[must_use]
pub fn extract(markup: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    WIKI_LINK
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|slug| !slug.is_empty())
        .filter(|slug| seen.insert(*slug))
        .map(str::to_string)
        .collect()
}

/// Check every slug for syntax and for presence in `markup`.
///
/// Rules run in order and the first failing slug aborts validation. An empty
/// list is always valid.
pub fn validate<S: AsRef<str>>(markup: &str, slugs: &[S]) -> Result<()> {
    if slugs.is_empty() {
        return Ok(());
    }

    let lowered = markup.to_lowercase();
    for raw in slugs {
        let slug = raw.as_ref().trim();
        let fault = if slug.is_empty() {
            Some(BacklinkFault::Empty)
        } else if slug.contains('/') {
            Some(BacklinkFault::PathSeparator)
        } else if slug.contains(DISALLOWED_CHARS) {
            Some(BacklinkFault::DisallowedCharacter)
        } else if !lowered.contains(&format!("{WIKI_PREFIX}{}", slug.to_lowercase())) {
            Some(BacklinkFault::MissingFromMarkup)
        } else {
            None
        };

        if let Some(fault) = fault {
            return Err(Error::InvalidBacklink {
                slug: slug.to_string(),
                fault,
            });
        }
    }
    Ok(())
}

/// Extracted slugs followed by declared ones not already present.
#[must_use]
pub fn merge(extracted: Vec<String>, declared: &[String]) -> Vec<String> {
    let mut merged = extracted;
    for slug in declared {
        if !merged.iter().any(|existing| existing == slug) {
            merged.push(slug.clone());
        }
    }
    merged
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fault_of(result: Result<()>) -> BacklinkFault {
        match result {
            Err(Error::InvalidBacklink { fault, .. }) => fault,
            other => panic!("expected backlink error, got {other:?}"),
        }
    }

    #[test]
    fn test_extract_dedups_in_first_occurrence_order() {
        let markup = r#"<div><a href="/wiki/alpha">A</a> <a href="/wiki/beta">B</a> <a href="/wiki/alpha">again</a></div>"#;

        assert_eq!(extract(markup), vec!["alpha", "beta"]);
    }

    #[test]
    fn test_extract_keeps_case_and_ignores_fragments() {
        let markup = r#"<a href="/wiki/Paris">P</a><a href="/wiki/Rome#history">R</a><a href="/wiki/?q=x">Q</a><a href="https://example.com/wiki/zed">Z</a>"#;

        assert_eq!(extract(markup), vec!["Paris"]);
    }

    #[test]
    fn test_extract_without_links_is_empty() {
        assert!(extract("<div><p>No links here.</p></div>").is_empty());
    }

    #[test]
    fn test_validate_empty_list_is_ok() {
        let none: &[&str] = &[];
        assert!(validate("<div></div>", none).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_syntax_even_if_present() {
        let markup = r#"<a href="/wiki/a/b">x</a> /wiki/bad slug /wiki/say"hi"#;

        assert_eq!(fault_of(validate(markup, &["a/b"])), BacklinkFault::PathSeparator);
        assert_eq!(
            fault_of(validate(markup, &["bad slug"])),
            BacklinkFault::DisallowedCharacter
        );
        assert_eq!(
            fault_of(validate(markup, &["say\"hi"])),
            BacklinkFault::DisallowedCharacter
        );
        assert_eq!(fault_of(validate(markup, &["   "])), BacklinkFault::Empty);
    }

    #[test]
    fn test_validate_requires_presence_case_insensitively() {
        let markup = r#"<div><a href="/wiki/Alpha">Alpha</a></div>"#;

        assert!(validate(markup, &["alpha"]).is_ok());
        assert!(validate(markup, &["ALPHA"]).is_ok());
        assert_eq!(
            fault_of(validate(markup, &["alpha", "gamma"])),
            BacklinkFault::MissingFromMarkup
        );
    }

    #[test]
    fn test_validate_reports_first_failure() {
        let err = validate("<div></div>", &["one", "two"]).unwrap_err();

        assert_eq!(err.to_string(), "backlink slug 'one' is missing from markup");
    }

    #[test]
    fn test_merge_appends_only_new_declared_slugs() {
        let merged = merge(
            vec!["alpha".into(), "beta".into()],
            &["beta".into(), "gamma".into()],
        );

        assert_eq!(merged, vec!["alpha", "beta", "gamma"]);
    }

    proptest! {
        #[test]
        fn prop_extracted_slugs_always_validate(
            slugs in prop::collection::vec("[a-zA-Z0-9_-]{1,12}", 0..8),
        ) {
            let markup: String = slugs
                .iter()
                .map(|slug| format!(r#"<a href="/wiki/{slug}">{slug}</a>"#))
                .collect();

            let extracted = extract(&markup);

            prop_assert!(validate(&markup, &extracted).is_ok());
            let unique: std::collections::HashSet<_> = extracted.iter().collect();
            prop_assert_eq!(unique.len(), extracted.len());
        }
    }
}
