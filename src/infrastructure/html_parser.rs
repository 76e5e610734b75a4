//! Document query helpers shared by the listing and detail extractors
//!
//! Thin layer over `scraper`: selector compilation with typed errors,
//! whitespace-normalized element text, href absolutization and
//! order-preserving deduplication.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use std::collections::HashSet;
use url::Url;

use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Compile a CSS selector, mapping the parse error into `InvalidSelector`
pub fn parse_selector(selector: &str) -> ScrapeResult<Selector> {
    Selector::parse(selector).map_err(|e| ScrapeError::invalid_selector(selector, e))
}

/// Text content of an element with runs of whitespace collapsed and trimmed
pub fn element_text(element: &ElementRef<'_>) -> String {
    let raw = element.text().collect::<String>();
    WHITESPACE.replace_all(raw.trim(), " ").into_owned()
}

/// Text of the first descendant matching `selector`, if non-empty
pub fn select_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

/// The element's serialized markup; two elements with identical markup are the same listing item.
///
/// Attributes serialize in source order (scraper's `deterministic` feature),
/// so the same markup yields the same key on every parse.
pub fn element_identity(element: &ElementRef<'_>) -> String {
    element.html()
}

/// Make an href absolute against the site origin.
///
/// Handles absolute (`https://..`), protocol-relative (`//host/..`),
/// root-relative (`/in/..`) and path-relative hrefs. An unparsable origin
/// leaves the href untouched.
pub fn resolve_url(href: &str, origin: &str) -> String {
    let href = href.trim();
    match Url::parse(origin) {
        Ok(base) => base
            .join(href)
            .map(String::from)
            .unwrap_or_else(|_| href.to_string()),
        Err(_) => href.to_string(),
    }
}

/// Drop blank entries, then drop repeats while keeping first-seen order
pub fn dedupe_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_url_resolution() {
        let origin = "https://www.ycombinator.com";

        assert_eq!(
            resolve_url("/companies/acme", origin),
            "https://www.ycombinator.com/companies/acme"
        );
        assert_eq!(
            resolve_url("//www.linkedin.com/in/ann", origin),
            "https://www.linkedin.com/in/ann"
        );
        assert_eq!(
            resolve_url("https://other.com/test", origin),
            "https://other.com/test"
        );
        assert_eq!(
            resolve_url("relative/path", "https://example.com/"),
            "https://example.com/relative/path"
        );
    }

    #[test]
    fn unparsable_origin_keeps_href() {
        assert_eq!(resolve_url("/in/ann", "not a url"), "/in/ann");
    }

    #[test]
    fn dedupe_removes_blanks_and_repeats() {
        let names = ["Ann", "", "Bob", "Ann", " "].map(String::from);
        assert_eq!(dedupe_preserving_order(names), vec!["Ann", "Bob"]);
    }

    #[test]
    fn dedupe_is_idempotent() {
        let once = dedupe_preserving_order(["b", "a", "b"].map(String::from));
        let twice = dedupe_preserving_order(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn element_text_collapses_whitespace() {
        let html = Html::parse_fragment("<div>  Jane \n\t <b>Doe</b>  </div>");
        let div = html.select(&parse_selector("div").unwrap()).next().unwrap();
        assert_eq!(element_text(&div), "Jane Doe");
    }

    #[test]
    fn select_text_skips_empty_matches() {
        let html = Html::parse_fragment(r#"<div><span class="n"> </span><span class="n">Acme</span></div>"#);
        let div = html.select(&parse_selector("div").unwrap()).next().unwrap();
        assert_eq!(
            select_text(&div, &parse_selector("span.n").unwrap()),
            Some("Acme".to_string())
        );
    }

    #[test]
    fn identity_is_stable_across_reparses() {
        let page = r#"<html><body><a class="_company_x" href="/companies/acme" id="c1" title="Acme" data-rank="1" data-batch="S24"><span class="pill _pill_x" data-kind="batch" title="S24">S24</span></a></body></html>"#;
        let item = parse_selector("a[class*='_company_']").unwrap();
        let identity = || {
            let html = Html::parse_document(page);
            html.select(&item).map(|el| element_identity(&el)).next().unwrap()
        };

        let first = identity();
        for _ in 0..8 {
            assert_eq!(identity(), first);
        }
        assert!(first.starts_with(r#"<a class="_company_x" href="/companies/acme""#));
    }

    #[test]
    fn invalid_selector_is_typed() {
        assert!(matches!(
            parse_selector("a[["),
            Err(ScrapeError::InvalidSelector { .. })
        ));
    }
}
