//! # Founder Extractor
//!
//! Pulls founder names and profile links out of a rendered detail page.
//! Each field has an ordered list of strategies; the first one that yields a
//! non-empty (deduplicated) list wins.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::FounderInfo;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::html_parser::{
    dedupe_preserving_order, element_text, parse_selector, resolve_url, select_text,
};
use crate::infrastructure::renderer::PageSnapshot;
use crate::infrastructure::scrape_error::ScrapeResult;

type Strategy = fn(&FounderExtractor, &Html) -> Vec<String>;

/// Names: structured founder cards, then the text preceding a "Founder" role label
const NAME_STRATEGIES: &[(&str, Strategy)] = &[
    ("founder cards", FounderExtractor::names_from_cards),
    ("role label", FounderExtractor::names_before_role_label),
];

/// Links: profile-domain links inside founder cards, then any profile-path link on the page
const LINK_STRATEGIES: &[(&str, Strategy)] = &[
    ("founder cards", FounderExtractor::links_from_cards),
    ("page scan", FounderExtractor::links_anywhere),
];

pub struct FounderExtractor {
    container: Selector,
    name: Selector,
    link: Selector,
    layout_block: Selector,
    any_link: Selector,
    origin: String,
    domain_marker: String,
    path_marker: String,
    exclusion_marker: String,
    role_marker: String,
}

impl FounderExtractor {
    pub fn new(config: &AppConfig) -> ScrapeResult<Self> {
        let detail = &config.selectors.detail;
        let enrichment = &config.enrichment;

        Ok(Self {
            container: parse_selector(&detail.founder_container)?,
            name: parse_selector(&detail.founder_name)?,
            link: parse_selector(&detail.founder_link)?,
            layout_block: parse_selector(&detail.layout_block)?,
            any_link: parse_selector("a[href]")?,
            origin: config.site.origin.clone(),
            domain_marker: enrichment.profile_domain_marker.clone(),
            path_marker: enrichment.profile_path_marker.clone(),
            exclusion_marker: enrichment.profile_exclusion_marker.clone(),
            role_marker: enrichment.founder_text_marker.clone(),
        })
    }

    pub fn extract_snapshot(&self, snapshot: &PageSnapshot) -> FounderInfo {
        self.extract(&snapshot.parse())
    }

    pub fn extract(&self, document: &Html) -> FounderInfo {
        FounderInfo {
            names: self.first_non_empty("names", NAME_STRATEGIES, document),
            profile_urls: self.first_non_empty("links", LINK_STRATEGIES, document),
        }
    }

    fn first_non_empty(&self, field: &str, strategies: &[(&str, Strategy)], document: &Html) -> Vec<String> {
        for (label, strategy) in strategies {
            let values = dedupe_preserving_order(strategy(self, document));
            if !values.is_empty() {
                debug!("{} found via {}: {}", field, label, values.len());
                return values;
            }
        }
        Vec::new()
    }

    fn names_from_cards(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.container)
            .filter_map(|card| select_text(&card, &self.name))
            .collect()
    }

    /// Innermost layout blocks mentioning the role marker; the name is the previous sibling element
    fn names_before_role_label(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.layout_block)
            .filter(|block| self.is_innermost_role_block(block))
            .filter_map(|block| block.prev_siblings().find_map(ElementRef::wrap))
            .map(|sibling| element_text(&sibling))
            .filter(|text| !text.contains(&self.role_marker))
            .collect()
    }

    fn is_innermost_role_block(&self, block: &ElementRef<'_>) -> bool {
        element_text(block).contains(&self.role_marker)
            && !block
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .filter(|inner| self.layout_block.matches(inner))
                .any(|inner| element_text(&inner).contains(&self.role_marker))
    }

    fn links_from_cards(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.container)
            .flat_map(|card| card.select(&self.link).collect::<Vec<_>>())
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.accept_profile_href(href, &self.domain_marker))
            .collect()
    }

    fn links_anywhere(&self, document: &Html) -> Vec<String> {
        document
            .select(&self.any_link)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| self.accept_profile_href(href, &self.path_marker))
            .collect()
    }

    /// Absolute URL if `href` is a personal profile link under `marker`
    pub fn accept_profile_href(&self, href: &str, marker: &str) -> Option<String> {
        let url = resolve_url(href, &self.origin);
        (url.contains(marker) && !url.contains(&self.exclusion_marker)).then_some(url)
    }

    pub fn domain_marker(&self) -> &str {
        &self.domain_marker
    }

    pub fn path_marker(&self) -> &str {
        &self.path_marker
    }
}
