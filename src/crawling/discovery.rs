//! # Discovery stage
//!
//! Scrolls the listing page until enough unique cards are loaded or the page
//! stops growing, then parses each card into a partial [`Record`].
//!
//! Termination rule: after every scroll the unique-card count and the page
//! height are read again. The loop stops when the count reaches the target,
//! or when the height did not change since the previous reading. A scroll
//! that fails part-way also ends the loop as a stall; cards already seen are
//! still parsed and returned.
//!
//! Known limitation: the stall rule cannot tell "no more content" from "the
//! next batch has not rendered yet". On a slow connection the height can read
//! unchanged for one settle interval and discovery ends early with fewer
//! records than the page holds. Raising `discovery.scroll_settle_ms` is the
//! only mitigation; there is no retry.

use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::domain::Record;
use crate::infrastructure::config::{AppConfig, ListingSelectors};
use crate::infrastructure::html_parser::{
    element_identity, parse_selector, resolve_url, select_text,
};
use crate::infrastructure::renderer::RendererSession;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

const PREVIEW_COUNT: usize = 5;

/// Where the scroll loop stands after one height reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    /// Page grew and the target is not reached yet: scroll again
    Growing,
    /// Height unchanged since the previous reading (or scroll cap hit)
    Stalled,
    TargetReached,
}

impl ScrollState {
    /// The target check wins when both conditions hold in the same iteration.
    pub fn next(previous_height: u64, current_height: u64, unique_count: usize, target_count: usize) -> Self {
        if unique_count >= target_count {
            Self::TargetReached
        } else if current_height == previous_height {
            Self::Stalled
        } else {
            Self::Growing
        }
    }

    /// State before the first scroll
    pub fn initial(unique_count: usize, target_count: usize) -> Self {
        if unique_count >= target_count {
            Self::TargetReached
        } else {
            Self::Growing
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Growing)
    }
}

/// Compiled listing selectors, with the source text kept for error messages
struct ListingSelectorSet {
    source: ListingSelectors,
    item: Selector,
    name: Selector,
    batch: Selector,
    description: Selector,
    detail_link: Option<Selector>,
}

impl ListingSelectorSet {
    fn compile(source: &ListingSelectors) -> ScrapeResult<Self> {
        let detail_link = if source.detail_link.trim().is_empty() {
            None
        } else {
            Some(parse_selector(&source.detail_link)?)
        };

        Ok(Self {
            item: parse_selector(&source.item)?,
            name: parse_selector(&source.name)?,
            batch: parse_selector(&source.batch)?,
            description: parse_selector(&source.description)?,
            detail_link,
            source: source.clone(),
        })
    }
}

/// Unique listing cards in first-seen order, keyed by serialized markup
#[derive(Debug, Default)]
struct SeenItems {
    keys: HashSet<String>,
    ordered: Vec<String>,
}

impl SeenItems {
    /// Returns how many of `fragments` were new
    fn extend(&mut self, fragments: Vec<String>) -> usize {
        let before = self.ordered.len();
        for fragment in fragments {
            if self.keys.insert(fragment.clone()) {
                self.ordered.push(fragment);
            }
        }
        self.ordered.len() - before
    }

    fn len(&self) -> usize {
        self.ordered.len()
    }
}

/// Outcome of one discovery run
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub records: Vec<Record>,
    pub final_state: ScrollState,
    pub scrolls: u32,
    pub unique_items: usize,
    pub skipped_items: usize,
}

pub struct DiscoveryLoop {
    selectors: ListingSelectorSet,
    origin: String,
    target_count: usize,
    scroll_settle: Duration,
    max_scrolls: u32,
}

impl DiscoveryLoop {
    pub fn new(config: &AppConfig) -> ScrapeResult<Self> {
        Ok(Self {
            selectors: ListingSelectorSet::compile(&config.selectors.listing)?,
            origin: config.site.origin.clone(),
            target_count: config.discovery.target_count,
            scroll_settle: config.discovery.scroll_settle(),
            max_scrolls: config.discovery.max_scrolls,
        })
    }

    #[must_use]
    pub fn with_target(mut self, target_count: usize) -> Self {
        self.target_count = target_count;
        self
    }

    /// Drive the scroll loop on a session already sitting on the listing page
    pub async fn run(&self, session: &mut dyn RendererSession) -> ScrapeResult<DiscoveryReport> {
        info!("📜 Scrolling to load startups (target: {})...", self.target_count);

        let mut seen = SeenItems::default();
        let mut previous_height = session.page_height().await?;
        self.capture(session, &mut seen).await?;

        let mut state = ScrollState::initial(seen.len(), self.target_count);
        let mut scrolls = 0u32;

        while !state.is_terminal() {
            if scrolls >= self.max_scrolls {
                warn!("⚠️ Scroll cap of {} reached with {} items, stopping", self.max_scrolls, seen.len());
                state = ScrollState::Stalled;
                break;
            }

            let (added, current_height) = match self.scroll_once(session, &mut seen).await {
                Ok(step) => step,
                Err(e) => {
                    // 이미 수집한 카드는 버리지 않는다
                    warn!("⚠️ Scroll #{} failed with {} items seen, stopping: {}", scrolls + 1, seen.len(), e);
                    state = ScrollState::Stalled;
                    break;
                }
            };
            scrolls += 1;
            state = ScrollState::next(previous_height, current_height, seen.len(), self.target_count);

            debug!(
                "scroll #{}: height {} -> {}, +{} new, {} unique, {:?}",
                scrolls,
                previous_height,
                current_height,
                added,
                seen.len(),
                state
            );
            previous_height = current_height;
        }

        match state {
            ScrollState::TargetReached => info!("🎯 Target reached: {} unique startup cards", seen.len()),
            _ => info!("🧱 Page stopped growing after {} scrolls: {} unique startup cards", scrolls, seen.len()),
        }

        let unique_items = seen.len();
        let records = self.parse_items(&seen.ordered);
        let skipped_items = unique_items - records.len();

        info!("✅ Found {} startups ({} cards skipped)", records.len(), skipped_items);
        for (i, record) in records.iter().take(PREVIEW_COUNT).enumerate() {
            info!("{}. {}", i + 1, record.name);
        }

        Ok(DiscoveryReport {
            records,
            final_state: state,
            scrolls,
            unique_items,
            skipped_items,
        })
    }

    /// Scroll, settle, then read the cards and the new height
    async fn scroll_once(&self, session: &mut dyn RendererSession, seen: &mut SeenItems) -> ScrapeResult<(usize, u64)> {
        session.execute_scroll().await?;
        sleep(self.scroll_settle).await;

        let added = self.capture(session, seen).await?;
        let current_height = session.page_height().await?;
        Ok((added, current_height))
    }

    async fn capture(&self, session: &mut dyn RendererSession, seen: &mut SeenItems) -> ScrapeResult<usize> {
        let snapshot = session.current_document().await?;
        let fragments = collect_item_fragments(&snapshot.parse(), &self.selectors.item);
        Ok(seen.extend(fragments))
    }

    fn parse_items(&self, fragments: &[String]) -> Vec<Record> {
        fragments
            .iter()
            .enumerate()
            .filter_map(|(i, fragment)| {
                let html = Html::parse_fragment(fragment);
                let Some(item) = html.select(&self.selectors.item).next() else {
                    warn!("⚠️ Card {} could not be re-read, skipping", i + 1);
                    return None;
                };
                match parse_listing_item(&item, &self.selectors, &self.origin) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("⚠️ Skipping card {}: {}", i + 1, e);
                        None
                    }
                }
            })
            .collect()
    }
}

fn collect_item_fragments(document: &Html, item: &Selector) -> Vec<String> {
    document.select(item).map(|el| element_identity(&el)).collect()
}

fn parse_listing_item(
    item: &ElementRef<'_>,
    selectors: &ListingSelectorSet,
    origin: &str,
) -> ScrapeResult<Record> {
    let source = &selectors.source;
    let field = |selector: &Selector, field_name: &str, selector_text: &str| {
        select_text(item, selector).ok_or_else(|| ScrapeError::field_missing(field_name, selector_text))
    };

    let name = field(&selectors.name, "name", &source.name)?;
    let batch = field(&selectors.batch, "batch", &source.batch)?;
    let description = field(&selectors.description, "short_description", &source.description)?;

    let href = match &selectors.detail_link {
        Some(link) => item
            .select(link)
            .find_map(|a| a.value().attr("href"))
            .ok_or_else(|| ScrapeError::field_missing("detail_url", &source.detail_link))?,
        None => item
            .value()
            .attr("href")
            .ok_or_else(|| ScrapeError::field_missing("detail_url", &source.item))?,
    };

    Ok(Record::partial(name, batch, description, resolve_url(href, origin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        Fault, ScriptedFactory, ScriptedPage, fast_config, listing_card, listing_page, numbered_cards,
    };

    const LISTING: &str = "https://www.ycombinator.com/companies";

    #[test]
    fn target_wins_over_stall() {
        assert_eq!(ScrollState::next(100, 100, 10, 10), ScrollState::TargetReached);
        assert_eq!(ScrollState::next(100, 100, 9, 10), ScrollState::Stalled);
        assert_eq!(ScrollState::next(100, 200, 9, 10), ScrollState::Growing);
    }

    #[test]
    fn zero_target_is_reached_immediately() {
        assert_eq!(ScrollState::initial(0, 0), ScrollState::TargetReached);
        assert!(ScrollState::initial(0, 0).is_terminal());
    }

    #[test]
    fn card_fields_are_extracted_and_href_resolved() {
        let config = fast_config();
        let selectors = ListingSelectorSet::compile(&config.selectors.listing).unwrap();
        let html = Html::parse_fragment(&listing_card("acme", "Acme", "S24", "Rockets, but cheaper"));
        let item = html.select(&selectors.item).next().unwrap();

        let record = parse_listing_item(&item, &selectors, &config.site.origin).unwrap();

        assert_eq!(record.name, "Acme");
        assert_eq!(record.batch_label, "S24");
        assert_eq!(record.short_description, "Rockets, but cheaper");
        assert_eq!(record.detail_url, "https://www.ycombinator.com/companies/acme");
    }

    #[test]
    fn card_without_name_is_a_field_failure() {
        let config = fast_config();
        let selectors = ListingSelectorSet::compile(&config.selectors.listing).unwrap();
        let html = Html::parse_fragment(r#"<a class="_company_x" href="/companies/x"><span class="pill _pill_x">S24</span></a>"#);
        let item = html.select(&selectors.item).next().unwrap();

        let err = parse_listing_item(&item, &selectors, &config.site.origin).unwrap_err();
        assert!(matches!(err, ScrapeError::FieldExtractionFailure { ref field, .. } if field == "name"));
    }

    #[tokio::test]
    async fn stalls_below_target_and_keeps_everything_seen() {
        let cards = numbered_cards(42);
        let factory = ScriptedFactory::new([(
            LISTING,
            ScriptedPage::frames([
                (1000, listing_page(cards[..20].to_vec())),
                (2000, listing_page(cards.clone())),
                (2000, listing_page(cards.clone())),
            ]),
        )]);
        let mut session = factory.session_at(LISTING).await.unwrap();

        let report = DiscoveryLoop::new(&fast_config())
            .unwrap()
            .with_target(500)
            .run(session.as_mut())
            .await
            .unwrap();

        assert_eq!(report.final_state, ScrollState::Stalled);
        assert_eq!(report.records.len(), 42);
        assert_eq!(report.scrolls, 2);
        assert_eq!(report.records[0].name, "Company 0");
        assert_eq!(report.records[41].name, "Company 41");
    }

    #[tokio::test]
    async fn stops_as_soon_as_target_is_reached() {
        let cards = numbered_cards(30);
        let factory = ScriptedFactory::new([(
            LISTING,
            ScriptedPage::frames([
                (1000, listing_page(cards[..10].to_vec())),
                (2000, listing_page(cards[..20].to_vec())),
                (3000, listing_page(cards.clone())),
            ]),
        )]);
        let mut session = factory.session_at(LISTING).await.unwrap();

        let report = DiscoveryLoop::new(&fast_config())
            .unwrap()
            .with_target(15)
            .run(session.as_mut())
            .await
            .unwrap();

        assert_eq!(report.final_state, ScrollState::TargetReached);
        assert_eq!(report.scrolls, 1);
        assert_eq!(report.records.len(), 20);
    }

    #[tokio::test]
    async fn duplicate_cards_count_once_and_broken_cards_are_skipped() {
        let good = listing_card("acme", "Acme", "S24", "Rockets");
        let broken = r#"<a class="_company_x" href="/companies/broken"><span class="_coName_x">Broken</span></a>"#.to_string();
        let factory = ScriptedFactory::new([(
            LISTING,
            ScriptedPage::fixed(listing_page([good.clone(), good, broken])),
        )]);
        let mut session = factory.session_at(LISTING).await.unwrap();

        let report = DiscoveryLoop::new(&fast_config())
            .unwrap()
            .run(session.as_mut())
            .await
            .unwrap();

        assert_eq!(report.unique_items, 2);
        assert_eq!(report.skipped_items, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.final_state, ScrollState::Stalled);
    }

    #[tokio::test]
    async fn failed_scroll_keeps_cards_already_seen() {
        let cards = numbered_cards(30);
        let factory = ScriptedFactory::new([(
            LISTING,
            ScriptedPage::frames([
                (1000, listing_page(cards[..10].to_vec())),
                (2000, listing_page(cards[..20].to_vec())),
                (3000, listing_page(cards.clone())),
            ])
            .with_fault(Fault::ScrollFailsAfter(1)),
        )]);
        let mut session = factory.session_at(LISTING).await.unwrap();

        let report = DiscoveryLoop::new(&fast_config())
            .unwrap()
            .with_target(500)
            .run(session.as_mut())
            .await
            .unwrap();

        assert_eq!(report.final_state, ScrollState::Stalled);
        assert_eq!(report.scrolls, 1);
        assert_eq!(report.records.len(), 20);
        assert_eq!(report.records[19].name, "Company 19");
    }

    #[tokio::test]
    async fn scroll_cap_is_treated_as_stall() {
        let cards = numbered_cards(5);
        let frames = (0..10u64).map(|i| (i * 100, listing_page(cards.clone())));
        let factory = ScriptedFactory::new([(LISTING, ScriptedPage::frames(frames))]);
        let mut session = factory.session_at(LISTING).await.unwrap();

        let mut config = fast_config();
        config.discovery.max_scrolls = 3;
        let report = DiscoveryLoop::new(&config).unwrap().run(session.as_mut()).await.unwrap();

        assert_eq!(report.scrolls, 3);
        assert_eq!(report.final_state, ScrollState::Stalled);
        assert_eq!(factory.stats.scrolls(), 3);
    }
}
