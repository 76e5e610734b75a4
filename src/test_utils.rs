//! Test utilities
//!
//! A scripted, in-memory renderer so discovery and enrichment can be driven
//! without a network or a browser. Pages are keyed by URL; a listing page is a
//! sequence of frames and every scroll advances one frame (the last frame
//! repeats). Session statistics are shared atomics so tests can assert on
//! concurrency and cleanup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::sleep;

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::html_parser::parse_selector;
use crate::infrastructure::renderer::{PageSnapshot, RendererFactory, RendererSession};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Fault injected into a scripted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// `open()` fails with `SessionFailure`
    OpenFails,
    /// `open()` loads the page but reports `RenderTimeout`
    OpenTimesOut,
    /// `current_document()` panics
    PanicOnRead,
    /// Every scroll after the first `n` fails with `SessionFailure`
    ScrollFailsAfter(usize),
}

#[derive(Debug, Clone)]
struct Frame {
    height: u64,
    html: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedPage {
    frames: Vec<Frame>,
    open_delay: Duration,
    fault: Option<Fault>,
}

impl ScriptedPage {
    /// A page whose markup never changes
    pub fn fixed(html: impl Into<String>) -> Self {
        let html = html.into();
        Self {
            frames: vec![Frame {
                height: html.len() as u64,
                html,
            }],
            ..Self::default()
        }
    }

    /// A page that changes on every scroll: `(height, html)` per frame
    pub fn frames<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = (u64, S)>,
        S: Into<String>,
    {
        Self {
            frames: frames
                .into_iter()
                .map(|(height, html)| Frame {
                    height,
                    html: html.into(),
                })
                .collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    #[must_use]
    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }
}

/// Counters shared by a factory and every session it created
#[derive(Debug, Default)]
pub struct SessionStats {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub open_now: AtomicUsize,
    pub max_open: AtomicUsize,
    pub scrolls: AtomicUsize,
}

impl SessionStats {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pages: Arc<HashMap<String, ScriptedPage>>,
    pub stats: Arc<SessionStats>,
}

impl ScriptedFactory {
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = (S, ScriptedPage)>,
        S: Into<String>,
    {
        Self {
            pages: Arc::new(pages.into_iter().map(|(url, page)| (url.into(), page)).collect()),
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// A session already sitting on `url`, for driving discovery directly
    pub async fn session_at(&self, url: &str) -> ScrapeResult<Box<dyn RendererSession>> {
        let mut session = self.create().await?;
        session.open(url).await?;
        Ok(session)
    }
}

#[async_trait]
impl RendererFactory for ScriptedFactory {
    async fn create(&self) -> ScrapeResult<Box<dyn RendererSession>> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_open.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            pages: Arc::clone(&self.pages),
            stats: Arc::clone(&self.stats),
            page: None,
            frame: 0,
            scrolled: 0,
            closed: false,
        }))
    }
}

pub struct ScriptedSession {
    pages: Arc<HashMap<String, ScriptedPage>>,
    stats: Arc<SessionStats>,
    page: Option<(String, ScriptedPage)>,
    frame: usize,
    scrolled: usize,
    closed: bool,
}

impl ScriptedSession {
    fn current(&self) -> ScrapeResult<(&str, &ScriptedPage, &Frame)> {
        let (url, page) = self
            .page
            .as_ref()
            .ok_or_else(|| ScrapeError::session("no page is open in this session"))?;
        let frame = page
            .frames
            .get(self.frame)
            .ok_or_else(|| ScrapeError::session("scripted page has no frames"))?;
        Ok((url.as_str(), page, frame))
    }
}

#[async_trait]
impl RendererSession for ScriptedSession {
    async fn open(&mut self, url: &str) -> ScrapeResult<()> {
        let page = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })?;

        if !page.open_delay.is_zero() {
            sleep(page.open_delay).await;
        }
        if page.fault == Some(Fault::OpenFails) {
            return Err(ScrapeError::session(format!("scripted failure opening {}", url)));
        }

        let times_out = page.fault == Some(Fault::OpenTimesOut);
        self.page = Some((url.to_string(), page));
        self.frame = 0;
        self.scrolled = 0;
        if times_out {
            return Err(ScrapeError::render_timeout(url, Duration::from_secs(30)));
        }
        Ok(())
    }

    async fn execute_scroll(&mut self) -> ScrapeResult<()> {
        let (url, page, _) = self.current()?;
        if let Some(Fault::ScrollFailsAfter(n)) = page.fault {
            if self.scrolled >= n {
                return Err(ScrapeError::session(format!("scripted scroll failure on {}", url)));
            }
        }
        let last = page.frames.len().saturating_sub(1);
        self.frame = (self.frame + 1).min(last);
        self.scrolled += 1;
        self.stats.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn page_height(&mut self) -> ScrapeResult<u64> {
        Ok(self.current()?.2.height)
    }

    async fn current_document(&mut self) -> ScrapeResult<PageSnapshot> {
        let (url, page, frame) = self.current()?;
        if page.fault == Some(Fault::PanicOnRead) {
            panic!("scripted panic reading {}", url);
        }
        Ok(PageSnapshot::new(url, frame.html.clone()))
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ScrapeResult<()> {
        let compiled = parse_selector(selector)?;
        let found = {
            let document = PageSnapshot::new("", self.current()?.2.html.clone()).parse();
            document.select(&compiled).next().is_some()
        };
        if found {
            Ok(())
        } else {
            Err(ScrapeError::render_timeout(selector, timeout))
        }
    }

    async fn close(&mut self) -> ScrapeResult<()> {
        if !self.closed {
            self.closed = true;
            self.page = None;
            self.stats.closed.fetch_add(1, Ordering::SeqCst);
            self.stats.open_now.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/* ---------------- Markup builders ---------------- */

/// One listing card in the directory's markup shape
pub fn listing_card(slug: &str, name: &str, batch: &str, description: &str) -> String {
    format!(
        r#"<a class="_company_i9oky_355" href="/companies/{slug}"><div><span class="_coName_i9oky_470">{name}</span><span class="_coLocation_i9oky_486">San Francisco</span></div><div><span class="_coDescription_i9oky_495">{description}</span></div><div class="_pillWrapper_i9oky_33"><span class="pill _pill_i9oky_33">{batch}</span><span class="pill _pill_i9oky_33">B2B</span></div></a>"#
    )
}

/// A listing document containing `cards`
pub fn listing_page<I: IntoIterator<Item = String>>(cards: I) -> String {
    let body: String = cards.into_iter().collect();
    format!(r#"<html><body><div class="_section_i9oky_163">{body}</div></body></html>"#)
}

/// `n` distinct cards named `Company 0..n`
pub fn numbered_cards(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| listing_card(&format!("company-{i}"), &format!("Company {i}"), "S24", "Does things"))
        .collect()
}

/// A detail page with the structured founder cards
pub fn founder_page(founders: &[(&str, &str)]) -> String {
    let cards: String = founders
        .iter()
        .map(|(name, profile)| {
            format!(
                r#"<div class="ycdc-card-new"><div class="font-bold">{name}</div><div>Founder</div><a href="{profile}">LinkedIn</a></div>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><a href="https://www.linkedin.com/school/y-combinator/">YC</a>{cards}</body></html>"#
    )
}

/// Default configuration with zero settle pauses, for fast tests
pub fn fast_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.discovery.initial_settle_ms = 0;
    config.discovery.scroll_settle_ms = 0;
    config.logging.file_output = false;
    config
}
