//! Plain HTTP renderer
//!
//! Fetches the server-rendered markup with `reqwest`. No script runs, so
//! scrolling never loads anything new: the reported height is the document
//! length and discovery over this engine stalls after the first scroll.

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{PageSnapshot, RendererFactory, RendererSession};
use crate::infrastructure::config::RendererConfig;
use crate::infrastructure::html_parser::parse_selector;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Shares one connection pool across all sessions it creates
#[derive(Clone)]
pub struct HttpRendererFactory {
    client: Client,
}

impl HttpRendererFactory {
    pub fn new(config: &RendererConfig) -> ScrapeResult<Self> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ScrapeError::session(format!("Failed to create HTTP client: {}", e)))?;

        info!("🌐 HTTP renderer ready (timeout {:?})", config.request_timeout());
        Ok(Self { client })
    }
}

#[async_trait]
impl RendererFactory for HttpRendererFactory {
    async fn create(&self) -> ScrapeResult<Box<dyn RendererSession>> {
        Ok(Box::new(HttpRendererSession {
            client: self.client.clone(),
            current: None,
        }))
    }
}

pub struct HttpRendererSession {
    client: Client,
    current: Option<PageSnapshot>,
}

impl HttpRendererSession {
    fn snapshot(&self) -> ScrapeResult<&PageSnapshot> {
        self.current
            .as_ref()
            .ok_or_else(|| ScrapeError::session("no page is open in this session"))
    }
}

#[async_trait]
impl RendererSession for HttpRendererSession {
    async fn open(&mut self, url: &str) -> ScrapeResult<()> {
        debug!("🌐 HTTP GET: {}", url);
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("❌ HTTP error {}: {}", status, url);
            return Err(ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let html = response.text().await?;
        self.current = Some(PageSnapshot::new(url, html));
        Ok(())
    }

    async fn execute_scroll(&mut self) -> ScrapeResult<()> {
        // static markup: nothing to lazy-load
        self.snapshot().map(|_| ())
    }

    async fn page_height(&mut self) -> ScrapeResult<u64> {
        Ok(self.snapshot()?.html.len() as u64)
    }

    async fn current_document(&mut self) -> ScrapeResult<PageSnapshot> {
        self.snapshot().cloned()
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ScrapeResult<()> {
        let compiled = parse_selector(selector)?;
        let found = {
            let document = self.snapshot()?.parse();
            document.select(&compiled).next().is_some()
        };

        if found {
            Ok(())
        } else {
            // the markup cannot change, so waiting longer is pointless
            Err(ScrapeError::render_timeout(selector, timeout))
        }
    }

    async fn close(&mut self) -> ScrapeResult<()> {
        self.current = None;
        Ok(())
    }
}
