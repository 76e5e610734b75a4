//! Headless Chromium renderer (`chrome` feature)
//!
//! One browser process per run; every session is its own tab, so no two
//! tasks ever share a page handle.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::{PageSnapshot, RendererFactory, RendererSession};
use crate::infrastructure::config::RendererConfig;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight);";
const SCROLL_HEIGHT: &str = "document.body.scrollHeight";
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn cdp_failure(context: &str, e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::session(format!("{}: {}", context, e))
}

pub struct ChromeRendererFactory {
    browser: Mutex<Option<Browser>>,
    handler_task: Mutex<Option<JoinHandle<()>>>,
    navigation_timeout: Duration,
}

impl ChromeRendererFactory {
    /// Start the browser process. Failure here is fatal to the whole run.
    pub async fn launch(config: &RendererConfig) -> ScrapeResult<Self> {
        info!("🚀 Initializing headless browser...");

        let mut builder = BrowserConfig::builder()
            .window_size(config.window_width, config.window_height)
            .request_timeout(config.request_timeout());
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder
            .build()
            .map_err(|e| cdp_failure("Invalid browser configuration", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| cdp_failure("Failed to launch browser", e))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            handler_task: Mutex::new(Some(handler_task)),
            navigation_timeout: config.request_timeout(),
        })
    }
}

#[async_trait]
impl RendererFactory for ChromeRendererFactory {
    async fn create(&self) -> ScrapeResult<Box<dyn RendererSession>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScrapeError::session("browser already shut down"))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| cdp_failure("Failed to open tab", e))?;

        Ok(Box::new(ChromeRendererSession {
            page: Some(page),
            navigation_timeout: self.navigation_timeout,
        }))
    }

    async fn shutdown(&self) -> ScrapeResult<()> {
        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser.close().await {
                warn!("⚠️ Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("⚠️ Browser process did not exit cleanly: {}", e);
            }
        }
        if let Some(task) = self.handler_task.lock().await.take() {
            task.abort();
        }
        info!("🛑 Browser shut down");
        Ok(())
    }
}

pub struct ChromeRendererSession {
    page: Option<Page>,
    navigation_timeout: Duration,
}

impl ChromeRendererSession {
    fn page(&self) -> ScrapeResult<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::session("session already closed"))
    }
}

#[async_trait]
impl RendererSession for ChromeRendererSession {
    async fn open(&mut self, url: &str) -> ScrapeResult<()> {
        let timeout = self.navigation_timeout;
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(cdp_failure(&format!("Navigation to {} failed", url), e)),
            Err(_) => Err(ScrapeError::render_timeout(url, timeout)),
        }
    }

    async fn execute_scroll(&mut self) -> ScrapeResult<()> {
        self.page()?
            .evaluate(SCROLL_TO_BOTTOM)
            .await
            .map_err(|e| cdp_failure("Scroll failed", e))?;
        Ok(())
    }

    async fn page_height(&mut self) -> ScrapeResult<u64> {
        self.page()?
            .evaluate(SCROLL_HEIGHT)
            .await
            .map_err(|e| cdp_failure("Height query failed", e))?
            .into_value::<u64>()
            .map_err(|e| cdp_failure("Height was not a number", e))
    }

    async fn current_document(&mut self) -> ScrapeResult<PageSnapshot> {
        let page = self.page()?;
        let url = page.url().await.ok().flatten().unwrap_or_default();
        let html = page
            .content()
            .await
            .map_err(|e| cdp_failure("Failed to read page content", e))?;
        Ok(PageSnapshot::new(url, html))
    }

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ScrapeResult<()> {
        let deadline = Instant::now() + timeout;
        let page = self.page()?;
        loop {
            if page.find_element(selector).await.is_ok() {
                debug!("✅ '{}' present", selector);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ScrapeError::render_timeout(selector, timeout));
            }
            sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) -> ScrapeResult<()> {
        if let Some(page) = self.page.take() {
            page.close()
                .await
                .map_err(|e| cdp_failure("Failed to close tab", e))?;
        }
        Ok(())
    }
}
