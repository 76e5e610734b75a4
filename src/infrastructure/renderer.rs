//! Renderer session abstraction
//!
//! A session owns one page-automation handle. Discovery uses a single
//! session for the whole scroll loop; every enrichment task creates its own
//! short-lived session through a [`RendererFactory`] and releases it through
//! [`with_session`], which awaits `close()` on every exit path.

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use scraper::Html;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{debug, warn};

use crate::infrastructure::config::{AppConfig, RendererEngine};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

pub mod http_renderer;
#[cfg(feature = "chrome")]
pub mod chrome_renderer;

pub use http_renderer::HttpRendererFactory;
#[cfg(feature = "chrome")]
pub use chrome_renderer::ChromeRendererFactory;

/// Snapshot of the rendered markup at one instant.
///
/// Kept as an owned string so it can cross `.await` points; the parsed
/// tree is built on demand inside synchronous extraction code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub html: String,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[async_trait]
pub trait RendererSession: Send {
    /// Navigate and wait until the initial document is available
    async fn open(&mut self, url: &str) -> ScrapeResult<()>;

    /// Scroll to the bottom of the page
    async fn execute_scroll(&mut self) -> ScrapeResult<()>;

    /// Current `document.body.scrollHeight`
    async fn page_height(&mut self) -> ScrapeResult<u64>;

    async fn current_document(&mut self) -> ScrapeResult<PageSnapshot>;

    /// Returns `RenderTimeout` if nothing matches `selector` before `timeout`
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> ScrapeResult<()>;

    /// Release the handle. Calling it again is a no-op.
    async fn close(&mut self) -> ScrapeResult<()>;
}

#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn create(&self) -> ScrapeResult<Box<dyn RendererSession>>;

    /// Tear down anything shared between sessions (e.g. the browser process)
    async fn shutdown(&self) -> ScrapeResult<()> {
        Ok(())
    }
}

/// Run `body` with a fresh session and always close it afterwards.
///
/// A panic inside `body` is captured, the session is still closed, and the
/// panic surfaces as `SessionFailure`. The body may only borrow the session;
/// anything else it needs is moved in.
pub async fn with_session<F, T>(factory: &dyn RendererFactory, body: F) -> ScrapeResult<T>
where
    F: for<'s> FnOnce(&'s mut (dyn RendererSession + 'static)) -> BoxFuture<'s, ScrapeResult<T>>,
{
    let mut session = factory.create().await?;

    let outcome = AssertUnwindSafe(body(session.as_mut())).catch_unwind().await;

    if let Err(e) = session.close().await {
        warn!("⚠️ Failed to close renderer session: {}", e);
    } else {
        debug!("🔒 Renderer session released");
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => Err(ScrapeError::session(format!(
            "extraction panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

/// `open()`, but a navigation timeout only degrades: it is logged and the
/// caller goes on with whatever did render
pub async fn open_or_degrade(session: &mut dyn RendererSession, url: &str) -> ScrapeResult<()> {
    match session.open(url).await {
        Err(ScrapeError::RenderTimeout { timeout_ms, .. }) => {
            warn!("⏱️ Navigation to {} exceeded {}ms, continuing with what rendered", url, timeout_ms);
            Ok(())
        }
        other => other,
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Build the factory selected by `renderer.engine`
pub async fn build_factory(config: &AppConfig) -> ScrapeResult<Box<dyn RendererFactory>> {
    match config.renderer.engine {
        RendererEngine::Http => Ok(Box::new(HttpRendererFactory::new(&config.renderer)?)),
        #[cfg(feature = "chrome")]
        RendererEngine::Chrome => Ok(Box::new(ChromeRendererFactory::launch(&config.renderer).await?)),
        #[cfg(not(feature = "chrome"))]
        RendererEngine::Chrome => Err(ScrapeError::configuration(
            "renderer.engine = \"chrome\" requires building with `--features chrome`",
        )),
    }
}
