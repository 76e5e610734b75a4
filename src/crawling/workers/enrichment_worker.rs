//! # Enrichment Worker
//!
//! Visits one detail page in its own renderer session and extracts the
//! founders. Failures never escape: they are logged with the detail URL and
//! the record position and turn into an empty result.

use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::founder_extractor::FounderExtractor;
use crate::domain::{FounderInfo, Record};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::renderer::{RendererFactory, open_or_degrade, with_session};
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// How one record's enrichment ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Found(FounderInfo),
    /// Page loaded but no founder data was on it
    Empty,
    /// No detail URL to visit
    Skipped,
    Failed(String),
}

impl EnrichmentOutcome {
    pub fn into_founders(self) -> FounderInfo {
        match self {
            Self::Found(info) => info,
            Self::Empty | Self::Skipped | Self::Failed(_) => FounderInfo::default(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::Empty => "empty",
            Self::Skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }
}

pub struct EnrichmentWorker {
    extractor: Arc<FounderExtractor>,
    wait_selector: String,
    wait_timeout: Duration,
}

impl EnrichmentWorker {
    pub fn new(config: &AppConfig) -> ScrapeResult<Self> {
        Ok(Self {
            extractor: Arc::new(FounderExtractor::new(config)?),
            wait_selector: config.selectors.detail.founder_name_block.clone(),
            wait_timeout: config.enrichment.founder_wait_timeout(),
        })
    }

    pub async fn enrich(&self, factory: &dyn RendererFactory, position: usize, record: &Record) -> EnrichmentOutcome {
        if !record.is_pending_enrichment() {
            debug!("[{}] {} has no detail URL, skipping", position, record.name);
            return EnrichmentOutcome::Skipped;
        }

        match self.visit(factory, &record.detail_url).await {
            Ok(info) if info.is_empty() => EnrichmentOutcome::Empty,
            Ok(info) => EnrichmentOutcome::Found(info),
            Err(e) => {
                if e.is_recoverable() {
                    warn!(position, url = %record.detail_url, "⚠️ Failed to enrich {}: {}", record.name, e);
                } else {
                    error!(position, url = %record.detail_url, "❌ Failed to enrich {}: {}", record.name, e);
                }
                EnrichmentOutcome::Failed(e.to_string())
            }
        }
    }

    /// open → wait for the founder block → snapshot → extract; timeouts on
    /// either step are tolerated
    async fn visit(&self, factory: &dyn RendererFactory, url: &str) -> ScrapeResult<FounderInfo> {
        let url = url.to_string();
        let extractor = Arc::clone(&self.extractor);
        let wait_selector = self.wait_selector.clone();
        let wait_timeout = self.wait_timeout;

        with_session(factory, move |session| {
            async move {
                open_or_degrade(&mut *session, &url).await?;

                match session.wait_for_selector(&wait_selector, wait_timeout).await {
                    Ok(()) => {}
                    Err(ScrapeError::RenderTimeout { .. }) => {
                        warn!("⏱️ Founder block did not appear on {} within {:?}, extracting anyway", url, wait_timeout);
                    }
                    Err(e) => return Err(e),
                }

                let snapshot = session.current_document().await?;
                Ok::<_, ScrapeError>(extractor.extract_snapshot(&snapshot))
            }
            .boxed()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Fault, ScriptedFactory, ScriptedPage, fast_config, founder_page};

    const DETAIL: &str = "https://www.ycombinator.com/companies/acme";

    fn record() -> Record {
        Record::partial("Acme", "S24", "Rockets", DETAIL)
    }

    #[tokio::test]
    async fn founders_are_found_and_session_released() {
        let factory = ScriptedFactory::new([(
            DETAIL,
            ScriptedPage::fixed(founder_page(&[("Ann Lee", "https://www.linkedin.com/in/annlee")])),
        )]);
        let worker = EnrichmentWorker::new(&fast_config()).unwrap();

        let outcome = worker.enrich(&factory, 0, &record()).await;

        assert_eq!(outcome.label(), "found");
        assert_eq!(outcome.into_founders().names, vec!["Ann Lee"]);
        assert_eq!(factory.stats.closed(), 1);
    }

    #[tokio::test]
    async fn missing_founder_block_still_extracts() {
        let page = r#"<html><body><div><div>Jane Doe</div><div>Founder</div></div></body></html>"#;
        let factory = ScriptedFactory::new([(DETAIL, ScriptedPage::fixed(page))]);
        let worker = EnrichmentWorker::new(&fast_config()).unwrap();

        let outcome = worker.enrich(&factory, 3, &record()).await;

        assert_eq!(outcome.into_founders().names, vec!["Jane Doe"]);
    }

    #[tokio::test]
    async fn open_failure_is_contained() {
        let factory = ScriptedFactory::new([(
            DETAIL,
            ScriptedPage::fixed("<p></p>").with_fault(Fault::OpenFails),
        )]);
        let worker = EnrichmentWorker::new(&fast_config()).unwrap();

        let outcome = worker.enrich(&factory, 1, &record()).await;

        assert_eq!(outcome.label(), "failed");
        assert!(outcome.into_founders().is_empty());
        assert_eq!(factory.stats.closed(), 1);
    }

    #[tokio::test]
    async fn navigation_timeout_still_extracts_rendered_founders() {
        let factory = ScriptedFactory::new([(
            DETAIL,
            ScriptedPage::fixed(founder_page(&[("Ann Lee", "https://www.linkedin.com/in/annlee")]))
                .with_fault(Fault::OpenTimesOut),
        )]);
        let worker = EnrichmentWorker::new(&fast_config()).unwrap();

        let outcome = worker.enrich(&factory, 0, &record()).await;

        assert_eq!(outcome.label(), "found");
        let founders = outcome.into_founders();
        assert_eq!(founders.names, vec!["Ann Lee"]);
        assert_eq!(founders.profile_urls, vec!["https://www.linkedin.com/in/annlee"]);
        assert_eq!(factory.stats.closed(), 1);
    }

    #[tokio::test]
    async fn panic_during_extraction_is_contained_and_session_closed() {
        let factory = ScriptedFactory::new([(
            DETAIL,
            ScriptedPage::fixed(founder_page(&[("Ann", "https://www.linkedin.com/in/ann")]))
                .with_fault(Fault::PanicOnRead),
        )]);
        let worker = EnrichmentWorker::new(&fast_config()).unwrap();

        let outcome = worker.enrich(&factory, 2, &record()).await;

        assert!(matches!(outcome, EnrichmentOutcome::Failed(ref msg) if msg.contains("panicked")));
        assert_eq!(factory.stats.closed(), 1);
    }

    #[tokio::test]
    async fn record_without_detail_url_is_skipped() {
        let factory = ScriptedFactory::default();
        let worker = EnrichmentWorker::new(&fast_config()).unwrap();

        let outcome = worker.enrich(&factory, 0, &Record::partial("Acme", "S24", "", "")).await;

        assert_eq!(outcome, EnrichmentOutcome::Skipped);
        assert_eq!(factory.stats.created(), 0);
    }
}
