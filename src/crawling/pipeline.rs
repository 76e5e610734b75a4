//! # Pipeline Driver
//!
//! Runs the two stages against one renderer factory and persists the output
//! of each. Discovery writes the discovery CSV; enrichment reads it back (or
//! takes the records directly) and writes the enriched CSV.

use futures::FutureExt;
use std::path::Path;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use super::coordinator::{EnrichmentCoordinator, EnrichmentSummary};
use super::discovery::{DiscoveryLoop, DiscoveryReport};
use super::workers::EnrichmentWorker;
use crate::domain::Record;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::persistence::{read_discovery_csv, write_discovery_csv, write_enriched_csv};
use crate::infrastructure::renderer::{RendererFactory, open_or_degrade, with_session};
use crate::infrastructure::scrape_error::ScrapeResult;

pub struct PipelineDriver {
    config: AppConfig,
    factory: Arc<dyn RendererFactory>,
    run_id: Uuid,
}

impl PipelineDriver {
    pub fn new(config: AppConfig, factory: Arc<dyn RendererFactory>) -> Self {
        let run_id = Uuid::new_v4();
        info!(%run_id, "🧭 Pipeline created");
        Self {
            config,
            factory,
            run_id,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Scroll the listing page and write the partial records to `output`
    pub async fn run_discovery(&self, target: Option<usize>, output: &Path) -> ScrapeResult<DiscoveryReport> {
        let mut discovery = DiscoveryLoop::new(&self.config)?;
        if let Some(target) = target {
            discovery = discovery.with_target(target);
        }

        let listing_url = self.config.site.listing_url.clone();
        let initial_settle = self.config.discovery.initial_settle();
        let run_id = self.run_id;

        let report = with_session(self.factory.as_ref(), move |session| {
            async move {
                info!(%run_id, "🌐 Opening {}", listing_url);
                open_or_degrade(&mut *session, &listing_url).await?;
                sleep(initial_settle).await;
                discovery.run(session).await
            }
            .boxed()
        })
        .await?;

        write_discovery_csv(output, &report.records).await?;
        Ok(report)
    }

    /// Enrich `records` with up to `workers` concurrent sessions and write the result to `output`
    pub async fn run_enrichment(
        &self,
        records: Vec<Record>,
        workers: Option<usize>,
        output: &Path,
    ) -> ScrapeResult<(Vec<Record>, EnrichmentSummary)> {
        let worker = EnrichmentWorker::new(&self.config)?;
        let max_concurrent = workers.unwrap_or(self.config.enrichment.max_concurrent);
        let coordinator = EnrichmentCoordinator::new(Arc::clone(&self.factory), worker, max_concurrent);

        info!(run_id = %self.run_id, "🔧 Enrichment stage: {} records", records.len());
        let (enriched, summary) = coordinator.enrich_all(records).await;
        write_enriched_csv(output, &enriched).await?;
        Ok((enriched, summary))
    }

    /// Enrichment stage fed from a discovery CSV on disk
    pub async fn enrich_file(
        &self,
        input: &Path,
        workers: Option<usize>,
        output: &Path,
    ) -> ScrapeResult<(Vec<Record>, EnrichmentSummary)> {
        let records = read_discovery_csv(input).await?;
        info!("📂 Loaded {} startups from {}", records.len(), input.display());
        self.run_enrichment(records, workers, output).await
    }

    /// Both stages back to back, using the configured output paths
    pub async fn run_all(&self, target: Option<usize>, workers: Option<usize>) -> ScrapeResult<Vec<Record>> {
        let output = &self.config.output;
        let report = self.run_discovery(target, &output.discovery_csv).await?;
        let (enriched, _) = self
            .run_enrichment(report.records, workers, &output.enriched_csv)
            .await?;
        Ok(enriched)
    }

    pub async fn shutdown(&self) {
        if let Err(e) = self.factory.shutdown().await {
            warn!("⚠️ Renderer shutdown failed: {}", e);
        }
    }
}
