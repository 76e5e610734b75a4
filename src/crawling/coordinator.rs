//! # Enrichment Coordinator
//!
//! Fans the records out to at most `max_concurrent` worker tasks and merges
//! the results back in discovery order. Each task owns one slot of a
//! fixed-size arena, indexed by the record's position, and writes it at most
//! once. A task that panics or fails to join leaves its slot empty and the
//! record keeps empty founder fields.

use futures::future::join_all;
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tracing::{error, info};

use super::workers::{EnrichmentOutcome, EnrichmentWorker};
use crate::domain::{FounderInfo, Record};
use crate::infrastructure::renderer::RendererFactory;
use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// One write-once slot per record position
#[derive(Debug)]
pub struct ResultArena {
    slots: Vec<OnceLock<FounderInfo>>,
}

impl ResultArena {
    pub fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn store(&self, position: usize, founders: FounderInfo) -> ScrapeResult<()> {
        let slot = self.slots.get(position).ok_or_else(|| ScrapeError::AggregationFailure {
            position,
            reason: format!("position out of range (arena holds {})", self.slots.len()),
        })?;
        slot.set(founders).map_err(|_| ScrapeError::AggregationFailure {
            position,
            reason: "slot already written".to_string(),
        })
    }

    /// Slot contents in position order; unwritten slots are empty results
    pub fn collect(&self) -> Vec<FounderInfo> {
        self.slots
            .iter()
            .map(|slot| slot.get().cloned().unwrap_or_default())
            .collect()
    }
}

/// Per-run tally of task outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    pub total: usize,
    pub found: usize,
    pub empty: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl EnrichmentSummary {
    fn count(&mut self, outcome: &EnrichmentOutcome) {
        match outcome {
            EnrichmentOutcome::Found(_) => self.found += 1,
            EnrichmentOutcome::Empty => self.empty += 1,
            EnrichmentOutcome::Skipped => self.skipped += 1,
            EnrichmentOutcome::Failed(_) => self.failed += 1,
        }
    }
}

pub struct EnrichmentCoordinator {
    factory: Arc<dyn RendererFactory>,
    worker: Arc<EnrichmentWorker>,
    max_concurrent: usize,
}

impl EnrichmentCoordinator {
    pub fn new(factory: Arc<dyn RendererFactory>, worker: EnrichmentWorker, max_concurrent: usize) -> Self {
        Self {
            factory,
            worker: Arc::new(worker),
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Enrich every record; output has the same length and order as `records`
    pub async fn enrich_all(&self, records: Vec<Record>) -> (Vec<Record>, EnrichmentSummary) {
        let total = records.len();
        info!("🔍 Enriching {} startups with {} workers", total, self.max_concurrent);

        let records = Arc::new(records);
        let arena = Arc::new(ResultArena::new(total));
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let tasks: Vec<_> = (0..total)
            .map(|position| {
                let records = Arc::clone(&records);
                let arena = Arc::clone(&arena);
                let semaphore = Arc::clone(&semaphore);
                let factory = Arc::clone(&self.factory);
                let worker = Arc::clone(&self.worker);

                tokio::spawn(async move {
                    // permit first: never more than `max_concurrent` live sessions
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            error!("Semaphore closed before task {} could start: {}", position, e);
                            return EnrichmentOutcome::Failed(e.to_string());
                        }
                    };

                    let record = &records[position];
                    let outcome = worker.enrich(factory.as_ref(), position, record).await;

                    let stored = arena.store(position, outcome.clone().into_founders());
                    if let Err(e) = &stored {
                        error!("{}", e);
                    }
                    debug_assert!(stored.is_ok(), "result slot {} written twice", position);

                    let founders = match &outcome {
                        EnrichmentOutcome::Found(info) => info.names.len(),
                        _ => 0,
                    };
                    info!(
                        "[{}/{}] {} → {} ({} founders)",
                        position + 1,
                        total,
                        record.name,
                        outcome.label(),
                        founders
                    );
                    outcome
                })
            })
            .collect();

        let mut summary = EnrichmentSummary {
            total,
            ..EnrichmentSummary::default()
        };
        for (position, joined) in join_all(tasks).await.into_iter().enumerate() {
            match joined {
                Ok(outcome) => summary.count(&outcome),
                Err(e) => {
                    error!("💥 Enrichment task {} did not complete: {}", position + 1, e);
                    summary.failed += 1;
                }
            }
        }

        let founders = arena.collect();
        let records = Arc::try_unwrap(records).unwrap_or_else(|shared| shared.as_ref().clone());
        let merged: Vec<Record> = records
            .into_iter()
            .zip(founders)
            .map(|(record, info)| record.with_founders(info))
            .collect();

        info!(
            "🏁 Enrichment done: {} found, {} empty, {} skipped, {} failed (of {})",
            summary.found, summary.empty, summary.skipped, summary.failed, summary.total
        );
        (merged, summary)
    }
}
