//! # Crawling stages
//!
//! - `discovery`: listing-page scroll loop → partial records
//! - `workers`: per-record detail page visit → founders
//! - `coordinator`: bounded fan-out of workers, order-preserving merge
//! - `pipeline`: stage driver with CSV persistence

pub mod coordinator;
pub mod discovery;
pub mod pipeline;
pub mod workers;

pub use coordinator::{EnrichmentCoordinator, EnrichmentSummary, ResultArena};
pub use discovery::{DiscoveryLoop, DiscoveryReport, ScrollState};
pub use pipeline::PipelineDriver;
pub use workers::{EnrichmentOutcome, EnrichmentWorker, FounderExtractor};
