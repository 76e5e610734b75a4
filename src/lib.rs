//! YC Directory Crawler
//!
//! Two-stage scraper for the Y Combinator company directory. Discovery
//! scrolls the infinite listing page and collects one partial record per
//! company card; enrichment visits every company's detail page with a
//! bounded pool of renderer sessions and fills in founder names and
//! profile links, keeping the discovery order.

// Module declarations
pub mod crawling;
pub mod domain;
pub mod infrastructure;
pub mod test_utils;

pub use crawling::PipelineDriver;
pub use domain::{FounderInfo, Record};
pub use infrastructure::{AppConfig, ScrapeError, ScrapeResult};
