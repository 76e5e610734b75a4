//! # Workers
//!
//! Detail-page enrichment: one worker visit per record, in its own session.
//! - `founder_extractor`: 동기 HTML 추출 (전략 목록 순서대로)
//! - `enrichment_worker`: 세션 획득/해제 + 오류 격리

pub mod enrichment_worker;
pub mod founder_extractor;

pub use enrichment_worker::{EnrichmentOutcome, EnrichmentWorker};
pub use founder_extractor::FounderExtractor;
