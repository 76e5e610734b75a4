//! Domain module - the record model shared by both crawling stages

pub mod record;

pub use record::{FounderInfo, Record};
