//! Error taxonomy for the discovery and enrichment stages
//!
//! Every failure that can happen inside one listing item or one detail page
//! is expressed here so the caller can decide whether to skip, degrade or abort.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    /// A wait or navigation exceeded its deadline. Callers degrade and continue.
    #[error("Render timeout after {timeout_ms}ms waiting for '{target}'")]
    RenderTimeout { target: String, timeout_ms: u64 },

    /// A sub-selector found nothing where a field was expected.
    #[error("Field '{field}' not found (selector: {selector})")]
    FieldExtractionFailure { field: String, selector: String },

    /// The automation handle could not be created or stopped responding.
    #[error("Renderer session failure: {message}")]
    SessionFailure { message: String },

    /// A result slot was written twice or read before being written.
    #[error("Result aggregation failed at position {position}: {reason}")]
    AggregationFailure { position: usize, reason: String },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request failed: {status} - {url}")]
    HttpStatus { status: u16, url: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed tabular data at line {line}: {reason}")]
    Persistence { line: usize, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ScrapeError {
    pub fn render_timeout(target: &str, timeout: std::time::Duration) -> Self {
        Self::RenderTimeout {
            target: target.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn field_missing(field: &str, selector: &str) -> Self {
        Self::FieldExtractionFailure {
            field: field.to_string(),
            selector: selector.to_string(),
        }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::SessionFailure {
            message: message.into(),
        }
    }

    pub fn invalid_selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether the stage can keep going after this error (skip item / degrade page)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::RenderTimeout { .. } => true,
            Self::FieldExtractionFailure { .. } => true,
            Self::HttpStatus { status, .. } => *status < 500,
            Self::Http(e) => e.is_timeout(),
            Self::SessionFailure { .. } => false,
            Self::AggregationFailure { .. } => false,
            Self::InvalidSelector { .. } => false,
            Self::Io(_) => false,
            Self::Persistence { .. } => false,
            Self::Configuration { .. } => false,
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
