//! Infrastructure layer: configuration, logging, page rendering, HTML
//! querying and CSV persistence.

pub mod config;
pub mod html_parser;
pub mod logging;
pub mod persistence;
pub mod renderer;
pub mod scrape_error;

// Re-export commonly used items
pub use config::{AppConfig, ConfigManager, yc};
pub use logging::{get_log_directory, init_logging_with_config};
pub use renderer::{PageSnapshot, RendererFactory, RendererSession, build_factory, with_session};
pub use scrape_error::{ScrapeError, ScrapeResult};
