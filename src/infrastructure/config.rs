//! Configuration infrastructure
//!
//! Configuration is layered:
//! 1. Built-in defaults (`defaults` / `yc` constants below)
//! 2. Optional config file (JSON or TOML, picked by extension)
//! 3. Environment variables prefixed with `YCDC`, e.g. `YCDC_ENRICHMENT__MAX_CONCURRENT=8`

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::info;

use crate::infrastructure::scrape_error::{ScrapeError, ScrapeResult};

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub discovery: DiscoveryConfig,
    pub enrichment: EnrichmentConfig,
    pub renderer: RendererConfig,
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Target site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Origin used to absolutize protocol-relative and root-relative hrefs
    pub origin: String,

    /// Listing page the discovery stage scrolls through
    pub listing_url: String,
}

/// Discovery stage (scroll loop) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Desired minimum number of unique listing items
    pub target_count: usize,

    /// Pause after the listing page opens, before the first height reading
    pub initial_settle_ms: u64,

    /// Pause after each scroll so new content can render
    pub scroll_settle_ms: u64,

    /// Hard cap on scroll iterations
    pub max_scrolls: u32,
}

/// Enrichment stage (detail pages) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Maximum concurrent detail-page workers (W)
    pub max_concurrent: usize,

    /// How long to wait for the founder name block before extracting anyway
    pub founder_wait_timeout_secs: u64,

    /// Marker a profile link must contain in the primary pass
    pub profile_domain_marker: String,

    /// Stricter marker used when scanning every link on the page
    pub profile_path_marker: String,

    /// Links containing this marker are never profile links (the org's own page)
    pub profile_exclusion_marker: String,

    /// Text marker of the role block that follows a founder's name
    pub founder_text_marker: String,
}

/// Which renderer engine drives the pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererEngine {
    /// Plain HTTP fetch; no script execution, scrolling is a no-op
    Http,
    /// Headless Chromium (requires the `chrome` cargo feature)
    Chrome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    pub engine: RendererEngine,

    /// Run the browser without a visible window
    pub headless: bool,

    pub window_width: u32,
    pub window_height: u32,

    /// Navigation / request timeout in seconds
    pub request_timeout_seconds: u64,

    pub user_agent: String,
}

/// CSS selectors for both stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub listing: ListingSelectors,
    pub detail: DetailSelectors,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// One element per company card
    pub item: String,
    pub name: String,
    pub batch: String,
    pub description: String,
    /// Link to the detail page inside the card. Empty: the card itself is the anchor
    pub detail_link: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailSelectors {
    /// Waited on before extraction starts
    pub founder_name_block: String,
    /// One block per founder
    pub founder_container: String,
    /// Name element inside a founder block
    pub founder_name: String,
    /// Link elements inside a founder block
    pub founder_link: String,
    /// Broad layout blocks scanned by the "Founder" text fallback
    pub layout_block: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub discovery_csv: PathBuf,
    pub enriched_csv: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs in the log file
    pub json_format: bool,

    pub console_output: bool,
    pub file_output: bool,

    /// Log directory. Empty: `logs/` next to the executable
    pub log_dir: String,

    /// Number of log files to keep (older files will be deleted)
    pub max_files: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            discovery: DiscoveryConfig::default(),
            enrichment: EnrichmentConfig::default(),
            renderer: RendererConfig::default(),
            selectors: SelectorConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: yc::ORIGIN.to_string(),
            listing_url: yc::COMPANIES_URL.to_string(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            target_count: defaults::TARGET_COUNT,
            initial_settle_ms: defaults::INITIAL_SETTLE_MS,
            scroll_settle_ms: defaults::SCROLL_SETTLE_MS,
            max_scrolls: defaults::MAX_SCROLLS,
        }
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::ENRICHMENT_MAX_CONCURRENT,
            founder_wait_timeout_secs: defaults::FOUNDER_WAIT_TIMEOUT_SECS,
            profile_domain_marker: yc::PROFILE_DOMAIN_MARKER.to_string(),
            profile_path_marker: yc::PROFILE_PATH_MARKER.to_string(),
            profile_exclusion_marker: yc::PROFILE_EXCLUSION_MARKER.to_string(),
            founder_text_marker: yc::FOUNDER_TEXT_MARKER.to_string(),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            engine: RendererEngine::Http,
            headless: true,
            window_width: defaults::WINDOW_WIDTH,
            window_height: defaults::WINDOW_HEIGHT,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            listing: ListingSelectors {
                item: yc::selectors::ITEM.to_string(),
                name: yc::selectors::NAME.to_string(),
                batch: yc::selectors::BATCH.to_string(),
                description: yc::selectors::DESCRIPTION.to_string(),
                detail_link: String::new(),
            },
            detail: DetailSelectors {
                founder_name_block: yc::selectors::FOUNDER_NAME_BLOCK.to_string(),
                founder_container: yc::selectors::FOUNDER_CONTAINER.to_string(),
                founder_name: yc::selectors::FOUNDER_NAME.to_string(),
                founder_link: yc::selectors::FOUNDER_LINK.to_string(),
                layout_block: yc::selectors::LAYOUT_BLOCK.to_string(),
            },
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            discovery_csv: PathBuf::from(defaults::DISCOVERY_CSV),
            enriched_csv: PathBuf::from(defaults::ENRICHED_CSV),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: String::new(),
            max_files: defaults::LOG_MAX_FILES,
        }
    }
}

impl DiscoveryConfig {
    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

impl EnrichmentConfig {
    pub fn founder_wait_timeout(&self) -> Duration {
        Duration::from_secs(self.founder_wait_timeout_secs)
    }
}

impl RendererConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl AppConfig {
    /// 설정값 유효성 검증
    pub fn validate(&self) -> ScrapeResult<()> {
        if self.enrichment.max_concurrent == 0 {
            return Err(ScrapeError::configuration(
                "enrichment.max_concurrent must be greater than 0",
            ));
        }
        if self.enrichment.founder_wait_timeout_secs == 0 {
            return Err(ScrapeError::configuration(
                "enrichment.founder_wait_timeout_secs must be greater than 0",
            ));
        }
        if self.renderer.request_timeout_seconds == 0 {
            return Err(ScrapeError::configuration(
                "renderer.request_timeout_seconds must be greater than 0",
            ));
        }
        url::Url::parse(&self.site.origin).map_err(|e| {
            ScrapeError::configuration(format!("site.origin '{}' is not a URL: {}", self.site.origin, e))
        })?;

        let listing = &self.selectors.listing;
        let detail = &self.selectors.detail;
        let mut selectors = vec![
            &listing.item,
            &listing.name,
            &listing.batch,
            &listing.description,
            &detail.founder_name_block,
            &detail.founder_container,
            &detail.founder_name,
            &detail.founder_link,
            &detail.layout_block,
        ];
        if !listing.detail_link.is_empty() {
            selectors.push(&listing.detail_link);
        }
        for selector in selectors {
            Selector::parse(selector).map_err(|e| ScrapeError::invalid_selector(selector, e))?;
        }
        Ok(())
    }
}

/// Configuration loader for the layered sources
pub struct ConfigManager {
    pub config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get user config directory")?
            .join(defaults::APP_DIR_NAME);

        Ok(config_dir)
    }

    /// Uses `path` when given, otherwise `<config_dir>/yc-directory-crawler/config.json` if it exists
    pub fn new(path: Option<PathBuf>) -> Self {
        let config_path = path.or_else(|| {
            Self::get_config_dir()
                .ok()
                .map(|dir| dir.join(defaults::CONFIG_FILE_NAME))
                .filter(|p| p.exists())
        });
        Self { config_path }
    }

    /// defaults → file → `YCDC_*` environment
    pub fn load(&self) -> Result<AppConfig> {
        let defaults = config::Config::try_from(&AppConfig::default())
            .context("Failed to serialize default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = &self.config_path {
            info!("📄 Loading configuration from {:?}", path);
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration as pretty JSON
    pub async fn write_default(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(&AppConfig::default())
            .context("Failed to serialize configuration")?;
        fs::write(path, content)
            .await
            .with_context(|| format!("Failed to write configuration file: {:?}", path))?;

        info!("Saved default configuration to: {:?}", path);
        Ok(())
    }
}

/// Y Combinator company directory constants
pub mod yc {
    pub const ORIGIN: &str = "https://www.ycombinator.com";

    pub const COMPANIES_URL: &str = "https://www.ycombinator.com/companies";

    pub const PROFILE_DOMAIN_MARKER: &str = "linkedin.com";

    pub const PROFILE_PATH_MARKER: &str = "/in/";

    /// YC's own LinkedIn school page shows up on every company page
    pub const PROFILE_EXCLUSION_MARKER: &str = "linkedin.com/school/y-combinator";

    pub const FOUNDER_TEXT_MARKER: &str = "Founder";

    pub mod selectors {
        // 해시가 붙은 클래스명은 배포마다 바뀌므로 부분 일치로 잡는다
        pub const ITEM: &str = "a[class*='_company_']";
        pub const NAME: &str = "span[class*='_coName_']";
        // 첫 번째 pill이 배치 라벨 (뒤에 업종 태그가 따라옴)
        pub const BATCH: &str = "span[class*='_pill_']";
        pub const DESCRIPTION: &str = "span[class*='_coDescription_']";

        pub const FOUNDER_NAME_BLOCK: &str = "div.ycdc-card-new div.font-bold";
        pub const FOUNDER_CONTAINER: &str = "div.ycdc-card-new";
        pub const FOUNDER_NAME: &str = "div.font-bold";
        pub const FOUNDER_LINK: &str = "a[href]";
        pub const LAYOUT_BLOCK: &str = "div";
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "yc-directory-crawler";
    pub const CONFIG_FILE_NAME: &str = "config.json";
    pub const ENV_PREFIX: &str = "YCDC";

    pub const TARGET_COUNT: usize = 500;
    pub const INITIAL_SETTLE_MS: u64 = 3000;
    pub const SCROLL_SETTLE_MS: u64 = 2000;
    pub const MAX_SCROLLS: u32 = 1000;

    pub const ENRICHMENT_MAX_CONCURRENT: usize = 5;
    pub const FOUNDER_WAIT_TIMEOUT_SECS: u64 = 8;

    pub const WINDOW_WIDTH: u32 = 1920;
    pub const WINDOW_HEIGHT: u32 = 1080;
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

    pub const DISCOVERY_CSV: &str = "yc_startups.csv";
    pub const ENRICHED_CSV: &str = "yc_startups_with_founders.csv";

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_MAX_FILES: u32 = 5;
}
