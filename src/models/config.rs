//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP and retry behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Pagination and pacing rules
    #[serde(default)]
    pub scan: ScanConfig,

    /// Source site layout
    #[serde(default)]
    pub site: SiteConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("cannot read {}: {e}", path.display())))?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.crawler.base_url)
            .map_err(|e| AppError::validation(format!("crawler.base_url: {e}")))?;
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.scan.unchanged_limit == 0 {
            return Err(AppError::validation("scan.unchanged_limit must be > 0"));
        }
        if self.scan.interval_secs == 0 {
            return Err(AppError::validation("scan.interval_secs must be > 0"));
        }
        if !self.site.listing_path.contains("{page}") {
            return Err(AppError::validation(
                "site.listing_path must contain a {page} placeholder",
            ));
        }
        self.site.validate()
    }
}

/// HTTP client and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Origin every relative path is resolved against
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retry budget shared by rate-limit and network retries
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// Wait after an HTTP 429, in milliseconds
    #[serde(default = "defaults::rate_limit_backoff")]
    pub rate_limit_backoff_ms: u64,

    /// Wait after a connection failure, in milliseconds
    #[serde(default = "defaults::network_backoff")]
    pub network_backoff_ms: u64,
}

impl CrawlerConfig {
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn network_backoff(&self) -> Duration {
        Duration::from_millis(self.network_backoff_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            rate_limit_backoff_ms: defaults::rate_limit_backoff(),
            network_backoff_ms: defaults::network_backoff(),
        }
    }
}

/// Pagination, early-termination and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Consecutive unchanged items that end a run
    #[serde(default = "defaults::unchanged_limit")]
    pub unchanged_limit: u32,

    /// Pause between item extractions, in milliseconds
    #[serde(default = "defaults::item_delay")]
    pub item_delay_ms: u64,

    /// Pause between listing pages, in milliseconds
    #[serde(default = "defaults::page_delay")]
    pub page_delay_ms: u64,

    /// In-place retries for a listing page that failed with a non-404 error
    #[serde(default = "defaults::max_page_retries")]
    pub max_page_retries: u32,

    /// Hard cap on pages per run (unbounded when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,

    /// Interval between runs in watch mode, in seconds
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl ScanConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            unchanged_limit: defaults::unchanged_limit(),
            item_delay_ms: defaults::item_delay(),
            page_delay_ms: defaults::page_delay(),
            max_page_retries: defaults::max_page_retries(),
            max_pages: None,
            interval_secs: defaults::interval(),
        }
    }
}

/// Paths, CSS selectors and token patterns of the source site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Listing page path; `{page}` is replaced with the page number
    #[serde(default = "defaults::listing_path")]
    pub listing_path: String,

    /// AJAX playlist endpoint path
    #[serde(default = "defaults::playlist_path")]
    pub playlist_path: String,

    /// Selector for each item on a listing page
    #[serde(default = "defaults::item_selector")]
    pub item_selector: String,

    /// Selector for the detail link inside an item
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Selector for the title inside an item
    #[serde(default = "defaults::title_selector")]
    pub title_selector: String,

    /// Selector for the description on a detail page
    #[serde(default = "defaults::description_selector")]
    pub description_selector: String,

    /// Selector for the poster image on a detail page
    #[serde(default = "defaults::image_selector")]
    pub image_selector: String,

    /// Element carrying the content id as a data attribute
    #[serde(default = "defaults::news_id_selector")]
    pub news_id_selector: String,

    /// Name of that data attribute
    #[serde(default = "defaults::news_id_attr")]
    pub news_id_attr: String,

    /// Selector for entries inside the playlist fragment
    #[serde(default = "defaults::playlist_entry_selector")]
    pub playlist_entry_selector: String,

    /// Regex capturing the session hash in the page source
    #[serde(default = "defaults::login_hash_pattern")]
    pub login_hash_pattern: String,

    /// Regex capturing the content id in the page source
    #[serde(default = "defaults::news_id_pattern")]
    pub news_id_pattern: String,

    /// Regex capturing the episode count label in page text
    #[serde(default = "defaults::episode_count_pattern")]
    pub episode_count_pattern: String,
}

impl SiteConfig {
    /// Listing path for a page number.
    pub fn listing_path_for(&self, page: u32) -> String {
        self.listing_path.replace("{page}", &page.to_string())
    }

    fn validate(&self) -> Result<()> {
        for selector in [
            &self.item_selector,
            &self.link_selector,
            &self.title_selector,
            &self.description_selector,
            &self.image_selector,
            &self.news_id_selector,
            &self.playlist_entry_selector,
        ] {
            Selector::parse(selector)
                .map_err(|e| AppError::selector(selector, format!("{e:?}")))?;
        }
        for pattern in [
            &self.login_hash_pattern,
            &self.news_id_pattern,
            &self.episode_count_pattern,
        ] {
            let re = Regex::new(pattern)?;
            if re.captures_len() < 2 {
                return Err(AppError::validation(format!(
                    "pattern '{pattern}' needs a capture group"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_path: defaults::listing_path(),
            playlist_path: defaults::playlist_path(),
            item_selector: defaults::item_selector(),
            link_selector: defaults::link_selector(),
            title_selector: defaults::title_selector(),
            description_selector: defaults::description_selector(),
            image_selector: defaults::image_selector(),
            news_id_selector: defaults::news_id_selector(),
            news_id_attr: defaults::news_id_attr(),
            playlist_entry_selector: defaults::playlist_entry_selector(),
            login_hash_pattern: defaults::login_hash_pattern(),
            news_id_pattern: defaults::news_id_pattern(),
            episode_count_pattern: defaults::episode_count_pattern(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level filter (`RUST_LOG` takes precedence)
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    // Crawler defaults
    pub fn base_url() -> String {
        "https://anitube.in.ua".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn rate_limit_backoff() -> u64 {
        10_000
    }
    pub fn network_backoff() -> u64 {
        3_000
    }

    // Scan defaults
    pub fn unchanged_limit() -> u32 {
        30
    }
    pub fn item_delay() -> u64 {
        2_000
    }
    pub fn page_delay() -> u64 {
        1_000
    }
    pub fn max_page_retries() -> u32 {
        2
    }
    pub fn interval() -> u64 {
        3_600
    }

    // Site defaults
    pub fn listing_path() -> String {
        "/anime/page/{page}/".into()
    }
    pub fn playlist_path() -> String {
        "/engine/ajax/playlists.php".into()
    }
    pub fn item_selector() -> String {
        "article.story".into()
    }
    pub fn link_selector() -> String {
        ".story_c a".into()
    }
    pub fn title_selector() -> String {
        "h2".into()
    }
    pub fn description_selector() -> String {
        ".story_c_text .my-text".into()
    }
    pub fn image_selector() -> String {
        ".story_c_l img".into()
    }
    pub fn news_id_selector() -> String {
        ".playlists-ajax".into()
    }
    pub fn news_id_attr() -> String {
        "data-news_id".into()
    }
    pub fn playlist_entry_selector() -> String {
        ".playlists-videos li".into()
    }
    pub fn login_hash_pattern() -> String {
        r#"dle_login_hash\s*=\s*['"]([0-9a-fA-F]+)['"]"#.into()
    }
    pub fn news_id_pattern() -> String {
        r#"news_id\s*[=:]\s*['"]?(\d+)"#.into()
    }
    pub fn episode_count_pattern() -> String {
        r"(?i)(?:кількість\s+серій|серій|episodes)\s*:?\s*(\d+)".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
