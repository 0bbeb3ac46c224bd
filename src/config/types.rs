use crate::storage::BackoffPolicy;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Recrawl-Robot
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

/// Backing store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,
}

/// Fetch and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Politeness delay after every fetch (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Sleep when no task is eligible (milliseconds)
    #[serde(rename = "idle-poll-ms", default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,

    /// Time between successful fetches of the same URL (seconds)
    #[serde(rename = "recrawl-every-secs", default = "default_recrawl_every_secs")]
    pub recrawl_every_secs: u64,

    /// Upper bound on the failure backoff (seconds)
    #[serde(rename = "max-backoff-secs", default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Largest exponent used by the failure backoff
    #[serde(rename = "backoff-cap-exponent", default = "default_backoff_cap_exponent")]
    pub backoff_cap_exponent: u32,
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn recrawl_interval(&self) -> Duration {
        Duration::from_secs(self.recrawl_every_secs)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_backoff_secs: self.max_backoff_secs,
            cap_exponent: self.backoff_cap_exponent,
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            delay_ms: default_delay_ms(),
            idle_poll_ms: default_idle_poll_ms(),
            recrawl_every_secs: default_recrawl_every_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            backoff_cap_exponent: default_backoff_cap_exponent(),
        }
    }
}

/// Plain-text corpus output
#[derive(Debug, Clone, Deserialize)]
pub struct TextConfig {
    /// Directory receiving one `.txt` file per changed document; disabled when unset
    #[serde(rename = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Extracted texts shorter than this (in characters) are not written
    #[serde(rename = "min-chars", default = "default_min_chars")]
    pub min_chars: usize,
}

/// A named logical crawl and how its URLs are seeded
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Tag stored with every task and document of this source
    pub name: String,

    pub seed: SeedConfig,
}

/// Where a source's initial URLs come from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SeedConfig {
    /// One URL per line
    SeedFile { path: PathBuf },

    /// Pages of a MediaWiki category
    WikiCategory {
        /// MediaWiki `api.php` endpoint
        api: String,

        /// Full category title, including the namespace prefix
        category: String,

        /// Page URL template with a `{pageid}` placeholder
        #[serde(rename = "page-url-pattern")]
        page_url_pattern: String,

        /// Stop after this many pages
        #[serde(rename = "max-seed", default)]
        max_seed: Option<u32>,
    },
}

pub const PAGE_ID_PLACEHOLDER: &str = "{pageid}";
pub const DEFAULT_MAX_SEED: u32 = 50_000;

fn default_user_agent() -> String {
    "recrawl-robot/1.0".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_delay_ms() -> u64 {
    200
}

fn default_idle_poll_ms() -> u64 {
    250
}

fn default_recrawl_every_secs() -> u64 {
    86_400
}

fn default_max_backoff_secs() -> u64 {
    3600
}

fn default_backoff_cap_exponent() -> u32 {
    12
}

fn default_min_chars() -> usize {
    800
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            min_chars: default_min_chars(),
        }
    }
}
