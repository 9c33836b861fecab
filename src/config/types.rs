use serde::Deserialize;

/// Browser identification sent with every listing request
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/111.0.0.0 Safari/537.36";

/// Main configuration structure for Recipe-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Search keywords crawled one after another
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Target site locations
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Search listing base; pages are `<search-url>/<category>?page=<n>`
    #[serde(rename = "search-url", default = "default_search_url")]
    pub search_url: String,

    /// Base that recipe slugs are resolved against
    #[serde(rename = "recipe-url", default = "default_recipe_url")]
    pub recipe_url: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Highest page number requested for each category
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum number of in-flight requests against the target domain
    #[serde(
        rename = "max-concurrent-requests",
        default = "default_max_concurrent_requests"
    )]
    pub max_concurrent_requests: u32,

    /// Fixed pause each worker slot takes after a request (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Upper bound of the random pause added to `delay-ms` (milliseconds)
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for timeouts and 5xx/429 responses
    #[serde(rename = "retry-attempts", default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Pause between retry attempts (milliseconds)
    #[serde(rename = "retry-delay-ms", default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(default = "default_user_agent")]
    pub value: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            recipe_url: default_recipe_url(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            max_concurrent_requests: default_max_concurrent_requests(),
            delay_ms: default_delay_ms(),
            jitter_ms: default_jitter_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            value: default_user_agent(),
        }
    }
}

fn default_categories() -> Vec<String> {
    ["ayam", "sayur", "ikan", "kue", "telur", "sapi", "daging"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_search_url() -> String {
    "https://cookpad.com/id/cari".to_string()
}

fn default_recipe_url() -> String {
    "https://cookpad.com/id/resep/".to_string()
}

fn default_max_pages() -> u32 {
    500
}

fn default_max_concurrent_requests() -> u32 {
    50
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_jitter_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
