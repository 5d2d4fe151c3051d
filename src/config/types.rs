use serde::Deserialize;

/// Main configuration structure for the prefetcher
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(rename = "cache-warming", default)]
    pub cache_warming: CacheWarmingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(rename = "addon", default)]
    pub addons: Vec<AddonEntry>,
    #[serde(rename = "catalog", default)]
    pub catalogs: Vec<CatalogEntry>,
}

/// Where run data and summaries are written
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file holding freshness records and runs
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout, as a duration string
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: String,

    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Optional HTTP(S) proxy for every outgoing request
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

/// Crawl limits and pacing
///
/// Every limit accepts -1 for "unlimited".
#[derive(Debug, Clone, Deserialize)]
pub struct PrefetchConfig {
    #[serde(rename = "movies-global-limit", default = "default_movies_global")]
    pub movies_global_limit: i64,

    #[serde(rename = "series-global-limit", default = "default_series_global")]
    pub series_global_limit: i64,

    #[serde(rename = "movies-per-catalog", default = "default_movies_per_catalog")]
    pub movies_per_catalog: i64,

    #[serde(rename = "series-per-catalog", default = "default_series_per_catalog")]
    pub series_per_catalog: i64,

    #[serde(rename = "items-per-mixed-catalog", default = "default_items_per_mixed")]
    pub items_per_mixed_catalog: i64,

    /// Sleep after every networked item and every warm request
    #[serde(default = "default_delay")]
    pub delay: String,

    /// How long a prefetched item stays fresh; -1 keeps it fresh forever
    #[serde(rename = "cache-validity", default = "default_cache_validity")]
    pub cache_validity: String,

    /// Wall-clock budget for one run; -1 disables the budget
    #[serde(rename = "max-execution-time", default = "default_max_execution_time")]
    pub max_execution_time: String,

    #[serde(rename = "randomize-catalogs", default)]
    pub randomize_catalogs: bool,

    #[serde(rename = "randomize-items", default)]
    pub randomize_items: bool,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            movies_global_limit: default_movies_global(),
            series_global_limit: default_series_global(),
            movies_per_catalog: default_movies_per_catalog(),
            series_per_catalog: default_series_per_catalog(),
            items_per_mixed_catalog: default_items_per_mixed(),
            delay: default_delay(),
            cache_validity: default_cache_validity(),
            max_execution_time: default_max_execution_time(),
            randomize_catalogs: false,
            randomize_items: false,
        }
    }
}

/// Stream cache warming settings
#[derive(Debug, Clone, Deserialize)]
pub struct CacheWarmingConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Regular expression that marks a stream as already cached upstream
    #[serde(rename = "cached-stream-regex", default = "default_cached_regex")]
    pub cached_stream_regex: String,

    #[serde(rename = "max-requests-per-item", default = "default_per_item")]
    pub max_requests_per_item: u32,

    #[serde(rename = "max-requests-global", default = "default_global")]
    pub max_requests_global: u32,

    /// Warming is skipped when more than this many streams are already cached
    #[serde(rename = "cached-streams-threshold", default)]
    pub cached_streams_threshold: u32,
}

impl Default for CacheWarmingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cached_stream_regex: default_cached_regex(),
            max_requests_per_item: default_per_item(),
            max_requests_global: default_global(),
            cached_streams_threshold: 0,
        }
    }
}

/// Recurring run schedule
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(rename = "entry", default)]
    pub entries: Vec<ScheduleEntryConfig>,
}

/// One `[[schedule.entry]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleEntryConfig {
    /// Local time of day, "HH:MM"
    pub time: String,

    /// Weekdays, 0 = Monday through 6 = Sunday
    pub days: Vec<i64>,
}

/// What an addon is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddonKind {
    Catalog,
    Stream,
    Both,
}

impl AddonKind {
    pub fn serves_catalogs(&self) -> bool {
        matches!(self, Self::Catalog | Self::Both)
    }

    pub fn serves_streams(&self) -> bool {
        matches!(self, Self::Stream | Self::Both)
    }
}

/// A configured addon endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct AddonEntry {
    pub url: String,
    pub kind: AddonKind,
}

/// A catalog selected for prefetching
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "addon-url")]
    pub addon_url: String,

    #[serde(rename = "catalog-id")]
    pub catalog_id: String,

    /// "movie", "series" or "mixed"
    #[serde(rename = "catalog-type")]
    pub catalog_type: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub order: u32,

    /// Display name; the catalog id is used when absent
    #[serde(default)]
    pub name: Option<String>,
}

fn default_request_timeout() -> String {
    "30s".to_string()
}

fn default_user_agent() -> String {
    format!("streams-prefetcher/{}", env!("CARGO_PKG_VERSION"))
}

fn default_movies_global() -> i64 {
    200
}

fn default_series_global() -> i64 {
    15
}

fn default_movies_per_catalog() -> i64 {
    50
}

fn default_series_per_catalog() -> i64 {
    3
}

fn default_items_per_mixed() -> i64 {
    20
}

fn default_delay() -> String {
    "2s".to_string()
}

fn default_cache_validity() -> String {
    "1w".to_string()
}

fn default_max_execution_time() -> String {
    "90m".to_string()
}

fn default_cached_regex() -> String {
    "⚡".to_string()
}

fn default_per_item() -> u32 {
    1
}

fn default_global() -> u32 {
    50
}

fn default_true() -> bool {
    true
}
