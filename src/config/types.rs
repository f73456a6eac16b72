use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub seeds: SeedConfig,
    pub fetch: FetchConfig,
    pub proxy: ProxyConfig,
    pub output: OutputConfig,
}

/// Quota, depth and scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// Number of records to collect before stopping
    pub results_wanted: u32,

    /// Page-depth ceiling for paginated continuations
    pub max_pages: u32,

    /// Sequential or bounded-pool scheduling
    pub mode: SchedulingMode,

    /// Number of workers in pool mode
    pub workers: u32,

    /// Maximum number of pending tasks in the frontier
    pub frontier_capacity: u32,

    /// How follow links from listing pages are admitted near the quota
    pub follow_link_policy: FollowLinkPolicy,

    /// Optional wall-clock limit for the whole run, in seconds
    pub deadline_secs: Option<u64>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            results_wanted: 100,
            max_pages: 10,
            mode: SchedulingMode::Sequential,
            workers: 10,
            frontier_capacity: 100,
            follow_link_policy: FollowLinkPolicy::StopWhenQuotaMet,
            deadline_secs: None,
        }
    }
}

/// Scheduling model for the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingMode {
    /// One task at a time, in exact BFS order
    Sequential,
    /// A fixed-size pool of concurrent workers
    Pool,
}

/// Policy for enqueuing follow links discovered on listing pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FollowLinkPolicy {
    /// Enqueue every follow link
    Unbounded,
    /// Stop enqueuing once the quota has been met
    StopWhenQuotaMet,
    /// Enqueue at most as many links as records are still wanted
    CapToRemaining,
}

/// Seed configuration
///
/// Explicit start URLs win; otherwise a single seed is derived from the
/// topic, author search or author letter, in that order. Explicit URLs may
/// come from `start-urls`, `start-url` and `url` together.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SeedConfig {
    pub start_urls: StartUrls,
    pub start_url: String,
    pub url: String,
    pub author_letter: String,
    pub search_author: String,
    pub topic: String,
    pub base_url: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            start_urls: StartUrls::default(),
            start_url: String::new(),
            url: String::new(),
            author_letter: String::new(),
            search_author: String::new(),
            topic: String::new(),
            base_url: "https://www.azquotes.com".to_string(),
        }
    }
}

impl SeedConfig {
    /// Returns every explicit start URL: `start-urls`, then `start-url`, then `url`
    pub fn explicit_urls(&self) -> Vec<String> {
        let mut urls = self.start_urls.urls();
        urls.extend(
            [&self.start_url, &self.url]
                .into_iter()
                .map(|u| u.trim())
                .filter(|u| !u.is_empty())
                .map(str::to_string),
        );
        urls
    }
}

/// Start URLs, given either as a list or as one newline/comma separated string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StartUrls {
    List(Vec<String>),
    Text(String),
}

impl Default for StartUrls {
    fn default() -> Self {
        StartUrls::List(Vec::new())
    }
}

impl StartUrls {
    /// Returns the non-empty, trimmed URLs in declaration order
    pub fn urls(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            StartUrls::List(list) => list.iter().map(String::as_str).collect(),
            StartUrls::Text(text) => text.split(['\n', ',']).collect(),
        };

        raw.into_iter()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Attempts per fetch before the final direct fallback
    pub max_attempts: u32,

    /// Hard wall-clock limit per attempt (milliseconds)
    pub attempt_timeout_ms: u64,

    /// First backoff interval (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound on any backoff interval (milliseconds)
    pub backoff_cap_ms: u64,

    /// Lower bound of the pre-request jitter (milliseconds)
    pub min_delay_ms: u64,

    /// Upper bound of the pre-request jitter (milliseconds)
    pub max_delay_ms: u64,

    /// Referer header sent with every request
    pub referer: String,

    /// Replaces the built-in User-Agent pool when non-empty
    pub user_agents: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout_ms: 10_000,
            backoff_base_ms: 500,
            backoff_cap_ms: 2_000,
            min_delay_ms: 100,
            max_delay_ms: 500,
            referer: "https://www.azquotes.com/".to_string(),
            user_agents: Vec::new(),
        }
    }
}

impl FetchConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }
}

/// Proxy configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyConfig {
    /// Proxy endpoints; empty means every request goes direct
    pub urls: Vec<String>,

    /// How the next proxy is chosen for each fetch
    pub rotation: ProxyRotation,
}

/// Proxy selection strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyRotation {
    #[default]
    RoundRobin,
    Random,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Sink implementation
    pub format: OutputFormat,

    /// Path to the SQLite database or JSON Lines file
    pub path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Sqlite,
            path: "./quotes.db".to_string(),
        }
    }
}

/// Sink implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Sqlite,
    JsonLines,
}
