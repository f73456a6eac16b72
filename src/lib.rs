//! Quote-Crawler: a bounded, quota-aware quotes crawler
//!
//! This crate walks a small link graph (listing pages, detail pages and their
//! paginated continuations), extracts quote records, and stops once a target
//! record count or page-depth ceiling is reached.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawl runs
///
/// Per-task failures (fetch exhaustion, malformed pages) never surface here;
/// only startup problems and sink failures end a run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sink error: {source} ({lost} record(s) not persisted)")]
    Sink {
        source: output::SinkError,
        lost: usize,
    },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<output::SinkError> for CrawlError {
    fn from(source: output::SinkError) -> Self {
        CrawlError::Sink { source, lost: 0 }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlTask, RunSummary, TaskRole};
pub use record::Record;
pub use state::{RunState, TaskState};
pub use url::normalize_url;
