//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML run
//! configuration, and deriving the seed tasks a run starts from.
//!
//! # Example
//!
//! ```no_run
//! use quote_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawl.toml")).unwrap();
//! println!("Collecting {} quotes", config.crawl.results_wanted);
//! ```

mod parser;
mod seeds;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlConfig, FetchConfig, FollowLinkPolicy, OutputConfig, OutputFormat, ProxyConfig,
    ProxyRotation, SchedulingMode, SeedConfig, StartUrls,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use seeds::{derive_start_url, seed_role, seed_tasks};
pub use validation::validate;
