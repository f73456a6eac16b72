//! Crawler module for page fetching and crawl orchestration
//!
//! This module contains the core crawling logic, including:
//! - Crawl tasks and the bounded frontier
//! - HTTP fetching with retry, backoff and proxy fallback
//! - Record and link extraction
//! - Overall crawl coordination in sequential or pool mode

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod proxy;
mod task;

pub use coordinator::{run_crawl, Coordinator, CrawlSettings, RunSummary};
pub use extractor::{Extractor, ParsedPage, QuotesExtractor};
pub use fetcher::{
    build_http_client, classify, FetchError, FetchErrorKind, FetchPolicy, FetchRequest,
    FetchResult, Fetcher, ReqwestTransport, RetryState, Transport, TransportError, USER_AGENTS,
};
pub use frontier::{Frontier, PushOutcome};
pub use proxy::{proxy_supplier_from_config, NoProxy, ProxyRotator, ProxySupplier};
pub use task::{CrawlTask, TaskRole};
