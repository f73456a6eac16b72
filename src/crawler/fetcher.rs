//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - A [`Transport`] seam with a reqwest-backed implementation
//! - Jittered pre-request delay and rotating browser-like request identity
//! - A hard per-attempt timeout raced against the request
//! - Error classification
//! - Retry with exponential backoff and proxy-then-direct fallback

use crate::config::FetchConfig;
use crate::crawler::proxy::ProxySupplier;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default pool of User-Agent strings drawn from for each attempt
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// A successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Page body content
    pub body: String,

    /// Final URL after redirects
    pub final_url: String,
}

/// Classification of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Per-attempt timer fired, or the transport reported a timeout
    Timeout,
    /// HTTP 403/407/5xx while routed through a proxy
    ProxyError,
    /// Connection refused/reset at the transport level
    NetworkError,
    /// Anything else, e.g. a 404
    OtherError,
    /// A stop signal arrived before the next attempt
    Cancelled,
}

impl FetchErrorKind {
    /// Returns true for the failure kinds the retry policy exists for
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::ProxyError | Self::NetworkError)
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "Timeout",
            Self::ProxyError => "Proxy error",
            Self::NetworkError => "Network error",
            Self::OtherError => "Error",
            Self::Cancelled => "Cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Fetch failure surfaced after all attempts are exhausted
#[derive(Debug, Clone, Error)]
#[error("{kind} fetching {url} after {attempts} attempt(s): {message}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub url: String,
    pub message: String,
    pub attempts: u32,
}

/// Failure reported by a [`Transport`] for a single attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {code}")]
    Status { code: u16 },

    #[error("{0}")]
    Other(String),
}

/// One GET request as handed to a transport
#[derive(Debug, Clone)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub headers: Vec<(&'static str, String)>,
    pub proxy: Option<&'a str>,
}

/// Issues a single HTTP GET
///
/// Implementations must treat any non-2xx status as
/// [`TransportError::Status`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: FetchRequest<'_>) -> Result<FetchResult, TransportError>;
}

/// Classifies a transport failure for the retry policy
pub fn classify(error: &TransportError, via_proxy: bool) -> FetchErrorKind {
    match error {
        TransportError::Timeout(_) => FetchErrorKind::Timeout,
        TransportError::Connect(_) => FetchErrorKind::NetworkError,
        TransportError::Status { code } if via_proxy && (*code == 403 || *code == 407 || *code >= 500) => {
            FetchErrorKind::ProxyError
        }
        TransportError::Status { .. } | TransportError::Other(_) => FetchErrorKind::OtherError,
    }
}

/// Retry and fallback knobs for the fetcher
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub referer: String,
    pub user_agents: Vec<String>,
}

impl From<&FetchConfig> for FetchPolicy {
    fn from(config: &FetchConfig) -> Self {
        let user_agents = if config.user_agents.is_empty() {
            USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            config.user_agents.clone()
        };

        Self {
            max_attempts: config.max_attempts.max(1),
            attempt_timeout: config.attempt_timeout(),
            backoff_base: config.backoff_base(),
            backoff_cap: config.backoff_cap(),
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            referer: config.referer.clone(),
            user_agents,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl FetchPolicy {
    /// Backoff before the attempt following `attempt`: `min(base * 2^(attempt-1), cap)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_cap)
    }

    /// Random pre-request delay within `[min_delay, max_delay]`
    pub fn jitter(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        thread_rng().gen_range(self.min_delay..=self.max_delay)
    }

    /// Browser-like headers with a randomly drawn User-Agent
    pub fn request_headers(&self) -> Vec<(&'static str, String)> {
        let user_agent = self
            .user_agents
            .choose(&mut thread_rng())
            .cloned()
            .unwrap_or_else(|| USER_AGENTS[0].to_string());

        vec![
            ("User-Agent", user_agent),
            (
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
                    .to_string(),
            ),
            ("Accept-Language", "en-US,en;q=0.9".to_string()),
            ("Referer", self.referer.clone()),
            ("DNT", "1".to_string()),
            ("Upgrade-Insecure-Requests", "1".to_string()),
        ]
    }
}

/// Per-fetch retry state machine
///
/// The proxy is disabled by the first failure of a proxy-routed attempt;
/// `proxy_used` then earns one final direct attempt once the regular
/// attempts run out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    proxy: Option<String>,
    proxy_enabled: bool,
    proxy_used: bool,
    last_error: Option<(FetchErrorKind, String)>,
}

impl RetryState {
    pub fn new(proxy: Option<String>, max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            proxy_enabled: proxy.is_some(),
            proxy,
            proxy_used: false,
            last_error: None,
        }
    }

    /// Proxy the next attempt should be routed through
    pub fn route(&self) -> Option<&str> {
        if self.proxy_enabled {
            self.proxy.as_deref()
        } else {
            None
        }
    }

    /// Starts the next attempt and returns its 1-based number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        if self.route().is_some() {
            self.proxy_used = true;
        }
        self.attempt
    }

    /// Records a failed attempt; returns true if this failure disabled the proxy
    pub fn record_failure(&mut self, kind: FetchErrorKind, message: String, via_proxy: bool) -> bool {
        self.last_error = Some((kind, message));
        if via_proxy && self.proxy_enabled {
            self.proxy_enabled = false;
            return true;
        }
        false
    }

    pub fn has_attempts_left(&self) -> bool {
        self.attempt < self.max_attempts
    }

    pub fn proxy_enabled(&self) -> bool {
        self.proxy_enabled
    }

    /// True if any attempt went through a proxy
    pub fn proxy_used(&self) -> bool {
        self.proxy_used
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Converts the state into the error surfaced to the orchestrator
    pub fn into_error(self, url: &str) -> FetchError {
        let (kind, message) = self
            .last_error
            .unwrap_or((FetchErrorKind::OtherError, "no attempt was made".to_string()));
        FetchError {
            kind,
            url: url.to_string(),
            message,
            attempts: self.attempt,
        }
    }

    fn cancelled(self, url: &str) -> FetchError {
        let message = match self.last_error {
            Some((kind, message)) => format!("stopped after {}: {}", kind, message),
            None => "stopped before the first attempt".to_string(),
        };
        FetchError {
            kind: FetchErrorKind::Cancelled,
            url: url.to_string(),
            message,
            attempts: self.attempt,
        }
    }
}

/// Resilient page fetcher
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    proxies: Arc<dyn ProxySupplier>,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        proxies: Arc<dyn ProxySupplier>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            transport,
            proxies,
            policy,
        }
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Fetches a page with jitter, retries, backoff and proxy fallback
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Any failure | Retry up to `max_attempts`, backoff `min(base * 2^(n-1), cap)` |
    /// | First proxy-routed failure | Route direct for the remaining attempts |
    /// | Attempts exhausted, proxy used | One final direct attempt |
    /// | Stop signal | Abandon after the current attempt |
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<FetchResult, FetchError> {
        let mut state = RetryState::new(self.proxies.next_proxy_url(), self.policy.max_attempts);

        if !pause(self.policy.jitter(), cancel).await {
            return Err(state.cancelled(url));
        }

        while state.has_attempts_left() {
            let attempt = state.begin_attempt();
            let proxy = state.route().map(str::to_string);

            tracing::debug!(
                "Fetching {} (attempt {}/{}){}",
                url,
                attempt,
                self.policy.max_attempts,
                if proxy.is_some() { " via proxy" } else { " direct" }
            );

            match self.attempt(url, proxy.as_deref()).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let kind = classify(&error, proxy.is_some());
                    if kind.is_transient() {
                        tracing::warn!(
                            "{} on {} (attempt {}/{}): {}",
                            kind,
                            url,
                            attempt,
                            self.policy.max_attempts,
                            error
                        );
                    } else {
                        tracing::warn!(
                            "Error fetching {} (attempt {}/{}): {}",
                            url,
                            attempt,
                            self.policy.max_attempts,
                            error
                        );
                    }

                    if state.record_failure(kind, error.to_string(), proxy.is_some()) {
                        tracing::info!("Proxy failed. Switching to direct connection for {}", url);
                    }
                }
            }

            if state.has_attempts_left() && !pause(self.policy.backoff_delay(attempt), cancel).await {
                return Err(state.cancelled(url));
            }
        }

        if state.proxy_used() {
            if cancel.is_cancelled() {
                return Err(state.cancelled(url));
            }

            tracing::info!("Attempts through proxy exhausted. Trying one last time direct: {}", url);
            state.begin_attempt();
            match self.attempt(url, None).await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    let kind = classify(&error, false);
                    state.record_failure(kind, error.to_string(), false);
                }
            }
        }

        Err(state.into_error(url))
    }

    /// Runs one attempt raced against the per-attempt timer
    async fn attempt(&self, url: &str, proxy: Option<&str>) -> Result<FetchResult, TransportError> {
        let request = FetchRequest {
            url,
            headers: self.policy.request_headers(),
            proxy,
        };

        match tokio::time::timeout(self.policy.attempt_timeout, self.transport.get(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(format!(
                "no response within {:?}",
                self.policy.attempt_timeout
            ))),
        }
    }
}

/// Sleeps for `duration`; returns false if the stop signal fired first
async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// Builds an HTTP client, optionally routed through a proxy
///
/// # Arguments
///
/// * `proxy` - Proxy URL (`http://`, `https://` or `socks5://`), or None for direct
/// * `timeout` - Transport-level request timeout
pub fn build_http_client(proxy: Option<&str>, timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// reqwest-backed transport
///
/// Keeps one direct client and lazily builds one client per proxy endpoint.
pub struct ReqwestTransport {
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            direct: build_http_client(None, timeout)?,
            proxied: Mutex::new(HashMap::new()),
            timeout,
        })
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, TransportError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(Some(proxy), self.timeout)
            .map_err(|e| TransportError::Other(format!("invalid proxy {}: {}", proxy, e)))?;
        clients.insert(proxy.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: FetchRequest<'_>) -> Result<FetchResult, TransportError> {
        let client = self.client_for(request.proxy)?;

        let mut builder = client.get(request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        let final_url = response.url().to_string();

        if !status.is_success() {
            return Err(TransportError::Status {
                code: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        Ok(FetchResult { body, final_url })
    }
}

/// Maps a reqwest error onto the transport error taxonomy
fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout(error.to_string());
    }

    if error.is_connect() || is_connection_io_error(&error) {
        return TransportError::Connect(error.to_string());
    }

    TransportError::Other(error.to_string())
}

/// Walks the source chain looking for a reset/aborted/timed-out socket
fn is_connection_io_error(error: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind;

    let mut source = error.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::BrokenPipe
                    | ErrorKind::TimedOut
            );
        }
        source = inner.source();
    }
    false
}
