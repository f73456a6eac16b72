//! Proxy endpoint suppliers
//!
//! The fetcher asks a [`ProxySupplier`] for one proxy per fetch. Which
//! endpoint comes back is opaque to the crawl core.

use crate::config::{ProxyConfig, ProxyRotation};
use rand::{thread_rng, Rng};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of proxy endpoints
pub trait ProxySupplier: Send + Sync {
    /// Returns the proxy to route the next fetch through, or None to go direct
    fn next_proxy_url(&self) -> Option<String>;
}

/// Supplier that always routes direct
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProxy;

impl ProxySupplier for NoProxy {
    fn next_proxy_url(&self) -> Option<String> {
        None
    }
}

/// Rotates through a fixed list of proxy endpoints
#[derive(Debug)]
pub struct ProxyRotator {
    urls: Vec<String>,
    rotation: ProxyRotation,
    cursor: AtomicUsize,
}

impl ProxyRotator {
    pub fn new(urls: Vec<String>, rotation: ProxyRotation) -> Self {
        Self {
            urls,
            rotation,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl ProxySupplier for ProxyRotator {
    fn next_proxy_url(&self) -> Option<String> {
        if self.urls.is_empty() {
            return None;
        }

        let index = match self.rotation {
            ProxyRotation::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % self.urls.len(),
            ProxyRotation::Random => thread_rng().gen_range(0..self.urls.len()),
        };

        self.urls.get(index).cloned()
    }
}

/// Builds the supplier described by the proxy configuration
pub fn proxy_supplier_from_config(config: &ProxyConfig) -> Box<dyn ProxySupplier> {
    if config.urls.is_empty() {
        Box::new(NoProxy)
    } else {
        tracing::info!(
            "Routing fetches through {} proxy endpoint(s) ({:?})",
            config.urls.len(),
            config.rotation
        );
        Box::new(ProxyRotator::new(config.urls.clone(), config.rotation))
    }
}
