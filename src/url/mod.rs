//! URL handling module
//!
//! This module provides URL normalization (the URL-level dedup key) and link
//! resolution for hrefs found in fetched pages.

mod normalize;
mod resolve;

// Re-export main functions
pub use normalize::{dedup_key, normalize_url};
pub use resolve::{page_number, resolve_link};
