//! Extracted quote records
//!
//! A [`Record`] is the unit of output pushed to a sink. Its serialized field
//! names form the output schema: `quote`, `author`, `author_url`, `tags`,
//! `likes`, `source`.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Records whose text is shorter than this are parsing noise
pub const MIN_TEXT_LEN: usize = 10;

/// Number of leading characters of the quote text that take part in the fingerprint
pub const FINGERPRINT_PREFIX_CHARS: usize = 100;

/// A single extracted quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The quote text
    #[serde(rename = "quote")]
    pub primary_text: String,

    /// Name of the quoted author
    #[serde(rename = "author")]
    pub attribution_name: String,

    /// Page the author attribution was found on
    #[serde(rename = "author_url")]
    pub attribution_url: String,

    /// Topic tags, absent when the page lists none
    pub tags: Option<Vec<String>>,

    /// Popularity counter as displayed on the page
    #[serde(rename = "likes")]
    pub popularity: String,

    /// Canonical URL of the quote itself
    #[serde(rename = "source")]
    pub source_url: String,
}

impl Record {
    /// Returns true if the record passes the minimum-quality rule
    ///
    /// The text must have at least [`MIN_TEXT_LEN`] characters and the author
    /// name must be non-empty. Invalid records are discarded silently.
    pub fn is_valid(&self) -> bool {
        self.primary_text.trim().chars().count() >= MIN_TEXT_LEN
            && !self.attribution_name.trim().is_empty()
    }

    /// Computes the content-level dedup key
    ///
    /// The key covers the first [`FINGERPRINT_PREFIX_CHARS`] characters of
    /// the text plus the author name, hashed to keep set entries small.
    pub fn fingerprint(&self) -> String {
        let prefix: String = self
            .primary_text
            .chars()
            .take(FINGERPRINT_PREFIX_CHARS)
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(prefix.as_bytes());
        hasher.update(b"-");
        hasher.update(self.attribution_name.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
pub(crate) fn sample_record(text: &str, author: &str) -> Record {
    Record {
        primary_text: text.to_string(),
        attribution_name: author.to_string(),
        attribution_url: "https://example.com/author/1-someone".to_string(),
        tags: None,
        popularity: "0".to_string(),
        source_url: "https://example.com/quote/1".to_string(),
    }
}
