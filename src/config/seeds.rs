use crate::config::types::SeedConfig;
use crate::crawler::{CrawlTask, TaskRole};
use crate::ConfigError;
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    /// URLs that point straight at a page of quotes
    static ref DETAIL_URL: Regex = Regex::new(r"(/author/\d+-|/quotes/topics/)").unwrap();
}

/// Derives the single seed URL used when no explicit start URL is configured
///
/// Precedence: topic, then author search, then author letter, then the
/// authors index.
pub fn derive_start_url(seeds: &SeedConfig) -> String {
    let base = seeds.base_url.trim_end_matches('/');

    let topic = seeds.topic.trim();
    if !topic.is_empty() {
        let slug = topic
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        return format!("{}/quotes/topics/{}.html", base, slug);
    }

    let search = seeds.search_author.trim();
    if !search.is_empty() {
        return match search.chars().next().map(|c| c.to_ascii_lowercase()) {
            Some(letter) if letter.is_ascii_lowercase() => {
                format!("{}/quotes/authors/{}/", base, letter)
            }
            _ => format!("{}/quotes/authors.html", base),
        };
    }

    let letter = seeds.author_letter.trim();
    if !letter.is_empty() {
        return format!("{}/quotes/authors/{}/", base, letter.to_lowercase());
    }

    format!("{}/quotes/authors.html", base)
}

/// Classifies a seed URL as a listing or detail page
pub fn seed_role(url: &str) -> TaskRole {
    if DETAIL_URL.is_match(url) {
        TaskRole::Detail
    } else {
        TaskRole::Listing
    }
}

/// Builds the seed tasks for a run, all at depth 1
pub fn seed_tasks(seeds: &SeedConfig) -> Result<Vec<CrawlTask>, ConfigError> {
    let mut urls = seeds.explicit_urls();
    if urls.is_empty() {
        urls.push(derive_start_url(seeds));
    }

    urls.into_iter()
        .map(|raw| {
            let url = Url::parse(&raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed '{}': {}", raw, e)))?;
            let role = seed_role(url.as_str());
            Ok(CrawlTask::seed(url, role))
        })
        .collect()
}
