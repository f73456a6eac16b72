//! HTML extraction of records and follow-up links
//!
//! This module turns a fetched page body into:
//! - Candidate records (detail pages)
//! - Follow links to detail pages (listing pages)
//! - The next pagination link (both roles)
//!
//! Malformed markup never produces an error; it simply yields nothing.

use crate::crawler::task::TaskRole;
use crate::record::Record;
use crate::url::{page_number, resolve_link};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

lazy_static! {
    static ref AUTHOR_LINK: Regex = Regex::new(r"/author/\d+-[A-Za-z\-_]+").unwrap();
    static ref QUOTE_BLOCK: Selector = Selector::parse("ul.list-quotes li .wrap-block").unwrap();
    static ref QUOTE_TEXT: Selector = Selector::parse("p a.title").unwrap();
    static ref QUOTE_LINK: Selector = Selector::parse("a.title").unwrap();
    static ref AUTHOR_NAME: Selector = Selector::parse(".author a").unwrap();
    static ref TAG: Selector = Selector::parse(".mytags a").unwrap();
    static ref LIKES: Selector = Selector::parse(".heart24").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
    static ref REL_NEXT: Selector = Selector::parse(r#"link[rel="next"]"#).unwrap();
}

/// Everything the orchestrator needs from one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Candidate records, not yet validated or deduplicated
    pub records: Vec<Record>,

    /// Absolute URLs of detail pages linked from a listing page
    pub follow_links: Vec<Url>,

    /// Absolute URL of the next page, if any
    pub next_page: Option<Url>,
}

/// Turns a page body into records and links
pub trait Extractor: Send + Sync {
    fn parse(&self, body: &str, page_url: &Url, role: TaskRole) -> ParsedPage;
}

/// Extractor for quote listing/author pages
#[derive(Debug, Clone, Default)]
pub struct QuotesExtractor {
    /// Normalized author name filter for listing pages
    author_filter: Option<String>,
}

impl QuotesExtractor {
    /// Creates an extractor, optionally keeping only follow links whose
    /// anchor text matches `search_author`
    pub fn new(search_author: Option<&str>) -> Self {
        let author_filter = search_author
            .map(squash)
            .filter(|name| !name.is_empty());
        Self { author_filter }
    }

    fn matches_author(&self, anchor_text: &str) -> bool {
        let Some(wanted) = &self.author_filter else {
            return true;
        };

        let found = squash(anchor_text);
        if found.is_empty() {
            return false;
        }
        found.contains(wanted.as_str()) || wanted.contains(found.as_str())
    }
}

impl Extractor for QuotesExtractor {
    fn parse(&self, body: &str, page_url: &Url, role: TaskRole) -> ParsedPage {
        let document = Html::parse_document(body);

        let (records, follow_links) = match role {
            TaskRole::Listing => (Vec::new(), self.extract_author_links(&document, page_url)),
            TaskRole::Detail => (extract_records(&document, page_url), Vec::new()),
        };

        ParsedPage {
            records,
            follow_links,
            next_page: find_next_page(&document, page_url),
        }
    }
}

impl QuotesExtractor {
    /// Collects author page links in page order, without repeats
    fn extract_author_links(&self, document: &Html, page_url: &Url) -> Vec<Url> {
        let mut links: Vec<Url> = Vec::new();

        for anchor in document.select(&ANCHOR) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !AUTHOR_LINK.is_match(href) {
                continue;
            }

            let Some(url) = resolve_link(href, page_url) else {
                continue;
            };
            if url.path().contains("/tag/") || url.path().contains("/quote/") {
                continue;
            }

            if !self.matches_author(&element_text(&anchor)) {
                continue;
            }

            if !links.contains(&url) {
                links.push(url);
            }
        }

        if self.author_filter.is_some() {
            tracing::info!("{} author link(s) matched the author filter on {}", links.len(), page_url);
        }

        links
    }
}

/// Extracts one record per quote block
fn extract_records(document: &Html, page_url: &Url) -> Vec<Record> {
    document
        .select(&QUOTE_BLOCK)
        .filter_map(|block| extract_record(block, page_url))
        .collect()
}

fn extract_record(block: ElementRef<'_>, page_url: &Url) -> Option<Record> {
    let text = block
        .select(&QUOTE_TEXT)
        .next()
        .map(|e| element_text(&e))
        .unwrap_or_default();

    let author = block
        .select(&AUTHOR_NAME)
        .next()
        .map(|e| element_text(&e))
        .unwrap_or_default();

    let source = block
        .select(&QUOTE_LINK)
        .next()
        .and_then(|e| e.value().attr("href"))
        .and_then(|href| resolve_link(href, page_url))
        .map(|url| url.to_string())
        .unwrap_or_else(|| page_url.to_string());

    let tags: Vec<String> = block
        .select(&TAG)
        .map(|e| element_text(&e))
        .filter(|tag| !tag.is_empty())
        .collect();

    let likes = block
        .select(&LIKES)
        .next()
        .map(|e| element_text(&e))
        .filter(|likes| !likes.is_empty())
        .unwrap_or_else(|| "0".to_string());

    let record = Record {
        primary_text: text,
        attribution_name: author,
        attribution_url: page_url.to_string(),
        tags: if tags.is_empty() { None } else { Some(tags) },
        popularity: likes,
        source_url: source,
    };

    record.is_valid().then_some(record)
}

/// Finds the next page via `<link rel="next">`, then via `?p=N+1` anchors
fn find_next_page(document: &Html, page_url: &Url) -> Option<Url> {
    if let Some(href) = document
        .select(&REL_NEXT)
        .next()
        .and_then(|e| e.value().attr("href"))
    {
        if let Some(url) = resolve_link(href, page_url) {
            return Some(url);
        }
    }

    let next = page_number(page_url) + 1;
    let query_form = format!("?p={}", next);
    let param_form = format!("&p={}", next);

    document
        .select(&ANCHOR)
        .filter_map(|e| e.value().attr("href"))
        .find(|href| href.contains(&query_form) || href.contains(&param_form))
        .and_then(|href| resolve_link(href, page_url))
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Lowercases and strips all whitespace
fn squash(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
