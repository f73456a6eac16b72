use crate::UrlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
    "ref",
];

/// Normalizes a URL into the form used for URL-level deduplication
///
/// The normalized URL is only ever used as a set key; the crawler still
/// fetches the URL exactly as it was discovered.
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Map http:// to https:// so both schemes share one key
/// 3. Lowercase the host and remove a www. prefix
/// 4. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters alphabetically
/// 8. Remove empty query string (trailing ?)
///
/// # Examples
///
/// ```
/// use quote_crawler::url::normalize_url;
///
/// let url = normalize_url("http://WWW.EXAMPLE.COM/author/1-x/?p=2#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/author/1-x?p=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.scheme() == "http" {
        url.set_scheme("https")
            .map_err(|_| UrlError::Malformed(format!("Cannot rewrite scheme of {}", url_str)))?;
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let filtered_params = filter_and_sort_query_params(&url);

        if filtered_params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(&filtered_params);
        }
    }

    Ok(url)
}

/// Returns the dedup key for a URL
///
/// Falls back to the trimmed raw string when the URL cannot be normalized,
/// so that even odd URLs are fetched at most once.
pub fn dedup_key(url_str: &str) -> String {
    match normalize_url(url_str) {
        Ok(url) => url.to_string(),
        Err(_) => url_str.trim().to_string(),
    }
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
