use std::fmt;
use url::Url;

/// What kind of page a task points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRole {
    /// An index page linking to detail pages
    Listing,
    /// A page of records, possibly paginated
    Detail,
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRole::Listing => write!(f, "LISTING"),
            TaskRole::Detail => write!(f, "DETAIL"),
        }
    }
}

/// A unit of crawl work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Absolute URL to fetch
    pub url: Url,

    /// Role of the page
    pub role: TaskRole,

    /// Page depth, starting at 1
    pub depth: u32,
}

impl CrawlTask {
    /// Creates a seed task at depth 1
    pub fn seed(url: Url, role: TaskRole) -> Self {
        Self {
            url,
            role,
            depth: 1,
        }
    }

    /// Creates the detail task for a follow link found on a listing page
    pub fn follow(url: Url) -> Self {
        Self {
            url,
            role: TaskRole::Detail,
            depth: 1,
        }
    }

    /// Creates the continuation task for this task's next page
    pub fn next_page(&self, url: Url) -> Self {
        Self {
            url,
            role: self.role,
            depth: self.depth + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn test_follow_link_is_detail_at_depth_one() {
        let task = CrawlTask::follow(url("/author/1-a"));
        assert_eq!(task.role, TaskRole::Detail);
        assert_eq!(task.depth, 1);
    }

    #[test]
    fn test_next_page_keeps_role_and_increments_depth() {
        let listing = CrawlTask::seed(url("/quotes/authors/a/"), TaskRole::Listing);
        let next = listing.next_page(url("/quotes/authors/a/?p=2"));
        assert_eq!(next.role, TaskRole::Listing);
        assert_eq!(next.depth, 2);

        let detail = CrawlTask {
            url: url("/author/1-a?p=3"),
            role: TaskRole::Detail,
            depth: 3,
        };
        assert_eq!(detail.next_page(url("/author/1-a?p=4")).depth, 4);
    }

    #[test]
    fn test_role_display() {
        assert_eq!(TaskRole::Listing.to_string(), "LISTING");
        assert_eq!(TaskRole::Detail.to_string(), "DETAIL");
    }
}
