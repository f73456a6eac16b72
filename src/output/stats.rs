//! Run summaries and stored-record statistics
//!
//! This module prints the summary of a finished run and extracts simple
//! statistics from an existing SQLite output database.

use crate::crawler::RunSummary;
use crate::output::sqlite_sink::SqliteSink;
use crate::output::traits::SinkResult;

/// Statistics over the records stored in a SQLite sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteStatistics {
    /// Total number of stored records
    pub total_records: u64,

    /// Number of distinct authors
    pub unique_authors: u64,

    /// Authors with the most records, most first
    pub top_authors: Vec<(String, u64)>,
}

/// Loads statistics from a SQLite sink
///
/// # Arguments
///
/// * `sink` - The opened sink to query
/// * `top` - How many authors to list
pub fn load_statistics(sink: &SqliteSink, top: usize) -> SinkResult<QuoteStatistics> {
    Ok(QuoteStatistics {
        total_records: sink.count()?,
        unique_authors: sink.unique_authors()?,
        top_authors: sink.top_authors(top)?,
    })
}

/// Prints stored-record statistics to stdout
pub fn print_statistics(stats: &QuoteStatistics) {
    println!("=== Quote Statistics ===\n");

    println!("Overview:");
    println!("  Total quotes: {}", stats.total_records);
    println!("  Unique authors: {}", stats.unique_authors);
    println!();

    if !stats.top_authors.is_empty() {
        println!("Top Authors:");
        for (author, count) in &stats.top_authors {
            let percentage = if stats.total_records > 0 {
                (*count as f64 / stats.total_records as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", author, count, percentage);
        }
        println!();
    }
}

/// Prints the summary of a finished run to stdout
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Records:");
    println!("  Saved: {} / {} wanted", summary.saved, summary.wanted);
    println!("  Duplicate records filtered: {}", summary.duplicate_records);
    println!();

    println!("Pages:");
    println!("  Fetched: {}", summary.pages_fetched);
    println!("  Failed: {}", summary.fetch_failures);
    println!("  Duplicate URLs skipped: {}", summary.duplicate_urls);
    println!("  Tasks dropped (frontier full): {}", summary.tasks_dropped);
    println!();

    println!("Started:  {}", summary.started_at.to_rfc3339());
    println!("Finished: {}", summary.finished_at.to_rfc3339());
    println!("Duration: {:.1}s", summary.duration().as_secs_f64());

    if summary.cancelled {
        println!("\nRun was stopped before completion");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Sink;
    use crate::record::sample_record;

    #[tokio::test]
    async fn test_load_statistics() {
        let sink = SqliteSink::new_in_memory().unwrap();
        sink.push(&[
            sample_record("An investment in knowledge pays.", "Benjamin Franklin"),
            sample_record("Lost time is never found again.", "Benjamin Franklin"),
            sample_record("The unexamined life is not worth living.", "Socrates"),
        ])
        .await
        .unwrap();

        let stats = load_statistics(&sink, 10).unwrap();
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.unique_authors, 2);
        assert_eq!(stats.top_authors[0], ("Benjamin Franklin".to_string(), 2));
    }
}
