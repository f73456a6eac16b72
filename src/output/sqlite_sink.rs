//! SQLite sink
//!
//! Records are appended to a single `quotes` table. Tags are stored as a
//! JSON array (or NULL when the page listed none).

use crate::output::traits::{Sink, SinkError, SinkResult};
use crate::record::Record;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Schema for the quotes table
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS quotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quote TEXT NOT NULL,
    author TEXT NOT NULL,
    author_url TEXT NOT NULL,
    tags TEXT,
    likes TEXT NOT NULL,
    source TEXT NOT NULL,
    saved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_quotes_author ON quotes(author);
"#;

/// Append-only SQLite record sink
pub struct SqliteSink {
    conn: Mutex<Option<Connection>>,
}

impl SqliteSink {
    /// Opens (or creates) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Successfully opened/created database
    /// * `Err(SinkError)` - Failed to open database or create the schema
    pub fn new(path: &Path) -> SinkResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored records
    pub fn count(&self) -> SinkResult<u64> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM quotes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Loads every stored record in insertion order
    pub fn load_records(&self) -> SinkResult<Vec<Record>> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;

        let mut stmt = conn.prepare(
            "SELECT quote, author, author_url, tags, likes, source FROM quotes ORDER BY id",
        )?;

        let rows = stmt.query_map([], |row| {
            let tags: Option<String> = row.get(3)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                tags,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (quote, author, author_url, tags, likes, source) = row?;
            let tags = match tags {
                Some(json) => Some(serde_json::from_str(&json)?),
                None => None,
            };
            records.push(Record {
                primary_text: quote,
                attribution_name: author,
                attribution_url: author_url,
                tags,
                popularity: likes,
                source_url: source,
            });
        }

        Ok(records)
    }

    /// Authors with the most stored records, most first
    pub fn top_authors(&self, limit: usize) -> SinkResult<Vec<(String, u64)>> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;

        let mut stmt = conn.prepare(
            "SELECT author, COUNT(*) AS n FROM quotes GROUP BY author ORDER BY n DESC, author LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(SinkError::from)
    }

    /// Number of distinct authors
    pub fn unique_authors(&self) -> SinkResult<u64> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(SinkError::Closed)?;
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT author) FROM quotes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl Sink for SqliteSink {
    async fn push(&self, records: &[Record]) -> SinkResult<()> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(SinkError::Closed)?;

        let saved_at = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO quotes (quote, author, author_url, tags, likes, source, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;

            for record in records {
                let tags = match &record.tags {
                    Some(tags) => Some(serde_json::to_string(tags)?),
                    None => None,
                };
                stmt.execute(params![
                    record.primary_text,
                    record.attribution_name,
                    record.attribution_url,
                    tags,
                    record.popularity,
                    record.source_url,
                    saved_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Stored {} record(s) in SQLite", records.len());
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        if let Some(conn) = self.lock().take() {
            conn.close().map_err(|(_, e)| SinkError::Database(e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_record;

    #[tokio::test]
    async fn test_push_and_count() {
        let sink = SqliteSink::new_in_memory().unwrap();
        sink.push(&[
            sample_record("The only way out is through, always.", "Robert Frost"),
            sample_record("Nothing in life is to be feared.", "Marie Curie"),
        ])
        .await
        .unwrap();

        assert_eq!(sink.count().unwrap(), 2);
        assert_eq!(sink.unique_authors().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tags_round_trip_as_json() {
        let sink = SqliteSink::new_in_memory().unwrap();
        let mut tagged = sample_record("Simplicity is the ultimate sophistication.", "Leonardo");
        tagged.tags = Some(vec!["simplicity".to_string(), "design".to_string()]);
        let untagged = sample_record("Stay hungry, stay foolish, always.", "Steve Jobs");

        sink.push(&[tagged.clone(), untagged.clone()]).await.unwrap();

        let loaded = sink.load_records().unwrap();
        assert_eq!(loaded, vec![tagged, untagged]);
    }

    #[tokio::test]
    async fn test_top_authors() {
        let sink = SqliteSink::new_in_memory().unwrap();
        sink.push(&[
            sample_record("First quote by the same person.", "Seneca"),
            sample_record("Second quote by the same person.", "Seneca"),
            sample_record("A quote by somebody else entirely.", "Epictetus"),
        ])
        .await
        .unwrap();

        let top = sink.top_authors(1).unwrap();
        assert_eq!(top, vec![("Seneca".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_push_after_close_fails() {
        let sink = SqliteSink::new_in_memory().unwrap();
        sink.close().await.unwrap();

        let result = sink
            .push(&[sample_record("Too late to write this one.", "Nobody")])
            .await;
        assert!(matches!(result, Err(SinkError::Closed)));
    }

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.db");
        SqliteSink::new(&path).unwrap();
        assert!(SqliteSink::new(&path).is_ok());
    }
}
