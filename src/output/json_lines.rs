//! JSON Lines sink: one JSON object per record, appended to a file

use crate::output::traits::{Sink, SinkError, SinkResult};
use crate::record::Record;
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

pub struct JsonLinesSink {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed
    pub fn new(path: &Path) -> SinkResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }
}

#[async_trait]
impl Sink for JsonLinesSink {
    async fn push(&self, records: &[Record]) -> SinkResult<()> {
        let mut guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let writer = guard.as_mut().ok_or(SinkError::Closed)?;

        for record in records {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(mut writer) = writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_record;

    #[tokio::test]
    async fn test_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.jsonl");

        let sink = JsonLinesSink::new(&path).unwrap();
        sink.push(&[
            sample_record("Well done is better than well said.", "Benjamin Franklin"),
            sample_record("Be yourself; everyone else is already taken.", "Oscar Wilde"),
        ])
        .await
        .unwrap();
        sink.close().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(value["quote"], "Well done is better than well said.");
        assert_eq!(value["author"], "Benjamin Franklin");
        assert!(value["tags"].is_null());
        assert_eq!(value["likes"], "0");
    }

    #[tokio::test]
    async fn test_appends_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quotes.jsonl");

        for author in ["First Author", "Second Author"] {
            let sink = JsonLinesSink::new(&path).unwrap();
            sink.push(&[sample_record("A sufficiently long quote text.", author)])
                .await
                .unwrap();
            sink.close().await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_push_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(&dir.path().join("q.jsonl")).unwrap();
        sink.close().await.unwrap();

        let result = sink.push(&[]).await;
        assert!(matches!(result, Err(SinkError::Closed)));
    }
}
