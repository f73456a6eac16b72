use crate::output::traits::{Sink, SinkError, SinkResult};
use crate::record::Record;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Sink that keeps every pushed record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
    batches: Mutex<Vec<usize>>,
    closed: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records pushed so far, in push order
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sizes of the pushed batches, in push order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn push(&self, records: &[Record]) -> SinkResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }

        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(records);
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(records.len());
        Ok(())
    }

    async fn close(&self) -> SinkResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_record;

    #[tokio::test]
    async fn test_collects_in_push_order() {
        let sink = MemorySink::new();
        let a = sample_record("The first of two quotes here.", "A");
        let b = sample_record("The second of two quotes here.", "B");

        sink.push(&[a.clone()]).await.unwrap();
        sink.push(&[b.clone()]).await.unwrap();

        assert_eq!(sink.records(), vec![a, b]);
        assert_eq!(sink.batch_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_closed_sink_rejects_pushes() {
        let sink = MemorySink::new();
        sink.close().await.unwrap();
        assert!(matches!(sink.push(&[]).await, Err(SinkError::Closed)));
        assert!(sink.is_empty());
    }
}
