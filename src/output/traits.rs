//! Sink trait and error types
//!
//! A sink is the durable destination for accepted records. The orchestrator
//! pushes one batch per detail page and treats any failure as fatal to the run.

use crate::record::Record;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while persisting records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink is closed")]
    Closed,
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for accepted records
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persists a batch of records
    ///
    /// A batch is written completely or the error is returned; callers
    /// never retry a failed batch.
    async fn push(&self, records: &[Record]) -> SinkResult<()>;

    /// Flushes and releases the underlying resource
    ///
    /// Pushing after close returns [`SinkError::Closed`].
    async fn close(&self) -> SinkResult<()> {
        Ok(())
    }
}
