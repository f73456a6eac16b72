//! Output module for persisting records and reporting runs
//!
//! This module handles:
//! - The [`Sink`] seam the orchestrator pushes accepted records through
//! - SQLite, JSON Lines and in-memory sinks
//! - Printing run summaries and stored-record statistics

mod json_lines;
mod memory;
mod sqlite_sink;
pub mod stats;
mod traits;

pub use json_lines::JsonLinesSink;
pub use memory::MemorySink;
pub use sqlite_sink::SqliteSink;
pub use stats::{load_statistics, print_statistics, print_summary, QuoteStatistics};
pub use traits::{Sink, SinkError, SinkResult};

use crate::config::{OutputConfig, OutputFormat};
use std::path::Path;
use std::sync::Arc;

/// Opens the sink described by the output configuration
///
/// # Arguments
///
/// * `config` - The output section of the run configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn Sink>)` - The opened sink
/// * `Err(SinkError)` - Failed to open the database or file
pub fn sink_from_config(config: &OutputConfig) -> SinkResult<Arc<dyn Sink>> {
    let path = Path::new(&config.path);
    tracing::info!("Writing {:?} output to {}", config.format, path.display());

    let sink: Arc<dyn Sink> = match config.format {
        OutputFormat::Sqlite => Arc::new(SqliteSink::new(path)?),
        OutputFormat::JsonLines => Arc::new(JsonLinesSink::new(path)?),
    };
    Ok(sink)
}
