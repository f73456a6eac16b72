//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TaskState`: Tracks a single task through fetch, parse, filter and enqueue
//! - `RunState`: Synchronized run-wide dedup sets and quota accounting

mod run_state;
mod task_state;

// Re-export main types
pub use run_state::{Admission, RunState};
pub use task_state::TaskState;
