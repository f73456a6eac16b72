/// Task state definitions for tracking a crawl task through the orchestrator
///
/// Every popped task walks `Pending → Fetching → Parsing → (Filtering →)
/// Enqueuing → Done`, or ends early in `Skipped` (URL already handled) or
/// `Failed` (fetch exhausted).
use std::fmt;

/// Represents the current state of a crawl task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task has been popped but not yet checked or fetched
    Pending,

    /// Page is being fetched
    Fetching,

    /// Page body is being handed to the extractor
    Parsing,

    /// Extracted records are being deduplicated and admitted against the quota
    Filtering,

    /// Follow-up tasks are being pushed onto the frontier
    Enqueuing,

    // ===== Terminal States =====
    /// Task completed normally
    Done,

    /// URL had already been processed in this run
    Skipped,

    /// Fetch exhausted all attempts (or was cancelled)
    Failed,
}

impl TaskState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }

    /// Returns true if the transition `self → next` is allowed
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Skipped)
                | (Fetching, Parsing)
                | (Fetching, Failed)
                | (Parsing, Filtering)
                | (Parsing, Enqueuing)
                | (Filtering, Enqueuing)
                | (Enqueuing, Done)
        )
    }

    /// Moves to `next`, returning the new state
    ///
    /// Invalid transitions are a programming error: they trip a debug
    /// assertion and are logged in release builds.
    pub fn advance(self, next: TaskState) -> TaskState {
        let allowed = self.can_transition_to(next);
        debug_assert!(allowed, "invalid task transition {} -> {}", self, next);
        if !allowed {
            tracing::warn!("Invalid task state transition {} -> {}", self, next);
        }
        tracing::trace!("Task state {} -> {}", self, next);
        next
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Filtering => "filtering",
            Self::Enqueuing => "enqueuing",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Fetching.is_terminal());
        assert!(!TaskState::Parsing.is_terminal());
        assert!(!TaskState::Filtering.is_terminal());
        assert!(!TaskState::Enqueuing.is_terminal());

        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_detail_path() {
        let state = TaskState::Pending
            .advance(TaskState::Fetching)
            .advance(TaskState::Parsing)
            .advance(TaskState::Filtering)
            .advance(TaskState::Enqueuing)
            .advance(TaskState::Done);
        assert_eq!(state, TaskState::Done);
    }

    #[test]
    fn test_listing_path_skips_filtering() {
        assert!(TaskState::Parsing.can_transition_to(TaskState::Enqueuing));
    }

    #[test]
    fn test_failure_only_from_fetching() {
        assert!(TaskState::Fetching.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Parsing.can_transition_to(TaskState::Failed));
        assert!(!TaskState::Pending.can_transition_to(TaskState::Failed));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for terminal in [TaskState::Done, TaskState::Skipped, TaskState::Failed] {
            for next in [
                TaskState::Pending,
                TaskState::Fetching,
                TaskState::Parsing,
                TaskState::Filtering,
                TaskState::Enqueuing,
                TaskState::Done,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", TaskState::Pending), "pending");
        assert_eq!(format!("{}", TaskState::Enqueuing), "enqueuing");
    }
}
