//! Run lifecycle and counters

use std::fmt;

/// Lifecycle of a [`RunEngine`](super::RunEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Canceled | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Canceled => "canceled",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Cumulative counters handed to the progress callback after every batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunProgress {
    /// Units covered so far, executed now or already checkpointed
    pub executed_units: u64,
    pub affected_rows: u64,
    /// Units passed over because they were already checkpointed
    pub skipped_units: u64,
}

/// Outcome of one call to [`RunEngine::run`](super::RunEngine::run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub state: RunState,
    /// Units read from the script, skipped ones included
    pub units_read: u64,
    /// Units checkpointed by this run
    pub units_executed: u64,
    pub units_skipped: u64,
    /// Batches that reached the database
    pub batches_executed: u64,
    pub affected_rows: u64,
}

impl RunSummary {
    pub fn progress(&self) -> RunProgress {
        RunProgress {
            executed_units: self.units_read,
            affected_rows: self.affected_rows,
            skipped_units: self.units_skipped,
        }
    }
}
