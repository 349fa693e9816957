//! Task board entry models.
//!
//! A `BoardEntry` is the mutable wrapper around an immutable [`SubTask`]
//! while it lives on a team's task board.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::SubTask;

/// Status of a sub-task on the board.
///
/// `Blocked` covers both "waiting for dependencies" and "unreachable because
/// an upstream failed"; consumers that need the distinction inspect the
/// upstream entry's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    /// At least one dependency is not yet completed.
    Blocked,
    /// All dependencies complete; eligible to be claimed.
    Pending,
    /// Reserved by an agent that has not started running it.
    Claimed,
    /// Running.
    InProgress,
    /// Finished successfully; the entry's result holds the output.
    Completed,
    /// Finished with an error.
    Failed,
}

impl BoardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Valid transitions from this status.
    ///
    /// `Pending -> Blocked`, `Claimed -> Blocked` and `InProgress -> Blocked`
    /// exist for failure propagation; `Claimed -> Pending` is the reclaim
    /// path for stuck claims.
    pub fn valid_transitions(&self) -> &'static [BoardStatus] {
        match self {
            Self::Blocked => &[Self::Pending],
            Self::Pending => &[Self::Claimed, Self::Blocked],
            Self::Claimed => &[Self::InProgress, Self::Pending, Self::Blocked],
            Self::InProgress => &[Self::Completed, Self::Failed, Self::Blocked],
            Self::Completed | Self::Failed => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable per-sub-task state kept inside a task board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEntry {
    /// Same as `subtask.id`.
    pub task_id: String,
    /// The immutable sub-task.
    pub subtask: SubTask,
    /// Current board status.
    pub status: BoardStatus,
    /// Claiming agent, present iff status is claimed or in progress.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Output on completion, error text on failure.
    pub result: Option<String>,
    /// Copy of the sub-task's dependency set (the board may scrub edges
    /// when a step is removed by the quality gate).
    pub dependencies: HashSet<String>,
    pub priority: i32,
    pub role_hint: String,
}

impl BoardEntry {
    /// Wrap a sub-task with the given initial status.
    pub fn new(subtask: SubTask, status: BoardStatus) -> Self {
        Self {
            task_id: subtask.id.clone(),
            dependencies: subtask.dependencies.clone(),
            priority: subtask.priority,
            role_hint: subtask.role_hint.clone(),
            subtask,
            status,
            claimed_by: None,
            claimed_at: None,
            started_at: None,
            completed_at: None,
            result: None,
        }
    }
}

/// Why a claim attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("task already claimed: {0}")]
    AlreadyClaimed(String),
    #[error("task not in pending state: {0}")]
    NotPending(String),
}
