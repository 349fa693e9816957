//! Task domain models.
//!
//! A `Task` is one user submission; a `SubTask` is one node of the
//! execution DAG produced for it. Sub-tasks are immutable after creation;
//! all mutable per-sub-task state lives on the task board.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a user task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, not yet picked up.
    Pending,
    /// Complexity analysis in progress.
    Analyzing,
    /// Being decomposed into sub-tasks.
    Decomposing,
    /// Sub-tasks running on a team.
    Executing,
    /// Collecting sub-task outputs.
    Aggregating,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled by the caller or a timeout.
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Decomposing => "decomposing",
            Self::Executing => "executing",
            Self::Aggregating => "aggregating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Valid transitions from this status.
    ///
    /// The pipeline is monotonic: no backward transitions, except that any
    /// non-terminal status may move to `Cancelled`.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Analyzing, Self::Decomposing, Self::Executing, Self::Cancelled],
            Self::Analyzing => &[Self::Decomposing, Self::Executing, Self::Failed, Self::Cancelled],
            Self::Decomposing => &[Self::Executing, Self::Failed, Self::Cancelled],
            Self::Executing => &[Self::Aggregating, Self::Completed, Self::Failed, Self::Cancelled],
            Self::Aggregating => &[Self::Completed, Self::Failed, Self::Cancelled],
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user submission, owned by the main agent for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    pub id: String,
    /// The user request text.
    pub content: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Estimated complexity, 0.0..=10.0.
    pub complexity: f64,
    /// When submitted.
    pub created_at: DateTime<Utc>,
    /// Free-form metadata (task type, wave telemetry, plan echo).
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Create a new pending task from submission content.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            status: TaskStatus::default(),
            complexity: 0.0,
            created_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    /// Transition to a new status, enforcing the state machine.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> Result<(), crate::domain::errors::SwarmError> {
        if !self.status.can_transition_to(new_status) {
            return Err(crate::domain::errors::SwarmError::InvalidTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        self.status = new_status;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One node of the execution DAG. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    /// Identifier, unique within the parent task.
    pub id: String,
    /// The owning task.
    pub parent_task_id: String,
    /// What to do.
    pub content: String,
    /// Suggested agent role for execution.
    pub role_hint: String,
    /// Ids of sub-tasks (same parent) this one depends on.
    pub dependencies: HashSet<String>,
    /// Higher runs first among siblings.
    pub priority: i32,
    /// Rough complexity estimate.
    pub estimated_complexity: f64,
}

impl SubTask {
    pub fn new(id: impl Into<String>, parent_task_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent_task_id: parent_task_id.into(),
            content: content.into(),
            role_hint: String::new(),
            dependencies: HashSet::new(),
            priority: 0,
            estimated_complexity: 1.0,
        }
    }

    /// Set the role hint.
    pub fn with_role(mut self, role_hint: impl Into<String>) -> Self {
        self.role_hint = role_hint.into();
        self
    }

    /// Add a dependency. Self-edges are ignored.
    pub fn with_dependency(mut self, dep: impl Into<String>) -> Self {
        let dep = dep.into();
        if dep != self.id {
            self.dependencies.insert(dep);
        }
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Replace the content, keeping everything else.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}
