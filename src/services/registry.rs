//! In-memory task registry.
//!
//! Process-wide bookkeeping for submitted tasks: statuses, terminal
//! results, sub-task progress counters, and recent errors. The core keeps
//! no durable state; downstream consumers persist terminal results
//! themselves.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{Task, TaskResult, TaskStatus};

/// Cap on retained error records per task.
const MAX_ERRORS_PER_TASK: usize = 50;

/// One recorded error event.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Sub-task progress counters for one executing task.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubTaskProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Default)]
struct RegistryInner {
    tasks: HashMap<String, Task>,
    results: HashMap<String, TaskResult>,
    progress: HashMap<String, SubTaskProgress>,
    errors: HashMap<String, Vec<ErrorRecord>>,
}

/// Shared task store behind one lock.
pub struct TaskRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    pub async fn insert(&self, task: Task) {
        let mut inner = self.inner.write().await;
        inner.tasks.insert(task.id.clone(), task);
    }

    pub async fn get(&self, task_id: &str) -> Option<Task> {
        self.inner.read().await.tasks.get(task_id).cloned()
    }

    pub async fn contains(&self, task_id: &str) -> bool {
        self.inner.read().await.tasks.contains_key(task_id)
    }

    /// Apply a status transition through the task state machine.
    /// Writing the current status again is a no-op.
    pub async fn update_status(&self, task_id: &str, status: TaskStatus) -> SwarmResult<()> {
        let mut inner = self.inner.write().await;
        let task = inner
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| SwarmError::TaskNotFound(task_id.to_string()))?;
        if task.status == status {
            return Ok(());
        }
        task.transition_to(status)
    }

    pub async fn status(&self, task_id: &str) -> SwarmResult<TaskStatus> {
        self.inner
            .read()
            .await
            .tasks
            .get(task_id)
            .map(|t| t.status)
            .ok_or_else(|| SwarmError::TaskNotFound(task_id.to_string()))
    }

    pub async fn set_complexity(&self, task_id: &str, complexity: f64) {
        let mut inner = self.inner.write().await;
        if let Some(task) = inner.tasks.get_mut(task_id) {
            task.complexity = complexity;
        }
    }

    pub async fn set_metadata(&self, task_id: &str, key: &str, value: serde_json::Value) {
        let mut inner = self.inner.write().await;
        if let Some(task) = inner.tasks.get_mut(task_id) {
            task.metadata.insert(key.to_string(), value);
        }
    }

    /// Record an error event, keeping only the most recent entries.
    pub async fn record_error(&self, task_id: &str, kind: &str, message: impl Into<String>) {
        let mut inner = self.inner.write().await;
        let errors = inner.errors.entry(task_id.to_string()).or_default();
        errors.push(ErrorRecord {
            kind: kind.to_string(),
            message: message.into(),
            at: Utc::now(),
        });
        if errors.len() > MAX_ERRORS_PER_TASK {
            let excess = errors.len() - MAX_ERRORS_PER_TASK;
            errors.drain(..excess);
        }
    }

    /// The most recent `limit` error records, newest last.
    pub async fn recent_errors(&self, task_id: &str, limit: usize) -> Vec<ErrorRecord> {
        let inner = self.inner.read().await;
        inner
            .errors
            .get(task_id)
            .map(|errors| {
                let start = errors.len().saturating_sub(limit);
                errors[start..].to_vec()
            })
            .unwrap_or_default()
    }

    /// Reset progress counters at publish time.
    pub async fn set_subtask_total(&self, task_id: &str, total: usize) {
        let mut inner = self.inner.write().await;
        inner.progress.insert(
            task_id.to_string(),
            SubTaskProgress {
                total,
                ..SubTaskProgress::default()
            },
        );
    }

    /// Count one finished sub-task. Newly added steps grow the total.
    pub async fn record_subtask_outcome(&self, task_id: &str, success: bool) {
        let mut inner = self.inner.write().await;
        let progress = inner.progress.entry(task_id.to_string()).or_default();
        if success {
            progress.completed += 1;
        } else {
            progress.failed += 1;
        }
        if progress.completed + progress.failed > progress.total {
            progress.total = progress.completed + progress.failed;
        }
    }

    pub async fn grow_subtask_total(&self, task_id: &str, added: usize) {
        let mut inner = self.inner.write().await;
        inner.progress.entry(task_id.to_string()).or_default().total += added;
    }

    pub async fn progress(&self, task_id: &str) -> SubTaskProgress {
        self.inner
            .read()
            .await
            .progress
            .get(task_id)
            .copied()
            .unwrap_or_default()
    }

    pub async fn store_result(&self, result: TaskResult) {
        let mut inner = self.inner.write().await;
        inner.results.insert(result.task_id.clone(), result);
    }

    pub async fn result(&self, task_id: &str) -> Option<TaskResult> {
        self.inner.read().await.results.get(task_id).cloned()
    }

    pub async fn all_tasks(&self) -> Vec<Task> {
        self.inner.read().await.tasks.values().cloned().collect()
    }

    /// Tasks in a non-terminal status.
    pub async fn active_tasks(&self) -> Vec<Task> {
        self.inner
            .read()
            .await
            .tasks
            .values()
            .filter(|t| !t.is_terminal())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_status_flow() {
        let registry = TaskRegistry::new();
        let task = Task::new("do something");
        let id = task.id.clone();
        registry.insert(task).await;

        assert!(registry.contains(&id).await);
        registry.update_status(&id, TaskStatus::Executing).await.unwrap();
        assert_eq!(registry.status(&id).await.unwrap(), TaskStatus::Executing);
        // Same-status writes are no-ops, not errors.
        registry.update_status(&id, TaskStatus::Executing).await.unwrap();
        // Backward transitions are rejected.
        assert!(registry.update_status(&id, TaskStatus::Analyzing).await.is_err());
    }

    #[tokio::test]
    async fn unknown_task_errors() {
        let registry = TaskRegistry::new();
        assert!(registry.status("nope").await.is_err());
        assert!(registry.update_status("nope", TaskStatus::Executing).await.is_err());
    }

    #[tokio::test]
    async fn progress_counters_grow_with_added_steps() {
        let registry = TaskRegistry::new();
        registry.set_subtask_total("t1", 2).await;
        registry.record_subtask_outcome("t1", true).await;
        registry.record_subtask_outcome("t1", false).await;
        registry.record_subtask_outcome("t1", true).await;

        let progress = registry.progress("t1").await;
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.total, 3);
    }

    #[tokio::test]
    async fn error_log_is_capped() {
        let registry = TaskRegistry::new();
        for i in 0..60 {
            registry.record_error("t1", "test", format!("error {i}")).await;
        }
        let recent = registry.recent_errors("t1", 10).await;
        assert_eq!(recent.len(), 10);
        assert_eq!(recent.last().unwrap().message, "error 59");
        // The backing log only keeps the newest records.
        let all = registry.recent_errors("t1", 1000).await;
        assert_eq!(all.len(), MAX_ERRORS_PER_TASK);
    }
}
