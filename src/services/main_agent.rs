//! Main agent: the submission surface and process-wide task registry.
//!
//! Validates and classifies submissions, delegates execution to the task
//! executor with timeout and cancellation handling, and exposes progress
//! and summary reporting over the shared registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{Config, Task, TaskPlan, TaskResult, TaskStatus};
use crate::domain::ports::{Planner, QualityEvaluator, ResultAggregator, RoleRunnerFactory, StreamSink};
use crate::services::registry::{ErrorRecord, TaskRegistry};
use crate::services::task_executor::{TaskExecutor, TimeoutWarningCallback};
use crate::services::team_manager::TeamLifecycleManager;

/// Keyword table for task-type classification. First match set wins on a
/// score tie, so the order here is part of the contract.
const TYPE_KEYWORDS: &[(&str, &[&str])] = &[
    ("research", &["research", "investigate", "study"]),
    ("analysis", &["analyze", "analyse", "evaluate", "compare"]),
    ("writing", &["write", "draft", "compose"]),
    ("coding", &["code", "program", "develop", "implement"]),
    ("translation", &["translate", "convert"]),
    ("search", &["search", "find", "lookup"]),
    ("summary", &["summarize", "summary", "abstract"]),
    ("verification", &["verify", "validate", "confirm"]),
];

/// Coarse progress snapshot for one task.
#[derive(Debug, Clone)]
pub struct TaskProgress {
    pub task_id: String,
    pub status: TaskStatus,
    pub percent: u8,
    pub total_subtasks: usize,
    pub completed_subtasks: usize,
}

/// Execution summary for one task.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub successful_subtasks: usize,
    pub failed_subtasks: usize,
    /// Workers presumed live (claimed or running) right now.
    pub active_agents: usize,
    pub tool_calls: usize,
    pub total_tokens: u64,
    /// Up to the ten most recent errors.
    pub recent_errors: Vec<ErrorRecord>,
}

/// Result of a graceful shutdown sweep.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSummary {
    pub cancelled_tasks: Vec<String>,
    pub errors: Vec<String>,
}

/// Process-level orchestrator facade.
pub struct MainAgent {
    config: Config,
    planner: Arc<dyn Planner>,
    registry: Arc<TaskRegistry>,
    teams: Arc<TeamLifecycleManager>,
    executor: TaskExecutor,
    running: Mutex<HashMap<String, CancellationToken>>,
}

impl MainAgent {
    pub fn new(config: Config, planner: Arc<dyn Planner>, runner_factory: Arc<dyn RoleRunnerFactory>) -> Self {
        let registry = Arc::new(TaskRegistry::new());
        let teams = Arc::new(TeamLifecycleManager::new());
        let executor = TaskExecutor::new(
            config.clone(),
            planner.clone(),
            runner_factory,
            teams.clone(),
            registry.clone(),
        );
        Self {
            config,
            planner,
            registry,
            teams,
            executor,
            running: Mutex::new(HashMap::new()),
        }
    }

    /// Use an external aggregator for multi-step outputs.
    pub fn with_aggregator(mut self, aggregator: Arc<dyn ResultAggregator>) -> Self {
        self.executor = self.executor.with_aggregator(aggregator);
        self
    }

    pub fn registry(&self) -> Arc<TaskRegistry> {
        self.registry.clone()
    }

    pub fn teams(&self) -> Arc<TeamLifecycleManager> {
        self.teams.clone()
    }

    pub async fn add_timeout_warning_callback(&self, callback: TimeoutWarningCallback) {
        self.executor.add_timeout_warning_callback(callback).await;
    }

    /// Validate, classify, estimate, and register a new task.
    pub async fn submit_task(
        &self,
        content: &str,
        metadata: HashMap<String, serde_json::Value>,
    ) -> SwarmResult<Task> {
        self.validate_content(content)?;

        let mut task = Task::new(content);
        task.metadata = metadata;
        task.metadata.insert(
            "task_type".to_string(),
            serde_json::Value::String(classify_task_type(content).to_string()),
        );

        match self.planner.estimate_complexity(&task).await {
            Ok(complexity) => task.complexity = complexity.clamp(0.0, 10.0),
            Err(err) => {
                // The estimator is advisory; fall back to a midpoint score.
                task.complexity = 5.0;
                task.metadata.insert(
                    "complexity_analysis_error".to_string(),
                    serde_json::Value::String(err.to_string()),
                );
            }
        }

        tracing::info!(task_id = %task.id, complexity = task.complexity, "task submitted");
        self.registry.insert(task.clone()).await;
        Ok(task)
    }

    fn validate_content(&self, content: &str) -> SwarmResult<()> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(SwarmError::ValidationFailed(
                "task content cannot be empty or whitespace only".to_string(),
            ));
        }
        let limits = &self.config.execution;
        if trimmed.len() < limits.min_task_content_length {
            return Err(SwarmError::ValidationFailed(format!(
                "task content too short (minimum {} characters)",
                limits.min_task_content_length
            )));
        }
        if content.len() > limits.max_task_content_length {
            return Err(SwarmError::ValidationFailed(format!(
                "task content too long (maximum {} characters)",
                limits.max_task_content_length
            )));
        }
        Ok(())
    }

    /// Execute a task through the planner path. Always returns a
    /// `TaskResult`; failure is expressed in the result, never an `Err`.
    pub async fn execute_task(&self, task_id: &str) -> TaskResult {
        if let Some(result) = self.refuse_terminal(task_id).await {
            return result;
        }
        let cancel = self.register_running(task_id).await;
        let result = self.executor.execute(task_id, cancel).await;
        self.running.lock().await.remove(task_id);
        result
    }

    /// Launch [`execute_task`](Self::execute_task) in the background and
    /// hand back its join handle. The task stays cancellable through
    /// [`cancel_task`](Self::cancel_task); the handle resolves to the
    /// terminal `TaskResult` either way.
    pub fn spawn_task(self: Arc<Self>, task_id: &str) -> tokio::task::JoinHandle<TaskResult> {
        let task_id = task_id.to_string();
        tokio::spawn(async move { self.execute_task(&task_id).await })
    }

    /// Launch [`execute_with_plan`](Self::execute_with_plan) in the
    /// background and hand back its join handle.
    pub fn spawn_with_plan(
        self: Arc<Self>,
        task_id: &str,
        plan: TaskPlan,
        evaluator: Option<Arc<dyn QualityEvaluator>>,
        stream: Option<StreamSink>,
    ) -> tokio::task::JoinHandle<TaskResult> {
        let task_id = task_id.to_string();
        tokio::spawn(async move {
            self.execute_with_plan(&task_id, plan, evaluator, stream).await
        })
    }

    /// A task already in a terminal state (for instance cancelled before a
    /// spawned execution got scheduled) is never re-executed; callers get
    /// the stored result or a failure naming the state.
    async fn refuse_terminal(&self, task_id: &str) -> Option<TaskResult> {
        let task = self.registry.get(task_id).await?;
        if !task.is_terminal() {
            return None;
        }
        Some(match self.registry.result(task_id).await {
            Some(result) => result,
            None => TaskResult::failed(
                task_id,
                format!("task is already {}", task.status),
                0.0,
            ),
        })
    }

    /// Execute a task from an externally supplied plan, with optional
    /// quality gating.
    pub async fn execute_with_plan(
        &self,
        task_id: &str,
        plan: TaskPlan,
        evaluator: Option<Arc<dyn QualityEvaluator>>,
        stream: Option<StreamSink>,
    ) -> TaskResult {
        if let Some(result) = self.refuse_terminal(task_id).await {
            return result;
        }
        let cancel = self.register_running(task_id).await;
        let result = self
            .executor
            .execute_with_plan(task_id, plan, evaluator, stream, cancel)
            .await;
        self.running.lock().await.remove(task_id);
        result
    }

    /// Execute with the configured hard timeout on top of the executor's
    /// own deadline watcher.
    pub async fn execute_with_timeout(&self, task_id: &str) -> TaskResult {
        let timeout = std::time::Duration::from_secs(self.config.execution.timeout_secs);
        match tokio::time::timeout(timeout, self.execute_task(task_id)).await {
            Ok(result) => result,
            Err(_) => self.handle_timeout(task_id).await,
        }
    }

    async fn handle_timeout(&self, task_id: &str) -> TaskResult {
        let timeout_secs = self.config.execution.timeout_secs;
        self.registry
            .record_error(task_id, "execution_timeout", format!("timed out after {timeout_secs}s"))
            .await;
        self.cancel_task(task_id).await;
        let result = TaskResult::failed(
            task_id,
            format!("Task execution timed out after {timeout_secs} seconds"),
            timeout_secs as f64,
        );
        self.registry.store_result(result.clone()).await;
        result
    }

    async fn register_running(&self, task_id: &str) -> CancellationToken {
        let cancel = CancellationToken::new();
        self.running.lock().await.insert(task_id.to_string(), cancel.clone());
        cancel
    }

    /// Cancel a task. Idempotent: returns false when the task is unknown
    /// or already terminal.
    pub async fn cancel_task(&self, task_id: &str) -> bool {
        let Some(task) = self.registry.get(task_id).await else {
            return false;
        };
        if task.is_terminal() {
            return false;
        }

        if let Some(cancel) = self.running.lock().await.remove(task_id) {
            cancel.cancel();
        }
        let _ = self.registry.update_status(task_id, TaskStatus::Cancelled).await;
        self.registry
            .record_error(task_id, "task_cancelled", "cancelled by caller")
            .await;
        tracing::info!(task_id, "task cancelled");
        true
    }

    /// Cancel everything still active and report what happened.
    pub async fn graceful_shutdown(&self) -> ShutdownSummary {
        let mut summary = ShutdownSummary::default();
        for task in self.registry.active_tasks().await {
            if self.cancel_task(&task.id).await {
                summary.cancelled_tasks.push(task.id);
            } else {
                summary
                    .errors
                    .push(format!("task {} could not be cancelled", task.id));
            }
        }
        tracing::info!(cancelled = summary.cancelled_tasks.len(), "graceful shutdown complete");
        summary
    }

    pub async fn task(&self, task_id: &str) -> Option<Task> {
        self.registry.get(task_id).await
    }

    pub async fn task_status(&self, task_id: &str) -> SwarmResult<TaskStatus> {
        self.registry.status(task_id).await
    }

    pub async fn task_result(&self, task_id: &str) -> Option<TaskResult> {
        self.registry.result(task_id).await
    }

    /// Progress percentage computed by coarse status bands; the executing
    /// band moves linearly with completed sub-tasks between 15 and 85.
    pub async fn progress(&self, task_id: &str) -> SwarmResult<TaskProgress> {
        let status = self.registry.status(task_id).await?;
        let progress = self.registry.progress(task_id).await;

        let percent: u8 = match status {
            TaskStatus::Pending => 0,
            TaskStatus::Analyzing => 5,
            TaskStatus::Decomposing => 10,
            TaskStatus::Executing => {
                if progress.total == 0 {
                    15
                } else {
                    let done = progress.completed + progress.failed;
                    let fraction = done as f64 / progress.total as f64;
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let band = (15.0 + fraction * 70.0).round() as u8;
                    band.min(85)
                }
            }
            TaskStatus::Aggregating => 90,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => 100,
        };

        Ok(TaskProgress {
            task_id: task_id.to_string(),
            status,
            percent,
            total_subtasks: progress.total,
            completed_subtasks: progress.completed,
        })
    }

    /// Counts, resource usage, and the most recent errors for one task.
    pub async fn summary(&self, task_id: &str) -> SwarmResult<ExecutionSummary> {
        let status = self.registry.status(task_id).await?;
        let progress = self.registry.progress(task_id).await;
        let result = self.registry.result(task_id).await;

        let (tool_calls, total_tokens) = result
            .as_ref()
            .map_or((0, 0), |r| (r.tool_call_count(), r.total_tokens()));
        let active_agents = if status == TaskStatus::Executing {
            progress.total.saturating_sub(progress.completed + progress.failed)
        } else {
            0
        };

        Ok(ExecutionSummary {
            task_id: task_id.to_string(),
            status,
            successful_subtasks: progress.completed,
            failed_subtasks: progress.failed,
            active_agents,
            tool_calls,
            total_tokens,
            recent_errors: self.registry.recent_errors(task_id, 10).await,
        })
    }
}

/// Classify a submission by keyword hits; the best-scoring category wins,
/// "general" when nothing matches.
pub fn classify_task_type(content: &str) -> &'static str {
    let content = content.to_lowercase();
    let mut best = ("general", 0usize);
    for (task_type, keywords) in TYPE_KEYWORDS {
        let score = keywords.iter().filter(|kw| content.contains(*kw)).count();
        if score > best.1 {
            best = (task_type, score);
        }
    }
    best.0
}
