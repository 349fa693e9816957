//! Per-task execution orchestration.
//!
//! Owns the end-to-end run of one task given a plan: create and set up a
//! team, publish the plan's steps to the team board, drive the board with
//! the wave executor through a quality-gated runner, aggregate outputs,
//! and always disband the team on the way out. Every path returns a
//! `TaskResult`; nothing escapes as a panic or naked error.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{
    Config, Role, SubTask, SubTaskResult, Task, TaskPlan, TaskResult, TaskStatus, Team, TeamState,
};
use crate::domain::ports::{
    GateAction, Planner, QualityEvaluator, ResultAggregator, RoleRunnerFactory, RunContext, StreamSink,
};
use crate::services::quality_gate;
use crate::services::registry::TaskRegistry;
use crate::services::task_board::TaskBoard;
use crate::services::team_manager::TeamLifecycleManager;
use crate::services::wave_executor::{SubTaskRunner, WaveExecutor, WaveExecutorConfig};

/// Separator between aggregated multi-step outputs.
const OUTPUT_SEPARATOR: &str = "\n\n---\n\n";

/// Fired when an execution crosses its warning threshold:
/// `(task_id, elapsed_secs, remaining_secs)`.
pub type TimeoutWarningCallback = Arc<dyn Fn(&str, f64, f64) + Send + Sync>;

/// Orchestrates one task at a time from plan to aggregated result.
pub struct TaskExecutor {
    config: Config,
    planner: Arc<dyn Planner>,
    runner_factory: Arc<dyn RoleRunnerFactory>,
    aggregator: Option<Arc<dyn ResultAggregator>>,
    teams: Arc<TeamLifecycleManager>,
    registry: Arc<TaskRegistry>,
    timeout_callbacks: Arc<RwLock<Vec<TimeoutWarningCallback>>>,
}

impl TaskExecutor {
    pub fn new(
        config: Config,
        planner: Arc<dyn Planner>,
        runner_factory: Arc<dyn RoleRunnerFactory>,
        teams: Arc<TeamLifecycleManager>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        Self {
            config,
            planner,
            runner_factory,
            aggregator: None,
            teams,
            registry,
            timeout_callbacks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Use an external aggregator for multi-step outputs.
    pub fn with_aggregator(mut self, aggregator: Arc<dyn ResultAggregator>) -> Self {
        self.aggregator = Some(aggregator);
        self
    }

    /// Register a warning callback fired near the execution deadline.
    pub async fn add_timeout_warning_callback(&self, callback: TimeoutWarningCallback) {
        self.timeout_callbacks.write().await.push(callback);
    }

    /// Plan the task, then run it. Kept for callers that have no
    /// externally produced plan.
    pub async fn execute(&self, task_id: &str, cancel: CancellationToken) -> TaskResult {
        let clock = std::time::Instant::now();
        let Some(task) = self.registry.get(task_id).await else {
            return TaskResult::failed(task_id, format!("task not found: {task_id}"), 0.0);
        };

        let _ = self.registry.update_status(task_id, TaskStatus::Analyzing).await;
        if task.complexity == 0.0 {
            if let Ok(complexity) = self.planner.estimate_complexity(&task).await {
                self.registry.set_complexity(task_id, complexity).await;
            }
        }

        let _ = self.registry.update_status(task_id, TaskStatus::Decomposing).await;
        let plan = match self.planner.plan(&task).await {
            Ok(plan) => plan,
            Err(err) => {
                return self.abort(task_id, format!("planning failed: {err}"), clock).await;
            }
        };
        if plan.execution_flow.is_empty() {
            return self.abort(task_id, "planner returned an empty flow".to_string(), clock).await;
        }

        self.run_plan(task_id, plan, None, None, cancel).await
    }

    /// Run an externally produced plan through a team, with optional
    /// quality gating. Falls back to [`execute`](Self::execute) when the
    /// plan has no steps.
    pub async fn execute_with_plan(
        &self,
        task_id: &str,
        plan: TaskPlan,
        evaluator: Option<Arc<dyn QualityEvaluator>>,
        stream: Option<StreamSink>,
        cancel: CancellationToken,
    ) -> TaskResult {
        if plan.execution_flow.is_empty() {
            tracing::warn!(task_id, "plan has no execution flow; falling back to the planner path");
            return self.execute(task_id, cancel).await;
        }
        self.run_plan(task_id, plan, evaluator, stream, cancel).await
    }

    async fn abort(&self, task_id: &str, error: String, clock: std::time::Instant) -> TaskResult {
        tracing::error!(task_id, error, "task aborted");
        self.registry.record_error(task_id, "execution_error", error.clone()).await;
        let _ = self.registry.update_status(task_id, TaskStatus::Failed).await;
        let result = TaskResult::failed(task_id, error, clock.elapsed().as_secs_f64());
        self.registry.store_result(result.clone()).await;
        result
    }

    async fn run_plan(
        &self,
        task_id: &str,
        plan: TaskPlan,
        evaluator: Option<Arc<dyn QualityEvaluator>>,
        stream: Option<StreamSink>,
        cancel: CancellationToken,
    ) -> TaskResult {
        let clock = std::time::Instant::now();
        let Some(task) = self.registry.get(task_id).await else {
            return TaskResult::failed(task_id, format!("task not found: {task_id}"), 0.0);
        };

        let _ = self.registry.update_status(task_id, TaskStatus::Executing).await;
        if cancel.is_cancelled() {
            return self.cancelled(task_id, "Task cancelled", &[], clock).await;
        }

        let (subtasks, dependency_map) = convert_steps(&plan, task_id);
        if subtasks.is_empty() {
            return self.abort(task_id, "plan contained no runnable steps".to_string(), clock).await;
        }

        let team = match self.teams.create_team(&task, self.config.team.clone()).await {
            Ok(team) => team,
            Err(err) => {
                return self.abort(task_id, format!("team creation failed: {err}"), clock).await;
            }
        };

        let result = self
            .drive(&task, &team, subtasks, dependency_map, plan, evaluator, stream, cancel, clock)
            .await;

        // Disband on every exit path; a second disband is a no-op.
        let disband_timeout = Duration::from_secs(self.config.execution.disband_timeout_secs);
        if let Err(err) = self.teams.disband_team(&team.id, disband_timeout).await {
            tracing::error!(team_id = %team.id, %err, "disband after execution failed");
        }

        self.registry.store_result(result.clone()).await;
        result
    }

    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    async fn drive(
        &self,
        task: &Task,
        team: &Team,
        subtasks: Vec<SubTask>,
        dependency_map: HashMap<String, HashSet<String>>,
        plan: TaskPlan,
        evaluator: Option<Arc<dyn QualityEvaluator>>,
        stream: Option<StreamSink>,
        cancel: CancellationToken,
        clock: std::time::Instant,
    ) -> TaskResult {
        let task_id = task.id.as_str();

        let mut roles: Vec<Role> = Vec::new();
        let mut seen_hints: HashSet<String> = HashSet::new();
        for subtask in &subtasks {
            let hint = if subtask.role_hint.is_empty() {
                "generalist".to_string()
            } else {
                subtask.role_hint.clone()
            };
            if seen_hints.insert(hint.clone()) {
                roles.push(Role::by_hint(&hint));
            }
        }

        if let Err(err) = self.teams.setup_team(&team.id, &roles).await {
            return self.abort(task_id, format!("team setup failed: {err}"), clock).await;
        }
        let _ = self.teams.set_team_state(&team.id, TeamState::Executing).await;

        let Some(board) = self.teams.board(&team.id).await else {
            return self.abort(task_id, format!("task board missing for team {}", team.id), clock).await;
        };
        if let Err(err) = board.publish(subtasks.clone(), dependency_map).await {
            return self.abort(task_id, format!("publish failed: {err}"), clock).await;
        }
        self.registry.set_subtask_total(task_id, subtasks.len()).await;

        let subtask_index: HashMap<String, SubTask> =
            subtasks.iter().map(|s| (s.id.clone(), s.clone())).collect();
        let child_cancel = cancel.child_token();
        let runner = Arc::new(GatedRunner {
            task_id: task_id.to_string(),
            team_id: team.id.clone(),
            factory: self.runner_factory.clone(),
            board: board.clone(),
            flow: Arc::new(Mutex::new(plan.execution_flow.clone())),
            subtask_index: Arc::new(Mutex::new(subtask_index)),
            outputs: Arc::new(Mutex::new(HashMap::new())),
            retry_counts: Arc::new(Mutex::new(HashMap::new())),
            evaluator,
            stream,
            registry: self.registry.clone(),
            config: self.config.quality.clone(),
            cancel: child_cancel.clone(),
        });

        let watcher = tokio::spawn(watch_deadline(
            task_id.to_string(),
            Duration::from_secs(self.config.execution.timeout_secs),
            self.config.execution.timeout_warn_threshold,
            self.timeout_callbacks.clone(),
            self.registry.clone(),
            child_cancel.clone(),
            clock,
        ));

        let wave_config = WaveExecutorConfig {
            max_concurrency: self.config.scheduler.max_concurrent_agents,
            claim_timeout: Duration::from_secs(team.config.claim_timeout_secs),
            reclaim_interval: Duration::from_secs(self.config.scheduler.reclaim_interval_secs),
        };
        let wave_result = WaveExecutor::new(wave_config)
            .execute(board.clone(), runner.clone(), child_cancel.clone())
            .await;
        watcher.abort();

        let _ = self.teams.set_team_state(&team.id, TeamState::Completed).await;
        let _ = self.registry.update_status(task_id, TaskStatus::Aggregating).await;

        // Aggregate in step order: the original steps first, then any
        // gate-added ones by priority.
        let outputs = runner.outputs.lock().await.clone();
        let mut ordered_ids: Vec<String> = subtasks.iter().map(|s| s.id.clone()).collect();
        {
            let index = runner.subtask_index.lock().await;
            let mut extras: Vec<&SubTask> = index
                .values()
                .filter(|s| !ordered_ids.contains(&s.id))
                .collect();
            extras.sort_by_key(|s| (s.priority, s.id.clone()));
            ordered_ids.extend(extras.into_iter().map(|s| s.id.clone()));
        }

        let sub_results: Vec<SubTaskResult> = ordered_ids
            .iter()
            .filter_map(|id| outputs.get(id).cloned())
            .collect();
        let output_parts: Vec<&str> = sub_results
            .iter()
            .filter(|r| r.success && !r.output.is_empty())
            .map(|r| r.output.as_str())
            .collect();

        let aggregated = if output_parts.len() == 1 {
            Some(output_parts[0].to_string())
        } else if output_parts.len() > 1 {
            Some(self.aggregate(&sub_results, &output_parts).await)
        } else {
            None
        };

        let success = wave_result.failed_tasks == 0 && wave_result.completed_tasks > 0;
        let timed_out = child_cancel.is_cancelled() && !cancel.is_cancelled();
        let was_cancelled = cancel.is_cancelled() || timed_out;

        let retry_counts = runner.retry_counts.lock().await.clone();
        let mut metadata = HashMap::new();
        if let Ok(value) = serde_json::to_value(&plan) {
            metadata.insert("task_plan".to_string(), value);
        }
        if let Ok(value) = serde_json::to_value(&wave_result) {
            metadata.insert("wave_execution_result".to_string(), value);
        }
        if let Ok(value) = serde_json::to_value(&retry_counts) {
            metadata.insert("quality_retries".to_string(), value);
        }

        let (status, error) = if was_cancelled {
            let message = if timed_out {
                format!(
                    "Task execution timed out after {} seconds",
                    self.config.execution.timeout_secs
                )
            } else {
                "Task cancelled".to_string()
            };
            self.registry.record_error(task_id, "task_cancelled", message.clone()).await;
            (TaskStatus::Cancelled, Some(message))
        } else if success {
            (TaskStatus::Completed, None)
        } else {
            let failed_ids: Vec<&str> = outputs
                .values()
                .filter(|r| !r.success)
                .map(|r| r.subtask_id.as_str())
                .collect();
            let message = format!(
                "{} sub-tasks failed ({})",
                wave_result.failed_tasks,
                failed_ids.join(", ")
            );
            self.registry.record_error(task_id, "execution_error", message.clone()).await;
            (TaskStatus::Failed, Some(message))
        };
        let _ = self.registry.update_status(task_id, status).await;

        let output = aggregated.or_else(|| {
            success.then(|| {
                format!(
                    "Completed {}/{} sub-tasks in {} waves",
                    wave_result.completed_tasks, wave_result.total_tasks, wave_result.total_waves
                )
            })
        });

        TaskResult {
            task_id: task_id.to_string(),
            success: success && !was_cancelled,
            output,
            error,
            execution_time: clock.elapsed().as_secs_f64(),
            sub_results,
            metadata,
        }
    }

    async fn aggregate(&self, sub_results: &[SubTaskResult], output_parts: &[&str]) -> String {
        if let Some(aggregator) = &self.aggregator {
            match aggregator.aggregate(sub_results).await {
                Ok(output) if !output.is_empty() => return output,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "external aggregation failed; joining outputs");
                }
            }
        }
        output_parts.join(OUTPUT_SEPARATOR)
    }

    async fn cancelled(
        &self,
        task_id: &str,
        message: &str,
        sub_results: &[SubTaskResult],
        clock: std::time::Instant,
    ) -> TaskResult {
        let _ = self.registry.update_status(task_id, TaskStatus::Cancelled).await;
        self.registry.record_error(task_id, "task_cancelled", message).await;
        let result = TaskResult {
            task_id: task_id.to_string(),
            success: false,
            output: None,
            error: Some(message.to_string()),
            execution_time: clock.elapsed().as_secs_f64(),
            sub_results: sub_results.to_vec(),
            metadata: HashMap::new(),
        };
        self.registry.store_result(result.clone()).await;
        result
    }
}

/// Convert plan steps to sub-tasks plus the forward dependency map.
/// Steps already marked skipped are left out; the positional
/// `suggested_agents` overlay is applied in step order.
fn convert_steps(plan: &TaskPlan, parent_task_id: &str) -> (Vec<SubTask>, HashMap<String, HashSet<String>>) {
    let mut subtasks = Vec::new();
    let mut dependency_map = HashMap::new();

    for step in plan.ordered_steps() {
        if step.status == crate::domain::models::StepStatus::Skipped {
            continue;
        }
        let deps: HashSet<String> = step
            .dependencies
            .iter()
            .filter(|d| *d != &step.step_id)
            .cloned()
            .collect();
        let subtask = SubTask {
            id: step.step_id.clone(),
            parent_task_id: parent_task_id.to_string(),
            content: step.description.clone(),
            role_hint: step.agent_type.clone(),
            dependencies: deps.clone(),
            priority: step.step_number,
            estimated_complexity: 1.0,
        };
        dependency_map.insert(step.step_id.clone(), deps);
        subtasks.push(subtask);
    }

    for (subtask, agent) in subtasks.iter_mut().zip(plan.suggested_agents.iter()) {
        if !agent.is_empty() {
            subtask.role_hint.clone_from(agent);
        }
    }

    (subtasks, dependency_map)
}

/// The runner handed to the wave executor: resolves the role, enriches the
/// step content with upstream outputs, invokes the role runner, and applies
/// the quality-gate verdict in place.
struct GatedRunner {
    task_id: String,
    team_id: String,
    factory: Arc<dyn RoleRunnerFactory>,
    board: Arc<TaskBoard>,
    flow: Arc<Mutex<crate::domain::models::ExecutionFlow>>,
    subtask_index: Arc<Mutex<HashMap<String, SubTask>>>,
    outputs: Arc<Mutex<HashMap<String, SubTaskResult>>>,
    retry_counts: Arc<Mutex<HashMap<String, u32>>>,
    evaluator: Option<Arc<dyn QualityEvaluator>>,
    stream: Option<StreamSink>,
    registry: Arc<TaskRegistry>,
    config: crate::domain::models::QualityConfig,
    cancel: CancellationToken,
}

#[async_trait]
impl SubTaskRunner for GatedRunner {
    async fn run(&self, subtask: SubTask) -> SwarmResult<String> {
        loop {
            let output = self.run_once(&subtask).await?;

            let Some(evaluator) = &self.evaluator else {
                return Ok(output);
            };
            if !self.config.enable_quality_gates || !evaluator.enabled() {
                return Ok(output);
            }
            let step = { self.flow.lock().await.steps.get(&subtask.id).cloned() };
            let Some(step) = step else {
                // Steps outside the plan's flow are not gated.
                return Ok(output);
            };
            let result = {
                self.outputs
                    .lock()
                    .await
                    .get(&subtask.id)
                    .cloned()
                    .unwrap_or_else(|| SubTaskResult::success(&subtask.id, "", output.clone()))
            };
            let flow_snapshot = { self.flow.lock().await.clone() };

            let verdict = match evaluator
                .evaluate(&step, &result, &flow_snapshot, self.stream.clone())
                .await
            {
                Ok(verdict) => verdict,
                Err(err) => {
                    // Gate bugs never block progress.
                    tracing::warn!(step_id = %subtask.id, %err, "quality evaluation failed; continuing");
                    return Ok(output);
                }
            };

            match verdict.action {
                GateAction::Continue => return Ok(output),
                GateAction::Retry => {
                    let mut counts = self.retry_counts.lock().await;
                    let count = counts.entry(subtask.id.clone()).or_insert(0);
                    if *count >= self.config.max_retry_on_failure {
                        tracing::warn!(
                            step_id = %subtask.id,
                            cap = self.config.max_retry_on_failure,
                            "retry cap reached; accepting output"
                        );
                        return Ok(output);
                    }
                    *count += 1;
                    drop(counts);
                    tracing::info!(step_id = %subtask.id, reason = %verdict.reason, "quality gate requested retry");
                    self.outputs.lock().await.remove(&subtask.id);
                }
                GateAction::Adjust(adjustments) => {
                    let published = quality_gate::apply_adjustments(
                        &adjustments,
                        &self.flow,
                        &self.board,
                        &self.task_id,
                        &self.subtask_index,
                    )
                    .await;
                    if !published.is_empty() {
                        self.registry.grow_subtask_total(&self.task_id, published.len()).await;
                    }
                    return Ok(output);
                }
            }
        }
    }
}

impl GatedRunner {
    async fn run_once(&self, subtask: &SubTask) -> SwarmResult<String> {
        let role = Role::by_hint(if subtask.role_hint.is_empty() {
            "generalist"
        } else {
            &subtask.role_hint
        });
        let agent_id = format!("team-agent-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let enriched = self.enrich(subtask).await;
        let enriched_subtask = subtask.clone().with_content(enriched);

        let ctx = RunContext {
            task_id: self.task_id.clone(),
            team_id: self.team_id.clone(),
            agent_id: agent_id.clone(),
            role: role.clone(),
            cancel: self.cancel.clone(),
        };

        let started = std::time::Instant::now();
        let runner = self.factory.runner_for(&role);
        let mut result = match runner.run(&enriched_subtask, &ctx).await {
            Ok(result) => result,
            Err(err) => SubTaskResult::failure(&subtask.id, &agent_id, err.to_string()),
        };
        if result.execution_time == 0.0 {
            result.execution_time = started.elapsed().as_secs_f64();
        }

        self.outputs.lock().await.insert(subtask.id.clone(), result.clone());
        self.registry.record_subtask_outcome(&self.task_id, result.success).await;

        if result.success {
            Ok(result.output)
        } else {
            Err(SwarmError::ExecutionFailed(
                result.error.unwrap_or_else(|| "sub-task execution failed".to_string()),
            ))
        }
    }

    /// Prefix the sub-task content with the truncated outputs of its
    /// completed dependencies.
    async fn enrich(&self, subtask: &SubTask) -> String {
        if subtask.dependencies.is_empty() {
            return subtask.content.clone();
        }

        let outputs = self.outputs.lock().await;
        let index = self.subtask_index.lock().await;
        let mut dep_ids: Vec<&String> = subtask.dependencies.iter().collect();
        dep_ids.sort();

        let mut sections = Vec::new();
        for dep_id in dep_ids {
            let Some(dep_result) = outputs.get(dep_id) else { continue };
            if !dep_result.success || dep_result.output.is_empty() {
                continue;
            }
            let dep_desc = index
                .get(dep_id)
                .map_or_else(|| dep_id.clone(), |s| truncate_chars(&s.content, 100));
            let dep_output = truncate_chars(&dep_result.output, self.config.dependency_context_limit);
            sections.push(format!("### From: {dep_desc}\n{dep_output}"));
        }

        if sections.is_empty() {
            return subtask.content.clone();
        }
        format!(
            "{}\n\n## Prior step results\n\n{}",
            subtask.content,
            sections.join(OUTPUT_SEPARATOR)
        )
    }
}

/// Character-boundary-safe prefix truncation.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Emits a warning at the threshold, then cancels the execution at the
/// hard deadline. Aborted once the wave executor returns.
async fn watch_deadline(
    task_id: String,
    timeout: Duration,
    warn_threshold: f64,
    callbacks: Arc<RwLock<Vec<TimeoutWarningCallback>>>,
    registry: Arc<TaskRegistry>,
    cancel: CancellationToken,
    started: std::time::Instant,
) {
    let warn_after = timeout.mul_f64(warn_threshold.clamp(0.0, 1.0));
    tokio::time::sleep(warn_after.saturating_sub(started.elapsed())).await;

    let elapsed = started.elapsed().as_secs_f64();
    let remaining = (timeout.as_secs_f64() - elapsed).max(0.0);
    tracing::warn!(task_id, elapsed, remaining, "execution approaching its deadline");
    for callback in callbacks.read().await.iter() {
        callback(&task_id, elapsed, remaining);
    }
    registry
        .record_error(
            &task_id,
            "timeout_warning",
            format!("{elapsed:.0}s elapsed, {remaining:.0}s remaining"),
        )
        .await;

    tokio::time::sleep(timeout.saturating_sub(started.elapsed())).await;
    tracing::warn!(task_id, "execution deadline reached; cancelling");
    registry
        .record_error(&task_id, "execution_timeout", format!("deadline of {}s reached", timeout.as_secs()))
        .await;
    cancel.cancel();
}
