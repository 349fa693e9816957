//! Scripted port implementations.
//!
//! In-process stand-ins for the external collaborators, used by the CLI
//! demo and the test suite: an echo runner that completes every sub-task
//! with canned text, a scripted runner with per-step outcomes, a scripted
//! evaluator that replays a verdict sequence, and a static planner that
//! returns a prebuilt plan.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{SubTask, SubTaskResult, Task, TaskPlan, TokenUsage};
use crate::domain::ports::{
    GateVerdict, Planner, QualityEvaluator, RoleRunner, RoleRunnerFactory, RunContext, StreamSink,
};
use crate::domain::models::{ExecutionFlow, ExecutionStep};

/// Completes every sub-task with a short echo of its content.
#[derive(Debug, Default)]
pub struct EchoRunner;

#[async_trait]
impl RoleRunner for EchoRunner {
    async fn run(&self, subtask: &SubTask, ctx: &RunContext) -> SwarmResult<SubTaskResult> {
        if ctx.cancel.is_cancelled() {
            return Err(SwarmError::Cancelled);
        }
        let headline = subtask.content.lines().next().unwrap_or_default();
        let mut result = SubTaskResult::success(
            &subtask.id,
            &ctx.agent_id,
            format!("[{}] {}", ctx.role.name, headline),
        );
        result.token_usage = TokenUsage {
            input_tokens: subtask.content.len() as u64 / 4,
            output_tokens: 32,
        };
        Ok(result)
    }
}

/// Hands every role the same shared runner.
pub struct SharedRunnerFactory {
    runner: Arc<dyn RoleRunner>,
}

impl SharedRunnerFactory {
    pub fn new(runner: Arc<dyn RoleRunner>) -> Self {
        Self { runner }
    }

    pub fn echo() -> Self {
        Self::new(Arc::new(EchoRunner))
    }
}

impl RoleRunnerFactory for SharedRunnerFactory {
    fn runner_for(&self, _role: &crate::domain::models::Role) -> Arc<dyn RoleRunner> {
        self.runner.clone()
    }
}

/// What a scripted runner does for one sub-task id.
#[derive(Debug, Clone)]
enum ScriptedOutcome {
    Ok(String),
    Fail(String),
    Panic,
}

/// Runner with per-sub-task scripted outcomes and invocation counting.
/// Unscripted ids succeed with a default echo.
#[derive(Default)]
pub struct ScriptedRunner {
    outcomes: Mutex<HashMap<String, ScriptedOutcome>>,
    invocations: Mutex<HashMap<String, usize>>,
    /// Content each sub-task was invoked with, for assertions on
    /// dependency enrichment.
    seen_content: Mutex<HashMap<String, Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn succeed_with(&self, subtask_id: &str, output: &str) {
        self.outcomes
            .lock()
            .await
            .insert(subtask_id.to_string(), ScriptedOutcome::Ok(output.to_string()));
    }

    pub async fn fail_with(&self, subtask_id: &str, error: &str) {
        self.outcomes
            .lock()
            .await
            .insert(subtask_id.to_string(), ScriptedOutcome::Fail(error.to_string()));
    }

    pub async fn panic_on(&self, subtask_id: &str) {
        self.outcomes
            .lock()
            .await
            .insert(subtask_id.to_string(), ScriptedOutcome::Panic);
    }

    pub async fn invocations(&self, subtask_id: &str) -> usize {
        self.invocations.lock().await.get(subtask_id).copied().unwrap_or(0)
    }

    pub async fn seen_content(&self, subtask_id: &str) -> Vec<String> {
        self.seen_content
            .lock()
            .await
            .get(subtask_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoleRunner for ScriptedRunner {
    async fn run(&self, subtask: &SubTask, ctx: &RunContext) -> SwarmResult<SubTaskResult> {
        *self
            .invocations
            .lock()
            .await
            .entry(subtask.id.clone())
            .or_insert(0) += 1;
        self.seen_content
            .lock()
            .await
            .entry(subtask.id.clone())
            .or_default()
            .push(subtask.content.clone());

        let outcome = self.outcomes.lock().await.get(&subtask.id).cloned();
        match outcome {
            Some(ScriptedOutcome::Ok(output)) => {
                Ok(SubTaskResult::success(&subtask.id, &ctx.agent_id, output))
            }
            Some(ScriptedOutcome::Fail(error)) => {
                Ok(SubTaskResult::failure(&subtask.id, &ctx.agent_id, error))
            }
            Some(ScriptedOutcome::Panic) => panic!("scripted panic for {}", subtask.id),
            None => Ok(SubTaskResult::success(
                &subtask.id,
                &ctx.agent_id,
                format!("done: {}", subtask.id),
            )),
        }
    }
}

impl RoleRunnerFactory for Arc<ScriptedRunner> {
    fn runner_for(&self, _role: &crate::domain::models::Role) -> Arc<dyn RoleRunner> {
        self.clone()
    }
}

/// Replays a scripted sequence of verdicts per step; steps with an empty
/// queue get `Continue`.
#[derive(Default)]
pub struct ScriptedEvaluator {
    verdicts: Mutex<HashMap<String, VecDeque<GateVerdict>>>,
    evaluations: Mutex<HashMap<String, usize>>,
}

impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_verdict(&self, step_id: &str, verdict: GateVerdict) {
        self.verdicts
            .lock()
            .await
            .entry(step_id.to_string())
            .or_default()
            .push_back(verdict);
    }

    pub async fn evaluations(&self, step_id: &str) -> usize {
        self.evaluations.lock().await.get(step_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl QualityEvaluator for ScriptedEvaluator {
    async fn evaluate(
        &self,
        step: &ExecutionStep,
        _result: &SubTaskResult,
        _flow: &ExecutionFlow,
        _stream: Option<StreamSink>,
    ) -> SwarmResult<GateVerdict> {
        *self
            .evaluations
            .lock()
            .await
            .entry(step.step_id.clone())
            .or_insert(0) += 1;
        let verdict = self
            .verdicts
            .lock()
            .await
            .get_mut(&step.step_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(GateVerdict::proceed);
        Ok(verdict)
    }
}

/// Planner returning a prebuilt plan verbatim.
pub struct StaticPlanner {
    plan: TaskPlan,
}

impl StaticPlanner {
    pub fn new(plan: TaskPlan) -> Self {
        Self { plan }
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(&self, _task: &Task) -> SwarmResult<TaskPlan> {
        Ok(self.plan.clone())
    }

    async fn estimate_complexity(&self, _task: &Task) -> SwarmResult<f64> {
        Ok(self.plan.estimated_complexity)
    }
}
