//! Submission-surface behaviors: validation, cancellation, timeouts,
//! progress bands, and graceful shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use waggle::adapters::{HeuristicPlanner, ScriptedRunner, SharedRunnerFactory, StaticPlanner};
use waggle::domain::errors::{SwarmError, SwarmResult};
use waggle::domain::models::{Config, ExecutionFlow, ExecutionStep, SubTask, SubTaskResult, TaskPlan};
use waggle::domain::ports::{RoleRunner, RunContext};
use waggle::{MainAgent, TaskStatus};

fn single_step_plan() -> TaskPlan {
    TaskPlan {
        refined_task: String::new(),
        estimated_complexity: 1.0,
        execution_flow: ExecutionFlow::from_steps(vec![ExecutionStep::new(
            "s1",
            1,
            "do the thing",
            "generalist",
        )]),
        suggested_agents: Vec::new(),
    }
}

fn echo_agent() -> MainAgent {
    MainAgent::new(
        Config::default(),
        Arc::new(HeuristicPlanner::new()),
        Arc::new(SharedRunnerFactory::echo()),
    )
}

#[tokio::test]
async fn submission_validates_content_length() {
    let agent = echo_agent();

    assert!(agent.submit_task("", HashMap::new()).await.is_err());
    assert!(agent.submit_task("   \n\t ", HashMap::new()).await.is_err());
    let too_long = "x".repeat(100_001);
    assert!(agent.submit_task(&too_long, HashMap::new()).await.is_err());

    let task = agent.submit_task("write a haiku", HashMap::new()).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(
        task.metadata["task_type"],
        serde_json::Value::String("writing".to_string())
    );
    assert!(task.complexity >= 0.0 && task.complexity <= 10.0);
}

#[tokio::test]
async fn complexity_estimator_failure_falls_back_to_midpoint() {
    struct NoComplexity;
    #[async_trait]
    impl waggle::Planner for NoComplexity {
        async fn plan(&self, _task: &waggle::Task) -> SwarmResult<TaskPlan> {
            Ok(single_step_plan())
        }
        async fn estimate_complexity(&self, _task: &waggle::Task) -> SwarmResult<f64> {
            Err(SwarmError::PlanningFailed("estimator offline".to_string()))
        }
    }

    let agent = MainAgent::new(
        Config::default(),
        Arc::new(NoComplexity),
        Arc::new(SharedRunnerFactory::echo()),
    );
    let task = agent.submit_task("anything at all", HashMap::new()).await.unwrap();
    assert!((task.complexity - 5.0).abs() < f64::EPSILON);
    assert!(task.metadata.contains_key("complexity_analysis_error"));
}

#[tokio::test]
async fn end_to_end_echo_execution() {
    let agent = echo_agent();
    let task = agent.submit_task("translate hello to French", HashMap::new()).await.unwrap();
    let result = agent.execute_task(&task.id).await;

    assert!(result.success, "echo run failed: {:?}", result.error);
    assert!(result.output.is_some());
    assert_eq!(agent.task_status(&task.id).await.unwrap(), TaskStatus::Completed);

    let progress = agent.progress(&task.id).await.unwrap();
    assert_eq!(progress.percent, 100);

    let summary = agent.summary(&task.id).await.unwrap();
    assert_eq!(summary.failed_subtasks, 0);
    assert!(summary.successful_subtasks >= 1);
}

#[tokio::test]
async fn execution_apis_never_error_for_unknown_tasks() {
    let agent = echo_agent();
    let result = agent.execute_task("no-such-task").await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("not found"));
}

#[tokio::test]
async fn cancel_is_idempotent_and_converges() {
    let agent = echo_agent();
    assert!(!agent.cancel_task("ghost").await);

    let task = agent.submit_task("some work", HashMap::new()).await.unwrap();
    assert!(agent.cancel_task(&task.id).await);
    assert_eq!(agent.task_status(&task.id).await.unwrap(), TaskStatus::Cancelled);
    // Second cancellation of a terminal task reports false.
    assert!(!agent.cancel_task(&task.id).await);
}

#[tokio::test]
async fn cancelling_a_running_task_stops_it() {
    struct HangingRunner;
    #[async_trait]
    impl RoleRunner for HangingRunner {
        async fn run(&self, _subtask: &SubTask, ctx: &RunContext) -> SwarmResult<SubTaskResult> {
            // Cooperative: wait on the cancellation signal.
            ctx.cancel.cancelled().await;
            Err(SwarmError::Cancelled)
        }
    }

    let agent = Arc::new(MainAgent::new(
        Config::default(),
        Arc::new(StaticPlanner::new(single_step_plan())),
        Arc::new(SharedRunnerFactory::new(Arc::new(HangingRunner))),
    ));
    let task = agent.submit_task("hang forever", HashMap::new()).await.unwrap();

    let handle = agent.clone().spawn_task(&task.id);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert!(agent.cancel_task(&task.id).await);

    let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("execution did not unwind after cancel")
        .unwrap();
    assert!(!result.success);
}

#[tokio::test]
async fn spawned_task_resolves_to_its_result() {
    let agent = Arc::new(echo_agent());
    let task = agent.submit_task("summarize the notes", HashMap::new()).await.unwrap();

    let result = agent.clone().spawn_task(&task.id).await.unwrap();
    assert!(result.success);
    assert_eq!(agent.task_status(&task.id).await.unwrap(), TaskStatus::Completed);
}

#[tokio::test]
async fn spawn_after_cancellation_never_executes() {
    let runner = Arc::new(ScriptedRunner::new());
    let agent = Arc::new(MainAgent::new(
        Config::default(),
        Arc::new(StaticPlanner::new(single_step_plan())),
        Arc::new(runner.clone()),
    ));
    let task = agent.submit_task("doomed work", HashMap::new()).await.unwrap();
    assert!(agent.cancel_task(&task.id).await);

    let result = agent.clone().spawn_task(&task.id).await.unwrap();
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("cancelled"));
    assert_eq!(runner.invocations("s1").await, 0);
    assert_eq!(agent.task_status(&task.id).await.unwrap(), TaskStatus::Cancelled);
}

#[tokio::test]
async fn execution_deadline_cancels_the_run() {
    struct SlowRunner;
    #[async_trait]
    impl RoleRunner for SlowRunner {
        async fn run(&self, subtask: &SubTask, ctx: &RunContext) -> SwarmResult<SubTaskResult> {
            tokio::select! {
                () = ctx.cancel.cancelled() => Err(SwarmError::Cancelled),
                () = tokio::time::sleep(std::time::Duration::from_secs(60)) => {
                    Ok(SubTaskResult::success(&subtask.id, &ctx.agent_id, "late"))
                }
            }
        }
    }

    let mut config = Config::default();
    config.execution.timeout_secs = 1;

    let agent = MainAgent::new(
        config,
        Arc::new(StaticPlanner::new(single_step_plan())),
        Arc::new(SharedRunnerFactory::new(Arc::new(SlowRunner))),
    );
    let task = agent.submit_task("slow work", HashMap::new()).await.unwrap();
    let plan = single_step_plan();
    let result = agent.execute_with_plan(&task.id, plan, None, None).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("timed out"));
    assert_eq!(agent.task_status(&task.id).await.unwrap(), TaskStatus::Cancelled);
}

#[tokio::test]
async fn graceful_shutdown_cancels_active_tasks() {
    let agent = echo_agent();
    let keep = agent.submit_task("first", HashMap::new()).await.unwrap();
    let done = agent.submit_task("second", HashMap::new()).await.unwrap();
    agent.execute_task(&done.id).await;

    let summary = agent.graceful_shutdown().await;
    assert_eq!(summary.cancelled_tasks, vec![keep.id.clone()]);
    assert!(summary.errors.is_empty());
    assert_eq!(agent.task_status(&keep.id).await.unwrap(), TaskStatus::Cancelled);
    // Terminal tasks are untouched.
    assert_eq!(agent.task_status(&done.id).await.unwrap(), TaskStatus::Completed);
}

#[tokio::test]
async fn progress_uses_status_bands() {
    let agent = echo_agent();
    let task = agent.submit_task("band check", HashMap::new()).await.unwrap();
    let progress = agent.progress(&task.id).await.unwrap();
    assert_eq!(progress.percent, 0);
    assert_eq!(progress.status, TaskStatus::Pending);
}
