//! Event-driven wave executor.
//!
//! Drives a task board to a terminal state with maximum safe parallelism.
//! There is no wave barrier: every completion immediately unlocks and
//! starts whatever became runnable, and a "wave" is only the statistical
//! grouping of entries released by the same unlock event. A background
//! ticker reclaims claims whose agent never started running.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{BoardStatus, SubTask, WaveExecutionResult, WaveStats};
use crate::services::task_board::TaskBoard;

/// Agent id the executor claims entries under.
pub const EXECUTOR_AGENT_ID: &str = "wave-executor";

/// Executes one claimed sub-task and returns its textual output.
///
/// This is the seam between the scheduler and whatever actually runs a
/// sub-task (the task executor's gated runner in production, scripted
/// runners in tests). Errors and panics both fail the entry and propagate
/// `Blocked` downstream.
#[async_trait]
pub trait SubTaskRunner: Send + Sync {
    async fn run(&self, subtask: SubTask) -> SwarmResult<String>;
}

/// Tunables for one executor instance.
#[derive(Debug, Clone)]
pub struct WaveExecutorConfig {
    /// Upper bound on concurrently running workers.
    pub max_concurrency: usize,
    /// Age at which an unstarted claim is considered stuck.
    pub claim_timeout: Duration,
    /// Cadence of the reclaim scan.
    pub reclaim_interval: Duration,
}

impl Default for WaveExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            claim_timeout: Duration::from_secs(60),
            reclaim_interval: Duration::from_secs(10),
        }
    }
}

enum WorkerOutcome {
    Completed {
        task_id: String,
        wave: usize,
        unlocked: Vec<String>,
    },
    Failed {
        task_id: String,
        wave: usize,
    },
    /// The worker never ran the entry (claim lost or cancelled early).
    Skipped {
        task_id: String,
        wave: usize,
    },
}

struct WaveTally {
    started_at: DateTime<Utc>,
    task_count: usize,
    completed: usize,
    failed: usize,
}

/// Everything a spawned worker needs, cloneable per entry.
#[derive(Clone)]
struct WorkerContext {
    board: Arc<TaskBoard>,
    runner: Arc<dyn SubTaskRunner>,
    tx: mpsc::UnboundedSender<WorkerOutcome>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

/// Event-driven scheduler over one task board.
pub struct WaveExecutor {
    config: WaveExecutorConfig,
}

impl Default for WaveExecutor {
    fn default() -> Self {
        Self::new(WaveExecutorConfig::default())
    }
}

impl WaveExecutor {
    pub fn new(config: WaveExecutorConfig) -> Self {
        Self { config }
    }

    /// Run every entry on the board to a terminal state.
    ///
    /// Blocks until the active worker set is empty and no reclaim produces
    /// more work. Cancellation stops new spawns and reclaims; outstanding
    /// workers drain cooperatively.
    pub async fn execute(
        &self,
        board: Arc<TaskBoard>,
        runner: Arc<dyn SubTaskRunner>,
        cancel: CancellationToken,
    ) -> WaveExecutionResult {
        let clock = std::time::Instant::now();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = WorkerContext {
            board: board.clone(),
            runner,
            tx,
            semaphore: Arc::new(Semaphore::new(self.config.max_concurrency.max(1))),
            cancel: cancel.clone(),
        };

        let mut waves: Vec<WaveTally> = Vec::new();
        let mut active: HashSet<String> = HashSet::new();
        let mut completed = 0usize;
        let mut failed = 0usize;

        let initial: Vec<String> = board
            .available(EXECUTOR_AGENT_ID, None)
            .await
            .into_iter()
            .map(|e| e.task_id)
            .collect();
        spawn_batch(&ctx, initial, &mut active, &mut waves);

        let mut reclaim = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.reclaim_interval,
            self.config.reclaim_interval,
        );
        reclaim.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if active.is_empty() {
                if cancel.is_cancelled() {
                    break;
                }
                // Quality-gate adjustments can leave entries pending without
                // any unlock event (added steps, scrubbed dependencies);
                // sweep them up before declaring the run finished.
                let leftovers: Vec<String> = board
                    .available(EXECUTOR_AGENT_ID, None)
                    .await
                    .into_iter()
                    .map(|e| e.task_id)
                    .collect();
                if leftovers.is_empty() {
                    break;
                }
                spawn_batch(&ctx, leftovers, &mut active, &mut waves);
            }
            tokio::select! {
                outcome = rx.recv() => {
                    let Some(outcome) = outcome else { break };
                    match outcome {
                        WorkerOutcome::Completed { task_id, wave, unlocked } => {
                            active.remove(&task_id);
                            completed += 1;
                            waves[wave].completed += 1;
                            if !cancel.is_cancelled() {
                                spawn_batch(&ctx, unlocked, &mut active, &mut waves);
                            }
                        }
                        WorkerOutcome::Failed { task_id, wave } => {
                            active.remove(&task_id);
                            failed += 1;
                            waves[wave].failed += 1;
                        }
                        WorkerOutcome::Skipped { task_id, .. } => {
                            active.remove(&task_id);
                        }
                    }
                }
                _ = reclaim.tick(), if !cancel.is_cancelled() => {
                    let revived = board.reclaim_expired(self.config.claim_timeout).await;
                    if !revived.is_empty() {
                        tracing::info!(count = revived.len(), "reclaimed expired claims");
                        spawn_batch(&ctx, revived, &mut active, &mut waves);
                    }
                }
            }
        }

        let finished_at = Utc::now();
        let wave_stats: Vec<WaveStats> = waves
            .iter()
            .enumerate()
            .map(|(i, wave)| WaveStats {
                wave_number: i,
                task_count: wave.task_count,
                parallelism: wave.task_count,
                started_at: wave.started_at,
                ended_at: waves.get(i + 1).map_or(finished_at, |next| next.started_at),
                completed_tasks: wave.completed,
                failed_tasks: wave.failed,
            })
            .collect();

        let counts = board.status_counts().await;
        WaveExecutionResult {
            total_waves: wave_stats.len(),
            total_tasks: board.len().await,
            completed_tasks: completed,
            failed_tasks: failed,
            blocked_tasks: counts.get(&BoardStatus::Blocked).copied().unwrap_or(0),
            wave_stats,
            total_execution_time: clock.elapsed().as_secs_f64(),
        }
    }
}

/// Register a new wave for the given ids and spawn one worker per entry.
/// Ids already being worked are dropped; an empty batch registers nothing.
fn spawn_batch(
    ctx: &WorkerContext,
    ids: Vec<String>,
    active: &mut HashSet<String>,
    waves: &mut Vec<WaveTally>,
) {
    let fresh: Vec<String> = ids.into_iter().filter(|id| !active.contains(id)).collect();
    if fresh.is_empty() {
        return;
    }

    let wave = waves.len();
    waves.push(WaveTally {
        started_at: Utc::now(),
        task_count: fresh.len(),
        completed: 0,
        failed: 0,
    });
    tracing::debug!(wave, tasks = fresh.len(), "wave released");

    for task_id in fresh {
        active.insert(task_id.clone());
        tokio::spawn(run_entry(ctx.clone(), task_id, wave));
    }
}

/// One worker: claim, mark in progress, run, record the terminal status,
/// and report newly unlocked dependents back to the scheduler loop.
async fn run_entry(ctx: WorkerContext, task_id: String, wave: usize) {
    let skip = |task_id: String| {
        let _ = ctx.tx.send(WorkerOutcome::Skipped { task_id, wave });
    };

    let Ok(_permit) = ctx.semaphore.clone().acquire_owned().await else {
        skip(task_id);
        return;
    };
    if ctx.cancel.is_cancelled() {
        skip(task_id);
        return;
    }

    if let Err(err) = ctx.board.claim(EXECUTOR_AGENT_ID, &task_id).await {
        // Expected under contention or after a reclaim race; the entry is
        // someone else's problem now.
        tracing::debug!(task_id, %err, "claim not acquired");
        skip(task_id);
        return;
    }
    if ctx
        .board
        .update_status(&task_id, BoardStatus::InProgress, None)
        .await
        .is_err()
    {
        skip(task_id);
        return;
    }
    let subtask: SubTask = match ctx.board.get(&task_id).await {
        Ok(entry) => entry.subtask,
        Err(_) => {
            skip(task_id);
            return;
        }
    };

    let run: SwarmResult<String> = tokio::select! {
        () = ctx.cancel.cancelled() => Err(SwarmError::Cancelled),
        caught = AssertUnwindSafe(ctx.runner.run(subtask)).catch_unwind() => {
            caught.unwrap_or_else(|_| Err(SwarmError::ExecutionFailed("runner panicked".to_string())))
        }
    };

    match run {
        Ok(output) => {
            let _ = ctx
                .board
                .update_status(&task_id, BoardStatus::Completed, Some(output))
                .await;
            // Upstream failure may have forced this entry to blocked while
            // the runner was mid-flight; the write above was then dropped
            // and this completion must not be counted.
            let accepted = ctx
                .board
                .get(&task_id)
                .await
                .map(|e| e.status == BoardStatus::Completed)
                .unwrap_or(false);
            if accepted {
                let unlocked = ctx.board.on_completed(&task_id).await;
                let _ = ctx.tx.send(WorkerOutcome::Completed { task_id, wave, unlocked });
            } else {
                let _ = ctx.tx.send(WorkerOutcome::Skipped { task_id, wave });
            }
        }
        Err(err) => {
            tracing::warn!(task_id, %err, "sub-task failed");
            let _ = ctx
                .board
                .update_status(&task_id, BoardStatus::Failed, Some(err.to_string()))
                .await;
            let blocked = ctx.board.propagate_failure(&task_id).await;
            if !blocked.is_empty() {
                tracing::info!(task_id, downstream = blocked.len(), "blocked dependents of failed sub-task");
            }
            let _ = ctx.tx.send(WorkerOutcome::Failed { task_id, wave });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FnRunner<F>(F);

    #[async_trait]
    impl<F> SubTaskRunner for FnRunner<F>
    where
        F: Fn(&SubTask) -> SwarmResult<String> + Send + Sync,
    {
        async fn run(&self, subtask: SubTask) -> SwarmResult<String> {
            (self.0)(&subtask)
        }
    }

    fn subtask(id: &str, deps: &[&str]) -> SubTask {
        let mut st = SubTask::new(id, "task-1", format!("do {id}"));
        for dep in deps {
            st = st.with_dependency(*dep);
        }
        st
    }

    async fn publish(board: &TaskBoard, tasks: Vec<SubTask>) {
        let deps: HashMap<String, std::collections::HashSet<String>> = tasks
            .iter()
            .map(|t| (t.id.clone(), t.dependencies.clone()))
            .collect();
        board.publish(tasks, deps).await.unwrap();
    }

    #[tokio::test]
    async fn empty_board_returns_zero_waves() {
        let executor = WaveExecutor::default();
        let board = Arc::new(TaskBoard::new());
        let runner = Arc::new(FnRunner(|_: &SubTask| Ok("x".to_string())));
        let result = executor.execute(board, runner, CancellationToken::new()).await;
        assert_eq!(result.total_waves, 0);
        assert_eq!(result.total_tasks, 0);
        assert_eq!(result.completed_tasks, 0);
    }

    #[tokio::test]
    async fn linear_chain_runs_in_three_waves() {
        let executor = WaveExecutor::default();
        let board = Arc::new(TaskBoard::new());
        publish(
            &board,
            vec![subtask("s1", &[]), subtask("s2", &["s1"]), subtask("s3", &["s2"])],
        )
        .await;
        let runner = Arc::new(FnRunner(|st: &SubTask| Ok(format!("out-{}", st.id))));

        let result = executor.execute(board.clone(), runner, CancellationToken::new()).await;
        assert_eq!(result.total_waves, 3);
        assert_eq!(result.completed_tasks, 3);
        assert_eq!(result.failed_tasks, 0);
        assert!(result.is_success());
        for stats in &result.wave_stats {
            assert_eq!(stats.task_count, 1);
        }
        assert_eq!(
            board.get("s3").await.unwrap().result.as_deref(),
            Some("out-s3")
        );
    }

    #[tokio::test]
    async fn failure_blocks_downstream_only() {
        let executor = WaveExecutor::default();
        let board = Arc::new(TaskBoard::new());
        publish(
            &board,
            vec![
                subtask("s1", &[]),
                subtask("s2", &["s1"]),
                subtask("s3", &["s2"]),
                subtask("s4", &[]),
            ],
        )
        .await;
        let runner = Arc::new(FnRunner(|st: &SubTask| {
            if st.id == "s2" {
                Err(SwarmError::ExecutionFailed("s2 exploded".to_string()))
            } else {
                Ok(format!("out-{}", st.id))
            }
        }));

        let result = executor.execute(board.clone(), runner, CancellationToken::new()).await;
        assert_eq!(result.completed_tasks, 2);
        assert_eq!(result.failed_tasks, 1);
        assert_eq!(result.blocked_tasks, 1);
        assert_eq!(board.get("s1").await.unwrap().status, BoardStatus::Completed);
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Failed);
        assert_eq!(board.get("s3").await.unwrap().status, BoardStatus::Blocked);
        assert_eq!(board.get("s4").await.unwrap().status, BoardStatus::Completed);
    }

    #[tokio::test]
    async fn runner_panic_is_a_failure() {
        let executor = WaveExecutor::default();
        let board = Arc::new(TaskBoard::new());
        publish(&board, vec![subtask("s1", &[])]).await;
        let runner = Arc::new(FnRunner(|_: &SubTask| -> SwarmResult<String> {
            panic!("runner bug")
        }));

        let result = executor.execute(board.clone(), runner, CancellationToken::new()).await;
        assert_eq!(result.failed_tasks, 1);
        let entry = board.get("s1").await.unwrap();
        assert_eq!(entry.status, BoardStatus::Failed);
        assert!(entry.result.as_deref().unwrap_or_default().contains("panicked"));
    }

    #[tokio::test]
    async fn concurrency_is_bounded_by_config() {
        let executor = WaveExecutor::new(WaveExecutorConfig {
            max_concurrency: 2,
            ..WaveExecutorConfig::default()
        });
        let board = Arc::new(TaskBoard::new());
        publish(
            &board,
            (0..6).map(|i| subtask(&format!("s{i}"), &[])).collect(),
        )
        .await;

        struct GaugeRunner {
            live: AtomicUsize,
            peak: AtomicUsize,
        }
        #[async_trait]
        impl SubTaskRunner for GaugeRunner {
            async fn run(&self, _subtask: SubTask) -> SwarmResult<String> {
                let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(live, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.live.fetch_sub(1, Ordering::SeqCst);
                Ok("done".to_string())
            }
        }
        let runner = Arc::new(GaugeRunner {
            live: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });

        let result = executor
            .execute(board, runner.clone(), CancellationToken::new())
            .await;
        assert_eq!(result.completed_tasks, 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn cancellation_drains_without_spawning_successors() {
        let executor = WaveExecutor::default();
        let board = Arc::new(TaskBoard::new());
        publish(&board, vec![subtask("s1", &[]), subtask("s2", &["s1"])]).await;

        let cancel = CancellationToken::new();
        struct SlowRunner;
        #[async_trait]
        impl SubTaskRunner for SlowRunner {
            async fn run(&self, _subtask: SubTask) -> SwarmResult<String> {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok("never".to_string())
            }
        }

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let result = executor.execute(board.clone(), Arc::new(SlowRunner), cancel).await;
        assert_eq!(result.completed_tasks, 0);
        assert_eq!(result.failed_tasks, 1);
        assert_eq!(board.get("s1").await.unwrap().status, BoardStatus::Failed);
        // The dependent was never unlocked or claimed.
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Blocked);
    }
}
