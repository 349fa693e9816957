//! Waggle - multi-agent task orchestration core.
//!
//! Decomposes a user request into a DAG of sub-tasks, schedules them
//! across a bounded pool of agent workers, enforces at-most-one-claim
//! semantics on shared task state, propagates failure through dependency
//! chains, and aggregates results. Supports mid-flight quality gating
//! that can retry, skip, or inject new sub-tasks dynamically.
//!
//! The in-process seams (planner, role runners, quality evaluator,
//! aggregator) live in [`domain::ports`]; everything behind them is an
//! external collaborator. All state is in-memory.

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export key types for convenience
pub use domain::errors::{SwarmError, SwarmResult};
pub use domain::models::{
    BoardEntry, BoardStatus, ClaimError, Config, DisbandResult, ExecutionFlow, ExecutionStep,
    FlowAdjustment, Role, StepStatus, SubTask, SubTaskResult, Task, TaskPlan, TaskResult,
    TaskStatus, Team, TeamConfig, TeamState, WaveExecutionResult, WaveStats,
};
pub use domain::ports::{
    GateAction, GateVerdict, Planner, QualityEvaluator, ResultAggregator, RoleRunner,
    RoleRunnerFactory, RunContext, StreamSink,
};
pub use services::{MainAgent, MessageBus, TaskBoard, TaskExecutor, TeamLifecycleManager, WaveExecutor};
