//! Role runner port.
//!
//! A role runner executes one sub-task as one agent persona: it may run a
//! multi-turn LLM loop, open tool connections, and must observe the
//! cancellation token at its suspension points.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::errors::SwarmResult;
use crate::domain::models::{Role, SubTask, SubTaskResult};

/// Everything a runner needs beyond the sub-task itself.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The parent user task.
    pub task_id: String,
    /// The team this execution belongs to.
    pub team_id: String,
    /// The agent identity minted for this invocation.
    pub agent_id: String,
    /// Resolved role definition (prompt, tools, model parameters).
    pub role: Role,
    /// Cooperative cancellation; runners return promptly once cancelled.
    pub cancel: CancellationToken,
}

/// Executes one sub-task.
#[async_trait]
pub trait RoleRunner: Send + Sync {
    /// Run the sub-task to completion.
    ///
    /// A domain-level failure (the agent tried and failed) is expressed as
    /// `Ok` with `success = false`; `Err` is reserved for infrastructure
    /// problems. The executor treats both as a failed sub-task.
    async fn run(&self, subtask: &SubTask, ctx: &RunContext) -> SwarmResult<SubTaskResult>;
}

/// Builds role runners for a team.
pub trait RoleRunnerFactory: Send + Sync {
    /// Create a runner for the given role.
    fn runner_for(&self, role: &Role) -> std::sync::Arc<dyn RoleRunner>;
}
