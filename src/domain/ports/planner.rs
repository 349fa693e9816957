//! Planner port.

use async_trait::async_trait;

use crate::domain::errors::SwarmResult;
use crate::domain::models::{Task, TaskPlan};

/// Produces an execution plan for a task.
///
/// The planner is an external collaborator (typically LLM-backed); the core
/// only depends on this seam. Implementations must not share mutable state
/// across tasks.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Turn a user task into ordered steps with dependencies and
    /// suggested roles.
    async fn plan(&self, task: &Task) -> SwarmResult<TaskPlan>;

    /// Estimate task complexity on a 0..=10 scale.
    async fn estimate_complexity(&self, task: &Task) -> SwarmResult<f64>;
}
