//! Domain models.
//!
//! Pure entities with business logic and validation rules. These models are
//! framework-agnostic and contain no infrastructure concerns.

pub mod board;
pub mod config;
pub mod plan;
pub mod result;
pub mod role;
pub mod task;
pub mod team;
pub mod wave;

pub use board::{BoardEntry, BoardStatus, ClaimError};
pub use config::{Config, ExecutionConfig, LoggingConfig, QualityConfig, SchedulerConfig};
pub use plan::{ExecutionFlow, ExecutionStep, FlowAdjustment, StepStatus, TaskPlan};
pub use result::{SubTaskResult, TaskResult, TokenUsage, ToolCallRecord};
pub use role::{builtin_roles, ModelConfig, Role};
pub use task::{SubTask, Task, TaskStatus};
pub use team::{DisbandResult, Team, TeamConfig, TeamState};
pub use wave::{WaveExecutionResult, WaveStats};
