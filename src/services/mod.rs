//! Application services for the waggle orchestration core.

pub mod main_agent;
pub mod message_bus;
pub mod quality_gate;
pub mod registry;
pub mod task_board;
pub mod task_executor;
pub mod team_manager;
pub mod wave_executor;

pub use main_agent::{classify_task_type, ExecutionSummary, MainAgent, ShutdownSummary, TaskProgress};
pub use message_bus::{AgentMessage, DeliveryStatus, MessageBus};
pub use registry::{ErrorRecord, SubTaskProgress, TaskRegistry};
pub use task_board::TaskBoard;
pub use task_executor::{TaskExecutor, TimeoutWarningCallback};
pub use team_manager::{AgentHandle, TeamLifecycleManager};
pub use wave_executor::{SubTaskRunner, WaveExecutor, WaveExecutorConfig, EXECUTOR_AGENT_ID};
