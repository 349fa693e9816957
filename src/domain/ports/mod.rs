//! Domain ports (interfaces) for the waggle orchestration core.

pub mod aggregator;
pub mod planner;
pub mod quality;
pub mod runner;

pub use aggregator::ResultAggregator;
pub use planner::Planner;
pub use quality::{GateAction, GateVerdict, QualityEvaluator, StreamSink};
pub use runner::{RoleRunner, RoleRunnerFactory, RunContext};
