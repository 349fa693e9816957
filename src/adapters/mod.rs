//! In-process adapters for the domain ports.
//!
//! These back the CLI demo and the test suite; real deployments supply
//! LLM-backed implementations of the same traits.

pub mod heuristic;
pub mod scripted;

pub use heuristic::HeuristicPlanner;
pub use scripted::{EchoRunner, ScriptedEvaluator, ScriptedRunner, SharedRunnerFactory, StaticPlanner};
