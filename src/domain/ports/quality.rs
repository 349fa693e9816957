//! Quality evaluator port.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::SwarmResult;
use crate::domain::models::{ExecutionFlow, ExecutionStep, FlowAdjustment, SubTaskResult};

/// Uni-directional sink for per-step streaming output.
pub type StreamSink = Arc<dyn Fn(&str) + Send + Sync>;

/// What the gate decided for a completed step.
#[derive(Debug, Clone, Default)]
pub struct GateVerdict {
    pub action: GateAction,
    /// Optional quality score, 1..=10.
    pub quality_score: Option<f64>,
    pub reason: String,
}

impl GateVerdict {
    pub fn proceed() -> Self {
        Self::default()
    }
}

/// The gate's decision space.
#[derive(Debug, Clone, Default)]
pub enum GateAction {
    /// Accept the step output and move on.
    #[default]
    Continue,
    /// Re-run the step in place (bounded by the configured retry cap).
    Retry,
    /// Mutate the running flow, then move on.
    Adjust(Vec<FlowAdjustment>),
}

/// Post-step evaluation hook.
///
/// Gate failures must never block progress: the executor treats an `Err`
/// from `evaluate` as `Continue`.
#[async_trait]
pub trait QualityEvaluator: Send + Sync {
    /// Whether gating is enabled at all; when false the executor skips
    /// evaluation entirely.
    fn enabled(&self) -> bool {
        true
    }

    /// Judge one completed step against the running flow.
    async fn evaluate(
        &self,
        step: &ExecutionStep,
        result: &SubTaskResult,
        flow: &ExecutionFlow,
        stream: Option<StreamSink>,
    ) -> SwarmResult<GateVerdict>;
}
