//! Result aggregator port.

use async_trait::async_trait;

use crate::domain::errors::SwarmResult;
use crate::domain::models::SubTaskResult;

/// Combines sub-task outputs into one final output.
///
/// The surface is async-only on purpose: aggregation happens inside the
/// executor's async flow, so an implementation must never block the
/// scheduler. On error the executor falls back to a plain join of the
/// successful outputs.
#[async_trait]
pub trait ResultAggregator: Send + Sync {
    async fn aggregate(&self, sub_results: &[SubTaskResult]) -> SwarmResult<String>;
}
