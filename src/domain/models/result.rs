//! Execution results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One tool invocation made by a role runner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub result: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Token accounting for one runner invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Result of running one sub-task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubTaskResult {
    pub subtask_id: String,
    /// The agent identity that produced this result.
    pub agent_id: String,
    pub success: bool,
    pub output: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Wall-clock seconds spent in the runner.
    pub execution_time: f64,
    #[serde(default)]
    pub token_usage: TokenUsage,
}

impl SubTaskResult {
    pub fn success(subtask_id: impl Into<String>, agent_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            subtask_id: subtask_id.into(),
            agent_id: agent_id.into(),
            success: true,
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn failure(subtask_id: impl Into<String>, agent_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            subtask_id: subtask_id.into(),
            agent_id: agent_id.into(),
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Terminal result of one user task.
///
/// Every execution API returns one of these; failure is expressed as
/// `success = false` plus `error`, never as a panic across the boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock seconds for the whole task.
    pub execution_time: f64,
    #[serde(default)]
    pub sub_results: Vec<SubTaskResult>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl TaskResult {
    /// A bare failure result carrying only an error string.
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>, execution_time: f64) -> Self {
        Self {
            task_id: task_id.into(),
            success: false,
            error: Some(error.into()),
            execution_time,
            ..Self::default()
        }
    }

    /// Total tool calls across all sub-results.
    pub fn tool_call_count(&self) -> usize {
        self.sub_results.iter().map(|r| r.tool_calls.len()).sum()
    }

    /// Total tokens across all sub-results.
    pub fn total_tokens(&self) -> u64 {
        self.sub_results.iter().map(|r| r.token_usage.total()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_failure_constructors() {
        let ok = SubTaskResult::success("s1", "agent-1", "done");
        assert!(ok.success);
        assert_eq!(ok.output, "done");
        assert!(ok.error.is_none());

        let bad = SubTaskResult::failure("s2", "agent-2", "boom");
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("boom"));
    }

    #[test]
    fn task_result_aggregates_usage() {
        let mut result = TaskResult::failed("t1", "err", 1.0);
        result.sub_results.push(SubTaskResult {
            tool_calls: vec![ToolCallRecord::default(), ToolCallRecord::default()],
            token_usage: TokenUsage { input_tokens: 10, output_tokens: 5 },
            ..SubTaskResult::success("s1", "a", "x")
        });
        result.sub_results.push(SubTaskResult {
            token_usage: TokenUsage { input_tokens: 1, output_tokens: 1 },
            ..SubTaskResult::success("s2", "a", "y")
        });
        assert_eq!(result.tool_call_count(), 2);
        assert_eq!(result.total_tokens(), 17);
    }
}
