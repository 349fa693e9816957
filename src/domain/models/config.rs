//! Runtime configuration.
//!
//! One closed struct tree, loaded by the infrastructure config loader with
//! figment (defaults -> project yaml -> local yaml -> env) and validated
//! after extraction.

use serde::{Deserialize, Serialize};

use super::team::TeamConfig;

/// Scheduler limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on concurrently running workers per execution.
    pub max_concurrent_agents: usize,
    /// Cadence of the stuck-claim reclaim scan, seconds.
    pub reclaim_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_agents: 8,
            reclaim_interval_secs: 10,
        }
    }
}

/// Per-task execution limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Hard deadline for one task, seconds.
    pub timeout_secs: u64,
    /// Fraction of the deadline at which a progress warning fires.
    pub timeout_warn_threshold: f64,
    /// Grace period for disbanding a team, seconds.
    pub disband_timeout_secs: u64,
    /// Minimum trimmed submission length.
    pub min_task_content_length: usize,
    /// Maximum submission length.
    pub max_task_content_length: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            timeout_warn_threshold: 0.8,
            disband_timeout_secs: 30,
            min_task_content_length: 1,
            max_task_content_length: 100_000,
        }
    }
}

/// Quality-gate behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Whether step results are passed through the evaluator at all.
    pub enable_quality_gates: bool,
    /// Retry cap per step within one execution.
    pub max_retry_on_failure: u32,
    /// Per-dependency truncation when enriching step content, characters.
    pub dependency_context_limit: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enable_quality_gates: true,
            max_retry_on_failure: 2,
            dependency_context_limit: 4000,
        }
    }
}

/// Logging output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive (trace|debug|info|warn|error).
    pub level: String,
    /// Stdout format (pretty|json).
    pub format: String,
    /// When set, JSON logs are also written to rolling files here.
    pub log_dir: Option<String>,
    pub enable_stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            log_dir: None,
            enable_stdout: true,
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub execution: ExecutionConfig,
    pub quality: QualityConfig,
    pub team: TeamConfig,
    pub logging: LoggingConfig,
}
