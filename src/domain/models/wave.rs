//! Wave execution telemetry.
//!
//! A wave is the set of sub-tasks released to run by the same
//! dependency-unlock event. Waves are a statistical grouping only; they
//! impose no scheduling barrier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics for one wave.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveStats {
    pub wave_number: usize,
    /// How many sub-tasks were released in this wave.
    pub task_count: usize,
    /// Parallelism at release time (equal to `task_count`; waves have no
    /// internal ordering).
    pub parallelism: usize,
    pub started_at: DateTime<Utc>,
    /// Start of the next wave, or end of the execution for the last wave.
    pub ended_at: DateTime<Utc>,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
}

/// Terminal accounting for one wave-executor run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaveExecutionResult {
    pub total_waves: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    /// Entries left blocked (upstream failed, or never unlocked).
    pub blocked_tasks: usize,
    pub wave_stats: Vec<WaveStats>,
    /// Wall-clock seconds for the whole run.
    pub total_execution_time: f64,
}

impl WaveExecutionResult {
    /// True when everything that ran completed and at least one entry ran.
    pub fn is_success(&self) -> bool {
        self.failed_tasks == 0 && self.completed_tasks > 0
    }

    /// Largest wave released during the run.
    pub fn max_parallelism(&self) -> usize {
        self.wave_stats.iter().map(|w| w.parallelism).max().unwrap_or(0)
    }
}
