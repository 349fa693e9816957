//! Team domain models.
//!
//! A team is the ephemeral unit of isolation: one task, one task board,
//! one message bus, one set of agent identities.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamState {
    Creating,
    Ready,
    Executing,
    Completed,
    Disbanded,
}

impl TeamState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Ready => "ready",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Disbanded => "disbanded",
        }
    }
}

impl std::fmt::Display for TeamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-team configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfig {
    /// Maximum number of agents in the team.
    pub max_agents: usize,
    /// Per-agent execution timeout in seconds.
    pub agent_timeout_secs: u64,
    /// How long a claim may sit unstarted before it is reclaimed, seconds.
    pub claim_timeout_secs: u64,
    /// Whether agents may exchange peer-to-peer messages on the bus.
    pub enable_p2p_messaging: bool,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            max_agents: 20,
            agent_timeout_secs: 300,
            claim_timeout_secs: 60,
            enable_p2p_messaging: true,
        }
    }
}

/// A collection of agents instantiated for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    /// Unique team id.
    pub id: String,
    /// The task this team was created for.
    pub task_id: String,
    pub state: TeamState,
    pub config: TeamConfig,
    /// agent id -> role name.
    pub members: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of disbanding a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisbandResult {
    pub team_id: String,
    /// True when no errors were collected on the way down.
    pub success: bool,
    /// Agents that acknowledged shutdown (or were already gone).
    pub terminated_agents: usize,
    /// Agents abandoned after the grace timeout.
    pub force_terminated_agents: usize,
    pub errors: Vec<String>,
}

impl DisbandResult {
    /// Trivial success for a team that is already disbanded.
    pub fn already_disbanded(team_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            success: true,
            terminated_agents: 0,
            force_terminated_agents: 0,
            errors: Vec::new(),
        }
    }
}
