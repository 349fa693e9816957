//! Team lifecycle management.
//!
//! Owns every team's task board and message bus, mints agent identities,
//! and implements graceful-then-forced termination on disband. Boards and
//! buses are handed out as `Arc`s, so an outstanding runner can never
//! observe them freed even after the team is disbanded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use uuid::Uuid;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{DisbandResult, Role, Task, Team, TeamConfig, TeamState};
use crate::services::message_bus::{AgentMessage, DeliveryStatus, MessageBus};
use crate::services::task_board::TaskBoard;

/// One-shot, idempotent acknowledgment an agent sets when it has observed
/// its shutdown signal.
struct ShutdownAck {
    acked: AtomicBool,
    notify: Notify,
}

impl ShutdownAck {
    fn new() -> Self {
        Self {
            acked: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn set(&self) {
        self.acked.store(true, Ordering::Release);
        // notify_one stores a permit, so a waiter arriving later still wakes.
        self.notify.notify_one();
    }

    fn is_set(&self) -> bool {
        self.acked.load(Ordering::Acquire)
    }

    async fn wait(&self) {
        if self.is_set() {
            return;
        }
        self.notify.notified().await;
    }
}

/// An agent identity minted during team setup, with its bus mailbox.
pub struct AgentHandle {
    pub agent_id: String,
    pub role_name: String,
    /// Shutdown and peer messages arrive here; dropping the receiver makes
    /// future deliveries fail, which disband treats as "already gone".
    pub mailbox: mpsc::Receiver<AgentMessage>,
}

struct TeamResources {
    team: Team,
    board: Option<Arc<TaskBoard>>,
    bus: Option<Arc<MessageBus>>,
}

/// Creates, configures, and disbands teams.
pub struct TeamLifecycleManager {
    teams: RwLock<HashMap<String, TeamResources>>,
    shutdown_acks: Mutex<HashMap<String, Arc<ShutdownAck>>>,
}

impl Default for TeamLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamLifecycleManager {
    pub fn new() -> Self {
        Self {
            teams: RwLock::new(HashMap::new()),
            shutdown_acks: Mutex::new(HashMap::new()),
        }
    }

    /// Mint a team with its private board and bus, in state `Creating`.
    pub async fn create_team(&self, task: &Task, config: TeamConfig) -> SwarmResult<Team> {
        let team_id = Uuid::new_v4().to_string();
        let team = Team {
            id: team_id.clone(),
            task_id: task.id.clone(),
            state: TeamState::Creating,
            config,
            members: HashMap::new(),
            created_at: Utc::now(),
            completed_at: None,
        };

        let mut teams = self.teams.write().await;
        teams.insert(
            team_id.clone(),
            TeamResources {
                team: team.clone(),
                board: Some(Arc::new(TaskBoard::new())),
                bus: Some(Arc::new(MessageBus::new())),
            },
        );
        tracing::info!(team_id, task_id = %task.id, "team created");
        Ok(team)
    }

    /// Mint one agent per role, register everyone on the bus, and move the
    /// team to `Ready`. On partial failure everything registered so far is
    /// rolled back.
    pub async fn setup_team(&self, team_id: &str, roles: &[Role]) -> SwarmResult<Vec<AgentHandle>> {
        let (bus, max_agents) = {
            let teams = self.teams.read().await;
            let resources = teams
                .get(team_id)
                .ok_or_else(|| SwarmError::TeamNotFound(team_id.to_string()))?;
            let bus = resources
                .bus
                .clone()
                .ok_or_else(|| SwarmError::TeamCreation(format!("team {team_id} has no bus")))?;
            (bus, resources.team.config.max_agents)
        };

        if roles.len() > max_agents {
            return Err(SwarmError::TeamCreation(format!(
                "{} roles exceed the team limit of {max_agents} agents",
                roles.len()
            )));
        }

        let mut handles = Vec::with_capacity(roles.len());
        let mut registered: Vec<(String, String)> = Vec::with_capacity(roles.len());
        for role in roles {
            let agent_id = format!("agent-{}", &Uuid::new_v4().simple().to_string()[..8]);
            let mailbox = bus.register(&agent_id, team_id).await;
            self.shutdown_acks
                .lock()
                .await
                .insert(agent_id.clone(), Arc::new(ShutdownAck::new()));
            registered.push((agent_id.clone(), role.name.clone()));
            handles.push(AgentHandle {
                agent_id,
                role_name: role.name.clone(),
                mailbox,
            });
        }

        let mut teams = self.teams.write().await;
        match teams.get_mut(team_id) {
            Some(resources) => {
                for (agent_id, role_name) in registered {
                    resources.team.members.insert(agent_id, role_name);
                }
                resources.team.state = TeamState::Ready;
                tracing::info!(team_id, agents = handles.len(), "team setup complete");
                Ok(handles)
            }
            None => {
                // The team vanished under us; roll back the registrations.
                drop(teams);
                let mut acks = self.shutdown_acks.lock().await;
                for handle in &handles {
                    bus.unregister(&handle.agent_id).await;
                    acks.remove(&handle.agent_id);
                }
                Err(SwarmError::TeamNotFound(team_id.to_string()))
            }
        }
    }

    /// Explicit state transition driven by the executor.
    pub async fn set_team_state(&self, team_id: &str, state: TeamState) -> SwarmResult<()> {
        let mut teams = self.teams.write().await;
        let resources = teams
            .get_mut(team_id)
            .ok_or_else(|| SwarmError::TeamNotFound(team_id.to_string()))?;
        resources.team.state = state;
        if state == TeamState::Completed {
            resources.team.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Snapshot of a team.
    pub async fn team(&self, team_id: &str) -> SwarmResult<Team> {
        let teams = self.teams.read().await;
        teams
            .get(team_id)
            .map(|r| r.team.clone())
            .ok_or_else(|| SwarmError::TeamNotFound(team_id.to_string()))
    }

    /// The team's task board, while the team is alive.
    pub async fn board(&self, team_id: &str) -> Option<Arc<TaskBoard>> {
        self.teams.read().await.get(team_id).and_then(|r| r.board.clone())
    }

    /// The team's message bus, while the team is alive.
    pub async fn bus(&self, team_id: &str) -> Option<Arc<MessageBus>> {
        self.teams.read().await.get(team_id).and_then(|r| r.bus.clone())
    }

    /// Called by an agent runner once it has observed its shutdown signal.
    pub async fn acknowledge_shutdown(&self, agent_id: &str) {
        if let Some(ack) = self.shutdown_acks.lock().await.get(agent_id) {
            ack.set();
        }
    }

    /// Disband a team: signal every member, wait for acknowledgments within
    /// the grace timeout, count the unresponsive as force-terminated, and
    /// release the board and bus. Idempotent.
    pub async fn disband_team(&self, team_id: &str, timeout: Duration) -> SwarmResult<DisbandResult> {
        let (bus, member_ids) = {
            let mut teams = self.teams.write().await;
            let resources = teams
                .get_mut(team_id)
                .ok_or_else(|| SwarmError::TeamNotFound(team_id.to_string()))?;
            if resources.team.state == TeamState::Disbanded {
                return Ok(DisbandResult::already_disbanded(team_id));
            }
            // Mark disbanded up front so a concurrent disband is trivial.
            resources.team.state = TeamState::Disbanded;
            resources.board = None;
            let member_ids: Vec<String> = resources.team.members.keys().cloned().collect();
            (resources.bus.take(), member_ids)
        };

        // Bus operations are infallible in-process; the error list exists for
        // the disband contract and stays empty on the happy path.
        let errors: Vec<String> = Vec::new();
        let mut terminated = 0usize;
        let mut force_terminated = 0usize;
        let sender_id = format!("lifecycle-manager-{team_id}");
        let per_agent_timeout = timeout / u32::try_from(member_ids.len().max(1)).unwrap_or(1);

        for agent_id in &member_ids {
            let delivered = match &bus {
                Some(bus) => bus.send_shutdown(&sender_id, agent_id, "team disbanding").await,
                None => DeliveryStatus::Failed,
            };
            if delivered == DeliveryStatus::Failed {
                // Mailbox gone: the agent already terminated.
                terminated += 1;
                continue;
            }

            let ack = self.shutdown_acks.lock().await.get(agent_id).cloned();
            match ack {
                None => terminated += 1,
                Some(ack) => {
                    if tokio::time::timeout(per_agent_timeout, ack.wait()).await.is_ok() {
                        terminated += 1;
                    } else {
                        tracing::warn!(agent_id, team_id, "agent did not acknowledge shutdown; abandoning");
                        force_terminated += 1;
                    }
                }
            }
        }

        if let Some(bus) = &bus {
            for agent_id in &member_ids {
                bus.unregister(agent_id).await;
            }
        }
        {
            let mut acks = self.shutdown_acks.lock().await;
            for agent_id in &member_ids {
                acks.remove(agent_id);
            }
        }
        {
            let mut teams = self.teams.write().await;
            if let Some(resources) = teams.get_mut(team_id) {
                resources.team.completed_at = Some(Utc::now());
                resources.team.members.clear();
            }
        }

        tracing::info!(team_id, terminated, force_terminated, "team disbanded");
        Ok(DisbandResult {
            team_id: team_id.to_string(),
            success: errors.is_empty(),
            terminated_agents: terminated,
            force_terminated_agents: force_terminated,
            errors,
        })
    }
}
