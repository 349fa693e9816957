//! Per-team message bus.
//!
//! A registry of agent mailboxes used by the lifecycle manager to deliver
//! shutdown signals and by agents for optional peer-to-peer messages. The
//! bus holds no conversation state; delivery is best-effort into bounded
//! in-memory channels and never blocks the sender for long.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

/// Mailbox capacity per agent.
const MAILBOX_CAPACITY: usize = 32;

/// How long a send may wait on a full mailbox before reporting failure.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// A message delivered to an agent's mailbox.
#[derive(Debug, Clone)]
pub enum AgentMessage {
    /// Cooperative shutdown request; the runner acknowledges through the
    /// lifecycle manager and returns at its next suspension point.
    Shutdown { sender: String, reason: String },
    /// Best-effort peer-to-peer payload.
    Peer { sender: String, payload: serde_json::Value },
}

/// Outcome of a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    /// The target is unregistered, gone, or its mailbox stayed full.
    /// Callers treat this as "agent already terminated".
    Failed,
}

struct Mailbox {
    team_id: String,
    tx: mpsc::Sender<AgentMessage>,
}

/// Agent registry and delivery fabric for one team.
pub struct MessageBus {
    mailboxes: RwLock<HashMap<String, Mailbox>>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self {
            mailboxes: RwLock::new(HashMap::new()),
        }
    }

    /// Register an agent and hand back its mailbox receiver.
    ///
    /// Re-registering an agent id replaces the previous mailbox; the old
    /// receiver sees its channel close.
    pub async fn register(&self, agent_id: &str, team_id: &str) -> mpsc::Receiver<AgentMessage> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let mut mailboxes = self.mailboxes.write().await;
        mailboxes.insert(
            agent_id.to_string(),
            Mailbox {
                team_id: team_id.to_string(),
                tx,
            },
        );
        tracing::debug!(agent_id, team_id, "agent registered on bus");
        rx
    }

    /// Remove an agent's mailbox. Unknown ids are a no-op.
    pub async fn unregister(&self, agent_id: &str) {
        let mut mailboxes = self.mailboxes.write().await;
        if mailboxes.remove(agent_id).is_some() {
            tracing::debug!(agent_id, "agent unregistered from bus");
        }
    }

    pub async fn is_registered(&self, agent_id: &str) -> bool {
        self.mailboxes.read().await.contains_key(agent_id)
    }

    pub async fn agent_count(&self) -> usize {
        self.mailboxes.read().await.len()
    }

    /// Deliver a shutdown request to one agent.
    pub async fn send_shutdown(&self, sender: &str, target: &str, reason: &str) -> DeliveryStatus {
        self.deliver(
            target,
            AgentMessage::Shutdown {
                sender: sender.to_string(),
                reason: reason.to_string(),
            },
        )
        .await
    }

    /// Deliver a peer-to-peer payload to one agent.
    pub async fn send_message(&self, sender: &str, target: &str, payload: serde_json::Value) -> DeliveryStatus {
        self.deliver(
            target,
            AgentMessage::Peer {
                sender: sender.to_string(),
                payload,
            },
        )
        .await
    }

    async fn deliver(&self, target: &str, message: AgentMessage) -> DeliveryStatus {
        let tx = {
            let mailboxes = self.mailboxes.read().await;
            match mailboxes.get(target) {
                Some(mailbox) => mailbox.tx.clone(),
                None => return DeliveryStatus::Failed,
            }
        };
        match tx.send_timeout(message, SEND_TIMEOUT).await {
            Ok(()) => DeliveryStatus::Delivered,
            Err(_) => {
                tracing::warn!(recipient = target, "message delivery failed");
                DeliveryStatus::Failed
            }
        }
    }

    /// Team the agent registered under, if any.
    pub async fn team_of(&self, agent_id: &str) -> Option<String> {
        self.mailboxes
            .read()
            .await
            .get(agent_id)
            .map(|m| m.team_id.clone())
    }
}
