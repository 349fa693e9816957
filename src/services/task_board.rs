//! Shared task board.
//!
//! Single source of truth for the sub-task DAG of one team. All mutation
//! happens under one async lock per board, so exactly one concurrent claim
//! attempt for an entry can win and readers see consistent snapshots.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::errors::{SwarmError, SwarmResult};
use crate::domain::models::{BoardEntry, BoardStatus, ClaimError, SubTask};

#[derive(Default)]
struct BoardInner {
    entries: HashMap<String, BoardEntry>,
    /// task id -> ids it depends on.
    dependencies: HashMap<String, HashSet<String>>,
    /// task id -> ids that depend on it. Rebuilt from the forward edges on
    /// every publish; never mutated independently.
    dependents: HashMap<String, HashSet<String>>,
}

impl BoardInner {
    fn rebuild_dependents(&mut self) {
        self.dependents.clear();
        for (id, deps) in &self.dependencies {
            for dep in deps {
                self.dependents.entry(dep.clone()).or_default().insert(id.clone());
            }
        }
    }

    fn deps_satisfied(&self, task_id: &str) -> bool {
        self.dependencies.get(task_id).is_none_or(|deps| {
            deps.iter().all(|dep| {
                self.entries
                    .get(dep)
                    .is_some_and(|e| e.status == BoardStatus::Completed)
            })
        })
    }

    /// Kahn's algorithm over every forward edge currently known plus the
    /// incoming batch. Returns true when a cycle exists.
    fn has_cycle(&self, incoming: &HashMap<String, HashSet<String>>) -> bool {
        let mut edges: HashMap<&str, HashSet<&str>> = HashMap::new();
        let mut nodes: HashSet<&str> = HashSet::new();
        for (id, deps) in self.dependencies.iter().chain(incoming.iter()) {
            nodes.insert(id.as_str());
            let entry = edges.entry(id.as_str()).or_default();
            for dep in deps {
                nodes.insert(dep.as_str());
                entry.insert(dep.as_str());
            }
        }

        let mut in_degree: HashMap<&str, usize> = nodes.iter().map(|n| (*n, 0)).collect();
        // adjacency from dependency to dependent
        let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
        for (id, deps) in &edges {
            for dep in deps {
                adj.entry(*dep).or_default().push(*id);
                *in_degree.entry(*id).or_insert(0) += 1;
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut visited = 0usize;
        while let Some(node) = queue.pop_front() {
            visited += 1;
            if let Some(next) = adj.get(node) {
                for dependent in next {
                    let deg = in_degree.get_mut(dependent).expect("dependent was registered");
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }
        visited < nodes.len()
    }
}

/// Concurrency-safe repository of sub-task entries for one team.
pub struct TaskBoard {
    inner: Mutex<BoardInner>,
}

impl Default for TaskBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskBoard {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BoardInner::default()),
        }
    }

    /// Register a batch of sub-tasks and their dependency edges.
    ///
    /// The whole batch is refused on a dependency cycle, on an edge to an id
    /// that is neither in the batch nor already on the board, or on an id
    /// collision with an existing entry. On success each entry starts
    /// `Pending` iff its dependency set is empty or every dep is already
    /// `Completed`, otherwise `Blocked`.
    pub async fn publish(
        &self,
        subtasks: Vec<SubTask>,
        dependency_map: HashMap<String, HashSet<String>>,
    ) -> SwarmResult<()> {
        let mut inner = self.inner.lock().await;

        let batch_ids: HashSet<&str> = subtasks.iter().map(|t| t.id.as_str()).collect();
        for task in &subtasks {
            if inner.entries.contains_key(&task.id) {
                return Err(SwarmError::ValidationFailed(format!(
                    "sub-task {} is already on the board",
                    task.id
                )));
            }
        }
        for (id, deps) in &dependency_map {
            for dep in deps {
                if !batch_ids.contains(dep.as_str()) && !inner.entries.contains_key(dep) {
                    return Err(SwarmError::UnknownDependency {
                        dependent: id.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }
        if inner.has_cycle(&dependency_map) {
            return Err(SwarmError::DependencyCycle);
        }

        for task in subtasks {
            let deps = dependency_map.get(&task.id).cloned().unwrap_or_default();
            inner.dependencies.insert(task.id.clone(), deps.clone());

            let satisfied = deps.iter().all(|dep| {
                inner
                    .entries
                    .get(dep)
                    .is_some_and(|e| e.status == BoardStatus::Completed)
            });
            let status = if deps.is_empty() || satisfied {
                BoardStatus::Pending
            } else {
                BoardStatus::Blocked
            };

            let mut entry = BoardEntry::new(task, status);
            entry.dependencies = deps;
            inner.entries.insert(entry.task_id.clone(), entry);
        }

        inner.rebuild_dependents();
        Ok(())
    }

    /// Atomically reserve a pending entry for an agent.
    pub async fn claim(&self, agent_id: &str, task_id: &str) -> Result<(), ClaimError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .get_mut(task_id)
            .ok_or_else(|| ClaimError::NotFound(task_id.to_string()))?;

        match entry.status {
            BoardStatus::Claimed => Err(ClaimError::AlreadyClaimed(task_id.to_string())),
            BoardStatus::Pending => {
                entry.status = BoardStatus::Claimed;
                entry.claimed_by = Some(agent_id.to_string());
                entry.claimed_at = Some(Utc::now());
                Ok(())
            }
            _ => Err(ClaimError::NotPending(task_id.to_string())),
        }
    }

    /// Snapshot of all pending entries, optionally filtered by role hint,
    /// sorted by priority descending. Entries may change status the instant
    /// the caller inspects them.
    pub async fn available(&self, _agent_id: &str, role_filter: Option<&str>) -> Vec<BoardEntry> {
        let inner = self.inner.lock().await;
        let mut available: Vec<BoardEntry> = inner
            .entries
            .values()
            .filter(|e| e.status == BoardStatus::Pending)
            .filter(|e| role_filter.is_none_or(|role| e.role_hint == role))
            .cloned()
            .collect();
        available.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.task_id.cmp(&b.task_id)));
        available
    }

    /// Apply a single status transition, stamping `started_at` /
    /// `completed_at` as appropriate.
    ///
    /// A `Completed`/`Failed` write against an entry that failure propagation
    /// already forced to `Blocked` is a stale worker write and is dropped
    /// silently; any other transition the state machine forbids is an error.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: BoardStatus,
        result: Option<String>,
    ) -> SwarmResult<()> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .get_mut(task_id)
            .ok_or_else(|| SwarmError::TaskNotFound(task_id.to_string()))?;

        if entry.status == status {
            return Ok(());
        }
        if entry.status == BoardStatus::Blocked && status.is_terminal() {
            tracing::debug!(task_id, to = %status, "ignoring stale status write on blocked entry");
            return Ok(());
        }
        if !entry.status.can_transition_to(status) {
            return Err(SwarmError::InvalidTransition {
                from: entry.status.as_str().to_string(),
                to: status.as_str().to_string(),
            });
        }

        entry.status = status;
        if let Some(result) = result {
            entry.result = Some(result);
        }
        match status {
            BoardStatus::InProgress => entry.started_at = Some(Utc::now()),
            BoardStatus::Completed | BoardStatus::Failed => {
                entry.completed_at = Some(Utc::now());
                entry.claimed_by = None;
            }
            BoardStatus::Pending | BoardStatus::Blocked => {
                entry.claimed_by = None;
                entry.claimed_at = None;
            }
            BoardStatus::Claimed => {}
        }
        Ok(())
    }

    /// Read one entry.
    pub async fn get(&self, task_id: &str) -> SwarmResult<BoardEntry> {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(task_id)
            .cloned()
            .ok_or_else(|| SwarmError::TaskNotFound(task_id.to_string()))
    }

    /// After an entry completes, flip every direct dependent whose deps are
    /// now all complete from `Blocked` to `Pending`. Returns the unlocked
    /// ids so the caller can start new workers.
    pub async fn on_completed(&self, task_id: &str) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let dependents: Vec<String> = inner
            .dependents
            .get(task_id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default();

        let mut unlocked = Vec::new();
        for dep_id in dependents {
            let is_blocked = inner
                .entries
                .get(&dep_id)
                .is_some_and(|e| e.status == BoardStatus::Blocked);
            if is_blocked && inner.deps_satisfied(&dep_id) {
                if let Some(entry) = inner.entries.get_mut(&dep_id) {
                    entry.status = BoardStatus::Pending;
                    unlocked.push(dep_id);
                }
            }
        }
        unlocked
    }

    /// Revert claims whose agent never started running within `timeout`.
    /// Entries already `InProgress` are left alone.
    pub async fn reclaim_expired(&self, timeout: Duration) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut reclaimed = Vec::new();
        for (task_id, entry) in &mut inner.entries {
            if entry.status != BoardStatus::Claimed || entry.started_at.is_some() {
                continue;
            }
            let expired = entry
                .claimed_at
                .is_some_and(|at| (now - at).to_std().unwrap_or_default() > timeout);
            if expired {
                entry.status = BoardStatus::Pending;
                entry.claimed_by = None;
                entry.claimed_at = None;
                reclaimed.push(task_id.clone());
            }
        }
        reclaimed
    }

    /// BFS from a failed entry over the reverse-dependency index, forcing
    /// every not-yet-terminal dependent to `Blocked`. Returns the visited
    /// dependents.
    pub async fn propagate_failure(&self, failed_id: &str) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = inner
            .dependents
            .get(failed_id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default();
        queue.iter().for_each(|id| {
            visited.insert(id.clone());
        });

        let mut blocked = Vec::new();
        while let Some(current) = queue.pop_front() {
            if let Some(entry) = inner.entries.get_mut(&current) {
                if !entry.status.is_terminal() {
                    entry.status = BoardStatus::Blocked;
                    entry.claimed_by = None;
                    entry.claimed_at = None;
                    blocked.push(current.clone());
                }
            }
            if let Some(next) = inner.dependents.get(&current) {
                for id in next.clone() {
                    if visited.insert(id.clone()) {
                        queue.push_back(id);
                    }
                }
            }
        }
        blocked
    }

    /// Scrub an id from every dependency list (used when the quality gate
    /// removes a step), unlocking entries whose remaining deps are all
    /// complete. Returns the unlocked ids.
    pub async fn drop_dependency(&self, dep_id: &str) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        for deps in inner.dependencies.values_mut() {
            deps.remove(dep_id);
        }
        for entry in inner.entries.values_mut() {
            entry.dependencies.remove(dep_id);
        }
        inner.rebuild_dependents();

        let blocked: Vec<String> = inner
            .entries
            .values()
            .filter(|e| e.status == BoardStatus::Blocked)
            .map(|e| e.task_id.clone())
            .collect();
        let mut unlocked = Vec::new();
        for id in blocked {
            if inner.deps_satisfied(&id) {
                if let Some(entry) = inner.entries.get_mut(&id) {
                    entry.status = BoardStatus::Pending;
                    unlocked.push(id);
                }
            }
        }
        unlocked
    }

    /// Rewrite a pending entry's content and/or dependency set (quality-gate
    /// modify_step). Returns `Ok(false)` without touching anything when the
    /// entry is not currently `Pending`; rejects edits that would introduce
    /// a cycle or reference an unknown dependency.
    pub async fn modify_pending(
        &self,
        task_id: &str,
        description: Option<String>,
        dependencies: Option<HashSet<String>>,
    ) -> SwarmResult<bool> {
        let mut inner = self.inner.lock().await;
        let status = inner
            .entries
            .get(task_id)
            .map(|e| e.status)
            .ok_or_else(|| SwarmError::TaskNotFound(task_id.to_string()))?;
        if status != BoardStatus::Pending {
            return Ok(false);
        }

        if let Some(deps) = &dependencies {
            for dep in deps {
                if dep != task_id && !inner.entries.contains_key(dep) {
                    return Err(SwarmError::UnknownDependency {
                        dependent: task_id.to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
            let mut proposed = HashMap::new();
            let filtered: HashSet<String> = deps.iter().filter(|d| *d != task_id).cloned().collect();
            proposed.insert(task_id.to_string(), filtered);
            if inner.has_cycle(&proposed) {
                return Err(SwarmError::DependencyCycle);
            }
        }

        if let Some(description) = description {
            if let Some(entry) = inner.entries.get_mut(task_id) {
                entry.subtask.content = description;
            }
        }
        if let Some(deps) = dependencies {
            let deps: HashSet<String> = deps.into_iter().filter(|d| d != task_id).collect();
            if let Some(entry) = inner.entries.get_mut(task_id) {
                entry.subtask.dependencies = deps.clone();
                entry.dependencies = deps.clone();
            }
            inner.dependencies.insert(task_id.to_string(), deps);
            inner.rebuild_dependents();
            if !inner.deps_satisfied(task_id) {
                if let Some(entry) = inner.entries.get_mut(task_id) {
                    entry.status = BoardStatus::Blocked;
                }
            }
        }
        Ok(true)
    }

    /// Number of entries on the board.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    pub async fn contains(&self, task_id: &str) -> bool {
        self.inner.lock().await.entries.contains_key(task_id)
    }

    /// Snapshot of every entry.
    pub async fn entries(&self) -> Vec<BoardEntry> {
        self.inner.lock().await.entries.values().cloned().collect()
    }

    /// Entry counts per status.
    pub async fn status_counts(&self) -> HashMap<BoardStatus, usize> {
        let inner = self.inner.lock().await;
        let mut counts = HashMap::new();
        for entry in inner.entries.values() {
            *counts.entry(entry.status).or_insert(0) += 1;
        }
        counts
    }

    /// Direct dependents of an entry (reverse edges).
    pub async fn dependents_of(&self, task_id: &str) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .dependents
            .get(task_id)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn subtask(id: &str, deps: &[&str]) -> SubTask {
        let mut st = SubTask::new(id, "task-1", format!("work for {id}"));
        for dep in deps {
            st = st.with_dependency(*dep);
        }
        st
    }

    fn dep_map(pairs: &[(&str, &[&str])]) -> HashMap<String, HashSet<String>> {
        pairs
            .iter()
            .map(|(id, deps)| {
                (
                    (*id).to_string(),
                    deps.iter().map(|d| (*d).to_string()).collect(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn publish_sets_initial_statuses() {
        let board = TaskBoard::new();
        board
            .publish(
                vec![subtask("s1", &[]), subtask("s2", &["s1"])],
                dep_map(&[("s1", &[]), ("s2", &["s1"])]),
            )
            .await
            .unwrap();

        assert_eq!(board.get("s1").await.unwrap().status, BoardStatus::Pending);
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Blocked);
    }

    #[tokio::test]
    async fn publish_rejects_cycles_wholesale() {
        let board = TaskBoard::new();
        let err = board
            .publish(
                vec![subtask("s1", &["s2"]), subtask("s2", &["s1"])],
                dep_map(&[("s1", &["s2"]), ("s2", &["s1"])]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::DependencyCycle));
        assert!(board.is_empty().await);
    }

    #[tokio::test]
    async fn publish_rejects_unknown_dependency() {
        let board = TaskBoard::new();
        let err = board
            .publish(vec![subtask("s1", &["ghost"])], dep_map(&[("s1", &["ghost"])]))
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::UnknownDependency { .. }));
    }

    #[tokio::test]
    async fn publish_accepts_edges_onto_existing_entries() {
        // An edge onto a completed entry yields an immediately-pending entry.
        let board = TaskBoard::new();
        board
            .publish(vec![subtask("s1", &[])], dep_map(&[("s1", &[])]))
            .await
            .unwrap();
        board.claim("agent", "s1").await.unwrap();
        board.update_status("s1", BoardStatus::InProgress, None).await.unwrap();
        board.update_status("s1", BoardStatus::Completed, None).await.unwrap();
        board
            .publish(vec![subtask("s2", &["s1"])], dep_map(&[("s2", &["s1"])]))
            .await
            .unwrap();
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Pending);

        // An edge onto an entry that is merely in progress publishes blocked.
        let board2 = TaskBoard::new();
        board2
            .publish(vec![subtask("s1", &[])], dep_map(&[("s1", &[])]))
            .await
            .unwrap();
        board2.claim("agent", "s1").await.unwrap();
        board2.update_status("s1", BoardStatus::InProgress, None).await.unwrap();
        board2
            .publish(vec![subtask("s2", &["s1"])], dep_map(&[("s2", &["s1"])]))
            .await
            .unwrap();
        assert_eq!(board2.get("s2").await.unwrap().status, BoardStatus::Blocked);
    }

    #[tokio::test]
    async fn exactly_one_concurrent_claim_wins() {
        let board = Arc::new(TaskBoard::new());
        board
            .publish(vec![subtask("s1", &[])], dep_map(&[("s1", &[])]))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let board = board.clone();
            handles.push(tokio::spawn(async move {
                board.claim(&format!("agent-{i}"), "s1").await
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
        let entry = board.get("s1").await.unwrap();
        assert_eq!(entry.status, BoardStatus::Claimed);
        assert!(entry.claimed_by.is_some());
    }

    #[tokio::test]
    async fn claim_reports_distinct_errors() {
        let board = TaskBoard::new();
        board
            .publish(vec![subtask("s1", &[]), subtask("s2", &["s1"])], dep_map(&[("s2", &["s1"])]))
            .await
            .unwrap();

        assert!(matches!(
            board.claim("a", "nope").await.unwrap_err(),
            ClaimError::NotFound(_)
        ));
        assert!(matches!(
            board.claim("a", "s2").await.unwrap_err(),
            ClaimError::NotPending(_)
        ));
        board.claim("a", "s1").await.unwrap();
        assert!(matches!(
            board.claim("b", "s1").await.unwrap_err(),
            ClaimError::AlreadyClaimed(_)
        ));
    }

    #[tokio::test]
    async fn completion_unlocks_dependents() {
        let board = TaskBoard::new();
        board
            .publish(
                vec![subtask("s1", &[]), subtask("s2", &[]), subtask("s3", &["s1", "s2"])],
                dep_map(&[("s3", &["s1", "s2"])]),
            )
            .await
            .unwrap();

        board.claim("a", "s1").await.unwrap();
        board.update_status("s1", BoardStatus::InProgress, None).await.unwrap();
        board.update_status("s1", BoardStatus::Completed, Some("one".into())).await.unwrap();
        assert!(board.on_completed("s1").await.is_empty());

        board.claim("a", "s2").await.unwrap();
        board.update_status("s2", BoardStatus::InProgress, None).await.unwrap();
        board.update_status("s2", BoardStatus::Completed, Some("two".into())).await.unwrap();
        assert_eq!(board.on_completed("s2").await, vec!["s3".to_string()]);
        assert_eq!(board.get("s3").await.unwrap().status, BoardStatus::Pending);
    }

    #[tokio::test]
    async fn reclaim_skips_started_entries() {
        let board = TaskBoard::new();
        board
            .publish(vec![subtask("s1", &[]), subtask("s2", &[])], HashMap::new())
            .await
            .unwrap();
        board.claim("a", "s1").await.unwrap();
        board.claim("a", "s2").await.unwrap();
        board.update_status("s2", BoardStatus::InProgress, None).await.unwrap();

        // Zero timeout: every unstarted claim is instantly expired.
        let reclaimed = board.reclaim_expired(Duration::ZERO).await;
        assert_eq!(reclaimed, vec!["s1".to_string()]);
        let entry = board.get("s1").await.unwrap();
        assert_eq!(entry.status, BoardStatus::Pending);
        assert!(entry.claimed_by.is_none());
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::InProgress);
    }

    #[tokio::test]
    async fn failure_propagates_transitively() {
        let board = TaskBoard::new();
        board
            .publish(
                vec![
                    subtask("s1", &[]),
                    subtask("s2", &["s1"]),
                    subtask("s3", &["s2"]),
                    subtask("s4", &[]),
                ],
                dep_map(&[("s2", &["s1"]), ("s3", &["s2"])]),
            )
            .await
            .unwrap();

        board.claim("a", "s1").await.unwrap();
        board.update_status("s1", BoardStatus::InProgress, None).await.unwrap();
        board.update_status("s1", BoardStatus::Failed, Some("boom".into())).await.unwrap();

        let mut blocked = board.propagate_failure("s1").await;
        blocked.sort();
        assert_eq!(blocked, vec!["s2".to_string(), "s3".to_string()]);
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Blocked);
        assert_eq!(board.get("s3").await.unwrap().status, BoardStatus::Blocked);
        assert_eq!(board.get("s4").await.unwrap().status, BoardStatus::Pending);
    }

    #[tokio::test]
    async fn stale_write_after_propagation_is_ignored() {
        let board = TaskBoard::new();
        board
            .publish(
                vec![subtask("s1", &[]), subtask("s2", &["s1"])],
                dep_map(&[("s2", &["s1"])]),
            )
            .await
            .unwrap();
        // s2 was racing ahead when upstream failure forced it blocked.
        board.propagate_failure("s1").await;
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Blocked);

        board.update_status("s2", BoardStatus::Completed, Some("late".into())).await.unwrap();
        let entry = board.get("s2").await.unwrap();
        assert_eq!(entry.status, BoardStatus::Blocked);
        assert!(entry.result.is_none());
    }

    #[tokio::test]
    async fn terminal_entries_clear_claimant() {
        let board = TaskBoard::new();
        board.publish(vec![subtask("s1", &[])], HashMap::new()).await.unwrap();
        board.claim("agent-7", "s1").await.unwrap();
        board.update_status("s1", BoardStatus::InProgress, None).await.unwrap();
        board.update_status("s1", BoardStatus::Completed, Some("out".into())).await.unwrap();

        let entry = board.get("s1").await.unwrap();
        assert!(entry.claimed_by.is_none());
        assert!(entry.completed_at.is_some());
        assert_eq!(entry.result.as_deref(), Some("out"));
    }

    #[tokio::test]
    async fn drop_dependency_unlocks_when_rest_satisfied() {
        let board = TaskBoard::new();
        board
            .publish(
                vec![subtask("s1", &[]), subtask("s2", &["s1"])],
                dep_map(&[("s2", &["s1"])]),
            )
            .await
            .unwrap();

        let unlocked = board.drop_dependency("s1").await;
        assert_eq!(unlocked, vec!["s2".to_string()]);
        assert_eq!(board.get("s2").await.unwrap().status, BoardStatus::Pending);
    }

    #[tokio::test]
    async fn available_sorts_by_priority() {
        let board = TaskBoard::new();
        let mut low = subtask("low", &[]);
        low.priority = 1;
        let mut high = subtask("high", &[]);
        high.priority = 9;
        let mut role = subtask("role", &[]);
        role.priority = 5;
        role.role_hint = "writer".to_string();
        board.publish(vec![low, high, role], HashMap::new()).await.unwrap();

        let all = board.available("agent", None).await;
        let ids: Vec<&str> = all.iter().map(|e| e.task_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "role", "low"]);

        let writers = board.available("agent", Some("writer")).await;
        assert_eq!(writers.len(), 1);
        assert_eq!(writers[0].task_id, "role");
    }
}
