//! Team lifecycle integration: resource lifetimes across disband.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use waggle::domain::models::{Role, SubTask, Task, TeamConfig, TeamState};
use waggle::services::{DeliveryStatus, TeamLifecycleManager};

#[tokio::test]
async fn boards_held_by_runners_outlive_disband() {
    let manager = TeamLifecycleManager::new();
    let task = Task::new("long job");
    let team = manager.create_team(&task, TeamConfig::default()).await.unwrap();
    manager
        .setup_team(&team.id, &[Role::by_hint("researcher")])
        .await
        .unwrap();

    let board = manager.board(&team.id).await.unwrap();
    board
        .publish(vec![SubTask::new("s1", &task.id, "work")], HashMap::new())
        .await
        .unwrap();

    // A straggling runner still holds the board across disband.
    let straggler: Arc<_> = board.clone();
    manager.disband_team(&team.id, Duration::from_millis(100)).await.unwrap();
    assert!(manager.board(&team.id).await.is_none());

    // The Arc keeps the board alive and consistent for the straggler.
    assert_eq!(straggler.len().await, 1);
    assert!(straggler.claim("late-agent", "s1").await.is_ok());
}

#[tokio::test]
async fn bus_rejects_delivery_after_disband() {
    let manager = TeamLifecycleManager::new();
    let task = Task::new("t");
    let team = manager.create_team(&task, TeamConfig::default()).await.unwrap();
    let handles = manager
        .setup_team(&team.id, &[Role::by_hint("writer")])
        .await
        .unwrap();
    let agent_id = handles[0].agent_id.clone();

    let bus = manager.bus(&team.id).await.unwrap();
    manager.disband_team(&team.id, Duration::from_millis(100)).await.unwrap();

    // Everyone was unregistered on the way down.
    assert_eq!(
        bus.send_shutdown("tester", &agent_id, "again").await,
        DeliveryStatus::Failed
    );
    assert_eq!(bus.agent_count().await, 0);
}

#[tokio::test]
async fn team_states_follow_the_lifecycle() {
    let manager = TeamLifecycleManager::new();
    let task = Task::new("t");
    let team = manager.create_team(&task, TeamConfig::default()).await.unwrap();
    assert_eq!(team.state, TeamState::Creating);

    manager.setup_team(&team.id, &[Role::by_hint("coder")]).await.unwrap();
    assert_eq!(manager.team(&team.id).await.unwrap().state, TeamState::Ready);

    manager.set_team_state(&team.id, TeamState::Executing).await.unwrap();
    manager.set_team_state(&team.id, TeamState::Completed).await.unwrap();
    let completed = manager.team(&team.id).await.unwrap();
    assert_eq!(completed.state, TeamState::Completed);
    assert!(completed.completed_at.is_some());

    let first = manager.disband_team(&team.id, Duration::from_millis(100)).await.unwrap();
    let second = manager.disband_team(&team.id, Duration::from_millis(100)).await.unwrap();
    assert!(first.success && second.success);
    assert_eq!(second.terminated_agents, 0);
    assert_eq!(manager.team(&team.id).await.unwrap().state, TeamState::Disbanded);
}
