//! Quality-gate adjustment application.
//!
//! Translates evaluator verdict adjustments into mutations of the running
//! flow and the team's task board. Gating must never block progress on its
//! own failures, so every fallible step here degrades to a logged warning.

use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;

use crate::domain::models::{ExecutionFlow, ExecutionStep, FlowAdjustment, SubTask};
use crate::services::task_board::TaskBoard;

/// Apply a batch of flow adjustments mid-execution.
///
/// Returns the ids of steps newly published to the board (used to grow
/// progress totals).
pub async fn apply_adjustments(
    adjustments: &[FlowAdjustment],
    flow: &Mutex<ExecutionFlow>,
    board: &TaskBoard,
    parent_task_id: &str,
    subtask_index: &Mutex<HashMap<String, SubTask>>,
) -> Vec<String> {
    let mut published = Vec::new();
    for adjustment in adjustments {
        match adjustment {
            FlowAdjustment::AddStep { step } => {
                if add_step(step, flow, board, parent_task_id, subtask_index).await {
                    published.push(step.step_id.clone());
                }
            }
            FlowAdjustment::ModifyStep {
                step_id,
                description,
                dependencies,
            } => {
                modify_step(step_id, description.clone(), dependencies.clone(), flow, board, subtask_index).await;
            }
            FlowAdjustment::RemoveStep { step_id } => {
                flow.lock().await.skip_step(step_id);
                let unlocked = board.drop_dependency(step_id).await;
                if !unlocked.is_empty() {
                    tracing::info!(step_id, unlocked = unlocked.len(), "removed step unlocked dependents");
                }
            }
        }
    }
    published
}

async fn add_step(
    step: &ExecutionStep,
    flow: &Mutex<ExecutionFlow>,
    board: &TaskBoard,
    parent_task_id: &str,
    subtask_index: &Mutex<HashMap<String, SubTask>>,
) -> bool {
    flow.lock().await.add_step(step.clone());

    // Dependencies are filtered to ids the board actually knows about.
    let mut deps: HashSet<String> = HashSet::new();
    for dep in &step.dependencies {
        if board.contains(dep).await {
            deps.insert(dep.clone());
        } else {
            tracing::warn!(step_id = %step.step_id, dependency = %dep, "dropping unknown dependency on added step");
        }
    }

    let subtask = SubTask {
        id: step.step_id.clone(),
        parent_task_id: parent_task_id.to_string(),
        content: if step.description.is_empty() {
            step.name.clone()
        } else {
            step.description.clone()
        },
        role_hint: step.agent_type.clone(),
        dependencies: deps.clone(),
        priority: step.step_number,
        estimated_complexity: 1.0,
    };

    let mut dependency_map = HashMap::new();
    dependency_map.insert(step.step_id.clone(), deps);
    match board.publish(vec![subtask.clone()], dependency_map).await {
        Ok(()) => {
            subtask_index.lock().await.insert(subtask.id.clone(), subtask);
            tracing::info!(step_id = %step.step_id, "quality gate added step to the board");
            true
        }
        Err(err) => {
            tracing::warn!(step_id = %step.step_id, %err, "failed to publish added step; ignoring");
            false
        }
    }
}

async fn modify_step(
    step_id: &str,
    description: Option<String>,
    dependencies: Option<Vec<String>>,
    flow: &Mutex<ExecutionFlow>,
    board: &TaskBoard,
    subtask_index: &Mutex<HashMap<String, SubTask>>,
) {
    let dep_set: Option<HashSet<String>> = dependencies
        .as_ref()
        .map(|deps| deps.iter().cloned().collect());
    match board.modify_pending(step_id, description.clone(), dep_set.clone()).await {
        Ok(true) => {
            let mut flow = flow.lock().await;
            if let Some(step) = flow.steps.get_mut(step_id) {
                if let Some(description) = &description {
                    step.description.clone_from(description);
                }
                if let Some(deps) = &dependencies {
                    step.dependencies.clone_from(deps);
                }
            }
            drop(flow);
            let mut index = subtask_index.lock().await;
            if let Some(subtask) = index.get_mut(step_id) {
                if let Some(description) = description {
                    subtask.content = description;
                }
                if let Some(deps) = dep_set {
                    subtask.dependencies = deps;
                }
            }
        }
        Ok(false) => {
            tracing::debug!(step_id, "modify_step skipped; target is not pending");
        }
        Err(err) => {
            tracing::warn!(step_id, %err, "modify_step rejected; ignoring");
        }
    }
}
