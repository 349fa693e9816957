//! Deterministic, LLM-free planner.
//!
//! Scores complexity from surface features of the submission and emits a
//! small fixed pipeline: a single step for simple tasks, a
//! research/analysis/writing chain for complex ones. Useful as the demo
//! planner and as a fallback when no external planner is wired in.

use async_trait::async_trait;

use crate::domain::errors::SwarmResult;
use crate::domain::models::{ExecutionFlow, ExecutionStep, Task, TaskPlan};
use crate::domain::ports::Planner;
use crate::services::classify_task_type;

/// Complexity at or above which the planner emits a multi-step pipeline.
const PIPELINE_THRESHOLD: f64 = 3.0;

/// Role used for the single-step plan of each task type.
fn role_for_type(task_type: &str) -> &'static str {
    match task_type {
        "research" => "researcher",
        "analysis" => "analyst",
        "writing" => "writer",
        "coding" => "coder",
        "translation" => "translator",
        "search" => "searcher",
        "summary" => "summarizer",
        "verification" => "verifier",
        _ => "generalist",
    }
}

/// Surface-feature complexity estimate, clamped to 0..=10.
pub fn estimate_complexity(content: &str) -> f64 {
    let mut score: f64 = 0.0;

    let length = content.len();
    if length > 500 {
        score += 2.0;
    } else if length > 200 {
        score += 1.5;
    } else if length > 100 {
        score += 1.0;
    } else if length > 50 {
        score += 0.5;
    }

    let sentences = content
        .split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count();
    if sentences > 5 {
        score += 2.0;
    } else if sentences > 3 {
        score += 1.0;
    } else if sentences > 1 {
        score += 0.5;
    }

    let questions = content.matches('?').count();
    if questions > 3 {
        score += 2.0;
    } else if questions > 1 {
        score += 1.0;
    } else if questions > 0 {
        score += 0.5;
    }

    score.clamp(0.0, 10.0)
}

/// Keyword-and-heuristics planner.
#[derive(Debug, Clone, Default)]
pub struct HeuristicPlanner;

impl HeuristicPlanner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Planner for HeuristicPlanner {
    async fn plan(&self, task: &Task) -> SwarmResult<TaskPlan> {
        let complexity = estimate_complexity(&task.content);
        let task_type = classify_task_type(&task.content);

        let steps = if complexity >= PIPELINE_THRESHOLD {
            vec![
                ExecutionStep::new("step-1", 1, format!("Gather material for: {}", task.content), "researcher"),
                ExecutionStep::new("step-2", 2, "Analyze the gathered material and extract key findings", "analyst")
                    .with_dependencies(vec!["step-1".to_string()]),
                ExecutionStep::new("step-3", 3, "Produce the final deliverable from the analysis", "writer")
                    .with_dependencies(vec!["step-2".to_string()]),
            ]
        } else {
            vec![ExecutionStep::new("step-1", 1, task.content.clone(), role_for_type(task_type))]
        };

        Ok(TaskPlan {
            refined_task: task.content.clone(),
            estimated_complexity: complexity,
            execution_flow: ExecutionFlow::from_steps(steps),
            suggested_agents: Vec::new(),
        })
    }

    async fn estimate_complexity(&self, task: &Task) -> SwarmResult<f64> {
        Ok(estimate_complexity(&task.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_scores_low() {
        assert!(estimate_complexity("hi") < 1.0);
    }

    #[test]
    fn long_questioning_content_scores_high() {
        let content = "What is the history of distributed consensus? How did Paxos emerge? \
            Why is Raft considered easier to understand? What trade-offs exist between them? \
            Please compare the protocols in depth, covering leader election, log replication, \
            membership changes, and the practical systems built on each of them over the years."
            .repeat(2);
        assert!(estimate_complexity(&content) >= 5.0);
    }

    #[tokio::test]
    async fn simple_tasks_get_one_step() {
        let planner = HeuristicPlanner::new();
        let plan = planner.plan(&Task::new("translate hello")).await.unwrap();
        assert_eq!(plan.execution_flow.steps.len(), 1);
        assert_eq!(plan.execution_flow.steps["step-1"].agent_type, "translator");
    }

    #[tokio::test]
    async fn complex_tasks_get_a_pipeline() {
        let content = "Research the complete history of the transistor? Who invented it? \
            What materials were used over time? How did fabrication scale? Compare the major \
            fabrication nodes and write a detailed report covering each era with citations."
            .repeat(2);
        let planner = HeuristicPlanner::new();
        let plan = planner.plan(&Task::new(content)).await.unwrap();
        assert_eq!(plan.execution_flow.steps.len(), 3);
        let waves = plan.execution_flow.wave_preview().unwrap();
        assert_eq!(waves.len(), 3);
    }
}
