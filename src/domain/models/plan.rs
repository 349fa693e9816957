//! Execution plans.
//!
//! A `TaskPlan` is the structured output of a planner: an ordered set of
//! steps with dependency edges and suggested agent roles. The executor
//! converts steps into sub-tasks; the quality gate mutates the flow while
//! the plan is running.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Status of a plan step inside the execution flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Blocked,
    Running,
    Completed,
    Failed,
    /// Removed by a quality-gate adjustment; treated as completed for
    /// unlock purposes.
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// Unique step identifier.
    pub step_id: String,
    /// Ordinal used as the sub-task priority.
    pub step_number: i32,
    #[serde(default)]
    pub name: String,
    pub description: String,
    /// Role hint for the agent that should run this step.
    pub agent_type: String,
    #[serde(default)]
    pub expected_output: String,
    /// Ids of steps this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub status: StepStatus,
}

impl ExecutionStep {
    pub fn new(step_id: impl Into<String>, step_number: i32, description: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            step_number,
            name: String::new(),
            description: description.into(),
            agent_type: agent_type.into(),
            expected_output: String::new(),
            dependencies: Vec::new(),
            status: StepStatus::default(),
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }
}

/// The dependency-ordered set of steps for one plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionFlow {
    /// step id -> step.
    pub steps: HashMap<String, ExecutionStep>,
}

impl ExecutionFlow {
    pub fn from_steps(steps: Vec<ExecutionStep>) -> Self {
        Self {
            steps: steps.into_iter().map(|s| (s.step_id.clone(), s)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn add_step(&mut self, step: ExecutionStep) {
        self.steps.insert(step.step_id.clone(), step);
    }

    /// Mark a step skipped and scrub its id from every downstream
    /// dependency list, so dependents can unlock without it.
    pub fn skip_step(&mut self, step_id: &str) {
        if let Some(step) = self.steps.get_mut(step_id) {
            step.status = StepStatus::Skipped;
        }
        for step in self.steps.values_mut() {
            step.dependencies.retain(|dep| dep != step_id);
        }
    }

    /// Group steps into dependency layers: each layer only depends on
    /// earlier ones. Returns `None` when the edges are cyclic.
    pub fn wave_preview(&self) -> Option<Vec<Vec<String>>> {
        let mut remaining: HashSet<String> = self.steps.keys().cloned().collect();
        let mut placed: HashSet<String> = HashSet::new();
        let mut layers = Vec::new();

        while !remaining.is_empty() {
            let mut layer: Vec<String> = remaining
                .iter()
                .filter(|id| {
                    self.steps[id.as_str()]
                        .dependencies
                        .iter()
                        // Edges out of the plan are satisfied externally.
                        .all(|dep| placed.contains(dep) || !self.steps.contains_key(dep))
                })
                .cloned()
                .collect();

            if layer.is_empty() {
                return None;
            }
            layer.sort();
            for id in &layer {
                remaining.remove(id);
                placed.insert(id.clone());
            }
            layers.push(layer);
        }
        Some(layers)
    }
}

/// A planner-produced execution plan for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPlan {
    /// The task content after planner refinement.
    #[serde(default)]
    pub refined_task: String,
    #[serde(default)]
    pub estimated_complexity: f64,
    pub execution_flow: ExecutionFlow,
    /// Optional positional overlay of role hints onto steps.
    #[serde(default)]
    pub suggested_agents: Vec<String>,
}

impl TaskPlan {
    /// Steps ordered by step number, the shape the positional
    /// `suggested_agents` overlay applies to.
    pub fn ordered_steps(&self) -> Vec<&ExecutionStep> {
        let mut steps: Vec<&ExecutionStep> = self.execution_flow.steps.values().collect();
        steps.sort_by_key(|s| (s.step_number, s.step_id.clone()));
        steps
    }
}

/// A quality-gate adjustment to a running flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowAdjustment {
    /// Materialise a new step (and board entry) mid-flight.
    AddStep { step: ExecutionStep },
    /// Rewrite an existing step; only applied while it is still pending.
    ModifyStep {
        step_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dependencies: Option<Vec<String>>,
    },
    /// Mark a step skipped and drop it from downstream dependency lists.
    RemoveStep { step_id: String },
}
