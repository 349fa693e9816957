//! Command-line interface.
//!
//! A thin demo surface over the orchestration core: `plan` previews the
//! decomposition of a submission, `run` executes it end-to-end with the
//! built-in echo runner standing in for real agents.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use console::style;

use crate::adapters::{HeuristicPlanner, SharedRunnerFactory};
use crate::domain::models::{Config, TaskPlan, TaskResult};
use crate::domain::ports::Planner;
use crate::services::MainAgent;

/// Multi-agent task orchestration demo.
#[derive(Debug, Parser)]
#[command(name = "waggle", version, about)]
pub struct Cli {
    /// Path to a config file (defaults to the .waggle/ merge chain).
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Preview the execution plan for a submission.
    Plan {
        /// The task content.
        content: String,
        /// Load the plan from a YAML/JSON file instead of the built-in planner.
        #[arg(long)]
        plan: Option<String>,
    },
    /// Execute a submission end-to-end with the echo runner.
    Run {
        /// The task content.
        content: String,
        /// Load the plan from a YAML/JSON file instead of the built-in planner.
        #[arg(long)]
        plan: Option<String>,
        /// Override the execution timeout in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Load a plan file by extension (YAML unless it ends in .json).
fn load_plan_file(path: &str) -> Result<TaskPlan> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read plan file {path}"))?;
    let plan: TaskPlan = if path.ends_with(".json") {
        serde_json::from_str(&raw).with_context(|| format!("invalid JSON plan in {path}"))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("invalid YAML plan in {path}"))?
    };
    Ok(plan)
}

/// Handle `waggle plan`.
pub async fn handle_plan(content: String, plan_file: Option<String>) -> Result<()> {
    let plan = match plan_file {
        Some(path) => load_plan_file(&path)?,
        None => {
            let task = crate::domain::models::Task::new(content);
            HeuristicPlanner::new().plan(&task).await?
        }
    };

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Step", "Role", "Depends on", "Description"]);
    for step in plan.ordered_steps() {
        table.add_row(vec![
            step.step_number.to_string(),
            step.step_id.clone(),
            step.agent_type.clone(),
            step.dependencies.join(", "),
            step.description.chars().take(60).collect::<String>(),
        ]);
    }
    println!("{table}");

    match plan.execution_flow.wave_preview() {
        Some(waves) => {
            println!("\n{} estimated complexity {:.1}", style("Plan:").bold(), plan.estimated_complexity);
            for (i, wave) in waves.iter().enumerate() {
                println!("  wave {}: {}", i + 1, wave.join(", "));
            }
        }
        None => bail!("plan dependencies contain a cycle"),
    }
    Ok(())
}

/// Handle `waggle run`.
pub async fn handle_run(
    mut config: Config,
    content: String,
    plan_file: Option<String>,
    timeout: Option<u64>,
) -> Result<()> {
    if let Some(timeout) = timeout {
        config.execution.timeout_secs = timeout;
    }

    let planner = Arc::new(HeuristicPlanner::new());
    let runners = Arc::new(SharedRunnerFactory::echo());
    let agent = MainAgent::new(config, planner, runners);

    let task = agent.submit_task(&content, HashMap::new()).await?;
    println!(
        "{} {} (type {}, complexity {:.1})",
        style("Submitted").green().bold(),
        task.id,
        task.metadata
            .get("task_type")
            .and_then(|v| v.as_str())
            .unwrap_or("general"),
        task.complexity,
    );

    let result = match plan_file {
        Some(path) => {
            let plan = load_plan_file(&path)?;
            agent.execute_with_plan(&task.id, plan, None, None).await
        }
        None => agent.execute_with_timeout(&task.id).await,
    };

    print_result(&result);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_result(result: &TaskResult) {
    if result.success {
        println!("{}", style("Task completed").green().bold());
    } else {
        println!(
            "{} {}",
            style("Task failed:").red().bold(),
            result.error.as_deref().unwrap_or("unknown error"),
        );
    }

    if !result.sub_results.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Sub-task", "Agent", "Ok", "Seconds", "Tokens"]);
        for sub in &result.sub_results {
            table.add_row(vec![
                sub.subtask_id.clone(),
                sub.agent_id.clone(),
                if sub.success { "yes" } else { "no" }.to_string(),
                format!("{:.2}", sub.execution_time),
                sub.token_usage.total().to_string(),
            ]);
        }
        println!("{table}");
    }

    if let Some(output) = &result.output {
        println!("\n{}\n{output}", style("Output").bold());
    }
    println!("\nfinished in {:.2}s", result.execution_time);
}
