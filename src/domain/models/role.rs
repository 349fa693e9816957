//! Agent roles.
//!
//! A role bundles everything the runner needs to impersonate one agent
//! persona: a prompt template, the tools it may use, and a closed model
//! configuration. A static registry maps role hints to role definitions;
//! unknown hints fall back to the generalist.

use serde::{Deserialize, Serialize};

/// LLM parameters for a role.
///
/// The field set is closed on purpose: unknown keys in a plan or config file
/// are a validation error rather than silently carried along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ModelConfig {
    /// Model identifier.
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Allow the runner to use web search tools.
    pub enable_search: bool,
    /// Request extended thinking from the model.
    pub enable_thinking: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "default-large".to_string(),
            temperature: 0.7,
            max_tokens: 8192,
            enable_search: false,
            enable_thinking: false,
        }
    }
}

/// A named agent persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// System prompt template for the role loop.
    pub prompt: String,
    /// Tool names this role may invoke.
    pub allowed_tools: Vec<String>,
    pub model: ModelConfig,
}

impl Role {
    fn new(name: &str, prompt: &str, allowed_tools: &[&str], model: ModelConfig) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            allowed_tools: allowed_tools.iter().map(|t| (*t).to_string()).collect(),
            model,
        }
    }

    /// Resolve a role hint to a role definition.
    ///
    /// Matching is case-insensitive; anything unrecognised (including the
    /// empty hint) resolves to the generalist.
    pub fn by_hint(hint: &str) -> Role {
        let hint = hint.trim().to_lowercase();
        builtin_roles()
            .into_iter()
            .find(|r| r.name == hint)
            .unwrap_or_else(generalist)
    }
}

fn search_model() -> ModelConfig {
    ModelConfig {
        enable_search: true,
        ..ModelConfig::default()
    }
}

fn thinking_model() -> ModelConfig {
    ModelConfig {
        temperature: 0.4,
        enable_thinking: true,
        ..ModelConfig::default()
    }
}

fn generalist() -> Role {
    Role::new(
        "generalist",
        "You are a capable general-purpose agent. Complete the task described below thoroughly.",
        &["web_search", "file_read", "file_write"],
        ModelConfig::default(),
    )
}

/// The built-in role registry.
pub fn builtin_roles() -> Vec<Role> {
    vec![
        Role::new(
            "researcher",
            "You are a research agent. Gather accurate, sourced information for the task below.",
            &["web_search", "file_read"],
            search_model(),
        ),
        Role::new(
            "analyst",
            "You are an analysis agent. Examine the supplied material and produce structured findings.",
            &["file_read", "code_execution"],
            thinking_model(),
        ),
        Role::new(
            "writer",
            "You are a writing agent. Produce clear, well-organised prose for the task below.",
            &["file_read", "file_write"],
            ModelConfig::default(),
        ),
        Role::new(
            "coder",
            "You are a coding agent. Write correct, tested code for the task below.",
            &["code_execution", "file_read", "file_write"],
            thinking_model(),
        ),
        Role::new(
            "translator",
            "You are a translation agent. Translate the supplied content faithfully.",
            &["file_read"],
            ModelConfig::default(),
        ),
        Role::new(
            "searcher",
            "You are a search agent. Locate the most relevant sources for the task below.",
            &["web_search"],
            search_model(),
        ),
        Role::new(
            "summarizer",
            "You are a summarization agent. Condense the supplied material without losing substance.",
            &["file_read"],
            ModelConfig::default(),
        ),
        Role::new(
            "verifier",
            "You are a verification agent. Check the supplied claims and outputs for correctness.",
            &["web_search", "file_read", "code_execution"],
            thinking_model(),
        ),
        generalist(),
    ]
}
