//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid max_concurrent_agents: {0}. Must be between 1 and 100")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid timeout_warn_threshold: {0}. Must be within (0.0, 1.0)")]
    InvalidWarnThreshold(f64),

    #[error("Invalid timeout_secs: must be positive")]
    InvalidTimeout,

    #[error("Invalid max_agents: {0}. Must be at least 1")]
    InvalidMaxAgents(usize),

    #[error("Invalid task content bounds: min {min} must not exceed max {max}")]
    InvalidContentBounds { min: usize, max: usize },

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.waggle/config.yaml` (project config)
    /// 3. `.waggle/local.yaml` (project local overrides, optional)
    /// 4. Environment variables (`WAGGLE_*` prefix)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".waggle/config.yaml"))
            .merge(Yaml::file(".waggle/local.yaml"))
            .merge(Env::prefixed("WAGGLE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file on top of the defaults.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn validate(config: &Config) -> Result<(), ConfigError> {
        let scheduler = &config.scheduler;
        if scheduler.max_concurrent_agents == 0 || scheduler.max_concurrent_agents > 100 {
            return Err(ConfigError::InvalidMaxConcurrency(scheduler.max_concurrent_agents));
        }

        let execution = &config.execution;
        if execution.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        if execution.timeout_warn_threshold <= 0.0 || execution.timeout_warn_threshold >= 1.0 {
            return Err(ConfigError::InvalidWarnThreshold(execution.timeout_warn_threshold));
        }
        if execution.min_task_content_length > execution.max_task_content_length {
            return Err(ConfigError::InvalidContentBounds {
                min: execution.min_task_content_length,
                max: execution.max_task_content_length,
            });
        }

        if config.team.max_agents == 0 {
            return Err(ConfigError::InvalidMaxAgents(config.team.max_agents));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }

        Ok(())
    }
}
