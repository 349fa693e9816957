//! Infrastructure: configuration loading and logging setup.

pub mod config_loader;
pub mod logging;

pub use config_loader::{ConfigError, ConfigLoader};
pub use logging::Logging;
