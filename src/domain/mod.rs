//! Domain layer: models, ports, and errors.
//!
//! Contains core business entities and the trait seams behind which the
//! external collaborators (planner, role runners, quality evaluator,
//! aggregator) live.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{SwarmError, SwarmResult};
