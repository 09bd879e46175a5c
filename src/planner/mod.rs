//! Planning module for deployment operations.
//!
//! This module turns deployment options or `key=value` changes into a
//! manifest plus the action to take with it.

mod engine;
mod options;
mod plan;

pub use engine::DeploymentPlanner;
pub use options::{DeploymentOptions, PropertyAssignment};
pub use plan::{DeploymentIntent, DeploymentPlan, PlanMode, PropertyChange};
