//! BOSH director integration module.
//!
//! This module provides:
//! - The director interfaces used by the deployer
//! - An HTTP client for the director API
//! - Director task tracking

mod api;
mod client;
mod types;

pub use api::{Director, ReleaseUploader, StemcellUploader};
pub use client::DirectorClient;
pub use types::{
    DirectorStatus, DirectorTask, ReleaseSummary, ReleaseVersion, StemcellSummary, TaskState,
};
