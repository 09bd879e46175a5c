//! BOSH director API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Director identity as reported by `GET /info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorStatus {
    /// Director name.
    #[serde(default)]
    pub name: Option<String>,
    /// Director UUID.
    pub uuid: String,
    /// Director version.
    #[serde(default)]
    pub version: Option<String>,
    /// Authenticated user.
    #[serde(default)]
    pub user: Option<String>,
    /// Cloud provider interface, e.g. `aws_cpi`.
    #[serde(default)]
    pub cpi: Option<String>,
}

impl DirectorStatus {
    /// Returns the infrastructure family of the CPI (`aws_cpi` → `aws`).
    #[must_use]
    pub fn cpi_family(&self) -> Option<&str> {
        self.cpi
            .as_deref()
            .map(|cpi| cpi.strip_suffix("_cpi").unwrap_or(cpi))
    }
}

/// A release known to the director.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSummary {
    /// Release name.
    pub name: String,
    /// Uploaded versions.
    #[serde(default)]
    pub release_versions: Vec<ReleaseVersion>,
}

/// One uploaded version of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseVersion {
    /// Version string.
    pub version: String,
}

/// A stemcell known to the director.
#[derive(Debug, Clone, Deserialize)]
pub struct StemcellSummary {
    /// Stemcell name.
    pub name: String,
    /// Stemcell version.
    pub version: String,
    /// Cloud identifier.
    #[serde(default)]
    pub cid: Option<String>,
}

/// Director task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting to run.
    Queued,
    /// Running.
    Processing,
    /// Cancel requested.
    Cancelling,
    /// Cancelled.
    Cancelled,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Error,
    /// Timed out on the director.
    Timeout,
}

impl TaskState {
    /// Returns true if the task will not change state again.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Cancelled | Self::Done | Self::Error | Self::Timeout)
    }

    /// Returns true if the task finished successfully.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Cancelling => "cancelling",
            Self::Cancelled => "cancelled",
            Self::Done => "done",
            Self::Error => "error",
            Self::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// A director task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectorTask {
    /// Task identifier.
    pub id: u64,
    /// Current state.
    pub state: TaskState,
    /// What the task does.
    #[serde(default)]
    pub description: String,
    /// Start time as a Unix timestamp.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Result text, usually set once the task has finished.
    #[serde(default)]
    pub result: Option<String>,
}

impl DirectorTask {
    /// Returns when the task started, if known.
    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }
}

/// Response of `GET /deployments/<name>`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentManifestResponse {
    /// Manifest YAML.
    pub manifest: String,
}
