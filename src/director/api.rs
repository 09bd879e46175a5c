//! Interfaces to the BOSH director.
//!
//! The deployer only talks to the director through these traits, which
//! keeps it testable with in-memory doubles.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;
use crate::manifest::PropertyValue;

use super::types::{DirectorStatus, DirectorTask};

/// Director queries and deployment submission.
#[async_trait]
pub trait Director: Send + Sync {
    /// Fetches the director identity.
    async fn get_status(&self) -> Result<DirectorStatus>;

    /// Checks whether a release version has been uploaded.
    async fn has_release(&self, name: &str, version: u64) -> Result<bool>;

    /// Checks whether a stemcell version has been uploaded.
    ///
    /// A version of `latest` matches any uploaded version.
    async fn has_stemcell(&self, name: &str, version: &str) -> Result<bool>;

    /// Submits a manifest and waits for the resulting task.
    async fn deploy(&self, manifest: &[u8]) -> Result<DirectorTask>;

    /// Lists the `cf` properties of a deployment as the director has it.
    async fn list_properties(&self, deployment: &str) -> Result<BTreeMap<String, PropertyValue>>;
}

/// Release uploads.
#[async_trait]
pub trait ReleaseUploader: Send + Sync {
    /// Uploads a release tarball from a local path or remote URL.
    async fn upload_release(&self, path: &Path) -> Result<DirectorTask>;
}

/// Stemcell uploads.
#[async_trait]
pub trait StemcellUploader: Send + Sync {
    /// Asks the director to fetch a stemcell from `url`.
    async fn upload_stemcell(&self, url: &str) -> Result<DirectorTask>;
}
