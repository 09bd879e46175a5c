//! CLI configuration types.
//!
//! These types describe the optional `~/.cf-deploy/config.yml` file:
//!
//! ```yaml
//! director:
//!   target: https://192.168.50.4:25555
//!   username: admin
//!   password: admin
//!   skip_ssl_validation: true
//! release:
//!   name: cf-release
//!   version: 133
//!   path: releases/cf-release-133.tgz
//! stemcells:
//!   aws:
//!     name: bosh-aws-xen-ubuntu
//!     url: http://bosh-jenkins-artifacts.s3.amazonaws.com/bosh-stemcell/aws/latest-bosh-stemcell-aws.tgz
//! deployments_dir: deployments
//! strict_dns: true
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use validator::Validate;

use crate::manifest::{CF_NAMESPACE, ReleaseRef};
use crate::planner::DeploymentPlanner;

/// Infrastructure used when the director does not report a CPI.
pub const DEFAULT_CPI: &str = "aws";

/// Directory for deployment manifests when none is configured.
pub const DEFAULT_DEPLOYMENTS_DIR: &str = "deployments";

/// Root CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Director connection.
    pub director: DirectorConfig,
    /// The Cloud Foundry release to deploy.
    pub release: ReleaseSource,
    /// Stemcells by CPI family (`aws`, `vsphere`, ...).
    pub stemcells: BTreeMap<String, StemcellSource>,
    /// Directory holding deployment manifests.
    pub deployments_dir: Option<PathBuf>,
    /// Explicit manifest path, overriding the per-name default.
    pub deployment: Option<PathBuf>,
    /// Never prompt for confirmation.
    pub non_interactive: bool,
    /// Refuse to create a deployment whose domain does not resolve to one
    /// of its addresses. A mismatch is only a warning otherwise.
    pub strict_dns: bool,
}

/// Director connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DirectorConfig {
    /// Director URL.
    #[validate(url)]
    pub target: Option<String>,
    /// Basic auth user.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// HTTP request timeout in seconds.
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
    /// Delay between task polls in seconds.
    #[validate(range(min = 1))]
    pub task_poll_interval_secs: u64,
    /// Maximum time to wait for a director task in seconds.
    #[validate(range(min = 1))]
    pub task_timeout_secs: u64,
    /// Accept self-signed director certificates.
    pub skip_ssl_validation: bool,
}

/// Where the release tarball comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSource {
    /// Release name.
    pub name: String,
    /// Release version.
    pub version: u64,
    /// Local tarball path or remote URL.
    pub path: PathBuf,
}

/// Where a stemcell comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemcellSource {
    /// Stemcell name as reported by the director.
    pub name: String,
    /// Stemcell version, or `latest`.
    #[serde(default = "default_stemcell_version")]
    pub version: String,
    /// Download URL.
    pub url: String,
}

fn default_stemcell_version() -> String {
    String::from("latest")
}

impl Default for CliConfig {
    fn default() -> Self {
        let mut stemcells = BTreeMap::new();
        stemcells.insert(
            String::from(DEFAULT_CPI),
            StemcellSource {
                name: String::from("bosh-aws-xen-ubuntu"),
                version: default_stemcell_version(),
                url: String::from(
                    "http://bosh-jenkins-artifacts.s3.amazonaws.com/bosh-stemcell/aws/latest-bosh-stemcell-aws.tgz",
                ),
            },
        );

        Self {
            director: DirectorConfig::default(),
            release: ReleaseSource::default(),
            stemcells,
            deployments_dir: None,
            deployment: None,
            non_interactive: false,
            strict_dns: false,
        }
    }
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            target: None,
            username: None,
            password: None,
            timeout_secs: 30,
            task_poll_interval_secs: 5,
            task_timeout_secs: 3600,
            skip_ssl_validation: false,
        }
    }
}

impl Default for ReleaseSource {
    fn default() -> Self {
        Self {
            name: String::from("cf-release"),
            version: 133,
            path: PathBuf::from("releases/cf-release-133.tgz"),
        }
    }
}

impl ReleaseSource {
    /// Returns the release as a manifest reference.
    #[must_use]
    pub fn release_ref(&self) -> ReleaseRef {
        ReleaseRef::new(self.name.clone(), self.version)
    }
}

impl CliConfig {
    /// Returns the stemcell for a CPI family, falling back to the default
    /// infrastructure when the family is unknown.
    #[must_use]
    pub fn stemcell_for(&self, cpi: Option<&str>) -> Option<&StemcellSource> {
        cpi.and_then(|family| self.stemcells.get(family))
            .or_else(|| self.stemcells.get(DEFAULT_CPI))
    }

    /// Returns the manifest path for a deployment name.
    ///
    /// An explicit `deployment` path wins over the per-name default
    /// `<deployments_dir>/cf/<name>.yml`.
    #[must_use]
    pub fn manifest_path_for(&self, name: &str) -> PathBuf {
        if let Some(path) = &self.deployment {
            return path.clone();
        }
        self.deployments_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEPLOYMENTS_DIR))
            .join(CF_NAMESPACE)
            .join(format!("{name}.yml"))
    }

    /// Builds a planner for the configured release.
    #[must_use]
    pub fn planner(&self) -> DeploymentPlanner {
        DeploymentPlanner::new(self.release.release_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.release.version, 133);
        assert_eq!(config.director.task_poll_interval_secs, 5);
        assert!(!config.non_interactive);
        assert!(!config.strict_dns);
        assert_eq!(
            config.stemcell_for(None).map(|s| s.name.as_str()),
            Some("bosh-aws-xen-ubuntu")
        );
    }

    #[test]
    fn test_stemcell_for_unknown_cpi_falls_back() {
        let config = CliConfig::default();
        assert!(config.stemcell_for(Some("openstack")).is_some());
    }

    #[test]
    fn test_manifest_path_for() {
        let mut config = CliConfig::default();
        assert_eq!(
            config.manifest_path_for("demo"),
            PathBuf::from("deployments/cf/demo.yml")
        );

        config.deployments_dir = Some(PathBuf::from("/srv/bosh"));
        assert_eq!(
            config.manifest_path_for("demo"),
            PathBuf::from("/srv/bosh/cf/demo.yml")
        );

        config.deployment = Some(PathBuf::from("custom.yml"));
        assert_eq!(config.manifest_path_for("demo"), PathBuf::from("custom.yml"));
    }

    #[test]
    fn test_director_config_rules() {
        let mut director = DirectorConfig {
            target: Some(String::from("https://10.0.0.6:25555")),
            ..DirectorConfig::default()
        };
        assert!(director.validate().is_ok());

        director.target = Some(String::from("not a url"));
        assert!(director.validate().is_err());

        director.target = None;
        director.task_poll_interval_secs = 0;
        assert!(director.validate().is_err());
    }
}
