//! Deployment orchestration.
//!
//! The deployer sequences every command that touches the director:
//!
//! ```text
//! PREPARING -> RELEASE_READY -> STEMCELL_READY -> SUBMITTED -> DONE
//! ```
//!
//! Any stage may end in `FAILED`. Artifacts are only uploaded when the
//! director does not have them, and a deployment is submitted at most once
//! per command. Local validation always completes before the first remote
//! call. A new deployment's domain is checked against its addresses before
//! the director is contacted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::config::CliConfig;
use crate::director::{Director, DirectorTask, ReleaseUploader, StemcellUploader};
use crate::dns::{DnsMapping, DomainResolver, check_mapping};
use crate::error::{CfDeployError, ConfigError, DirectorError, ManifestError, Result};
use crate::manifest::{
    AttributeRules, Classification, ManifestDocument, ManifestStore, PropertyValue, ReleaseRef,
};
use crate::planner::{
    DeploymentIntent, DeploymentOptions, DeploymentPlan, DeploymentPlanner, PlanMode,
    PropertyChange,
};

/// Stages of a deployment command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStage {
    /// Contacting the director.
    Preparing,
    /// The release is on the director.
    ReleaseReady,
    /// The stemcell is on the director.
    StemcellReady,
    /// The manifest has been persisted and submitted.
    Submitted,
    /// Finished.
    Done,
    /// Aborted by an error.
    Failed,
}

impl std::fmt::Display for DeploymentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Preparing => "PREPARING",
            Self::ReleaseReady => "RELEASE_READY",
            Self::StemcellReady => "STEMCELL_READY",
            Self::Submitted => "SUBMITTED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Stages visited by one command.
#[derive(Debug, Default)]
struct StageLog {
    stages: Vec<DeploymentStage>,
}

impl StageLog {
    fn enter(&mut self, stage: DeploymentStage) {
        info!("Stage: {stage}");
        self.stages.push(stage);
    }

    fn fail(&mut self, err: &CfDeployError) {
        let from = self.stages.last().copied().unwrap_or(DeploymentStage::Preparing);
        error!("Stage {from} -> FAILED: {err}");
        self.stages.push(DeploymentStage::Failed);
    }
}

/// Outcome of release and stemcell preparation.
#[derive(Debug, Clone, Serialize)]
pub struct PreparationReport {
    /// Director UUID.
    pub director_uuid: String,
    /// Director CPI, if reported.
    pub cpi: Option<String>,
    /// Release checked.
    pub release: String,
    /// Whether the release was uploaded.
    pub release_uploaded: bool,
    /// Stemcell checked.
    pub stemcell: String,
    /// Whether the stemcell was uploaded.
    pub stemcell_uploaded: bool,
}

/// Outcome of a create or change command.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    /// Deployment name.
    pub deployment: String,
    /// Manifest location.
    pub manifest_path: PathBuf,
    /// Create or update.
    pub mode: PlanMode,
    /// Deploy or no-op.
    pub intent: DeploymentIntent,
    /// Stages visited.
    pub stages: Vec<DeploymentStage>,
    /// Artifact preparation.
    pub preparation: PreparationReport,
    /// Property changes applied.
    pub changes: Vec<PropertyChange>,
    /// SHA-256 of the written manifest.
    pub fingerprint: Option<String>,
    /// Director deploy task.
    pub task_id: Option<u64>,
    /// When the director started the deploy task.
    pub task_started_at: Option<DateTime<Utc>>,
    /// Domain check of a new deployment.
    pub dns: Option<DnsMapping>,
    /// When the command finished.
    pub finished_at: DateTime<Utc>,
}

/// Properties of a deployment.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyReport {
    /// Deployment name.
    pub deployment: Option<String>,
    /// Manifest location.
    pub manifest_path: PathBuf,
    /// Release in the manifest.
    pub releases: Vec<String>,
    /// One entry per property.
    pub properties: Vec<PropertyEntry>,
    /// Whether deployed values were fetched.
    pub includes_deployed: bool,
}

/// A single property with its local and deployed values.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyEntry {
    /// Property key.
    pub key: String,
    /// Whether it can be changed.
    pub classification: Classification,
    /// Value in the local manifest.
    pub local: Option<PropertyValue>,
    /// Value on the director.
    pub deployed: Option<PropertyValue>,
}

impl PropertyReport {
    /// Builds a report from a manifest and, optionally, the properties the
    /// director has for it.
    #[must_use]
    pub fn from_document(
        document: &ManifestDocument,
        path: &Path,
        rules: &AttributeRules,
        deployed: Option<&BTreeMap<String, PropertyValue>>,
    ) -> Self {
        let deployed_value = |key: &str| deployed.and_then(|d| d.get(key)).cloned();

        let mut properties: Vec<PropertyEntry> = rules
            .iter()
            .map(|rule| PropertyEntry {
                key: rule.key.to_string(),
                classification: rules.classify(rule.key),
                local: document.get(rule.key).cloned(),
                deployed: deployed_value(rule.key),
            })
            .collect();

        // Undeclared keys are listed so they can be spotted and removed.
        if let Some(local) = document.cf_properties() {
            for (key, value) in local {
                if rules.rule(key).is_none() {
                    properties.push(PropertyEntry {
                        key: key.clone(),
                        classification: Classification::Unknown,
                        local: Some(value.clone()),
                        deployed: deployed_value(key),
                    });
                }
            }
        }

        Self {
            deployment: document.deployment_name().map(String::from),
            manifest_path: path.to_path_buf(),
            releases: document.releases.iter().map(ToString::to_string).collect(),
            properties,
            includes_deployed: deployed.is_some(),
        }
    }
}

impl PropertyEntry {
    /// Returns true if the deployed value is known and differs.
    #[must_use]
    pub fn is_drifted(&self) -> bool {
        self.deployed.is_some() && self.deployed != self.local
    }
}

/// Orchestrates Cloud Foundry deployments on a BOSH director.
pub struct CfDeployer<'a, M: ManifestStore> {
    /// CLI configuration.
    config: &'a CliConfig,
    /// Director queries and deploys.
    director: &'a dyn Director,
    /// Release uploads.
    releases: &'a dyn ReleaseUploader,
    /// Stemcell uploads.
    stemcells: &'a dyn StemcellUploader,
    /// Domain lookups for the DNS mapping check.
    resolver: &'a dyn DomainResolver,
    /// Manifest storage.
    store: &'a M,
    /// Plan builder.
    planner: DeploymentPlanner,
}

impl<'a, M: ManifestStore> CfDeployer<'a, M> {
    /// Creates a new deployer.
    #[must_use]
    pub fn new(
        config: &'a CliConfig,
        director: &'a dyn Director,
        releases: &'a dyn ReleaseUploader,
        stemcells: &'a dyn StemcellUploader,
        resolver: &'a dyn DomainResolver,
        store: &'a M,
    ) -> Self {
        Self {
            config,
            director,
            releases,
            stemcells,
            resolver,
            store,
            planner: config.planner(),
        }
    }

    /// Makes sure the configured release and the stemcell for the
    /// director's CPI are uploaded. Safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns an upload error if an upload fails, or the director error
    /// if a query fails.
    pub async fn prepare(&self) -> Result<PreparationReport> {
        let mut stages = StageLog::default();
        let release = self.planner.release().clone();

        match self.ensure_artifacts(&release, &mut stages).await {
            Ok(report) => {
                stages.enter(DeploymentStage::Done);
                Ok(report)
            }
            Err(e) => {
                stages.fail(&e);
                Err(e)
            }
        }
    }

    /// Executes a plan: prepares artifacts, persists the manifest and
    /// submits it.
    ///
    /// # Errors
    ///
    /// Returns an already-exists error when creating over an existing
    /// manifest (before any remote call), a validation error on `dns` when
    /// strict DNS checking is on and the domain does not point at the
    /// deployment, and upload, write or deploy errors from later stages.
    pub async fn execute(&self, path: &Path, plan: &DeploymentPlan) -> Result<DeploymentReport> {
        let dns = match plan.mode {
            PlanMode::Create => {
                if self.store.exists(path).await? {
                    return Err(ManifestError::AlreadyExists {
                        path: path.to_path_buf(),
                    }
                    .into());
                }
                Some(self.check_dns(&plan.document).await?)
            }
            PlanMode::Update => None,
        };

        let mut stages = StageLog::default();
        match self.run_stages(path, plan, &mut stages).await {
            Ok((preparation, fingerprint, task)) => {
                stages.enter(DeploymentStage::Done);
                Ok(DeploymentReport {
                    deployment: plan.document.deployment_name().unwrap_or_default().to_string(),
                    manifest_path: path.to_path_buf(),
                    mode: plan.mode,
                    intent: plan.intent,
                    stages: stages.stages,
                    preparation,
                    changes: plan.changes.clone(),
                    fingerprint,
                    task_id: task.as_ref().map(|t| t.id),
                    task_started_at: task.as_ref().and_then(DirectorTask::started_at),
                    dns,
                    finished_at: Utc::now(),
                })
            }
            Err(e) => {
                stages.fail(&e);
                Err(e)
            }
        }
    }

    /// Creates a deployment.
    ///
    /// # Errors
    ///
    /// Returns a validation error for missing or invalid options, and the
    /// errors of [`Self::execute`].
    pub async fn create(
        &self,
        path: Option<&Path>,
        options: &DeploymentOptions,
    ) -> Result<DeploymentReport> {
        let plan = self.planner.plan_create(options)?;
        let path = path.map_or_else(
            || {
                self.config
                    .manifest_path_for(plan.document.deployment_name().unwrap_or_default())
            },
            Path::to_path_buf,
        );
        self.execute(&path, &plan).await
    }

    /// Changes mutable properties of an existing deployment.
    ///
    /// # Errors
    ///
    /// Returns a not-found or parse error for the manifest, a validation
    /// error for the arguments, and the errors of [`Self::execute`].
    pub async fn change_properties(
        &self,
        path: &Path,
        args: &[String],
    ) -> Result<DeploymentReport> {
        let existing = self.store.read(path).await?;
        let plan = self.planner.plan_update(&existing, args)?;
        self.execute(path, &plan).await
    }

    /// Reports the properties of the manifest at `path`, optionally with
    /// the values the director currently has.
    ///
    /// # Errors
    ///
    /// Returns a not-found or parse error for the manifest, or the director
    /// error when fetching deployed values fails.
    pub async fn show_properties(
        &self,
        path: &Path,
        include_deployed: bool,
    ) -> Result<PropertyReport> {
        let document = self.store.read(path).await?;

        if !include_deployed {
            return Ok(PropertyReport::from_document(
                &document,
                path,
                self.planner.rules(),
                None,
            ));
        }

        let name = document
            .deployment_name()
            .ok_or_else(|| ManifestError::validation("name", "manifest has no deployment name"))?;
        let deployed = self.director.list_properties(name).await?;

        Ok(PropertyReport::from_document(
            &document,
            path,
            self.planner.rules(),
            Some(&deployed),
        ))
    }

    async fn run_stages(
        &self,
        path: &Path,
        plan: &DeploymentPlan,
        stages: &mut StageLog,
    ) -> Result<(PreparationReport, Option<String>, Option<DirectorTask>)> {
        let release = plan
            .document
            .release(&self.planner.release().name)
            .or_else(|| plan.document.releases.first())
            .cloned()
            .ok_or_else(|| ManifestError::validation("releases", "manifest has no release"))?;

        let preparation = self.ensure_artifacts(&release, stages).await?;

        if plan.is_noop() {
            info!("No property changes, skipping deploy");
            return Ok((preparation, None, None));
        }

        stages.enter(DeploymentStage::Submitted);
        debug!("Writing manifest to {} store", self.store.backend_type());
        self.store.write(path, &plan.document).await?;
        let fingerprint = plan.document.fingerprint()?;
        debug!("Manifest fingerprint: {fingerprint}");

        let deployment = plan.document.deployment_name().unwrap_or_default().to_string();
        let bytes = plan.document.to_bytes()?;
        info!("Deploying '{deployment}' from {}", path.display());

        let task = self.director.deploy(&bytes).await.map_err(|e| {
            CfDeployError::from(DirectorError::Deploy {
                deployment: deployment.clone(),
                message: e.to_string(),
            })
        })?;

        info!("Deployment '{deployment}' finished (task {})", task.id);
        Ok((preparation, Some(fingerprint), Some(task)))
    }

    /// Checks that the domain of a new deployment resolves to one of its
    /// addresses.
    async fn check_dns(&self, document: &ManifestDocument) -> Result<DnsMapping> {
        let (Some(PropertyValue::Text(domain)), Some(PropertyValue::List(addresses))) =
            (document.get("dns"), document.get("ip_addresses"))
        else {
            return Err(
                ManifestError::validation("dns", "manifest has no dns or ip_addresses").into(),
            );
        };

        let mapping = check_mapping(self.resolver, domain, addresses).await;
        if !mapping.is_matched() {
            if self.config.strict_dns {
                let message = format!("{domain} {mapping}");
                return Err(ManifestError::validation("dns", message).into());
            }
            warn!("{domain} {mapping}; the deployment may not be reachable");
        }
        Ok(mapping)
    }

    async fn ensure_artifacts(
        &self,
        release: &ReleaseRef,
        stages: &mut StageLog,
    ) -> Result<PreparationReport> {
        stages.enter(DeploymentStage::Preparing);
        let status = self.director.get_status().await?;
        info!(
            "Director {} ({})",
            status.name.as_deref().unwrap_or("unnamed"),
            status.uuid
        );

        let release_uploaded = self.ensure_release(release).await?;
        stages.enter(DeploymentStage::ReleaseReady);

        let cpi = status.cpi_family();
        let stemcell = self.config.stemcell_for(cpi).ok_or_else(|| {
            ConfigError::validation(
                format!("no stemcell configured for CPI '{}'", cpi.unwrap_or("unknown")),
                "stemcells",
            )
        })?;

        let stemcell_label = format!("stemcell {}/{}", stemcell.name, stemcell.version);
        let stemcell_uploaded = if self
            .director
            .has_stemcell(&stemcell.name, &stemcell.version)
            .await?
        {
            debug!("{stemcell_label} already uploaded");
            false
        } else {
            info!("Uploading {stemcell_label} from {}", stemcell.url);
            self.stemcells
                .upload_stemcell(&stemcell.url)
                .await
                .map_err(|e| upload_failed(&stemcell_label, e))?;
            true
        };
        stages.enter(DeploymentStage::StemcellReady);

        Ok(PreparationReport {
            director_uuid: status.uuid.clone(),
            cpi: status.cpi.clone(),
            release: release.to_string(),
            release_uploaded,
            stemcell: format!("{}/{}", stemcell.name, stemcell.version),
            stemcell_uploaded,
        })
    }

    async fn ensure_release(&self, release: &ReleaseRef) -> Result<bool> {
        if self.director.has_release(&release.name, release.version).await? {
            debug!("Release {release} already uploaded");
            return Ok(false);
        }

        let label = format!("release {release}");
        if release != self.planner.release() {
            return Err(DirectorError::upload(
                label,
                "not on the director and no tarball is configured for this version",
            )
            .into());
        }

        let source = &self.config.release.path;
        info!("Uploading {label} from {}", source.display());
        self.releases
            .upload_release(source)
            .await
            .map_err(|e| upload_failed(&label, e))?;
        Ok(true)
    }
}

fn upload_failed(artifact: &str, err: CfDeployError) -> CfDeployError {
    match err {
        CfDeployError::Director(DirectorError::Upload { .. }) => err,
        other => DirectorError::upload(artifact, other.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(DeploymentStage::ReleaseReady.to_string(), "RELEASE_READY");
        assert_eq!(DeploymentStage::Failed.to_string(), "FAILED");
    }

    #[test]
    fn test_stage_log_records_failure() {
        let mut log = StageLog::default();
        log.enter(DeploymentStage::Preparing);
        log.fail(&DirectorError::network("connection refused").into());
        assert_eq!(
            log.stages,
            vec![DeploymentStage::Preparing, DeploymentStage::Failed]
        );
    }

    #[test]
    fn test_property_entry_drift() {
        let entry = PropertyEntry {
            key: String::from("persistent_disk"),
            classification: Classification::Mutable,
            local: Some(PropertyValue::Integer(8192)),
            deployed: Some(PropertyValue::Integer(4096)),
        };
        assert!(entry.is_drifted());

        let entry = PropertyEntry {
            deployed: None,
            ..entry
        };
        assert!(!entry.is_drifted());
    }
}
