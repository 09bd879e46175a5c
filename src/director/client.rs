//! BOSH director HTTP client.
//!
//! Long-running operations (uploads, deploys) answer with a redirect to a
//! task resource; the client follows the task until it finishes.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::config::DirectorConfig;
use crate::error::{CfDeployError, ConfigError, DirectorError, Result};
use crate::manifest::{ManifestDocument, PropertyValue};

use super::api::{Director, ReleaseUploader, StemcellUploader};
use super::types::{
    DeploymentManifestResponse, DirectorStatus, DirectorTask, ReleaseSummary, StemcellSummary,
};

/// Version that matches any uploaded stemcell.
const LATEST_VERSION: &str = "latest";

/// BOSH director API client.
#[derive(Debug, Clone)]
pub struct DirectorClient {
    /// HTTP client.
    client: Client,
    /// Director base URL.
    target: String,
    /// Basic auth user.
    username: Option<String>,
    /// Basic auth password.
    password: Option<String>,
    /// Delay between task polls.
    poll_interval: Duration,
    /// Maximum time to wait for a task.
    task_timeout: Duration,
}

impl DirectorClient {
    /// Creates a client for the configured director.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no target is set, or a network
    /// error if the HTTP client cannot be created.
    pub fn new(config: &DirectorConfig) -> Result<Self> {
        let target = config
            .target
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ConfigError::validation(
                    "no director target set; use director.target or CF_DEPLOY_DIRECTOR_TARGET",
                    "director.target",
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(config.skip_ssl_validation)
            .build()
            .map_err(|e| DirectorError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            target: target.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            poll_interval: Duration::from_secs(config.task_poll_interval_secs),
            task_timeout: Duration::from_secs(config.task_timeout_secs),
        })
    }

    /// Returns the director base URL.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Builds an authenticated request.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{path}", self.target));
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    /// Sends a request and maps HTTP failures to director errors.
    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| DirectorError::network(format!("{what} failed: {e}")))?;

        let status = response.status();
        trace!("{what} -> {status}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message =
                format!("{what} was rejected with {status}; check the director credentials");
            return Err(DirectorError::AuthenticationFailed { message }.into());
        }

        if !status.is_success() && !status.is_redirection() {
            let body = response.text().await.unwrap_or_default();
            return Err(DirectorError::api_error(status.as_u16(), body).into());
        }

        Ok(response)
    }

    /// Fetches and decodes a JSON resource.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let response = self
            .send(self.request(Method::GET, path), &format!("GET {path}"))
            .await?;

        response.json::<T>().await.map_err(|e| {
            DirectorError::InvalidResponse {
                message: format!("Failed to parse {path} response: {e}"),
            }
            .into()
        })
    }

    /// Submits a request that creates a task, then waits for the task.
    async fn submit(&self, builder: RequestBuilder, what: &str) -> Result<DirectorTask> {
        let response = self.send(builder, what).await?;

        let task_id = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| location.rsplit('/').next())
            .and_then(|id| id.parse::<u64>().ok())
            .ok_or_else(|| DirectorError::InvalidResponse {
                message: format!("{what} did not return a task location"),
            })?;

        info!("{what} started director task {task_id}");
        self.wait_for_task(task_id).await
    }

    /// Fetches a task.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is invalid.
    pub async fn get_task(&self, task_id: u64) -> Result<DirectorTask> {
        self.get_json(&format!("/tasks/{task_id}")).await
    }

    /// Polls a task until it finishes.
    ///
    /// # Errors
    ///
    /// Returns a task error if the task finishes unsuccessfully and a
    /// timeout error if it is still running after the configured timeout.
    pub async fn wait_for_task(&self, task_id: u64) -> Result<DirectorTask> {
        let started = Instant::now();

        loop {
            let task = self.get_task(task_id).await?;
            debug!("Task {task_id} is {}", task.state);

            if task.state.is_finished() {
                if task.state.is_success() {
                    return Ok(task);
                }
                let message = task
                    .result
                    .clone()
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| task.description.clone());
                return Err(DirectorError::TaskFailed {
                    task_id,
                    state: task.state.to_string(),
                    message,
                }
                .into());
            }

            if started.elapsed() >= self.task_timeout {
                return Err(DirectorError::TaskTimeout {
                    task_id,
                    timeout_secs: self.task_timeout.as_secs(),
                }
                .into());
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Fetches the manifest the director holds for a deployment.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the director has no such deployment.
    pub async fn deployment_manifest(&self, name: &str) -> Result<ManifestDocument> {
        let path = format!("/deployments/{name}");
        let result = self
            .send(self.request(Method::GET, &path), &format!("GET {path}"))
            .await;

        let response = match result {
            Ok(response) => response,
            Err(CfDeployError::Director(DirectorError::ApiRequestFailed { status: 404, .. })) => {
                return Err(DirectorError::DeploymentNotFound {
                    name: name.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e),
        };

        let body: DeploymentManifestResponse =
            response.json().await.map_err(|e| DirectorError::InvalidResponse {
                message: format!("Failed to parse {path} response: {e}"),
            })?;

        ManifestDocument::load(body.manifest.as_bytes()).map_err(|e| {
            DirectorError::InvalidResponse {
                message: format!("Deployed manifest for '{name}' is unreadable: {e}"),
            }
            .into()
        })
    }
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

#[async_trait]
impl Director for DirectorClient {
    async fn get_status(&self) -> Result<DirectorStatus> {
        self.get_json("/info").await
    }

    async fn has_release(&self, name: &str, version: u64) -> Result<bool> {
        let releases: Vec<ReleaseSummary> = self.get_json("/releases").await?;
        let wanted = version.to_string();

        Ok(releases
            .iter()
            .filter(|r| r.name == name)
            .flat_map(|r| &r.release_versions)
            .any(|v| v.version == wanted))
    }

    async fn has_stemcell(&self, name: &str, version: &str) -> Result<bool> {
        let stemcells: Vec<StemcellSummary> = self.get_json("/stemcells").await?;

        Ok(stemcells
            .iter()
            .any(|s| s.name == name && (version == LATEST_VERSION || s.version == version)))
    }

    async fn deploy(&self, manifest: &[u8]) -> Result<DirectorTask> {
        let builder = self
            .request(Method::POST, "/deployments")
            .header(header::CONTENT_TYPE, "text/yaml")
            .body(manifest.to_vec());
        self.submit(builder, "Deploy").await
    }

    async fn list_properties(&self, deployment: &str) -> Result<BTreeMap<String, PropertyValue>> {
        let manifest = self.deployment_manifest(deployment).await?;
        Ok(manifest.cf_properties().cloned().unwrap_or_default())
    }
}

#[async_trait]
impl ReleaseUploader for DirectorClient {
    async fn upload_release(&self, path: &Path) -> Result<DirectorTask> {
        let location = path.to_string_lossy();

        let builder = if is_remote(&location) {
            self.request(Method::POST, "/releases")
                .json(&json!({ "location": location }))
        } else {
            let tarball = tokio::fs::read(path).await.map_err(|e| {
                DirectorError::upload(
                    format!("release {}", path.display()),
                    format!("cannot read tarball: {e}"),
                )
            })?;
            self.request(Method::POST, "/releases")
                .header(header::CONTENT_TYPE, "application/x-compressed")
                .body(tarball)
        };

        self.submit(builder, "Release upload").await
    }
}

#[async_trait]
impl StemcellUploader for DirectorClient {
    async fn upload_stemcell(&self, url: &str) -> Result<DirectorTask> {
        let builder = self
            .request(Method::POST, "/stemcells")
            .json(&json!({ "location": url }));
        self.submit(builder, "Stemcell upload").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::TaskState;
    use wiremock::matchers::{basic_auth, body_json, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> DirectorConfig {
        DirectorConfig {
            target: Some(server.uri()),
            username: Some(String::from("admin")),
            password: Some(String::from("admin")),
            ..DirectorConfig::default()
        }
    }

    async fn mount_task(server: &MockServer, id: u64, state: &str, result: Option<&str>) {
        Mock::given(method("GET"))
            .and(path(format!("/tasks/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id,
                "state": state,
                "description": "test task",
                "timestamp": 1_700_000_000,
                "result": result,
            })))
            .mount(server)
            .await;
    }

    fn redirect_to_task(id: u64) -> ResponseTemplate {
        ResponseTemplate::new(302).insert_header("Location", format!("/tasks/{id}").as_str())
    }

    #[test]
    fn test_requires_target() {
        let result = DirectorClient::new(&DirectorConfig::default());
        assert!(matches!(
            result,
            Err(CfDeployError::Config(ConfigError::ValidationError { .. }))
        ));
    }

    #[tokio::test]
    async fn test_get_status_uses_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .and(basic_auth("admin", "admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "bosh",
                "uuid": "director-uuid",
                "version": "1.5.0",
                "user": "admin",
                "cpi": "aws_cpi",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        let status = client.get_status().await.unwrap();
        assert_eq!(status.uuid, "director-uuid");
        assert_eq!(status.cpi_family(), Some("aws"));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        let result = client.get_status().await;
        assert!(matches!(
            result,
            Err(CfDeployError::Director(DirectorError::AuthenticationFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_has_release_and_stemcell() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/releases"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "name": "cf-release",
                    "release_versions": [{ "version": "132" }, { "version": "133" }],
                },
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stemcells"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "bosh-aws-xen-ubuntu", "version": "1868", "cid": "ami-1" },
            ])))
            .mount(&server)
            .await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        assert!(client.has_release("cf-release", 133).await.unwrap());
        assert!(!client.has_release("cf-release", 134).await.unwrap());
        assert!(!client.has_release("other", 133).await.unwrap());
        assert!(client.has_stemcell("bosh-aws-xen-ubuntu", "latest").await.unwrap());
        assert!(client.has_stemcell("bosh-aws-xen-ubuntu", "1868").await.unwrap());
        assert!(!client.has_stemcell("bosh-aws-xen-ubuntu", "1900").await.unwrap());
    }

    #[tokio::test]
    async fn test_deploy_follows_task() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/deployments"))
            .and(header_is("content-type", "text/yaml"))
            .respond_with(redirect_to_task(7))
            .expect(1)
            .mount(&server)
            .await;
        mount_task(&server, 7, "done", Some("/deployments/demo")).await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        let task = client.deploy(b"releases: []\n").await.unwrap();
        assert_eq!(task.id, 7);
        assert_eq!(task.state, TaskState::Done);
    }

    #[tokio::test]
    async fn test_failed_task_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stemcells"))
            .and(body_json(json!({ "location": "http://example.com/stemcell.tgz" })))
            .respond_with(redirect_to_task(9))
            .mount(&server)
            .await;
        mount_task(&server, 9, "error", Some("Stemcell is corrupt")).await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        let err = client
            .upload_stemcell("http://example.com/stemcell.tgz")
            .await
            .unwrap_err();
        match err {
            CfDeployError::Director(DirectorError::TaskFailed { task_id, message, .. }) => {
                assert_eq!(task_id, 9);
                assert_eq!(message, "Stemcell is corrupt");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_task_timeout() {
        let server = MockServer::start().await;
        mount_task(&server, 11, "processing", None).await;

        let config = DirectorConfig {
            task_timeout_secs: 0,
            ..config_for(&server)
        };
        let client = DirectorClient::new(&config).unwrap();
        let result = client.wait_for_task(11).await;
        assert!(matches!(
            result,
            Err(CfDeployError::Director(DirectorError::TaskTimeout { task_id: 11, .. }))
        ));
    }

    #[tokio::test]
    async fn test_upload_remote_release() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/releases"))
            .and(body_json(json!({ "location": "https://example.com/cf-release-133.tgz" })))
            .respond_with(redirect_to_task(3))
            .expect(1)
            .mount(&server)
            .await;
        mount_task(&server, 3, "done", None).await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        let task = client
            .upload_release(Path::new("https://example.com/cf-release-133.tgz"))
            .await
            .unwrap();
        assert_eq!(task.id, 3);
    }

    #[tokio::test]
    async fn test_upload_missing_local_release() {
        let server = MockServer::start().await;
        let client = DirectorClient::new(&config_for(&server)).unwrap();

        let result = client
            .upload_release(Path::new("/nonexistent/cf-release-133.tgz"))
            .await;
        assert!(matches!(
            result,
            Err(CfDeployError::Director(DirectorError::Upload { .. }))
        ));
    }

    #[tokio::test]
    async fn test_list_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/deployments/demo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "manifest": "releases:\n- name: cf-release\n  version: 133\n\
                             properties:\n  cf:\n    persistent_disk: 4096\n",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/deployments/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = DirectorClient::new(&config_for(&server)).unwrap();
        let properties = client.list_properties("demo").await.unwrap();
        assert_eq!(properties.get("persistent_disk"), Some(&PropertyValue::Integer(4096)));

        let result = client.list_properties("missing").await;
        assert!(matches!(
            result,
            Err(CfDeployError::Director(DirectorError::DeploymentNotFound { .. }))
        ));
    }
}
