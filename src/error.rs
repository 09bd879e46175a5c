//! Error types for the cf-deploy tool.
//!
//! This module provides the error hierarchy for every stage of a deployment
//! operation: CLI configuration, manifest handling and validation, and calls
//! to the BOSH director.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for cf-deploy.
#[derive(Debug, Error)]
pub enum CfDeployError {
    /// CLI configuration errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Manifest and deployment option errors.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// BOSH director errors.
    #[error("Director error: {0}")]
    Director(#[from] DirectorError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CLI configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Manifest errors, including validation of user-supplied options.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// A deployment option or manifest property is missing or invalid.
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// Property or option that failed validation.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// The manifest file does not exist.
    #[error("Deployment manifest not found: {path}")]
    NotFound {
        /// Path to the missing manifest.
        path: PathBuf,
    },

    /// An immutable property already has a value and cannot be changed.
    #[error("Property '{key}' is immutable and cannot be changed after creation")]
    ImmutableAttribute {
        /// The locked property.
        key: String,
    },

    /// A manifest already exists where a new deployment would be created.
    #[error("Deployment manifest already exists: {path}")]
    AlreadyExists {
        /// Path to the existing manifest.
        path: PathBuf,
    },

    /// The manifest could not be serialized.
    #[error("Manifest serialization error: {message}")]
    Serialization {
        /// Description of the serialization error.
        message: String,
    },

    /// The manifest could not be written to disk.
    #[error("Failed to write manifest {path}: {message}")]
    WriteFailed {
        /// Target manifest path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },
}

/// BOSH director errors.
#[derive(Debug, Error)]
pub enum DirectorError {
    /// Authentication failed.
    #[error("Director authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// API request failed.
    #[error("Director API request failed: {status} - {message}")]
    ApiRequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the director.
        message: String,
    },

    /// Network error.
    #[error("Network error communicating with the director: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// Invalid response from the director.
    #[error("Invalid response from the director: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// Uploading a release or stemcell failed.
    #[error("Failed to upload {artifact}: {message}")]
    Upload {
        /// Release or stemcell being uploaded.
        artifact: String,
        /// Reason reported for the failure.
        message: String,
    },

    /// Submitting a deployment failed.
    #[error("Failed to deploy '{deployment}': {message}")]
    Deploy {
        /// Deployment name.
        deployment: String,
        /// Reason reported for the failure.
        message: String,
    },

    /// A director task finished unsuccessfully.
    #[error("Director task {task_id} finished in state '{state}': {message}")]
    TaskFailed {
        /// Task identifier.
        task_id: u64,
        /// Final task state.
        state: String,
        /// Task result or description.
        message: String,
    },

    /// A director task did not finish in time.
    #[error("Timeout waiting for director task {task_id} after {timeout_secs} seconds")]
    TaskTimeout {
        /// Task identifier.
        task_id: u64,
        /// Configured timeout.
        timeout_secs: u64,
    },

    /// The named deployment is unknown to the director.
    #[error("Deployment not found on director: {name}")]
    DeploymentNotFound {
        /// Deployment name.
        name: String,
    },
}

/// Result type alias for cf-deploy operations.
pub type Result<T> = std::result::Result<T, CfDeployError>;

impl CfDeployError {
    /// Returns true if the error was detected locally, without contacting
    /// the director.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Manifest(_) | Self::Io(_))
    }

    /// Returns the offending field for validation errors.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Manifest(ManifestError::Validation { field, .. }) => Some(field.as_str()),
            Self::Manifest(ManifestError::ImmutableAttribute { key }) => Some(key.as_str()),
            Self::Config(ConfigError::ValidationError { field, .. }) => field.as_deref(),
            _ => None,
        }
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ManifestError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl DirectorError {
    /// Creates an API request error.
    #[must_use]
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiRequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Creates an upload error for the named artifact.
    #[must_use]
    pub fn upload(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upload {
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_is_local() {
        let err = CfDeployError::from(ManifestError::validation("dns", "missing required option"));
        assert!(err.is_local());
        assert_eq!(err.field(), Some("dns"));
    }

    #[test]
    fn test_director_error_is_remote() {
        let err = CfDeployError::from(DirectorError::upload("release cf-release/133", "boom"));
        assert!(!err.is_local());
        assert!(err.to_string().contains("cf-release/133"));
    }
}
