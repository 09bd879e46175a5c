//! User-supplied deployment parameters.

use serde::Serialize;

use crate::error::{ManifestError, Result};

/// Parameters for creating a deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentOptions {
    /// Deployment name.
    pub name: Option<String>,
    /// IPv4 addresses for the router.
    pub ip_addresses: Vec<String>,
    /// DNS domain.
    pub dns: Option<String>,
    /// Password shared by the deployment's components.
    pub common_password: Option<String>,
    /// Deployment size name.
    pub size: Option<String>,
}

/// A `key=value` pair from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyAssignment {
    /// Property key (bare or `cf.`-prefixed).
    pub key: String,
    /// Raw value text.
    pub value: String,
}

impl PropertyAssignment {
    /// Parses `key=value`. The value may itself contain `=`.
    ///
    /// # Errors
    ///
    /// Returns a validation error when there is no `=` or the key is empty.
    pub fn parse(arg: &str) -> Result<Self> {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(ManifestError::validation(
                arg,
                "expected KEY=VALUE",
            )
            .into());
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(ManifestError::validation(arg, "property key cannot be empty").into());
        }

        Ok(Self {
            key: key.to_string(),
            value: value.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        let parsed = PropertyAssignment::parse("persistent_disk=8192").unwrap();
        assert_eq!(parsed.key, "persistent_disk");
        assert_eq!(parsed.value, "8192");
    }

    #[test]
    fn test_parse_keeps_equals_in_value() {
        let parsed = PropertyAssignment::parse("security_group=a=b").unwrap();
        assert_eq!(parsed.key, "security_group");
        assert_eq!(parsed.value, "a=b");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PropertyAssignment::parse("persistent_disk").is_err());
        assert!(PropertyAssignment::parse("=8192").is_err());
    }

    #[test]
    fn test_empty_value_is_kept() {
        let parsed = PropertyAssignment::parse("dns=").unwrap();
        assert_eq!(parsed.value, "");
    }
}
