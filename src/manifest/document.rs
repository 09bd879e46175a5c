//! In-memory representation of a Cloud Foundry deployment manifest.
//!
//! The on-disk layout is a YAML document with a `releases` list and a
//! `properties` tree whose `cf` namespace holds the deployment attributes:
//!
//! ```yaml
//! releases:
//!   - name: cf-release
//!     version: 132
//! properties:
//!   cf:
//!     name: demo
//!     dns: mycloud.com
//!     ip_addresses:
//!       - 1.2.3.4
//!     persistent_disk: 4096
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{ManifestError, Result};

use super::rules::{AttributeRules, Classification};

/// Property namespace managed by this tool.
pub const CF_NAMESPACE: &str = "cf";

/// A deployment manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDocument {
    /// Releases deployed by this manifest.
    #[serde(default)]
    pub releases: Vec<ReleaseRef>,
    /// Properties by namespace, then by key.
    #[serde(default)]
    pub properties: BTreeMap<String, BTreeMap<String, PropertyValue>>,
}

/// A release name and version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReleaseRef {
    /// Release name.
    pub name: String,
    /// Release version.
    pub version: u64,
}

/// A manifest property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Whole number (disk sizes).
    Integer(i64),
    /// Plain text.
    Text(String),
    /// List of text entries (addresses).
    List(Vec<String>),
}

impl ManifestDocument {
    /// Creates an empty manifest for a single release.
    #[must_use]
    pub fn new(release: ReleaseRef) -> Self {
        Self {
            releases: vec![release],
            properties: BTreeMap::new(),
        }
    }

    /// Parses a manifest from YAML bytes.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the bytes are not a valid manifest.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        Self::load_from(bytes, None)
    }

    /// Parses a manifest, naming `source` in parse errors.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the bytes are not a valid manifest.
    pub fn load_from(bytes: &[u8], source: Option<&Path>) -> Result<Self> {
        let document: Self = serde_yaml::from_slice(bytes).map_err(|e| {
            let position = e
                .location()
                .map(|l| format!("line {}, column {}", l.line(), l.column()));
            let location = match (source, position) {
                (Some(path), Some(pos)) => Some(format!("{} ({pos})", path.display())),
                (Some(path), None) => Some(path.display().to_string()),
                (None, pos) => pos,
            };
            ManifestError::Parse {
                message: format!("YAML parse error: {e}"),
                location,
            }
        })?;

        debug!(
            "Parsed manifest with {} release(s) and {} property namespace(s)",
            document.releases.len(),
            document.properties.len()
        );
        Ok(document)
    }

    /// Serializes the manifest to YAML bytes.
    ///
    /// Properties are stored in sorted maps, so the output is deterministic.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if YAML encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| ManifestError::serialization(format!("Failed to encode manifest: {e}")))?;
        Ok(yaml.into_bytes())
    }

    /// Computes a SHA-256 fingerprint of the serialized manifest.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if YAML encoding fails.
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = self.to_bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Looks up a property by `namespace.key`, or by bare key in the `cf`
    /// namespace.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        let (namespace, name) = split_key(key);
        self.properties.get(namespace).and_then(|props| props.get(name))
    }

    /// Sets a property, refusing to overwrite an immutable one.
    ///
    /// Immutable properties may be set once, while the document has no
    /// value for them. Returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns a validation error for undeclared properties and an
    /// immutable-attribute error when an immutable property already has a
    /// value.
    pub fn set_mutable(
        &mut self,
        key: &str,
        value: PropertyValue,
        rules: &AttributeRules,
    ) -> Result<Option<PropertyValue>> {
        let (namespace, name) = split_key(key);

        match rules.classify(key) {
            Classification::Unknown => {
                Err(ManifestError::validation(key, "unknown property").into())
            }
            Classification::Immutable if self.get(key).is_some() => {
                Err(ManifestError::ImmutableAttribute {
                    key: name.to_string(),
                }
                .into())
            }
            Classification::Immutable | Classification::Mutable => Ok(self
                .properties
                .entry(namespace.to_string())
                .or_default()
                .insert(name.to_string(), value)),
        }
    }

    /// Returns the properties of the `cf` namespace.
    #[must_use]
    pub fn cf_properties(&self) -> Option<&BTreeMap<String, PropertyValue>> {
        self.properties.get(CF_NAMESPACE)
    }

    /// Finds the release entry with the given name.
    #[must_use]
    pub fn release(&self, name: &str) -> Option<&ReleaseRef> {
        self.releases.iter().find(|r| r.name == name)
    }

    /// Returns the deployment name (`cf.name`), if set.
    #[must_use]
    pub fn deployment_name(&self) -> Option<&str> {
        match self.get("name") {
            Some(PropertyValue::Text(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Splits `namespace.key` into its parts. Bare keys belong to `cf`.
#[must_use]
pub fn split_key(key: &str) -> (&str, &str) {
    key.split_once('.').unwrap_or((CF_NAMESPACE, key))
}

impl PropertyValue {
    /// Returns a short name for the value's type.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for PropertyValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl ReleaseRef {
    /// Creates a release reference.
    #[must_use]
    pub fn new(name: impl Into<String>, version: u64) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for ReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}
