//! Attribute rules for Cloud Foundry manifest properties.
//!
//! Every property in the `cf` namespace is declared here exactly once, with
//! its mutability, whether it must be supplied on create, and the kind of
//! value it accepts. Immutable properties are fixed when a deployment is
//! created; mutable ones may be changed by later updates.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{ManifestError, Result};

use super::document::{CF_NAMESPACE, ManifestDocument, PropertyValue, split_key};

/// Whether a property can change after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mutability {
    /// Set once when the deployment is created.
    Immutable,
    /// May be changed by an update.
    Mutable,
}

/// Result of classifying a property key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Declared immutable.
    Immutable,
    /// Declared mutable.
    Mutable,
    /// Not declared.
    Unknown,
}

/// Kind of value a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Lowercase deployment name.
    Name,
    /// DNS domain.
    Hostname,
    /// Non-empty list of IPv4 addresses.
    IpList,
    /// One of the deployment sizes.
    Size,
    /// Password shared by the deployment's components.
    Secret,
    /// Disk size in megabytes.
    DiskSize,
    /// Security group name.
    SecurityGroup,
}

/// Declaration of a single property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRule {
    /// Property key within the `cf` namespace.
    pub key: &'static str,
    /// Whether updates may change it.
    pub mutability: Mutability,
    /// Whether it must be supplied when creating a deployment.
    pub required: bool,
    /// Accepted value kind.
    pub kind: ValueKind,
}

/// Deployment sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentSize {
    /// Small deployment.
    Small,
    /// Medium deployment.
    #[default]
    Medium,
    /// Large deployment.
    Large,
    /// Extra large deployment.
    Xlarge,
}

/// Resource defaults applied when a deployment is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeProfile {
    /// Persistent disk in megabytes.
    pub persistent_disk: i64,
}

/// Property declarations, in the order they are validated on create.
const STANDARD_RULES: &[AttributeRule] = &[
    AttributeRule {
        key: "name",
        mutability: Mutability::Immutable,
        required: true,
        kind: ValueKind::Name,
    },
    AttributeRule {
        key: "dns",
        mutability: Mutability::Immutable,
        required: true,
        kind: ValueKind::Hostname,
    },
    AttributeRule {
        key: "ip_addresses",
        mutability: Mutability::Mutable,
        required: true,
        kind: ValueKind::IpList,
    },
    AttributeRule {
        key: "deployment_size",
        mutability: Mutability::Immutable,
        required: false,
        kind: ValueKind::Size,
    },
    AttributeRule {
        key: "common_password",
        mutability: Mutability::Immutable,
        required: false,
        kind: ValueKind::Secret,
    },
    AttributeRule {
        key: "persistent_disk",
        mutability: Mutability::Mutable,
        required: false,
        kind: ValueKind::DiskSize,
    },
    AttributeRule {
        key: "security_group",
        mutability: Mutability::Mutable,
        required: false,
        kind: ValueKind::SecurityGroup,
    },
];

/// Minimum length of the common password.
const MIN_PASSWORD_LEN: usize = 6;

/// Maximum length of a DNS name.
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single DNS label.
const MAX_LABEL_LEN: usize = 63;

/// Lookup table of property declarations.
#[derive(Debug, Clone, Copy)]
pub struct AttributeRules {
    rules: &'static [AttributeRule],
}

impl Default for AttributeRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl AttributeRules {
    /// Returns the Cloud Foundry property declarations.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            rules: STANDARD_RULES,
        }
    }

    /// Iterates over all declarations in validation order.
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'static, AttributeRule> {
        self.rules.iter()
    }

    /// Finds the declaration for `key` (bare or `cf.`-prefixed).
    #[must_use]
    pub fn rule(&self, key: &str) -> Option<&'static AttributeRule> {
        let (namespace, name) = split_key(key);
        if namespace != CF_NAMESPACE {
            return None;
        }
        self.rules.iter().find(|r| r.key == name)
    }

    /// Classifies a property key.
    #[must_use]
    pub fn classify(&self, key: &str) -> Classification {
        match self.rule(key).map(|r| r.mutability) {
            Some(Mutability::Immutable) => Classification::Immutable,
            Some(Mutability::Mutable) => Classification::Mutable,
            None => Classification::Unknown,
        }
    }

    /// Validates a value for `key`.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the property if the key is unknown
    /// or the value is not acceptable.
    pub fn validate(&self, key: &str, value: &PropertyValue) -> Result<()> {
        let rule = self.require_rule(key)?;
        check_value(rule, value).map_err(|message| ManifestError::validation(rule.key, message))?;
        Ok(())
    }

    /// Converts a command-line `value` into the typed value `key` expects.
    ///
    /// Address lists are comma separated; disk sizes are integers.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the key is unknown or the text cannot
    /// be converted.
    pub fn parse_value(&self, key: &str, raw: &str) -> Result<PropertyValue> {
        let rule = self.require_rule(key)?;
        let raw = raw.trim();

        match rule.kind {
            ValueKind::IpList => Ok(PropertyValue::List(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect(),
            )),
            ValueKind::DiskSize => raw.parse::<i64>().map(PropertyValue::Integer).map_err(|_| {
                ManifestError::validation(rule.key, format!("expected an integer, got '{raw}'"))
                    .into()
            }),
            ValueKind::Name
            | ValueKind::Hostname
            | ValueKind::Size
            | ValueKind::Secret
            | ValueKind::SecurityGroup => Ok(PropertyValue::Text(raw.to_string())),
        }
    }

    /// Checks that every property of a loaded manifest is declared and valid.
    ///
    /// # Errors
    ///
    /// Returns a validation error for the first unknown namespace, unknown
    /// property or invalid value.
    pub fn check_document(&self, document: &ManifestDocument) -> Result<()> {
        for (namespace, properties) in &document.properties {
            if namespace != CF_NAMESPACE {
                return Err(ManifestError::validation(
                    namespace.as_str(),
                    "unknown property namespace",
                )
                .into());
            }
            for (key, value) in properties {
                self.validate(key, value)?;
            }
        }
        Ok(())
    }

    fn require_rule(&self, key: &str) -> Result<&'static AttributeRule> {
        self.rule(key)
            .ok_or_else(|| ManifestError::validation(key, "unknown property").into())
    }
}

/// Checks a value against its declaration.
fn check_value(rule: &AttributeRule, value: &PropertyValue) -> std::result::Result<(), String> {
    match (rule.kind, value) {
        (ValueKind::Name, PropertyValue::Text(name)) => {
            if is_valid_name(name) {
                Ok(())
            } else {
                Err(format!(
                    "'{name}' is invalid. Must be lowercase alphanumeric with hyphens, \
                     starting with a letter."
                ))
            }
        }
        (ValueKind::Hostname, PropertyValue::Text(host)) => check_hostname(host),
        (ValueKind::IpList, PropertyValue::List(addresses)) => check_addresses(addresses),
        (ValueKind::Size, PropertyValue::Text(size)) => size.parse::<DeploymentSize>().map(|_| ()),
        (ValueKind::Secret, PropertyValue::Text(secret)) => {
            if secret.chars().count() < MIN_PASSWORD_LEN {
                Err(format!("must be at least {MIN_PASSWORD_LEN} characters"))
            } else if secret.chars().any(char::is_whitespace) {
                Err(String::from("must not contain whitespace"))
            } else {
                Ok(())
            }
        }
        (ValueKind::DiskSize, PropertyValue::Integer(size)) => {
            if *size > 0 {
                Ok(())
            } else {
                Err(format!("disk size must be positive, got {size}"))
            }
        }
        (ValueKind::SecurityGroup, PropertyValue::Text(group)) => {
            if group.is_empty() {
                Err(String::from("cannot be empty"))
            } else if group
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                Ok(())
            } else {
                Err(format!("'{group}' may only contain letters, digits, '-' and '_'"))
            }
        }
        (kind, other) => Err(format!(
            "expected {}, got {}",
            expected_kind(kind),
            other.kind_name()
        )),
    }
}

const fn expected_kind(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::IpList => "a list of IPv4 addresses",
        ValueKind::DiskSize => "an integer",
        ValueKind::Name
        | ValueKind::Hostname
        | ValueKind::Size
        | ValueKind::Secret
        | ValueKind::SecurityGroup => "text",
    }
}

fn check_addresses(addresses: &[String]) -> std::result::Result<(), String> {
    if addresses.is_empty() {
        return Err(String::from("at least one IP address is required"));
    }

    let mut seen = HashSet::new();
    for address in addresses {
        if address.parse::<Ipv4Addr>().is_err() {
            return Err(format!("'{address}' is not an IPv4 address"));
        }
        if !seen.insert(address.as_str()) {
            return Err(format!("duplicate IP address {address}"));
        }
    }
    Ok(())
}

fn check_hostname(host: &str) -> std::result::Result<(), String> {
    if host.is_empty() {
        return Err(String::from("cannot be empty"));
    }
    if host.len() > MAX_HOSTNAME_LEN {
        return Err(format!("must be at most {MAX_HOSTNAME_LEN} characters"));
    }

    for label in host.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(format!(
                "'{host}' has a label that is empty or longer than {MAX_LABEL_LEN} characters"
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("'{host}' has a label starting or ending with '-'"));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("'{host}' contains characters not allowed in a DNS name"));
        }
    }
    Ok(())
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl DeploymentSize {
    /// All sizes, smallest first.
    pub const ALL: [Self; 4] = [Self::Small, Self::Medium, Self::Large, Self::Xlarge];

    /// Returns the resource defaults for this size.
    #[must_use]
    pub const fn profile(self) -> SizeProfile {
        let persistent_disk = match self {
            Self::Small => 2048,
            Self::Medium => 4096,
            Self::Large => 8192,
            Self::Xlarge => 16384,
        };
        SizeProfile { persistent_disk }
    }

    /// Returns the size name as used in manifests.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Xlarge => "xlarge",
        }
    }
}

impl FromStr for DeploymentSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown size '{s}'. Expected one of: small, medium, large, xlarge")
            })
    }
}

impl fmt::Display for DeploymentSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Immutable => "immutable",
            Self::Mutable => "mutable",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
