//! Deployment plan types.

use serde::Serialize;

use crate::manifest::{ManifestDocument, PropertyValue};

/// What the deployer should do with a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentIntent {
    /// Persist and submit the document.
    Deploy,
    /// Nothing changed.
    NoOp,
}

/// Whether a plan creates a deployment or updates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// First deploy; no manifest exists yet.
    Create,
    /// Changes to an existing manifest.
    Update,
}

/// A single property change in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyChange {
    /// Property key.
    pub key: String,
    /// Value before the change, if any.
    pub old_value: Option<PropertyValue>,
    /// Value after the change.
    pub new_value: PropertyValue,
}

/// A planned manifest and the action to take with it.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Create or update.
    pub mode: PlanMode,
    /// Deploy or no-op.
    pub intent: DeploymentIntent,
    /// The resulting manifest.
    pub document: ManifestDocument,
    /// Property changes in application order.
    pub changes: Vec<PropertyChange>,
}

impl DeploymentPlan {
    /// Returns true if the plan requires no deploy.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.intent == DeploymentIntent::NoOp
    }

    /// Returns the number of property changes.
    #[must_use]
    pub const fn change_count(&self) -> usize {
        self.changes.len()
    }
}

impl std::fmt::Display for DeploymentIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deploy => "deploy",
            Self::NoOp => "no-op",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.old_value {
            Some(old) => write!(f, "{}: {old} -> {}", self.key, self.new_value),
            None => write!(f, "{}: {}", self.key, self.new_value),
        }
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_noop() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Deployment Plan ({}, {} changes):", self.mode, self.changes.len())?;
        for (i, change) in self.changes.iter().enumerate() {
            writeln!(f, "  {}. {change}", i + 1)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ReleaseRef;

    #[test]
    fn test_noop_display() {
        let plan = DeploymentPlan {
            mode: PlanMode::Update,
            intent: DeploymentIntent::NoOp,
            document: ManifestDocument::new(ReleaseRef::new("cf-release", 133)),
            changes: vec![],
        };
        assert!(plan.is_noop());
        assert_eq!(plan.to_string(), "No changes required");
    }

    #[test]
    fn test_change_display() {
        let change = PropertyChange {
            key: String::from("persistent_disk"),
            old_value: Some(PropertyValue::Integer(4096)),
            new_value: PropertyValue::Integer(8192),
        };
        assert_eq!(change.to_string(), "persistent_disk: 4096 -> 8192");
    }
}
