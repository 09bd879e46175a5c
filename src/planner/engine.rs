//! Deployment planning.
//!
//! The planner turns user input into a manifest. It never touches the
//! network or the filesystem, so every error it raises is local.

use tracing::{debug, info};

use crate::error::{ManifestError, Result};
use crate::manifest::{
    AttributeRules, Classification, DeploymentSize, ManifestDocument, PropertyValue, ReleaseRef,
    split_key,
};

use super::options::{DeploymentOptions, PropertyAssignment};
use super::plan::{DeploymentIntent, DeploymentPlan, PlanMode, PropertyChange};

/// Length of a generated common password.
const GENERATED_PASSWORD_LEN: usize = 16;

/// Security group used when none is supplied.
const DEFAULT_SECURITY_GROUP: &str = "default";

/// Builds create and update plans for the managed release.
#[derive(Debug, Clone)]
pub struct DeploymentPlanner {
    rules: AttributeRules,
    release: ReleaseRef,
}

impl DeploymentPlanner {
    /// Creates a planner for `release` with the standard property rules.
    #[must_use]
    pub const fn new(release: ReleaseRef) -> Self {
        Self {
            rules: AttributeRules::standard(),
            release,
        }
    }

    /// Returns the property rules in use.
    #[must_use]
    pub const fn rules(&self) -> &AttributeRules {
        &self.rules
    }

    /// Returns the managed release.
    #[must_use]
    pub const fn release(&self) -> &ReleaseRef {
        &self.release
    }

    /// Plans a new deployment.
    ///
    /// Required options are checked first, then every supplied option is
    /// validated in a fixed order (name, dns, ip addresses, size, password).
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first missing or invalid
    /// option.
    pub fn plan_create(&self, options: &DeploymentOptions) -> Result<DeploymentPlan> {
        let name = non_blank(options.name.as_deref());
        let dns = non_blank(options.dns.as_deref());
        let ip_addresses: Vec<String> = options
            .ip_addresses
            .iter()
            .map(|ip| ip.trim())
            .filter(|ip| !ip.is_empty())
            .map(String::from)
            .collect();

        let mut missing = Vec::new();
        if ip_addresses.is_empty() {
            missing.push("ip_addresses");
        }
        if dns.is_none() {
            missing.push("dns");
        }
        if name.is_none() {
            missing.push("name");
        }
        let (Some(name), Some(dns), true) = (name, dns, missing.is_empty()) else {
            return Err(missing_options(&missing));
        };

        let size_text =
            non_blank(options.size.as_deref()).unwrap_or(DeploymentSize::default().as_str());
        let name_value = PropertyValue::from(name);
        let dns_value = PropertyValue::from(dns);
        let ip_value = PropertyValue::List(ip_addresses);

        self.rules.validate("name", &name_value)?;
        self.rules.validate("dns", &dns_value)?;
        self.rules.validate("ip_addresses", &ip_value)?;
        let size = size_text
            .parse::<DeploymentSize>()
            .map_err(|message| ManifestError::validation("deployment_size", message))?;

        let password_value = match non_blank(options.common_password.as_deref()) {
            Some(password) => {
                let value = PropertyValue::from(password);
                self.rules.validate("common_password", &value)?;
                value
            }
            None => {
                debug!("No common password supplied, generating one");
                PropertyValue::Text(generate_password())
            }
        };

        let profile = size.profile();
        let initial = [
            ("name", name_value),
            ("dns", dns_value),
            ("ip_addresses", ip_value),
            ("deployment_size", PropertyValue::from(size.as_str())),
            ("common_password", password_value),
            ("persistent_disk", PropertyValue::Integer(profile.persistent_disk)),
            ("security_group", PropertyValue::from(DEFAULT_SECURITY_GROUP)),
        ];

        let mut document = ManifestDocument::new(self.release.clone());
        let mut changes = Vec::with_capacity(initial.len());
        for (key, value) in initial {
            document.set_mutable(key, value.clone(), &self.rules)?;
            changes.push(PropertyChange {
                key: key.to_string(),
                old_value: None,
                new_value: value,
            });
        }

        info!("Planned new deployment '{name}' ({size}) with {}", self.release);
        Ok(DeploymentPlan {
            mode: PlanMode::Create,
            intent: DeploymentIntent::Deploy,
            document,
            changes,
        })
    }

    /// Plans changes to an existing manifest from `key=value` arguments.
    ///
    /// Every argument is parsed and validated before any is applied. When a
    /// key is repeated the last value wins. No arguments yields a no-op plan.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed arguments, unknown keys and
    /// invalid values, an immutable-attribute error for locked keys, and a
    /// validation error if the existing manifest itself is invalid.
    pub fn plan_update(
        &self,
        existing: &ManifestDocument,
        args: &[String],
    ) -> Result<DeploymentPlan> {
        self.check_existing(existing)?;

        let assignments = args
            .iter()
            .map(|arg| PropertyAssignment::parse(arg))
            .collect::<Result<Vec<_>>>()?;

        if assignments.is_empty() {
            debug!("No property assignments supplied");
            return Ok(DeploymentPlan {
                mode: PlanMode::Update,
                intent: DeploymentIntent::NoOp,
                document: existing.clone(),
                changes: Vec::new(),
            });
        }

        // Keys are checked for every pair, values only for the last one given.
        let mut winners: Vec<(&str, &PropertyAssignment)> = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let key = split_key(&assignment.key).1;
            match self.rules.classify(&assignment.key) {
                Classification::Unknown => {
                    return Err(
                        ManifestError::validation(&assignment.key, "unknown property").into(),
                    );
                }
                Classification::Immutable => {
                    return Err(ManifestError::ImmutableAttribute {
                        key: key.to_string(),
                    }
                    .into());
                }
                Classification::Mutable => {}
            }

            if let Some(slot) = winners.iter_mut().find(|(k, _)| *k == key) {
                debug!("Property '{key}' given more than once, using the last value");
                slot.1 = assignment;
            } else {
                winners.push((key, assignment));
            }
        }

        let mut pending: Vec<(String, PropertyValue)> = Vec::with_capacity(winners.len());
        for (key, assignment) in winners {
            let value = self.rules.parse_value(&assignment.key, &assignment.value)?;
            self.rules.validate(&assignment.key, &value)?;
            pending.push((key.to_string(), value));
        }

        let mut document = existing.clone();
        let mut changes = Vec::with_capacity(pending.len());
        for (key, value) in pending {
            let old_value = document.set_mutable(&key, value.clone(), &self.rules)?;
            changes.push(PropertyChange {
                key,
                old_value,
                new_value: value,
            });
        }

        info!("Planned {} property change(s)", changes.len());
        Ok(DeploymentPlan {
            mode: PlanMode::Update,
            intent: DeploymentIntent::Deploy,
            document,
            changes,
        })
    }

    /// Checks that a loaded manifest is one this planner can update.
    fn check_existing(&self, existing: &ManifestDocument) -> Result<()> {
        self.rules.check_document(existing)?;

        let entries = existing
            .releases
            .iter()
            .filter(|r| r.name == self.release.name)
            .count();
        if entries != 1 {
            return Err(ManifestError::validation(
                "releases",
                format!(
                    "expected exactly one '{}' release entry, found {entries}",
                    self.release.name
                ),
            )
            .into());
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn missing_options(missing: &[&str]) -> crate::error::CfDeployError {
    let field = missing.first().copied().unwrap_or("options");
    ManifestError::validation(
        field,
        format!("missing required option(s): {}", missing.join(", ")),
    )
    .into()
}

fn generate_password() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(GENERATED_PASSWORD_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CfDeployError;

    const EXISTING: &str = r"
releases:
  - name: cf-release
    version: 132
properties:
  cf:
    name: demo
    deployment_size: medium
    dns: mycloud.com
    common_password: qwerty
    ip_addresses:
      - 1.2.3.4
    persistent_disk: 4096
    security_group: cf
";

    fn planner() -> DeploymentPlanner {
        DeploymentPlanner::new(ReleaseRef::new("cf-release", 133))
    }

    fn existing() -> ManifestDocument {
        ManifestDocument::load(EXISTING.as_bytes()).unwrap()
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn full_options() -> DeploymentOptions {
        DeploymentOptions {
            name: Some(String::from("demo")),
            ip_addresses: vec![String::from("1.2.3.4")],
            dns: Some(String::from("mycloud.com")),
            common_password: Some(String::from("qwerty")),
            size: Some(String::from("xlarge")),
        }
    }

    #[test]
    fn test_create_missing_ip_addresses() {
        let options = DeploymentOptions {
            dns: Some(String::from("mycloud.com")),
            size: Some(String::from("xlarge")),
            ..DeploymentOptions::default()
        };
        let err = planner().plan_create(&options).unwrap_err();
        assert_eq!(err.field(), Some("ip_addresses"));
        assert!(err.is_local());
    }

    #[test]
    fn test_create_missing_dns() {
        let options = DeploymentOptions {
            ip_addresses: vec![String::from("1.2.3.4")],
            size: Some(String::from("xlarge")),
            ..DeploymentOptions::default()
        };
        let err = planner().plan_create(&options).unwrap_err();
        assert_eq!(err.field(), Some("dns"));
    }

    #[test]
    fn test_create_missing_name() {
        let options = DeploymentOptions {
            name: Some(String::from("   ")),
            ..full_options()
        };
        let err = planner().plan_create(&options).unwrap_err();
        assert_eq!(err.field(), Some("name"));
    }

    #[test]
    fn test_create_validation_order() {
        let options = DeploymentOptions {
            name: Some(String::from("Bad Name")),
            dns: Some(String::from("bad..dns")),
            ..full_options()
        };
        let err = planner().plan_create(&options).unwrap_err();
        assert_eq!(err.field(), Some("name"));

        let options = DeploymentOptions {
            dns: Some(String::from("bad..dns")),
            ip_addresses: vec![String::from("999.1.1.1")],
            ..full_options()
        };
        let err = planner().plan_create(&options).unwrap_err();
        assert_eq!(err.field(), Some("dns"));

        let options = DeploymentOptions {
            size: Some(String::from("huge")),
            common_password: Some(String::from("x")),
            ..full_options()
        };
        let err = planner().plan_create(&options).unwrap_err();
        assert_eq!(err.field(), Some("deployment_size"));
    }

    #[test]
    fn test_create_builds_document() {
        let plan = planner().plan_create(&full_options()).unwrap();
        let doc = &plan.document;

        assert_eq!(plan.mode, PlanMode::Create);
        assert_eq!(plan.intent, DeploymentIntent::Deploy);
        assert_eq!(doc.releases, vec![ReleaseRef::new("cf-release", 133)]);
        assert_eq!(doc.get("name"), Some(&PropertyValue::from("demo")));
        assert_eq!(doc.get("dns"), Some(&PropertyValue::from("mycloud.com")));
        assert_eq!(doc.get("common_password"), Some(&PropertyValue::from("qwerty")));
        assert_eq!(doc.get("deployment_size"), Some(&PropertyValue::from("xlarge")));
        assert_eq!(
            doc.get("ip_addresses"),
            Some(&PropertyValue::List(vec![String::from("1.2.3.4")]))
        );
        assert_eq!(doc.get("persistent_disk"), Some(&PropertyValue::Integer(16384)));
        assert_eq!(doc.get("security_group"), Some(&PropertyValue::from("default")));
        assert!(planner().rules().check_document(doc).is_ok());
    }

    #[test]
    fn test_create_defaults() {
        let options = DeploymentOptions {
            common_password: None,
            size: None,
            ..full_options()
        };
        let plan = planner().plan_create(&options).unwrap();

        assert_eq!(plan.document.get("deployment_size"), Some(&PropertyValue::from("medium")));
        assert_eq!(plan.document.get("persistent_disk"), Some(&PropertyValue::Integer(4096)));
        match plan.document.get("common_password") {
            Some(PropertyValue::Text(password)) => assert_eq!(password.len(), 16),
            other => panic!("expected generated password, got {other:?}"),
        }
    }

    #[test]
    fn test_update_single_property() {
        let before = existing();
        let plan = planner()
            .plan_update(&before, &args(&["persistent_disk=8192"]))
            .unwrap();

        assert_eq!(plan.intent, DeploymentIntent::Deploy);
        assert_eq!(plan.document.get("persistent_disk"), Some(&PropertyValue::Integer(8192)));
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.changes[0].old_value, Some(PropertyValue::Integer(4096)));

        let mut expected = before.clone();
        expected
            .properties
            .get_mut("cf")
            .unwrap()
            .insert(String::from("persistent_disk"), PropertyValue::Integer(8192));
        assert_eq!(plan.document, expected);
    }

    #[test]
    fn test_update_multiple_properties() {
        let plan = planner()
            .plan_update(
                &existing(),
                &args(&["persistent_disk=8192", "cf.security_group=cf-core"]),
            )
            .unwrap();

        assert_eq!(plan.change_count(), 2);
        assert_eq!(plan.document.get("persistent_disk"), Some(&PropertyValue::Integer(8192)));
        assert_eq!(plan.document.get("security_group"), Some(&PropertyValue::from("cf-core")));
    }

    #[test]
    fn test_update_last_value_wins() {
        let plan = planner()
            .plan_update(&existing(), &args(&["persistent_disk=8192", "persistent_disk=2048"]))
            .unwrap();

        assert_eq!(plan.change_count(), 1);
        assert_eq!(plan.document.get("persistent_disk"), Some(&PropertyValue::Integer(2048)));
    }

    #[test]
    fn test_update_ignores_overridden_invalid_value() {
        let plan = planner()
            .plan_update(&existing(), &args(&["persistent_disk=abc", "persistent_disk=8192"]))
            .unwrap();

        assert_eq!(plan.change_count(), 1);
        assert_eq!(plan.document.get("persistent_disk"), Some(&PropertyValue::Integer(8192)));
    }

    #[test]
    fn test_update_rejects_invalid_last_value() {
        let err = planner()
            .plan_update(&existing(), &args(&["persistent_disk=8192", "persistent_disk=abc"]))
            .unwrap_err();
        assert_eq!(err.field(), Some("persistent_disk"));
    }

    #[test]
    fn test_update_no_args_is_noop() {
        let before = existing();
        let plan = planner().plan_update(&before, &[]).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.document, before);
    }

    #[test]
    fn test_update_rejects_immutable() {
        let result = planner().plan_update(&existing(), &args(&["dns=other.com"]));
        assert!(matches!(
            result,
            Err(CfDeployError::Manifest(ManifestError::ImmutableAttribute { ref key }))
                if key == "dns"
        ));
    }

    #[test]
    fn test_update_rejects_unknown() {
        let err = planner()
            .plan_update(&existing(), &args(&["flavor=vanilla"]))
            .unwrap_err();
        assert_eq!(err.field(), Some("flavor"));
    }

    #[test]
    fn test_update_validates_all_before_applying() {
        let result = planner().plan_update(
            &existing(),
            &args(&["persistent_disk=8192", "ip_addresses=1.2.3"]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_update_rejects_wrong_release_entries() {
        let doc =
            ManifestDocument::load(b"releases: []\nproperties:\n  cf:\n    name: demo\n").unwrap();
        let err = planner()
            .plan_update(&doc, &args(&["persistent_disk=8192"]))
            .unwrap_err();
        assert_eq!(err.field(), Some("releases"));
    }
}
