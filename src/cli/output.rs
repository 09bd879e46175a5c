//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::deployer::{DeploymentReport, PreparationReport, PropertyReport};
use crate::manifest::{Classification, PropertyValue};
use crate::planner::{DeploymentPlan, PlanMode};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Property change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Property")]
    key: String,
    #[tabled(rename = "Old")]
    old: String,
    #[tabled(rename = "New")]
    new: String,
}

/// Property row for table display.
#[derive(Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    key: String,
    #[tabled(rename = "Kind")]
    classification: String,
    #[tabled(rename = "Value")]
    local: String,
}

/// Property row with deployed values.
#[derive(Tabled)]
struct DeployedPropertyRow {
    #[tabled(rename = "Property")]
    key: String,
    #[tabled(rename = "Kind")]
    classification: String,
    #[tabled(rename = "Local")]
    local: String,
    #[tabled(rename = "Deployed")]
    deployed: String,
}

/// Usage text for `cf-help`.
const CF_HELP: &str = "\
Deploying Cloud Foundry on a BOSH director

  1. cf-deploy prepare-cf
       Uploads the cf-release and the stemcell for your director's CPI
       if the director does not have them yet.

  2. cf-deploy create-cf --name NAME --ip IP[,IP...] --dns DOMAIN \\
         [--common-password PASSWORD] [--size small|medium|large|xlarge]
       Creates the deployment manifest and deploys it. name, dns, size and
       common_password are fixed once the deployment exists.

  3. cf-deploy show-cf-properties --name NAME [--deployed]
       Lists the deployment properties and whether they can change.

  4. cf-deploy change-cf-properties --name NAME KEY=VALUE [KEY=VALUE...]
       Changes ip_addresses, persistent_disk or security_group and
       redeploys once for all changes.

Director settings are read from ~/.cf-deploy/config.yml and the
CF_DEPLOY_DIRECTOR_TARGET, CF_DEPLOY_DIRECTOR_USER and
CF_DEPLOY_DIRECTOR_PASSWORD environment variables.
";

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the `cf-help` overview.
    #[must_use]
    pub fn format_help(&self) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&serde_json::json!({ "help": CF_HELP }))
                    .unwrap_or_default()
            }
            OutputFormat::Text => CF_HELP.to_string(),
        }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&PlanJson::from(plan)).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_noop() {
            return format!("{} No changes requested - nothing to deploy.\n", "✓".green());
        }

        let mut output = String::new();
        let title = match plan.mode {
            PlanMode::Create => "New deployment",
            PlanMode::Update => "Property changes",
        };
        let _ = write!(
            output,
            "\n📋 {title} for '{}'\n\n",
            plan.document.deployment_name().unwrap_or("unnamed")
        );

        let rows: Vec<ChangeRow> = plan
            .changes
            .iter()
            .enumerate()
            .map(|(i, c)| ChangeRow {
                index: i + 1,
                key: c.key.clone(),
                old: c.old_value.as_ref().map_or_else(
                    || "-".dimmed().to_string(),
                    |v| Self::truncate(&v.to_string(), 30),
                ),
                new: Self::truncate(&c.new_value.to_string(), 30).green().to_string(),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let releases: Vec<String> =
            plan.document.releases.iter().map(ToString::to_string).collect();
        let _ = write!(output, "\nRelease: {}\n", releases.join(", "));

        output
    }

    /// Formats the outcome of `prepare-cf`.
    #[must_use]
    pub fn format_preparation(&self, report: &PreparationReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Director {} is ready\n\n",
                    "✓".green(),
                    report.director_uuid
                );
                let _ = writeln!(
                    output,
                    "   Release:  {} ({})",
                    report.release,
                    Self::upload_state(report.release_uploaded)
                );
                let _ = writeln!(
                    output,
                    "   Stemcell: {} ({})",
                    report.stemcell,
                    Self::upload_state(report.stemcell_uploaded)
                );
                if let Some(cpi) = &report.cpi {
                    let _ = writeln!(output, "   CPI:      {cpi}");
                }
                output
            }
        }
    }

    /// Formats the outcome of a create or change command.
    #[must_use]
    pub fn format_deployment(&self, report: &DeploymentReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = match report.task_id {
                    Some(task_id) => format!(
                        "{} Deployed '{}' (task {task_id})\n\n",
                        "✓".green(),
                        report.deployment
                    ),
                    None => format!(
                        "{} '{}' unchanged, nothing deployed\n\n",
                        "✓".green(),
                        report.deployment
                    ),
                };

                let _ = writeln!(output, "   Manifest: {}", report.manifest_path.display());
                if let Some(fingerprint) = &report.fingerprint {
                    let short = &fingerprint[..12.min(fingerprint.len())];
                    let _ = writeln!(output, "   SHA-256:  {short}");
                }
                if let Some(mapping) = &report.dns {
                    let line = format!("DNS:      {mapping}");
                    if mapping.is_matched() {
                        let _ = writeln!(output, "   {line}");
                    } else {
                        let _ = writeln!(output, "   {}", line.yellow());
                    }
                }
                if let Some(started) = report.task_started_at {
                    let _ = writeln!(
                        output,
                        "   Started:  {}",
                        started.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
                let _ = writeln!(output, "   Changes:  {}", report.changes.len());
                let stages: Vec<String> = report.stages.iter().map(ToString::to_string).collect();
                let _ = writeln!(output, "   Stages:   {}", stages.join(" -> "));
                let _ = writeln!(
                    output,
                    "   Finished: {}",
                    report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                output
            }
        }
    }

    /// Formats deployment properties.
    #[must_use]
    pub fn format_properties(&self, report: &PropertyReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = write!(
                    output,
                    "\n📦 Deployment: {}\n   Manifest: {}\n   Releases: {}\n\n",
                    report.deployment.as_deref().unwrap_or("unnamed"),
                    report.manifest_path.display(),
                    report.releases.join(", ")
                );

                let table = if report.includes_deployed {
                    let rows: Vec<DeployedPropertyRow> = report
                        .properties
                        .iter()
                        .map(|p| {
                            let deployed = Self::value_or_dash(p.deployed.as_ref());
                            DeployedPropertyRow {
                                key: p.key.clone(),
                                classification: Self::format_classification(p.classification),
                                local: Self::value_or_dash(p.local.as_ref()),
                                deployed: if p.is_drifted() {
                                    deployed.yellow().to_string()
                                } else {
                                    deployed
                                },
                            }
                        })
                        .collect();
                    Table::new(rows).to_string()
                } else {
                    let rows: Vec<PropertyRow> = report
                        .properties
                        .iter()
                        .map(|p| PropertyRow {
                            key: p.key.clone(),
                            classification: Self::format_classification(p.classification),
                            local: Self::value_or_dash(p.local.as_ref()),
                        })
                        .collect();
                    Table::new(rows).to_string()
                };

                output.push_str(&table);
                output.push('\n');
                output
            }
        }
    }

    /// Formats configuration warnings.
    #[must_use]
    pub fn format_warnings(&self, warnings: &[String]) -> String {
        let mut output = String::new();
        for warning in warnings {
            let _ = writeln!(output, "{} {warning}", "⚠".yellow());
        }
        output
    }

    /// Formats an error for display.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats a classification with color.
    fn format_classification(classification: Classification) -> String {
        match classification {
            Classification::Mutable => "mutable".green().to_string(),
            Classification::Immutable => "immutable".yellow().to_string(),
            Classification::Unknown => "unknown".red().to_string(),
        }
    }

    fn upload_state(uploaded: bool) -> String {
        if uploaded {
            "uploaded".green().to_string()
        } else {
            "already present".dimmed().to_string()
        }
    }

    fn value_or_dash(value: Option<&PropertyValue>) -> String {
        value.map_or_else(|| String::from("-"), |v| Self::truncate(&v.to_string(), 40))
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{head}...")
        }
    }
}

// JSON serialization helpers

#[derive(serde::Serialize)]
struct PlanJson<'a> {
    mode: PlanMode,
    intent: String,
    deployment: Option<&'a str>,
    releases: Vec<String>,
    changes: &'a [crate::planner::PropertyChange],
}

impl<'a> From<&'a DeploymentPlan> for PlanJson<'a> {
    fn from(plan: &'a DeploymentPlan) -> Self {
        Self {
            mode: plan.mode,
            intent: plan.intent.to_string(),
            deployment: plan.document.deployment_name(),
            releases: plan.document.releases.iter().map(ToString::to_string).collect(),
            changes: &plan.changes,
        }
    }
}
