//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::planner::DeploymentOptions;

/// cf-deploy - Cloud Foundry deployments on a BOSH director.
#[derive(Parser, Debug)]
#[command(name = "cf-deploy")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "CF_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Never prompt for confirmation.
    #[arg(long, global = true)]
    pub non_interactive: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show how to deploy Cloud Foundry with this tool.
    CfHelp,

    /// Upload the Cloud Foundry release and stemcell if the director lacks them.
    PrepareCf,

    /// Create a new Cloud Foundry deployment.
    CreateCf {
        /// Deployment name.
        #[arg(long)]
        name: Option<String>,

        /// Router IP addresses (comma separated or repeated).
        #[arg(long = "ip", value_delimiter = ',')]
        ip_addresses: Vec<String>,

        /// DNS domain for the deployment.
        #[arg(long)]
        dns: Option<String>,

        /// Password shared by all components (generated if omitted).
        #[arg(long, alias = "common_password")]
        common_password: Option<String>,

        /// Deployment size (small, medium, large, xlarge).
        #[arg(long)]
        size: Option<String>,

        /// Manifest path (defaults to <deployments_dir>/cf/<name>.yml).
        #[arg(long)]
        deployment: Option<PathBuf>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the properties of a deployment.
    ShowCfProperties {
        /// Manifest path.
        #[arg(long, conflicts_with = "name")]
        deployment: Option<PathBuf>,

        /// Deployment name, used to find the manifest.
        #[arg(long)]
        name: Option<String>,

        /// Also fetch the values currently deployed on the director.
        #[arg(long)]
        deployed: bool,
    },

    /// Change mutable properties of a deployment and redeploy.
    ChangeCfProperties {
        /// Changes as KEY=VALUE pairs.
        #[arg(value_name = "KEY=VALUE")]
        properties: Vec<String>,

        /// Manifest path.
        #[arg(long, conflicts_with = "name")]
        deployment: Option<PathBuf>,

        /// Deployment name, used to find the manifest.
        #[arg(long)]
        name: Option<String>,

        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Commands {
    /// Builds deployment options from `create-cf` arguments.
    #[must_use]
    pub fn deployment_options(&self) -> Option<DeploymentOptions> {
        match self {
            Self::CreateCf {
                name,
                ip_addresses,
                dns,
                common_password,
                size,
                ..
            } => Some(DeploymentOptions {
                name: name.clone(),
                ip_addresses: ip_addresses.clone(),
                dns: dns.clone(),
                common_password: common_password.clone(),
                size: size.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "cf-deploy",
            "create-cf",
            "--name",
            "demo",
            "--ip",
            "1.2.3.4,1.2.3.5",
            "--dns",
            "mycloud.com",
            "--common_password",
            "qwerty",
            "--size",
            "xlarge",
        ])
        .unwrap();

        let options = cli.command.deployment_options().unwrap();
        assert_eq!(options.name.as_deref(), Some("demo"));
        assert_eq!(options.ip_addresses, vec!["1.2.3.4", "1.2.3.5"]);
        assert_eq!(options.common_password.as_deref(), Some("qwerty"));
        assert_eq!(options.size.as_deref(), Some("xlarge"));
    }

    #[test]
    fn test_create_without_ip_parses() {
        let cli = Cli::try_parse_from(["cf-deploy", "create-cf", "--dns", "mycloud.com"]).unwrap();
        let options = cli.command.deployment_options().unwrap();
        assert!(options.ip_addresses.is_empty());
    }

    #[test]
    fn test_parse_change_properties() {
        let cli = Cli::try_parse_from([
            "cf-deploy",
            "--non-interactive",
            "change-cf-properties",
            "persistent_disk=8192",
            "security_group=cf-core",
            "--name",
            "demo",
        ])
        .unwrap();

        assert!(cli.non_interactive);
        match cli.command {
            Commands::ChangeCfProperties { properties, name, .. } => {
                assert_eq!(properties.len(), 2);
                assert_eq!(name.as_deref(), Some("demo"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_output_flag() {
        let cli = Cli::try_parse_from(["cf-deploy", "prepare-cf", "--output", "json"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.command.deployment_options().is_none());
    }
}
