//! cf-deploy CLI entrypoint.
//!
//! This is the main entrypoint for the cf-deploy command-line tool.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use cf_deploy::cli::{Cli, Commands, OutputFormatter};
use cf_deploy::config::{CliConfig, ConfigParser, ConfigValidator};
use cf_deploy::deployer::{CfDeployer, PropertyReport};
use cf_deploy::director::DirectorClient;
use cf_deploy::dns::SystemResolver;
use cf_deploy::error::{ManifestError, Result};
use cf_deploy::manifest::{LocalManifestStore, ManifestStore};
use cf_deploy::planner::DeploymentPlan;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let formatter = OutputFormatter::new(cli.output);

    // Commands run one remote call at a time
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &formatter)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<()> {
    if matches!(cli.command, Commands::CfHelp) {
        eprintln!("{}", formatter.format_help());
        return Ok(());
    }

    let config = load_config(&cli, formatter)?;
    let options = cli.command.deployment_options();

    match cli.command {
        Commands::CfHelp => Ok(()),
        Commands::PrepareCf => cmd_prepare(&config, formatter).await,
        Commands::CreateCf { deployment, yes, .. } => {
            let options = options.unwrap_or_default();
            let plan = config.planner().plan_create(&options)?;
            let path = deployment.unwrap_or_else(|| {
                config.manifest_path_for(plan.document.deployment_name().unwrap_or_default())
            });
            cmd_execute(&config, path, &plan, yes, formatter).await
        }
        Commands::ShowCfProperties { deployment, name, deployed } => {
            let path = resolve_manifest_path(&config, deployment, name)?;
            cmd_show(&config, path, deployed, formatter).await
        }
        Commands::ChangeCfProperties { properties, deployment, name, yes } => {
            let path = resolve_manifest_path(&config, deployment, name)?;
            let existing = LocalManifestStore::new().read(&path).await?;
            let plan = config.planner().plan_update(&existing, &properties)?;
            cmd_execute(&config, path, &plan, yes, formatter).await
        }
    }
}

/// Loads and validates the CLI configuration.
fn load_config(cli: &Cli, formatter: &OutputFormatter) -> Result<CliConfig> {
    let parser = ConfigParser::new();
    parser.load_dotenv()?;

    let mut config = parser.load(cli.config.as_deref())?;
    if cli.non_interactive {
        config.non_interactive = true;
    }

    let validation = ConfigValidator::new().validate(&config)?;
    if !validation.warnings.is_empty() {
        eprint!("{}", formatter.format_warnings(&validation.warnings));
    }

    Ok(config)
}

/// Finds the manifest for show/change commands.
fn resolve_manifest_path(
    config: &CliConfig,
    deployment: Option<PathBuf>,
    name: Option<String>,
) -> Result<PathBuf> {
    if let Some(path) = deployment.or_else(|| config.deployment.clone()) {
        return Ok(path);
    }

    match name {
        Some(name) => Ok(config.manifest_path_for(&name)),
        None => Err(ManifestError::validation(
            "name",
            "pass --name or --deployment to select a deployment",
        )
        .into()),
    }
}

/// Upload the release and stemcell if needed.
async fn cmd_prepare(config: &CliConfig, formatter: &OutputFormatter) -> Result<()> {
    let client = DirectorClient::new(&config.director)?;
    let store = LocalManifestStore::new();
    let deployer = CfDeployer::new(config, &client, &client, &client, &SystemResolver, &store);

    let report = deployer.prepare().await?;
    eprintln!("{}", formatter.format_preparation(&report));
    Ok(())
}

/// Show a plan, confirm it and deploy.
async fn cmd_execute(
    config: &CliConfig,
    path: PathBuf,
    plan: &DeploymentPlan,
    auto_approve: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    eprintln!("{}", formatter.format_plan(plan));

    let ask = !plan.is_noop() && !auto_approve && !config.non_interactive;
    if ask && !confirm("Deploy these changes?")? {
        eprintln!("Deployment cancelled.");
        return Ok(());
    }

    let client = DirectorClient::new(&config.director)?;
    info!("Using director at {}", client.target());
    let store = LocalManifestStore::new();
    let deployer = CfDeployer::new(config, &client, &client, &client, &SystemResolver, &store);

    let report = deployer.execute(&path, plan).await?;
    eprintln!("{}", formatter.format_deployment(&report));
    Ok(())
}

/// Show deployment properties.
async fn cmd_show(
    config: &CliConfig,
    path: PathBuf,
    include_deployed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let store = LocalManifestStore::new();

    let report = if include_deployed {
        let client = DirectorClient::new(&config.director)?;
        let deployer = CfDeployer::new(config, &client, &client, &client, &SystemResolver, &store);
        deployer.show_properties(&path, true).await?
    } else {
        debug!("Reading properties from {} only", path.display());
        let document = store.read(&path).await?;
        PropertyReport::from_document(&document, &path, config.planner().rules(), None)
    };

    eprintln!("{}", formatter.format_properties(&report));
    Ok(())
}

/// Asks a yes/no question on the terminal.
fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}
