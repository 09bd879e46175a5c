//! Configuration module for the cf-deploy CLI.
//!
//! This module handles all configuration-related functionality:
//! - Locating and parsing `~/.cf-deploy/config.yml`
//! - Applying `.env` and `CF_DEPLOY_*` environment overrides
//! - Validation of configuration values

mod parser;
mod settings;
mod validation;

pub use parser::{
    ConfigParser, ENV_DEPLOYMENTS_DIR, ENV_DIRECTOR_PASSWORD, ENV_DIRECTOR_TARGET,
    ENV_DIRECTOR_USER, ENV_NON_INTERACTIVE, ENV_STRICT_DNS, default_config_path,
};
pub use settings::{
    CliConfig, DEFAULT_CPI, DEFAULT_DEPLOYMENTS_DIR, DirectorConfig, ReleaseSource,
    StemcellSource,
};
pub use validation::{ConfigValidator, ValidationError, ValidationResult};
