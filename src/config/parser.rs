//! Configuration parser for loading the CLI configuration.
//!
//! Precedence, lowest first: built-in defaults, the YAML file, then
//! `CF_DEPLOY_*` environment variables (which `.env` may populate).

use crate::error::{CfDeployError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::settings::CliConfig;

/// Overrides `director.target`.
pub const ENV_DIRECTOR_TARGET: &str = "CF_DEPLOY_DIRECTOR_TARGET";
/// Overrides `director.username`.
pub const ENV_DIRECTOR_USER: &str = "CF_DEPLOY_DIRECTOR_USER";
/// Overrides `director.password`.
pub const ENV_DIRECTOR_PASSWORD: &str = "CF_DEPLOY_DIRECTOR_PASSWORD";
/// Overrides `non_interactive`.
pub const ENV_NON_INTERACTIVE: &str = "CF_DEPLOY_NON_INTERACTIVE";
/// Overrides `strict_dns`.
pub const ENV_STRICT_DNS: &str = "CF_DEPLOY_STRICT_DNS";
/// Overrides `deployments_dir`.
pub const ENV_DEPLOYMENTS_DIR: &str = "CF_DEPLOY_DEPLOYMENTS_DIR";

/// Directory under the home directory holding the configuration file.
const CONFIG_DIR: &str = ".cf-deploy";

/// Configuration file name.
const CONFIG_FILE: &str = "config.yml";

/// Configuration parser for loading CLI configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for locating `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path used to locate `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<CliConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(CfDeployError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CfDeployError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<CliConfig> {
        debug!("Parsing YAML configuration");

        if content.trim().is_empty() {
            return Ok(CliConfig::default());
        }

        let config: CliConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            CfDeployError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration for release {}/{}",
            config.release.name, config.release.version
        );
        Ok(config)
    }

    /// Resolves and loads the configuration.
    ///
    /// An explicit path must exist. Otherwise the file in the home
    /// directory is used when present, and built-in defaults when not.
    /// Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file cannot be read or parsed.
    pub fn load(&self, explicit: Option<&Path>) -> Result<CliConfig> {
        let mut config = match explicit {
            Some(path) => self.load_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => self.load_file(path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    CliConfig::default()
                }
            },
        };

        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies `CF_DEPLOY_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(config: &mut CliConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(target) = lookup(ENV_DIRECTOR_TARGET) {
            debug!("Overriding director.target from environment");
            config.director.target = Some(target);
        }

        if let Some(user) = lookup(ENV_DIRECTOR_USER) {
            debug!("Overriding director.username from environment");
            config.director.username = Some(user);
        }

        if let Some(password) = lookup(ENV_DIRECTOR_PASSWORD) {
            debug!("Overriding director.password from environment");
            config.director.password = Some(password);
        }

        if let Some(dir) = lookup(ENV_DEPLOYMENTS_DIR) {
            debug!("Overriding deployments_dir from environment");
            config.deployments_dir = Some(PathBuf::from(dir));
        }

        for (name, field, target) in [
            (ENV_NON_INTERACTIVE, "non_interactive", &mut config.non_interactive),
            (ENV_STRICT_DNS, "strict_dns", &mut config.strict_dns),
        ] {
            let Some(flag) = lookup(name) else {
                continue;
            };
            match parse_flag(&flag) {
                Some(value) => {
                    debug!("Overriding {field} from environment");
                    *target = value;
                }
                None => warn!("Ignoring {name}={flag}: expected true or false"),
            }
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                CfDeployError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Returns `~/.cf-deploy/config.yml`, if the home directory is known.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
