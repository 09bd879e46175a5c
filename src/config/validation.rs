//! Configuration validation.
//!
//! Field-level rules come from the `validator` derives on the config types;
//! cross-field checks and warnings are written out here.

use crate::error::{CfDeployError, ConfigError, Result};
use tracing::debug;
use validator::Validate;

use super::settings::{CliConfig, DEFAULT_CPI, DirectorConfig};

/// Validator for CLI configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a CLI configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found. Warnings are only returned on success.
    pub fn validate(&self, config: &CliConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_director(&config.director, &mut result);
        Self::validate_release(config, &mut result);
        Self::validate_stemcells(config, &mut result);

        if let Some(first_error) = result.errors.first() {
            return Err(CfDeployError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }));
        }

        debug!(
            "Configuration validation passed with {} warning(s)",
            result.warnings.len()
        );
        Ok(result)
    }

    /// Validates director settings.
    fn validate_director(director: &DirectorConfig, result: &mut ValidationResult) {
        if let Err(errors) = director.validate() {
            let mut derived: Vec<ValidationError> = errors
                .field_errors()
                .into_iter()
                .flat_map(|(field, field_errors)| {
                    let field = field.to_string();
                    field_errors.iter().map(move |e| ValidationError {
                        field: format!("director.{field}"),
                        message: e
                            .message
                            .as_ref()
                            .map_or_else(|| describe_code(&e.code), ToString::to_string),
                    })
                })
                .collect();
            derived.sort_by(|a, b| a.field.cmp(&b.field));
            result.errors.extend(derived);
        }

        match director.target.as_deref() {
            None | Some("") => result.warnings.push(String::from(
                "director.target: not set; commands that contact the director will fail",
            )),
            Some(target) if target.starts_with("http://") => result.warnings.push(format!(
                "director.target: '{target}' is not using https; credentials are sent in clear text"
            )),
            Some(_) => {}
        }

        if director.username.is_some() && director.password.is_none() {
            result.errors.push(ValidationError {
                field: String::from("director.password"),
                message: String::from("A password is required when a username is set"),
            });
        }

        if director.skip_ssl_validation {
            result.warnings.push(String::from(
                "director.skip_ssl_validation: director certificates will not be verified",
            ));
        }

        if director.task_timeout_secs < director.task_poll_interval_secs {
            result.warnings.push(format!(
                "director.task_timeout_secs: {}s is shorter than the poll interval of {}s",
                director.task_timeout_secs, director.task_poll_interval_secs
            ));
        }
    }

    /// Validates the release source.
    fn validate_release(config: &CliConfig, result: &mut ValidationResult) {
        if config.release.name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("release.name"),
                message: String::from("Release name cannot be empty"),
            });
        }

        if config.release.version == 0 {
            result.errors.push(ValidationError {
                field: String::from("release.version"),
                message: String::from("Release version must be at least 1"),
            });
        }

        if config.release.path.as_os_str().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("release.path"),
                message: String::from("Release path cannot be empty"),
            });
        }
    }

    /// Validates stemcell sources.
    fn validate_stemcells(config: &CliConfig, result: &mut ValidationResult) {
        for (cpi, stemcell) in &config.stemcells {
            let prefix = format!("stemcells.{cpi}");

            if stemcell.name.trim().is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: String::from("Stemcell name cannot be empty"),
                });
            }

            if !(stemcell.url.starts_with("http://") || stemcell.url.starts_with("https://")) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.url"),
                    message: format!("Stemcell URL must be http(s): '{}'", stemcell.url),
                });
            }
        }

        if !config.stemcells.contains_key(DEFAULT_CPI) {
            result.warnings.push(format!(
                "stemcells: no '{DEFAULT_CPI}' entry; \
                 directors with an unlisted CPI cannot be prepared"
            ));
        }
    }
}

fn describe_code(code: &str) -> String {
    match code {
        "url" => String::from("must be a valid URL"),
        "range" => String::from("must be at least 1"),
        other => format!("failed '{other}' check"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StemcellSource;

    fn valid_config() -> CliConfig {
        let mut config = CliConfig::default();
        config.director.target = Some(String::from("https://10.0.0.6:25555"));
        config.director.username = Some(String::from("admin"));
        config.director.password = Some(String::from("admin"));
        config
    }

    #[test]
    fn test_valid_config() {
        let result = ConfigValidator::new().validate(&valid_config()).unwrap();
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_target_is_warning() {
        let mut config = valid_config();
        config.director.target = None;

        let result = ConfigValidator::new().validate(&config).unwrap();
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = valid_config();
        config.director.target = Some(String::from("director"));

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field(), Some("director.target"));
    }

    #[test]
    fn test_zero_poll_interval() {
        let mut config = valid_config();
        config.director.task_poll_interval_secs = 0;

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field(), Some("director.task_poll_interval_secs"));
    }

    #[test]
    fn test_username_without_password() {
        let mut config = valid_config();
        config.director.password = None;

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field(), Some("director.password"));
    }

    #[test]
    fn test_bad_stemcell_url() {
        let mut config = valid_config();
        config.stemcells.insert(
            String::from("vsphere"),
            StemcellSource {
                name: String::from("bosh-vsphere-esxi-ubuntu"),
                version: String::from("latest"),
                url: String::from("ftp://example.com/stemcell.tgz"),
            },
        );

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field(), Some("stemcells.vsphere.url"));
    }

    #[test]
    fn test_release_version_zero() {
        let mut config = valid_config();
        config.release.version = 0;

        let err = ConfigValidator::new().validate(&config).unwrap_err();
        assert_eq!(err.field(), Some("release.version"));
    }
}
