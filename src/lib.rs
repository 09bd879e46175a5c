// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # cf-deploy
//!
//! A command-line tool that creates and updates Cloud Foundry deployments on
//! a BOSH director.
//!
//! ## Overview
//!
//! Each deployment is a YAML manifest kept on the local filesystem. The tool:
//!
//! - Uploads the Cloud Foundry release and a stemcell when the director lacks them
//! - Generates a manifest from a few options (`name`, `dns`, `ip`, `size`)
//! - Changes mutable properties with `key=value` arguments and redeploys
//! - Refuses changes to immutable properties before contacting the director
//!
//! ## Architecture
//!
//! 1. **Plan**: options or `key=value` changes are validated against the
//!    attribute rules and turned into a manifest
//! 2. **Check**: a new deployment's domain must resolve to one of its addresses
//! 3. **Prepare**: the release and stemcell are checked and uploaded if missing
//! 4. **Deploy**: the manifest is written atomically and submitted once
//!
//! ## Modules
//!
//! - [`config`]: CLI configuration parsing and validation
//! - [`manifest`]: Manifest document, attribute rules and storage
//! - [`planner`]: Turning options and changes into a deployment plan
//! - [`director`]: BOSH director API client
//! - [`dns`]: Checking that a deployment's domain points at it
//! - [`deployer`]: Orchestration of prepare and deploy stages
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! releases:
//!   - name: cf-release
//!     version: 133
//! properties:
//!   cf:
//!     name: demo
//!     dns: mycloud.com
//!     ip_addresses:
//!       - 1.2.3.4
//!     deployment_size: medium
//!     persistent_disk: 4096
//!     security_group: default
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod deployer;
pub mod director;
pub mod dns;
pub mod error;
pub mod manifest;
pub mod planner;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{CliConfig, ConfigParser, ConfigValidator};
pub use deployer::{CfDeployer, DeploymentReport, PreparationReport, PropertyReport};
pub use director::{Director, DirectorClient, ReleaseUploader, StemcellUploader};
pub use dns::{DnsMapping, DomainResolver, SystemResolver};
pub use error::{CfDeployError, Result};
pub use manifest::{AttributeRules, LocalManifestStore, ManifestDocument, ManifestStore};
pub use planner::{DeploymentPlan, DeploymentPlanner};
