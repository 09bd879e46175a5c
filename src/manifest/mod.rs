//! Deployment manifest module.
//!
//! This module handles everything about the manifest file itself:
//! - The document model and its YAML encoding
//! - Mutability and validation rules for `cf` properties
//! - Atomic persistence on the local filesystem

mod document;
mod rules;
mod store;

pub use document::{CF_NAMESPACE, ManifestDocument, PropertyValue, ReleaseRef, split_key};
pub use rules::{
    AttributeRule, AttributeRules, Classification, DeploymentSize, Mutability, SizeProfile,
    ValueKind,
};
pub use store::{LocalManifestStore, ManifestStore};
