//! Manifest persistence.
//!
//! Writes replace the whole file atomically: the document is written to a
//! temporary file next to the target, synced, then renamed over it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ManifestError, Result};

use super::document::ManifestDocument;

/// Trait for manifest storage backends.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Checks whether a manifest exists at `path`.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Reads and parses the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if there is no file and a parse error if
    /// its content is not a manifest.
    async fn read(&self, path: &Path) -> Result<ManifestDocument>;

    /// Replaces the manifest at `path` with `document`.
    ///
    /// # Errors
    ///
    /// Returns a write error if the file cannot be replaced. The previous
    /// content is left untouched in that case.
    async fn write(&self, path: &Path, document: &ManifestDocument) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

/// Manifest store on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalManifestStore;

impl LocalManifestStore {
    /// Creates a new local manifest store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Temporary file that is removed on drop unless it was renamed into place.
struct PendingWrite {
    temp_path: PathBuf,
    committed: bool,
}

impl PendingWrite {
    fn for_target(target: &Path) -> Self {
        let file_name = target
            .file_name()
            .map_or_else(|| String::from("manifest"), |n| n.to_string_lossy().into_owned());
        let temp_name = format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple());
        let temp_path = target.with_file_name(temp_name);

        Self {
            temp_path,
            committed: false,
        }
    }

    async fn write_and_commit(mut self, target: &Path, content: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(&self.temp_path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.temp_path, target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.temp_path) {
            Ok(()) => debug!("Removed temp file {}", self.temp_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temp file {}: {e}", self.temp_path.display()),
        }
    }
}

fn write_failed(path: &Path, message: String) -> ManifestError {
    ManifestError::WriteFailed {
        path: path.to_path_buf(),
        message,
    }
}

#[async_trait]
impl ManifestStore for LocalManifestStore {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await?)
    }

    async fn read(&self, path: &Path) -> Result<ManifestDocument> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound {
                    path: path.to_path_buf(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        debug!("Loading manifest from: {}", path.display());
        ManifestDocument::load_from(&bytes, Some(path))
    }

    async fn write(&self, path: &Path, document: &ManifestDocument) -> Result<()> {
        let content = document.to_bytes()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                write_failed(path, format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        PendingWrite::for_target(path)
            .write_and_commit(path, &content)
            .await
            .map_err(|e| write_failed(path, e.to_string()))?;

        info!("Saved manifest to: {}", path.display());
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CfDeployError;
    use crate::manifest::{AttributeRules, PropertyValue, ReleaseRef};
    use tempfile::TempDir;

    fn sample_document() -> ManifestDocument {
        let rules = AttributeRules::standard();
        let mut doc = ManifestDocument::new(ReleaseRef::new("cf-release", 133));
        doc.set_mutable("name", PropertyValue::from("demo"), &rules)
            .expect("set name");
        doc.set_mutable("persistent_disk", PropertyValue::Integer(4096), &rules)
            .expect("set disk");
        doc
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .expect("read dir")
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("cf").join("demo.yml");
        let store = LocalManifestStore::new();

        assert!(!store.exists(&path).await.expect("exists check failed"));

        let doc = sample_document();
        store.write(&path, &doc).await.expect("Failed to write manifest");

        assert!(store.exists(&path).await.expect("exists check failed"));
        let loaded = store.read(&path).await.expect("Failed to read manifest");
        assert_eq!(loaded, doc);
        assert_eq!(leftover_temp_files(path.parent().expect("parent")), 0);
    }

    #[tokio::test]
    async fn test_write_replaces_existing() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("demo.yml");
        let store = LocalManifestStore::new();

        store.write(&path, &sample_document()).await.expect("first write");

        let mut updated = sample_document();
        let rules = AttributeRules::standard();
        updated
            .set_mutable("persistent_disk", PropertyValue::Integer(8192), &rules)
            .expect("update disk");
        store.write(&path, &updated).await.expect("second write");

        let loaded = store.read(&path).await.expect("read");
        assert_eq!(loaded.get("persistent_disk"), Some(&PropertyValue::Integer(8192)));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let store = LocalManifestStore::new();

        let result = store.read(&temp.path().join("absent.yml")).await;
        assert!(matches!(
            result,
            Err(CfDeployError::Manifest(ManifestError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_read_malformed_names_file() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("broken.yml");
        std::fs::write(&path, "releases: [oops").expect("write fixture");

        let result = LocalManifestStore::new().read(&path).await;
        match result {
            Err(CfDeployError::Manifest(ManifestError::Parse { location, .. })) => {
                assert!(location.expect("location").contains("broken.yml"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_write_keeps_original_and_cleans_up() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        // A directory at the target path makes the final rename fail.
        let path = temp.path().join("demo.yml");
        std::fs::create_dir(&path).expect("create blocking dir");
        std::fs::write(path.join("keep"), "x").expect("write marker");

        let result = LocalManifestStore::new().write(&path, &sample_document()).await;
        assert!(matches!(
            result,
            Err(CfDeployError::Manifest(ManifestError::WriteFailed { .. }))
        ));
        assert!(path.join("keep").exists());
        assert_eq!(leftover_temp_files(temp.path()), 0);
    }
}
