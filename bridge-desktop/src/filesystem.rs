//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const APP_DIR: &str = "offline-media";

/// Tokio-based file system implementation
///
/// Downloaded media goes to `<documents>/offline-media`, created on first
/// access.
pub struct TokioFileSystem {
    documents_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor with the platform directories
    pub fn new() -> Self {
        let documents_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);

        Self { documents_dir }
    }

    /// Create a new file system accessor with a custom documents directory
    pub fn with_documents_directory(documents_dir: PathBuf) -> Self {
        Self { documents_dir }
    }

    async fn ensure_dir(path: &Path) -> Result<PathBuf> {
        if !fs::try_exists(path).await? {
            fs::create_dir_all(path).await?;
            debug!(path = ?path, "Created directory");
        }
        Ok(path.to_path_buf())
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_documents_directory(&self) -> Result<PathBuf> {
        Self::ensure_dir(&self.documents_dir).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        let metadata = fs::metadata(path).await?;
        if metadata.is_dir() {
            return Err(BridgeError::InvalidInput(format!(
                "{} is a directory",
                path.display()
            )));
        }
        fs::remove_file(path).await?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }
}
