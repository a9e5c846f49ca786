//! Storage and File System Abstractions
//!
//! Provides a platform-agnostic trait for the file operations the download
//! engine needs: locating the documents directory and managing downloaded
//! files inside it.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File system access trait
///
/// Abstracts file I/O operations to support different platforms:
/// - Desktop: Direct filesystem access
/// - iOS/Android: Sandboxed app directories
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn media_path(fs: &dyn FileSystemAccess, id: &str) -> Result<PathBuf> {
///     let docs = fs.get_documents_directory().await?;
///     Ok(docs.join(format!("{id}.mp3")))
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's documents directory
    ///
    /// User-visible, backed-up storage. Downloaded media lives here.
    async fn get_documents_directory(&self) -> Result<PathBuf>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a file, treating a missing file as success.
    ///
    /// Returns whether a file was actually removed.
    async fn remove_file_if_exists(&self, path: &Path) -> Result<bool> {
        match self.delete_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct SetFileSystem {
        files: Mutex<HashSet<PathBuf>>,
    }

    #[async_trait]
    impl FileSystemAccess for SetFileSystem {
        async fn get_documents_directory(&self) -> Result<PathBuf> {
            Ok(PathBuf::from("/docs"))
        }

        async fn create_dir_all(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        async fn delete_file(&self, path: &Path) -> Result<()> {
            if self.files.lock().unwrap().remove(path) {
                Ok(())
            } else {
                Err(BridgeError::Io(std::io::Error::from(
                    std::io::ErrorKind::NotFound,
                )))
            }
        }
    }

    #[tokio::test]
    async fn test_remove_file_if_exists_is_idempotent() {
        let fs = SetFileSystem::default();
        let path = PathBuf::from("/docs/p1.mp3");
        fs.files.lock().unwrap().insert(path.clone());

        assert!(fs.remove_file_if_exists(&path).await.unwrap());
        assert!(!fs.remove_file_if_exists(&path).await.unwrap());
        assert!(fs.files.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_file_if_exists_propagates_other_errors() {
        struct ReadOnly;

        #[async_trait]
        impl FileSystemAccess for ReadOnly {
            async fn get_documents_directory(&self) -> Result<PathBuf> {
                Ok(PathBuf::from("/docs"))
            }

            async fn create_dir_all(&self, _path: &Path) -> Result<()> {
                Ok(())
            }

            async fn delete_file(&self, _path: &Path) -> Result<()> {
                Err(BridgeError::Io(std::io::Error::from(
                    std::io::ErrorKind::PermissionDenied,
                )))
            }
        }

        assert!(ReadOnly
            .remove_file_if_exists(Path::new("/docs/p1.mp3"))
            .await
            .is_err());
    }
}
