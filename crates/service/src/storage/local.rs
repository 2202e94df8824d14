use std::io::ErrorKind;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use models::name::PreferenceName;
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

use crate::errors::StorageError;
use crate::storage::{bootstrap::ensure_dir, StorageBackend};

/// Mode of document files: owner read/write only.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Direct filesystem backend, usable only by the privileged process.
///
/// Every document lives at `root/<name>`. Writes replace the whole file in
/// place; a crash mid-write may leave it truncated.
#[derive(Debug, Clone)]
pub struct LocalStorageBackend {
    root: PathBuf,
}

impl LocalStorageBackend {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &PreferenceName) -> PathBuf {
        name.resolve(&self.root)
    }
}

#[async_trait]
impl StorageBackend for LocalStorageBackend {
    async fn read(&self, name: &PreferenceName) -> Result<String, StorageError> {
        let path = self.path_of(name);
        match fs::read_to_string(&path).await {
            Ok(content) => {
                debug!(name = %name, bytes = content.len(), "read document");
                Ok(content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(StorageError::io(name.to_string(), e)),
        }
    }

    async fn write(&self, name: &PreferenceName, content: &str) -> Result<(), StorageError> {
        let path = self.path_of(name);
        if let Some(parent) = path.parent() {
            ensure_dir(parent).await?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(FILE_MODE);

        let mut file = options
            .open(&path)
            .await
            .map_err(|e| StorageError::io(name.to_string(), e))?;
        // The open mode only applies on creation; tighten files that predate it.
        #[cfg(unix)]
        file.set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
            .await
            .map_err(|e| StorageError::io(name.to_string(), e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StorageError::io(name.to_string(), e))?;
        file.flush().await.map_err(|e| StorageError::io(name.to_string(), e))?;

        debug!(name = %name, bytes = content.len(), "wrote document");
        Ok(())
    }
}
