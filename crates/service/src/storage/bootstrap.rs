use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::StorageError;

/// Mode of directories created under the storage root.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// Ensure `path` exists as a directory, creating every missing ancestor.
///
/// Existence is checked on every call. Missing ancestors are collected by
/// walking up the path and then created root-to-leaf. A directory that
/// appears between the check and the creation (a concurrent creator) counts
/// as success; a non-directory entry anywhere on the path fails with
/// `NotADirectory` and is not retried.
pub async fn ensure_dir(path: &Path) -> Result<(), StorageError> {
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut current = Some(path);

    while let Some(dir) = current {
        if dir.as_os_str().is_empty() {
            break;
        }
        match fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => break,
            Ok(_) => return Err(StorageError::NotADirectory(dir.to_path_buf())),
            // Any stat failure counts as missing; creation reports the real cause.
            Err(_) => {
                missing.push(dir.to_path_buf());
                current = dir.parent();
            }
        }
    }

    for dir in missing.iter().rev() {
        create_one(dir).await?;
    }
    Ok(())
}

async fn create_one(dir: &Path) -> Result<(), StorageError> {
    let mut builder = fs::DirBuilder::new();
    #[cfg(unix)]
    builder.mode(DIR_MODE);

    match builder.create(dir).await {
        Ok(()) => {
            debug!(dir = %dir.display(), "created directory");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => match fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::NotADirectory(dir.to_path_buf())),
            Err(e) => Err(StorageError::io(dir.display().to_string(), e)),
        },
        Err(e) => Err(StorageError::io(dir.display().to_string(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch() -> PathBuf {
        std::env::temp_dir().join(format!("prefs_bootstrap_{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn creates_every_missing_ancestor() -> Result<(), anyhow::Error> {
        let base = scratch();
        let target = base.join("a").join("b").join("c");

        ensure_dir(&target).await?;
        assert!(fs::metadata(&target).await?.is_dir());
        assert!(fs::metadata(base.join("a")).await?.is_dir());

        let _ = fs::remove_dir_all(&base).await;
        Ok(())
    }

    #[tokio::test]
    async fn existing_directory_is_idempotent() -> Result<(), anyhow::Error> {
        let base = scratch();
        ensure_dir(&base).await?;
        fs::write(base.join("keep.txt"), "x").await?;

        ensure_dir(&base).await?;
        assert_eq!(fs::read_to_string(base.join("keep.txt")).await?, "x");

        let _ = fs::remove_dir_all(&base).await;
        Ok(())
    }

    #[tokio::test]
    async fn file_in_the_way_is_not_a_directory() -> Result<(), anyhow::Error> {
        let base = scratch();
        ensure_dir(&base).await?;
        let file = base.join("plain");
        fs::write(&file, "").await?;

        let err = ensure_dir(&file.join("child")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotADirectory(p) if p == file));

        let _ = fs::remove_dir_all(&base).await;
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_creators_both_succeed() -> Result<(), anyhow::Error> {
        let base = scratch();
        let target = base.join("x").join("y");

        let (a, b) = tokio::join!(ensure_dir(&target), ensure_dir(&target));
        a?;
        b?;
        assert!(fs::metadata(&target).await?.is_dir());

        let _ = fs::remove_dir_all(&base).await;
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn created_directories_are_owner_only() -> Result<(), anyhow::Error> {
        use std::os::unix::fs::PermissionsExt;

        let base = scratch();
        ensure_dir(&base.join("inner")).await?;
        let mode = fs::metadata(base.join("inner")).await?.permissions().mode();
        assert_eq!(mode & 0o077, 0, "group/other bits must be clear, got {mode:o}");

        let _ = fs::remove_dir_all(&base).await;
        Ok(())
    }
}
