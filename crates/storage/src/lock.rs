//! Cross-process exclusion for a storage directory
//!
//! An advisory `flock` on a file inside the directory. Every process that
//! does a read-modify-write cycle on the directory takes it first and holds
//! it until the write has landed.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::{StorageError, StorageResult};

/// Name of the lock file inside a storage directory
pub const LOCK_FILE: &str = "ballot.lock";

/// Exclusive hold on a storage directory, released on drop
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Wait until the directory lock is free, then take it
    pub async fn acquire(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let path = dir.as_ref().join(LOCK_FILE);
        let lock = tokio::task::spawn_blocking(move || -> StorageResult<Self> {
            let file = open_lock_file(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(Self { file, path })
        })
        .await
        .map_err(|e| StorageError::IoError(io::Error::new(io::ErrorKind::Other, e)))??;

        debug!("Acquired lock {}", lock.path.display());
        Ok(lock)
    }

    /// Take the lock only if nobody holds it
    pub fn try_acquire(dir: impl AsRef<Path>) -> StorageResult<Option<Self>> {
        let path = dir.as_ref().join(LOCK_FILE);
        let file = open_lock_file(&path)?;
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Unlocking {} failed: {}", self.path.display(), e);
        }
    }
}

fn open_lock_file(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().unwrap();

        let held = DirLock::acquire(dir.path()).await.unwrap();
        assert!(held.path().ends_with(LOCK_FILE));
        assert!(DirLock::try_acquire(dir.path()).unwrap().is_none());

        drop(held);
        assert!(DirLock::try_acquire(dir.path()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let held = DirLock::acquire(dir.path()).await.unwrap();

        let path = dir.path().to_path_buf();
        let waiter = tokio::spawn(async move { DirLock::acquire(path).await.map(|_| ()) });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
    }
}
