use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::lock::{DirLock, LOCK_FILE};
use crate::{check_key, Storage, StorageError, StorageOptions, StorageResult};

/// A directory of files, one per key.
///
/// Writes go to a sibling temp file that is renamed into place, so a reader
/// never sees a half-written snapshot.
pub struct FileStorage {
    base_path: PathBuf,
    options: StorageOptions,
    cache: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl FileStorage {
    /// Open (and create if needed) a storage directory
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = base_path.into();

        if !path.exists() {
            fs::create_dir_all(&path).await?;
        } else if !path.is_dir() {
            return Err(StorageError::NotADirectory(path.display().to_string()));
        }

        Ok(Self {
            base_path: path,
            options: StorageOptions::default(),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Set storage options
    pub fn with_options(mut self, options: StorageOptions) -> Self {
        self.options = options;
        self
    }

    /// Take the directory's exclusive lock, waiting for other holders
    pub async fn lock(&self) -> StorageResult<DirLock> {
        DirLock::acquire(&self.base_path).await
    }

    fn get_path(&self, key: &str) -> PathBuf {
        self.base_path
            .join(key.replace('/', std::path::MAIN_SEPARATOR_STR))
    }

    async fn write_replace(&self, tmp_path: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(tmp_path).await?;
        file.write_all(data).await?;
        if self.options.sync_write {
            file.sync_all().await?;
        }
        drop(file);
        fs::rename(tmp_path, path).await
    }

    async fn list_directory(&self, dir_path: &Path) -> StorageResult<Vec<String>> {
        let mut result = Vec::new();
        let mut pending = vec![dir_path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                } else if path.extension().map_or(false, |ext| ext == "tmp")
                    || (dir == self.base_path && path.file_name().map_or(false, |n| n == LOCK_FILE))
                {
                    continue;
                } else if let Ok(rel_path) = path.strip_prefix(&self.base_path) {
                    let key = rel_path
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    result.push(key);
                }
            }
        }

        result.sort();
        Ok(result)
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        check_key(key)?;
        let path = self.get_path(key);

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut tmp_path = path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);
        if let Err(e) = self.write_replace(&tmp_path, &path, data).await {
            if let Err(cleanup) = fs::remove_file(&tmp_path).await {
                trace!("No temp file to remove at {}: {}", tmp_path.display(), cleanup);
            }
            return Err(e.into());
        }

        if self.options.use_cache {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), data.to_vec());
        }

        debug!("Stored {} bytes at key: {}", data.len(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        check_key(key)?;
        if self.options.use_cache {
            let cache = self.cache.read().await;
            if let Some(data) = cache.get(key) {
                trace!("Retrieved data from cache for key: {}", key);
                return Ok(data.clone());
            }
        }

        let path = self.get_path(key);
        if !path.is_file() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }

        let data = fs::read(&path).await?;

        if self.options.use_cache {
            let mut cache = self.cache.write().await;
            cache.insert(key.to_string(), data.clone());
        }

        debug!("Retrieved data for key: {}", key);
        Ok(data)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        let path = self.get_path(key);
        if path.exists() {
            fs::remove_file(path).await?;
            debug!("Deleted key: {}", key);
        }

        if self.options.use_cache {
            let mut cache = self.cache.write().await;
            cache.remove(key);
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        check_key(key)?;
        if self.options.use_cache && self.cache.read().await.contains_key(key) {
            return Ok(true);
        }

        Ok(self.get_path(key).is_file())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        debug!("Listing keys with prefix: {}", prefix);
        let keys = self.list_directory(&self.base_path).await?;
        Ok(keys.into_iter().filter(|k| k.starts_with(prefix)).collect())
    }

    fn base_path(&self) -> Option<PathBuf> {
        Some(self.base_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonStorage;

    #[tokio::test]
    async fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();

        storage.put("ledger/snapshot", b"state").await.unwrap();
        assert_eq!(storage.get("ledger/snapshot").await.unwrap(), b"state");
        assert!(dir.path().join("ledger").join("snapshot").is_file());
        assert!(!dir.path().join("ledger").join("snapshot.tmp").exists());

        let keys = storage.list("ledger/").await.unwrap();
        assert_eq!(keys, vec!["ledger/snapshot".to_string()]);

        storage.delete("ledger/snapshot").await.unwrap();
        assert!(!storage.exists("ledger/snapshot").await.unwrap());
    }

    #[tokio::test]
    async fn test_reopen_without_cache_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = FileStorage::new(dir.path()).await.unwrap();
            storage.put_json("ledger/snapshot", &vec!["a", "b"]).await.unwrap();
        }

        let storage = FileStorage::new(dir.path()).await.unwrap().with_options(StorageOptions {
            sync_write: false,
            use_cache: false,
        });
        let value: Vec<String> = storage.get_json("ledger/snapshot").await.unwrap();
        assert_eq!(value, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();
        assert!(matches!(
            storage.get("ledger/snapshot").await,
            Err(StorageError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();
        storage.put("ledger/snapshot", b"state").await.unwrap();

        // "ledger" is a non-empty directory, so the final rename fails.
        assert!(storage.put("ledger", b"clobber").await.is_err());
        assert!(!dir.path().join("ledger.tmp").exists());
        assert_eq!(storage.get("ledger/snapshot").await.unwrap(), b"state");
    }

    #[tokio::test]
    async fn test_lock_file_is_not_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).await.unwrap();
        storage.put("ledger/snapshot", b"state").await.unwrap();

        let _lock = storage.lock().await.unwrap();
        assert!(dir.path().join(LOCK_FILE).is_file());
        assert_eq!(storage.list("").await.unwrap(), vec!["ledger/snapshot".to_string()]);
    }

    #[tokio::test]
    async fn test_base_path_must_be_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            FileStorage::new(&file).await,
            Err(StorageError::NotADirectory(_))
        ));
    }
}
