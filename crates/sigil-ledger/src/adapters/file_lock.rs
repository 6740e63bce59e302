//! Cross-process send lock store.
//!
//! Each lock record lives in its own JSON file named by the digest of the
//! storage key. Compare-and-swap runs under the directory's exclusive
//! `fs2` lock, so two processes sharing the directory serialize on it.

use super::file_store::{write_atomic, DirectoryLock};
use crate::domain::{LockKey, LockRecord, StoreError};
use crate::ports::LockStore;
use sigil_crypto::digest;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;
use uuid::Uuid;

/// Lock store shared between processes through a directory.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    dir: PathBuf,
}

impl FileLockStore {
    /// Open (creating if needed) a lock directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &LockKey) -> PathBuf {
        let name = digest(key.storage_key().as_bytes()).to_hex();
        self.dir.join(format!("{name}.lock.json"))
    }

    fn read(&self, key: &LockKey) -> Result<Option<LockRecord>, StoreError> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.storage_key(),
                reason: e.to_string(),
            })
    }
}

impl LockStore for FileLockStore {
    fn get(&self, key: &LockKey) -> Result<Option<LockRecord>, StoreError> {
        let _guard = DirectoryLock::shared(&self.dir)?;
        self.read(key)
    }

    fn compare_and_swap(
        &self,
        key: &LockKey,
        expected: Option<&LockRecord>,
        new: LockRecord,
    ) -> Result<bool, StoreError> {
        let _guard = DirectoryLock::exclusive(&self.dir)?;
        let current = self.read(key)?;
        if current.as_ref() != expected {
            trace!(key = %key.storage_key(), "Lock CAS lost");
            return Ok(false);
        }
        let bytes = serde_json::to_vec(&new).map_err(|e| StoreError::Corrupt {
            key: key.storage_key(),
            reason: e.to_string(),
        })?;
        write_atomic(&self.path_for(key), &bytes)?;
        Ok(true)
    }

    fn remove_if_held(&self, key: &LockKey, lock_id: Uuid) -> Result<bool, StoreError> {
        let _guard = DirectoryLock::exclusive(&self.dir)?;
        match self.read(key)? {
            Some(record) if record.lock_id == lock_id => {
                fs::remove_file(self.path_for(key))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
