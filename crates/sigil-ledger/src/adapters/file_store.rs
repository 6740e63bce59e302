//! # File-Backed Storage
//!
//! Ledgers as one JSON document per artifact, plus a content-addressed blob
//! directory for window publication.
//!
//! ## Concurrency
//!
//! Several processes may share a data directory. Every operation takes an
//! `fs2` lock on the directory's `LOCK` file for its duration: shared for
//! reads, exclusive for writes. Writes go to a temp file that is renamed
//! into place, so a reader never sees a half-written ledger.
//!
//! A ledger write re-reads the stored ledger under the exclusive lock and
//! only replaces it if its head is still the one the writer loaded.

use super::ensure_stored_head;
use crate::domain::invariants;
use crate::domain::{ArtifactLedger, HeadCommitment, PublishError, StoreError};
use crate::ports::{LedgerStore, PublicationAdapter};
use async_trait::async_trait;
use fs2::FileExt;
use sigil_crypto::digest;
use sigil_types::{ContentId, Hash};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lock on a storage directory, held until dropped.
pub(crate) struct DirectoryLock {
    file: File,
}

impl DirectoryLock {
    const LOCK_FILE: &'static str = "LOCK";

    fn open(dir: &Path) -> Result<File, StoreError> {
        Ok(OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(dir.join(Self::LOCK_FILE))?)
    }

    /// Block until the exclusive lock is held.
    pub(crate) fn exclusive(dir: &Path) -> Result<Self, StoreError> {
        let file = Self::open(dir)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Block until a shared lock is held.
    pub(crate) fn shared(dir: &Path) -> Result<Self, StoreError> {
        let file = Self::open(dir)?;
        file.lock_shared()?;
        Ok(Self { file })
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Write `bytes` to `path` through a temp file and rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Ledger store writing one JSON file per artifact.
#[derive(Debug, Clone)]
pub struct FileBackedLedgerStore {
    dir: PathBuf,
}

impl FileBackedLedgerStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        info!(path = %dir.display(), "Opened ledger store");
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, artifact: &Hash) -> PathBuf {
        self.dir.join(format!("{}.json", artifact.to_hex()))
    }

    /// Read and validate a ledger. The caller holds the directory lock.
    fn read(&self, artifact: &Hash) -> Result<Option<ArtifactLedger>, StoreError> {
        let path = self.path_for(artifact);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| StoreError::Corrupt {
            key: artifact.to_hex(),
            reason,
        };
        let ledger: ArtifactLedger =
            serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;
        if ledger.canonical_hash() != *artifact {
            return Err(corrupt(format!("file holds ledger {}", ledger.canonical_hash())));
        }
        invariants::check_ledger(&ledger).map_err(|e| corrupt(e.to_string()))?;

        debug!(artifact = %artifact.short(), bytes = bytes.len(), "Loaded ledger");
        Ok(Some(ledger))
    }
}

impl LedgerStore for FileBackedLedgerStore {
    fn load(&self, artifact: &Hash) -> Result<Option<ArtifactLedger>, StoreError> {
        let _guard = DirectoryLock::shared(&self.dir)?;
        self.read(artifact)
    }

    fn save_if(
        &self,
        ledger: &ArtifactLedger,
        expected: Option<&HeadCommitment>,
    ) -> Result<(), StoreError> {
        let artifact = ledger.canonical_hash();
        let bytes = serde_json::to_vec_pretty(ledger).map_err(|e| StoreError::Corrupt {
            key: artifact.to_hex(),
            reason: e.to_string(),
        })?;

        let _guard = DirectoryLock::exclusive(&self.dir)?;
        let stored = self.read(&artifact)?;
        if let Err(e) = ensure_stored_head(&artifact, stored.as_ref(), expected) {
            warn!(artifact = %artifact.short(), error = %e, "Refusing stale ledger write");
            return Err(e);
        }
        write_atomic(&self.path_for(&artifact), &bytes)?;
        debug!(artifact = %artifact.short(), bytes = bytes.len(), "Saved ledger");
        Ok(())
    }

    fn list(&self) -> Result<Vec<Hash>, StoreError> {
        let _guard = DirectoryLock::shared(&self.dir)?;
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            if let Some(hash) = name
                .strip_suffix(".json")
                .and_then(|stem| Hash::from_hex(stem).ok())
            {
                hashes.push(hash);
            }
        }
        hashes.sort();
        Ok(hashes)
    }
}

/// Content-addressed blob directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    dir: PathBuf,
}

impl DirectoryPublisher {
    /// Content id prefix.
    pub const PREFIX: &'static str = "sha256:";

    /// Open (creating if needed) a blob directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Read a published blob.
    pub fn get(&self, id: &ContentId) -> Option<Vec<u8>> {
        let hex = id.as_str().strip_prefix(Self::PREFIX)?;
        fs::read(self.dir.join(hex)).ok()
    }
}

#[async_trait]
impl PublicationAdapter for DirectoryPublisher {
    async fn publish(&self, bytes: Vec<u8>) -> Result<ContentId, PublishError> {
        let hex = digest(&bytes).to_hex();
        let path = self.dir.join(&hex);
        if !path.exists() {
            write_atomic(&path, &bytes).map_err(|e| PublishError::Unavailable(e.to_string()))?;
        }
        Ok(ContentId(format!("{}{}", Self::PREFIX, hex)))
    }
}
