//! Named signing keys stored as hex seeds under `<data-dir>/keys`.

use anyhow::{bail, Context, Result};
use sigil_crypto::{Ed25519KeyPair, Ed25519PublicKey};
use sigil_ledger::adapters::LocalKeySigner;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

const SEED_EXTENSION: &str = "seed";

/// Directory of named key seeds.
pub struct KeyRing {
    dir: PathBuf,
}

impl KeyRing {
    /// Key ring rooted at `dir`, created if missing.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create key directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("Invalid key name {name:?}: use letters, digits, '-' or '_'");
        }
        Ok(self.dir.join(format!("{name}.{SEED_EXTENSION}")))
    }

    /// Create a fresh key. An existing key is only replaced with `force`.
    pub fn generate(&self, name: &str, force: bool) -> Result<Ed25519PublicKey> {
        let path = self.path(name)?;
        if path.exists() && !force {
            bail!("Key {name:?} already exists at {}", path.display());
        }
        let keys = Ed25519KeyPair::generate();
        let seed = Zeroizing::new(hex::encode(keys.to_seed()));
        fs::write(&path, seed.as_bytes())
            .with_context(|| format!("Failed to write key {}", path.display()))?;
        restrict_permissions(&path)?;
        Ok(keys.public_key())
    }

    /// Load the signer for `name`.
    pub fn load(&self, name: &str) -> Result<LocalKeySigner> {
        let path = self.path(name)?;
        let text = Zeroizing::new(
            fs::read_to_string(&path)
                .with_context(|| format!("Unknown key {name:?} (looked in {})", path.display()))?,
        );
        let bytes = Zeroizing::new(
            hex::decode(text.trim()).with_context(|| format!("Key {name:?} is not valid hex"))?,
        );
        let mut seed = Zeroizing::new([0u8; 32]);
        if bytes.len() != seed.len() {
            bail!("Key {name:?} has {} bytes, expected 32", bytes.len());
        }
        seed.copy_from_slice(&bytes);
        Ok(LocalKeySigner::from_seed(*seed))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("Failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
