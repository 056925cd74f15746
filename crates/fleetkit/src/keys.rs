//! SSH key store - provisions the region's default key pair on first use

use crate::error::{Error, Result};
use crate::provider::{CloudProvider, CredentialProvider};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// File name of the cached key for a region
pub fn key_file_name(region: &str) -> String {
    format!("{region}-default-key.pem")
}

/// Caches the default private key on disk.
///
/// The first call to [`CredentialProvider::private_key_path`] reuses an
/// existing key file or downloads one; later calls return the cached path
/// without touching the filesystem. Concurrent callers wait on the same
/// download.
pub struct KeyStore {
    provider: Arc<dyn CloudProvider>,
    path: PathBuf,
    cached: Mutex<Option<PathBuf>>,
}

impl KeyStore {
    /// Key store writing `<dir>/<region>-default-key.pem`
    pub fn new(provider: Arc<dyn CloudProvider>, dir: &Path, region: &str) -> Self {
        Self {
            provider,
            path: dir.join(key_file_name(region)),
            cached: Mutex::new(None),
        }
    }

    /// Where the key lives (or will live)
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn provision(&self) -> Result<()> {
        if self.path.is_file() {
            log::debug!("Reusing key at {}", self.path.display());
            return Ok(());
        }

        log::info!("Downloading default key pair to {}", self.path.display());
        let material = self.provider.download_default_key_pair()?;
        if material.trim().is_empty() {
            return Err(Error::Other("provider returned an empty private key".into()));
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_private(&self.path, material.as_bytes())
    }
}

impl CredentialProvider for KeyStore {
    fn private_key_path(&self) -> Result<PathBuf> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = cached.as_ref() {
            return Ok(path.clone());
        }

        self.provision()?;
        *cached = Some(self.path.clone());
        Ok(self.path.clone())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(content)?;
    // mode() only applies when the file is created
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;
    Ok(())
}
