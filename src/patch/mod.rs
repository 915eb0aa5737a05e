//! Host tool substitution.
//!
//! Swaps the host application's copy of yt-dlp for the forwarding stub and
//! back. The genuine binary is kept next to it as `<name>.bkp`.
//!
//! Step order matters: the original is moved to the backup path before the
//! stub is written, and the stub is deleted only right before the backup is
//! moved back, so at every point at least one of the two files exists.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;

/// Suffix appended to the target path for the backup copy
pub const BACKUP_SUFFIX: &str = ".bkp";

/// Errors that can occur while patching
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("Stub binary not found: {0}")]
    MissingStub(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of [`BinaryPatcher::apply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Target directory missing, host application not installed
    NotInstalled,

    /// Target already holds the stub
    AlreadyPatched,

    /// Stub written in place
    Patched,
}

/// Result of [`BinaryPatcher::revert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertOutcome {
    /// Target directory missing, host application not installed
    NotInstalled,

    /// No backup present
    NothingToRestore,

    /// Backup moved back into place
    Restored,
}

/// Substitutes one executable with the stub
#[derive(Debug, Clone)]
pub struct BinaryPatcher {
    target: PathBuf,
    backup: PathBuf,
    stub: PathBuf,
}

impl BinaryPatcher {
    pub fn new(target: impl Into<PathBuf>, stub: impl Into<PathBuf>) -> Self {
        let target = target.into();
        let mut backup = target.clone().into_os_string();
        backup.push(BACKUP_SUFFIX);

        Self {
            target,
            backup: PathBuf::from(backup),
            stub: stub.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    fn is_installed(&self) -> bool {
        self.target.parent().is_some_and(|dir| dir.is_dir())
    }

    /// Put the stub in place of the target, keeping the original as backup
    pub async fn apply(&self) -> Result<PatchOutcome, PatchError> {
        if !self.is_installed() {
            tracing::error!(
                "{} does not exist, host application may not be installed",
                self.target.parent().unwrap_or(self.target.as_path()).display()
            );
            return Ok(PatchOutcome::NotInstalled);
        }

        let stub = match fs::read(&self.stub).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PatchError::MissingStub(self.stub.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if self.target.is_file() {
            let current = fs::read(&self.target).await?;
            if content_hash(&current) == content_hash(&stub) {
                tracing::info!("{} is already patched", self.target.display());
                return Ok(PatchOutcome::AlreadyPatched);
            }

            if self.backup.exists() {
                set_readonly(&self.backup, false).await?;
                fs::remove_file(&self.backup).await?;
            }
            fs::rename(&self.target, &self.backup).await?;
            tracing::info!("Backed up {}", self.target.display());
        }

        if let Err(e) = self.write_stub(&stub).await {
            tracing::error!("Failed to write stub to {}: {}", self.target.display(), e);
            self.rollback().await;
            return Err(e.into());
        }

        tracing::info!("Patched {}", self.target.display());
        Ok(PatchOutcome::Patched)
    }

    async fn write_stub(&self, stub: &[u8]) -> Result<(), std::io::Error> {
        fs::write(&self.target, stub).await?;
        mark_executable(&self.target).await?;
        set_readonly(&self.target, true).await
    }

    /// Undo a half-finished apply so the original is back at the target
    async fn rollback(&self) {
        if !self.backup.exists() {
            return;
        }
        if let Err(e) = fs::remove_file(&self.target).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::error!("Failed to remove partial stub {}: {}", self.target.display(), e);
            }
        }
        if let Err(e) = fs::rename(&self.backup, &self.target).await {
            tracing::error!("Failed to restore {}: {}", self.target.display(), e);
        }
    }

    /// Move the backup back over the stub
    pub async fn revert(&self) -> Result<RevertOutcome, PatchError> {
        if !self.is_installed() {
            tracing::warn!("Nothing to restore, host application may not be installed");
            return Ok(RevertOutcome::NotInstalled);
        }

        if !self.backup.is_file() {
            tracing::debug!("No backup at {}", self.backup.display());
            return Ok(RevertOutcome::NothingToRestore);
        }

        tracing::info!("Restoring {}", self.target.display());
        if self.target.exists() {
            set_readonly(&self.target, false).await?;
            fs::remove_file(&self.target).await?;
        }
        fs::rename(&self.backup, &self.target).await?;
        set_readonly(&self.target, false).await?;

        tracing::info!("Restored {}", self.target.display());
        Ok(RevertOutcome::Restored)
    }
}

/// Hex SHA-256 of a byte slice
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(unix)]
async fn set_readonly(path: &Path, readonly: bool) -> Result<(), std::io::Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path).await?.permissions();
    let mode = permissions.mode();
    let mode = if readonly { mode & !0o222 } else { mode | 0o200 };
    permissions.set_mode(mode);
    fs::set_permissions(path, permissions).await
}

#[cfg(not(unix))]
async fn set_readonly(path: &Path, readonly: bool) -> Result<(), std::io::Error> {
    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_readonly(readonly);
    fs::set_permissions(path, permissions).await
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> Result<(), std::io::Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path).await?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions).await
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> Result<(), std::io::Error> {
    Ok(())
}
