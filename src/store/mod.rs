//! On-disk state owned by the agent
//!
//! Every file the agent replaces is a [`ManagedFile`]: a live path paired with
//! a single backup slot. `backup` copies live to backup, `restore` copies
//! backup to live, and both are no-ops when their source does not exist.
//! Copies are byte-for-byte; only [`write_json`] produces new content.

mod permissions;

pub use permissions::{is_owner_only, restrict_to_owner, PRIVATE_MODE};

use crate::error::{AgentError, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// A live file and its backup slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedFile {
    /// Path the engine or agent reads
    pub live: PathBuf,
    /// Single most-recent snapshot of `live`
    pub backup: PathBuf,
}

impl ManagedFile {
    /// Pair a live path with its backup path
    pub fn new(live: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        Self {
            live: live.into(),
            backup: backup.into(),
        }
    }

    /// Snapshot the live file into the backup slot
    ///
    /// Returns `false` when there was no live file to protect.
    pub async fn backup(&self) -> Result<bool> {
        copy_if_exists(&self.live, &self.backup).await.map_err(|e| {
            AgentError::Store(format!(
                "Failed to back up {:?} to {:?}: {}",
                self.live, self.backup, e
            ))
        })
    }

    /// Copy the backup snapshot over the live file
    ///
    /// Returns `false` when there was no backup to restore.
    pub async fn restore(&self) -> Result<bool> {
        copy_if_exists(&self.backup, &self.live).await.map_err(|e| {
            AgentError::Store(format!(
                "Failed to restore {:?} from {:?}: {}",
                self.live, self.backup, e
            ))
        })
    }

    /// Replace the live file with `value` as pretty-printed JSON
    pub async fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        write_json(&self.live, value).await
    }
}

async fn copy_if_exists(from: &Path, to: &Path) -> std::io::Result<bool> {
    let raw = match fs::read(from).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Nothing to copy, {:?} does not exist", from);
            return Ok(false);
        }
        Err(e) => return Err(e),
    };

    write_private(to, &raw).await?;
    debug!("Copied {} bytes from {:?} to {:?}", raw.len(), from, to);
    Ok(true)
}

/// Write `value` to `path` as pretty-printed JSON with owner-only permissions
pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_vec_pretty(value)?;
    write_private(path, &raw)
        .await
        .map_err(|e| AgentError::Store(format!("Failed to write {:?}: {}", path, e)))
}

/// Write a PID (or any small text record) with owner-only permissions
pub async fn write_text(path: &Path, text: &str) -> Result<()> {
    write_private(path, text.as_bytes())
        .await
        .map_err(|e| AgentError::Store(format!("Failed to write {:?}: {}", path, e)))
}

async fn write_private(path: &Path, raw: &[u8]) -> std::io::Result<()> {
    ensure_parent_dir(path).await?;
    fs::write(path, raw).await?;
    restrict_to_owner(path)
}

/// Create the parent directory of `path` if needed
pub async fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir).await,
        _ => Ok(()),
    }
}
