//! PID file records
//!
//! A PID file holds the decimal PID of the process launched for an engine.
//! A missing file means no tracked process.

use crate::error::{AgentError, Result};
use crate::store;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Contents of a PID file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidRecord {
    /// No PID file
    Missing,
    /// File exists but does not hold a usable PID
    Invalid,
    /// A tracked PID
    Pid(i32),
}

/// A PID file on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create a handle for `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record
    pub async fn read(&self) -> Result<PidRecord> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PidRecord::Missing),
            Err(e) => {
                return Err(AgentError::Process(format!(
                    "Failed to read PID file {:?}: {}",
                    self.path, e
                )))
            }
        };

        Ok(parse_pid(&raw))
    }

    /// Persist `pid`, creating parent directories as needed
    pub async fn write(&self, pid: u32) -> Result<()> {
        store::write_text(&self.path, &pid.to_string()).await?;
        debug!("Recorded PID {} in {:?}", pid, self.path);
        Ok(())
    }

    /// Delete the file; a missing file is fine
    pub async fn remove(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed PID file {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove PID file {:?}: {}", self.path, e),
        }
    }
}

/// Parse PID file contents
///
/// Zero and negative values address process groups in kill(2), so they are
/// rejected along with anything non-numeric.
pub fn parse_pid(raw: &str) -> PidRecord {
    match raw.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => PidRecord::Pid(pid),
        _ => PidRecord::Invalid,
    }
}
