//! Owner-only permissions for managed files
//!
//! Engine configurations carry private keys and user credentials, so every
//! file the agent writes is readable by its owner only.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::debug;

/// Mode applied to configuration, backup and PID files
pub const PRIVATE_MODE: u32 = 0o600;

/// Restrict `path` to owner read/write
pub fn restrict_to_owner(path: &Path) -> io::Result<()> {
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(PRIVATE_MODE))?;
    debug!("Set permissions on {:?}: {:o}", path, PRIVATE_MODE);
    Ok(())
}

/// Check that no one but the owner can access `path`
pub fn is_owner_only(path: &Path) -> io::Result<bool> {
    let mode = std::fs::metadata(path)?.permissions().mode();
    Ok(mode & 0o077 == 0)
}
