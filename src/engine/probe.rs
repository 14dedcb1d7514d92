//! Engine version probing
//!
//! A probe runs the engine's version command through `sh -c` once per
//! heartbeat and never blocks longer than the configured timeout. Failures
//! are folded into sentinel strings instead of errors.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Longest version string reported upstream
pub const VERSION_MAX_CHARS: usize = 64;

/// Outcome of a version probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// No version command configured
    NotConfigured,
    /// The command did not finish in time
    TimedOut,
    /// The command could not be run or exited non-zero
    Unavailable,
    /// The command succeeded but printed nothing
    Unknown,
    /// First line of the command output
    Version(String),
}

impl std::fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "not-configured"),
            Self::TimedOut => write!(f, "timeout"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Unknown => write!(f, "unknown"),
            Self::Version(version) => write!(f, "{}", version),
        }
    }
}

/// Run `command` and extract a short version string
pub async fn probe(command: &str, timeout: Duration) -> ProbeResult {
    if command.trim().is_empty() {
        return ProbeResult::NotConfigured;
    }

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.output()).await {
        Err(_) => {
            debug!("Version probe timed out after {:?}: {}", timeout, command);
            ProbeResult::TimedOut
        }
        Ok(Err(e)) => {
            debug!("Version probe failed to run {}: {}", command, e);
            ProbeResult::Unavailable
        }
        Ok(Ok(output)) if !output.status.success() => {
            debug!("Version probe exited with {}: {}", output.status, command);
            ProbeResult::Unavailable
        }
        Ok(Ok(output)) => {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            parse_version_output(&combined)
        }
    }
}

fn parse_version_output(output: &str) -> ProbeResult {
    let text = output.trim();
    if text.is_empty() {
        return ProbeResult::Unknown;
    }

    let line = text.lines().next().unwrap_or_default().trim();
    ProbeResult::Version(line.chars().take(VERSION_MAX_CHARS).collect())
}
