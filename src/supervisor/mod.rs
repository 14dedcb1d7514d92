//! Direct process supervision
//!
//! Without a service manager the agent launches each engine itself through
//! `sh -c`, detached into its own process group, and remembers it only by a
//! PID file. Signals go to the whole group, so anything the shell forked
//! stops with it. Nothing else survives an agent restart, so every decision is
//! driven by the PID file and by the outcome of signal delivery:
//!
//! ```text
//! Unknown --inspect--> Stopped            (no PID file, or unusable contents)
//! Unknown --inspect--> Running(pid)
//! Running --SIGTERM fails (ESRCH)--> Stopped
//! Running --SIGTERM, grace, SIGKILL if the group is still alive--> Stopped
//! Stopped --launch--> Running(new pid)
//! ```

mod pidfile;

pub use pidfile::{parse_pid, PidFile, PidRecord};

use crate::error::{AgentError, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time between SIGTERM and SIGKILL
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_millis(300);

/// Supervision state of one engine process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// PID file not inspected yet
    Unknown,
    /// A process is recorded and was alive at last check
    Running(i32),
    /// No tracked process
    Stopped,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Running(pid) => write!(f, "running (pid {})", pid),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Launches, stops and restarts engine processes tracked by PID files
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    grace: Duration,
}

impl ProcessSupervisor {
    /// Create a supervisor with the given stop grace period
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Resolve the state recorded in `pid_file`
    ///
    /// Unusable contents are deleted so the next launch starts clean.
    pub async fn inspect(&self, pid_file: &PidFile) -> Result<ProcessState> {
        match pid_file.read().await? {
            PidRecord::Missing => Ok(ProcessState::Stopped),
            PidRecord::Invalid => {
                warn!("Discarding stale PID file {:?}", pid_file.path());
                pid_file.remove().await;
                Ok(ProcessState::Stopped)
            }
            PidRecord::Pid(pid) => Ok(ProcessState::Running(pid)),
        }
    }

    /// Stop the process recorded in `pid_file` and delete the file
    pub async fn stop(&self, pid_file: &PidFile) -> Result<ProcessState> {
        let state = match self.inspect(pid_file).await? {
            ProcessState::Running(pid) => self.terminate(pid).await,
            other => other,
        };
        pid_file.remove().await;
        Ok(state)
    }

    async fn terminate(&self, pid: i32) -> ProcessState {
        match signal_group(pid, Some(Signal::SIGTERM)) {
            Ok(()) => debug!("Sent SIGTERM to process group {}", pid),
            Err(Errno::ESRCH) => {
                debug!("PID {} is not running", pid);
                return ProcessState::Stopped;
            }
            Err(e) => warn!("Failed to send SIGTERM to PID {}: {}", pid, e),
        }

        tokio::time::sleep(self.grace).await;

        // The group id cannot be reused while any member exists, so a group
        // that still answers signal 0 is ours.
        if signal_group(pid, None).is_ok() {
            warn!("Process group {} still alive after {:?}, sending SIGKILL", pid, self.grace);
            if let Err(e) = signal_group(pid, Some(Signal::SIGKILL)) {
                debug!("Failed to send SIGKILL to process group {}: {}", pid, e);
            }
        }

        ProcessState::Stopped
    }

    /// Launch `command` detached and record its PID
    pub async fn start(&self, pid_file: &PidFile, command: &str) -> Result<u32> {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0);

        // Spawned through tokio so the child is reaped once it exits.
        let child = tokio::process::Command::from(cmd).spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| AgentError::Process("spawned process has no PID".to_string()))?;

        pid_file.write(pid).await?;
        Ok(pid)
    }

    /// Stop the previous instance (if any) and launch a new one
    pub async fn restart_process(&self, pid_path: &Path, command: &str, name: &str) -> Result<u32> {
        if command.trim().is_empty() {
            return Err(AgentError::Process(format!(
                "{} process restart failed: empty command",
                name
            )));
        }

        let pid_file = PidFile::new(pid_path);

        let previous = self.stop(&pid_file).await.map_err(|e| {
            AgentError::Process(format!(
                "{} process restart failed while stopping previous process: {}",
                name, e
            ))
        })?;
        debug!("{} previous process: {}", name, previous);

        let pid = self.start(&pid_file, command).await.map_err(|e| {
            AgentError::Process(format!("{} process restart failed: {}", name, e))
        })?;

        info!("{} started with PID {}", name, pid);
        Ok(pid)
    }
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_STOP_GRACE)
    }
}

/// Send `sig` to the process group led by `pid`
///
/// Falls back to the single process when `pid` leads no group, as with PID
/// files written by another launcher.
fn signal_group(pid: i32, sig: Option<Signal>) -> nix::Result<()> {
    let target = Pid::from_raw(pid);
    match signal::killpg(target, sig) {
        Err(Errno::ESRCH) => signal::kill(target, sig),
        other => other,
    }
}

/// Check if a process exists and is not a zombie
pub fn is_process_alive(pid: i32) -> bool {
    if pid <= 0 || signal::kill(Pid::from_raw(pid), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state; Z and X are not running.
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        if let Some(state) = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
        {
            return !matches!(state, "Z" | "X");
        }
    }

    true
}
