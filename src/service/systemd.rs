//! systemd unit restarts
//!
//! Engines deployed as systemd units are restarted with
//! `<systemctl> restart <unit>`. The program is configurable so hosts with a
//! wrapper (or tests) can substitute their own.

use crate::config::AgentConfig;
use crate::engine::Engine;
use crate::error::{AgentError, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Restarts engine units through systemctl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdReloader {
    systemctl: String,
    singbox_unit: String,
    awg2_unit: String,
}

impl SystemdReloader {
    /// Create a reloader with explicit unit names
    pub fn new(
        systemctl: impl Into<String>,
        singbox_unit: impl Into<String>,
        awg2_unit: impl Into<String>,
    ) -> Self {
        Self {
            systemctl: systemctl.into(),
            singbox_unit: singbox_unit.into(),
            awg2_unit: awg2_unit.into(),
        }
    }

    /// Create a reloader from agent configuration
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.systemctl.clone(),
            config.singbox.systemd_unit.clone(),
            config.awg2.systemd_unit.clone(),
        )
    }

    /// Unit name for `engine`
    pub fn unit(&self, engine: Engine) -> &str {
        match engine {
            Engine::Singbox => &self.singbox_unit,
            Engine::Awg2 => &self.awg2_unit,
        }
    }

    /// Restart the unit of `engine`
    pub async fn restart(&self, engine: Engine) -> Result<()> {
        let unit = self.unit(engine);
        info!(engine = %engine, "Restarting systemd unit {}", unit);

        self.run(&["restart", unit]).await.map_err(|e| {
            AgentError::Reload(format!("{} systemd restart failed: {}", engine, e))
        })
    }

    async fn run(&self, args: &[&str]) -> std::result::Result<(), String> {
        debug!("Executing command: {} {:?}", self.systemctl, args);

        let output = Command::new(&self.systemctl)
            .args(args)
            .output()
            .await
            .map_err(|e| e.to_string())?;

        if output.status.success() {
            return Ok(());
        }

        let mut message = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(stderr.trim());
        }

        if message.is_empty() {
            Err(output.status.to_string())
        } else {
            Err(format!("{}: {}", output.status, message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_units_from_config() {
        let reloader = SystemdReloader::from_config(&AgentConfig::default());
        assert_eq!(reloader.unit(Engine::Singbox), "sing-box");
        assert_eq!(reloader.unit(Engine::Awg2), "awg2");
    }

    #[tokio::test]
    async fn test_restart_success() {
        let reloader = SystemdReloader::new("true", "sing-box", "awg2");
        assert!(reloader.restart(Engine::Singbox).await.is_ok());
    }

    #[tokio::test]
    async fn test_restart_failure_names_engine() {
        let reloader = SystemdReloader::new("false", "sing-box", "awg2");
        let err = reloader.restart(Engine::Awg2).await.unwrap_err();
        assert!(err.to_string().starts_with("awg2 systemd restart failed: "));
    }

    #[tokio::test]
    async fn test_restart_missing_program() {
        let reloader = SystemdReloader::new("/nonexistent/systemctl", "sing-box", "awg2");
        let err = reloader.restart(Engine::Singbox).await.unwrap_err();
        assert!(err.to_string().starts_with("sing-box systemd restart failed: "));
    }
}
