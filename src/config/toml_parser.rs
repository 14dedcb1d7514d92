//! TOML configuration file parser
//!
//! Every key is optional; a file only overrides what it names and the rest
//! keeps its built-in default.

use crate::config::{AgentConfig, EngineSettings};
use crate::error::{AgentError, Result};
use crate::service::RuntimeMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Control-plane base URL
    pub api_base_url: Option<String>,

    /// Node token
    pub node_token: Option<String>,

    /// Seconds between reconciliation ticks
    pub heartbeat_interval_secs: Option<u64>,

    /// Desired configuration snapshot path
    pub desired_path: Option<PathBuf>,

    /// Root runtime configuration path
    pub config_path: Option<PathBuf>,

    /// Root runtime configuration backup path
    pub backup_path: Option<PathBuf>,

    /// `process` or `systemd`
    pub runtime_mode: Option<RuntimeMode>,

    /// systemctl program
    pub systemctl: Option<String>,

    /// Version probe timeout in seconds
    pub probe_timeout_secs: Option<u64>,

    /// Stop grace period in milliseconds
    pub stop_grace_ms: Option<u64>,

    /// Status endpoint address
    pub status_addr: Option<String>,

    /// Proxy engine overrides
    #[serde(default)]
    pub singbox: TomlEngineConfig,

    /// Tunnel engine overrides
    #[serde(default)]
    pub awg2: TomlEngineConfig,
}

/// TOML per-engine overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlEngineConfig {
    /// Engine configuration file
    pub config_path: Option<PathBuf>,

    /// Engine configuration backup
    pub backup_path: Option<PathBuf>,

    /// Launch command
    pub run_command: Option<String>,

    /// Version command
    pub version_command: Option<String>,

    /// PID file
    pub pid_path: Option<PathBuf>,

    /// systemd unit
    pub systemd_unit: Option<String>,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            AgentError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Overlay the values present in this file onto `config`
    pub fn apply_to(self, config: &mut AgentConfig) {
        overwrite(&mut config.api_base_url, self.api_base_url);
        overwrite(&mut config.node_token, self.node_token);
        overwrite(&mut config.heartbeat_interval_secs, self.heartbeat_interval_secs);
        overwrite(&mut config.desired_path, self.desired_path);
        overwrite(&mut config.config_path, self.config_path);
        overwrite(&mut config.backup_path, self.backup_path);
        overwrite(&mut config.runtime_mode, self.runtime_mode);
        overwrite(&mut config.systemctl, self.systemctl);
        overwrite(&mut config.probe_timeout_secs, self.probe_timeout_secs);
        overwrite(&mut config.stop_grace_ms, self.stop_grace_ms);
        if self.status_addr.is_some() {
            config.status_addr = self.status_addr;
        }
        self.singbox.apply_to(&mut config.singbox);
        self.awg2.apply_to(&mut config.awg2);
    }
}

impl TomlEngineConfig {
    fn apply_to(self, settings: &mut EngineSettings) {
        overwrite(&mut settings.config_path, self.config_path);
        overwrite(&mut settings.backup_path, self.backup_path);
        overwrite(&mut settings.run_command, self.run_command);
        overwrite(&mut settings.version_command, self.version_command);
        overwrite(&mut settings.pid_path, self.pid_path);
        overwrite(&mut settings.systemd_unit, self.systemd_unit);
    }
}

fn overwrite<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let toml = r#"
api_base_url = "https://panel.example.com"
runtime_mode = "systemd"

[awg2]
run_command = "awg2 -f wg1"
"#;

        let file = TomlConfig::parse(toml).expect("Failed to parse TOML");
        let mut config = AgentConfig::default();
        file.apply_to(&mut config);

        assert_eq!(config.api_base_url, "https://panel.example.com");
        assert_eq!(config.runtime_mode, RuntimeMode::Systemd);
        assert_eq!(config.awg2.run_command, "awg2 -f wg1");
        // untouched engine fields keep their defaults
        assert_eq!(config.awg2.systemd_unit, "awg2");
        assert_eq!(config.singbox.systemd_unit, "sing-box");
        assert_eq!(config.heartbeat_interval_secs, 15);
    }

    #[test]
    fn test_parse_rejects_unknown_keys() {
        let err = TomlConfig::parse("no_such_key = 1").unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "node_token = \"node-1\"\nstop_grace_ms = 50\n").unwrap();

        let mut config = AgentConfig::default();
        TomlConfig::from_file(&path).unwrap().apply_to(&mut config);
        assert_eq!(config.node_token, "node-1");
        assert_eq!(config.stop_grace_ms, 50);
    }

    #[test]
    fn test_missing_file() {
        let err = TomlConfig::from_file("/nonexistent/agent.toml").unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
