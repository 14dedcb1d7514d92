//! Agent configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then `AGENT_*` environment variables. The result is validated once at
//! startup and shared read-only afterwards.

mod env;
mod toml_parser;
mod validation;

pub use env::{apply_env, apply_env_with};
pub use toml_parser::{TomlConfig, TomlEngineConfig};

use crate::engine::Engine;
use crate::error::{AgentError, Result};
use crate::service::RuntimeMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main agent configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Control-plane base URL
    pub api_base_url: String,

    /// Token identifying this node to the control plane
    pub node_token: String,

    /// Seconds between reconciliation ticks
    pub heartbeat_interval_secs: u64,

    /// Where the last fetched desired configuration is persisted
    pub desired_path: PathBuf,

    /// Root runtime configuration file
    pub config_path: PathBuf,

    /// Backup of the root runtime configuration file
    pub backup_path: PathBuf,

    /// How engine services are (re)started
    pub runtime_mode: RuntimeMode,

    /// Program used to restart units in systemd mode
    pub systemctl: String,

    /// Upper bound for a single version probe
    pub probe_timeout_secs: u64,

    /// Time between SIGTERM and SIGKILL when stopping an engine process
    pub stop_grace_ms: u64,

    /// Proxy engine (sing-box) settings
    pub singbox: EngineSettings,

    /// Tunnel engine (AmneziaWG 2) settings
    pub awg2: EngineSettings,

    /// Optional `host:port` for the local status endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_addr: Option<String>,
}

/// Per-engine file locations and commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Engine configuration file
    pub config_path: PathBuf,

    /// Backup of the engine configuration file
    pub backup_path: PathBuf,

    /// Shell command launching the engine (direct-process mode)
    pub run_command: String,

    /// Shell command printing the engine version
    pub version_command: String,

    /// PID file for the supervised engine process
    pub pid_path: PathBuf,

    /// systemd unit name (systemd mode)
    pub systemd_unit: String,
}

impl EngineSettings {
    /// Default settings for an engine
    pub fn defaults_for(engine: Engine) -> Self {
        match engine {
            Engine::Singbox => Self {
                config_path: PathBuf::from("/var/lib/pepoapple/singbox.json"),
                backup_path: PathBuf::from("/var/lib/pepoapple/singbox.backup.json"),
                run_command: "sing-box run -D /var/lib/pepoapple -c /var/lib/pepoapple/singbox.json"
                    .to_string(),
                version_command: "sing-box version".to_string(),
                pid_path: PathBuf::from("/var/lib/pepoapple/singbox.pid"),
                systemd_unit: "sing-box".to_string(),
            },
            Engine::Awg2 => Self {
                config_path: PathBuf::from("/var/lib/pepoapple/awg2.json"),
                backup_path: PathBuf::from("/var/lib/pepoapple/awg2.backup.json"),
                run_command: "awg2 -f wg0".to_string(),
                version_command: "awg2 --version".to_string(),
                pid_path: PathBuf::from("/var/lib/pepoapple/awg2.pid"),
                systemd_unit: "awg2".to_string(),
            },
        }
    }
}

impl AgentConfig {
    /// Load configuration: defaults, then the optional TOML file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = path {
            TomlConfig::from_file(path)?.apply_to(&mut config);
        }
        apply_env(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the environment only
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Settings for a single engine
    pub fn engine(&self, engine: Engine) -> &EngineSettings {
        match engine {
            Engine::Singbox => &self.singbox,
            Engine::Awg2 => &self.awg2,
        }
    }

    /// Mutable settings for a single engine
    pub fn engine_mut(&mut self, engine: Engine) -> &mut EngineSettings {
        match engine {
            Engine::Singbox => &mut self.singbox,
            Engine::Awg2 => &mut self.awg2,
        }
    }

    /// Tick interval of the reconciliation loop
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Version probe timeout
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Grace period between graceful and forced termination
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_base_url(&self.api_base_url)?;
        validation::validate_node_token(&self.node_token)?;
        validation::validate_interval(self.heartbeat_interval_secs)?;
        validation::validate_interval(self.probe_timeout_secs)
            .map_err(|e| AgentError::Config(format!("probe timeout: {}", e)))?;

        for path in [&self.desired_path, &self.config_path, &self.backup_path] {
            validation::validate_path(path)?;
        }
        for engine in Engine::ALL {
            let settings = self.engine(engine);
            validation::validate_path(&settings.config_path)
                .and_then(|_| validation::validate_path(&settings.backup_path))
                .and_then(|_| validation::validate_path(&settings.pid_path))
                .map_err(|e| AgentError::Config(format!("Engine '{}': {}", engine, e)))?;
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080".to_string(),
            node_token: "change-me".to_string(),
            heartbeat_interval_secs: 15,
            desired_path: PathBuf::from("/var/lib/pepoapple/desired.json"),
            config_path: PathBuf::from("/etc/pepoapple/runtime.json"),
            backup_path: PathBuf::from("/var/lib/pepoapple/runtime.backup.json"),
            runtime_mode: RuntimeMode::Process,
            systemctl: "systemctl".to_string(),
            probe_timeout_secs: 3,
            stop_grace_ms: 300,
            singbox: EngineSettings::defaults_for(Engine::Singbox),
            awg2: EngineSettings::defaults_for(Engine::Awg2),
            status_addr: None,
        }
    }
}
