//! Engine service reloading
//!
//! After new engine configuration is on disk the engines have to be
//! restarted to pick it up. Two strategies exist, selected by the deployment
//! mode:
//!
//! - `systemd`: `systemctl restart <unit>` per engine
//! - `process`: direct supervision through PID files (see [`crate::supervisor`])
//!
//! Both attempt every requested engine, collect per-engine outcomes in a
//! [`ReloadReport`] and fold the failures into one error at the end. The same
//! path serves forward applies and rollbacks.

mod process;
mod systemd;

pub use process::{EngineProcess, ProcessReloader};
pub use systemd::SystemdReloader;

use crate::config::AgentConfig;
use crate::engine::{Engine, EngineSet};
use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Deployment mode deciding how engines are restarted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuntimeMode {
    /// Agent launches engines itself
    #[default]
    Process,
    /// Engines are systemd units
    Systemd,
}

impl From<String> for RuntimeMode {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<&str> for RuntimeMode {
    /// `systemd` (any case) selects systemd; everything else means process mode
    fn from(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("systemd") {
            Self::Systemd
        } else {
            Self::Process
        }
    }
}

impl From<RuntimeMode> for String {
    fn from(mode: RuntimeMode) -> Self {
        mode.to_string()
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Systemd => write!(f, "systemd"),
        }
    }
}

/// Per-engine outcomes of one reload pass
#[derive(Debug, Default)]
pub struct ReloadReport {
    outcomes: Vec<(Engine, Result<()>)>,
}

impl ReloadReport {
    /// Record the outcome for `engine`
    pub fn record(&mut self, engine: Engine, result: Result<()>) {
        if let Err(e) = &result {
            warn!(engine = %engine, "Reload failed: {}", e);
        }
        self.outcomes.push((engine, result));
    }

    /// Engines that were attempted
    pub fn attempted(&self) -> impl Iterator<Item = Engine> + '_ {
        self.outcomes.iter().map(|(engine, _)| *engine)
    }

    /// Errors of the engines that failed
    pub fn failures(&self) -> impl Iterator<Item = &AgentError> + '_ {
        self.outcomes.iter().filter_map(|(_, result)| result.as_ref().err())
    }

    /// Check whether every attempted engine reloaded
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Fold the outcomes into one result, joining failure messages with `; `
    pub fn into_result(self) -> Result<()> {
        let failures: Vec<String> = self
            .outcomes
            .into_iter()
            .filter_map(|(_, result)| result.err())
            .map(|e| e.to_string())
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Reload(failures.join("; ")))
        }
    }
}

/// The active reload strategy
#[derive(Debug, Clone)]
pub enum Reloader {
    /// Restart systemd units
    Systemd(SystemdReloader),
    /// Restart directly supervised processes
    Process(ProcessReloader),
}

impl Reloader {
    /// Build the strategy selected by `config.runtime_mode`
    pub fn from_config(config: &AgentConfig) -> Self {
        match config.runtime_mode {
            RuntimeMode::Systemd => Self::Systemd(SystemdReloader::from_config(config)),
            RuntimeMode::Process => Self::Process(ProcessReloader::from_config(config)),
        }
    }

    /// Mode this strategy implements
    pub fn mode(&self) -> RuntimeMode {
        match self {
            Self::Systemd(_) => RuntimeMode::Systemd,
            Self::Process(_) => RuntimeMode::Process,
        }
    }

    /// Restart every engine in `engines`, attempting all before failing
    pub async fn reload(&self, engines: EngineSet) -> Result<()> {
        self.reload_report(engines).await.into_result()
    }

    /// Restart every engine in `engines` and return the per-engine outcomes
    pub async fn reload_report(&self, engines: EngineSet) -> ReloadReport {
        let mut report = ReloadReport::default();

        for engine in engines.iter() {
            let result = match self {
                Self::Systemd(reloader) => reloader.restart(engine).await,
                Self::Process(reloader) => reloader.restart(engine).await,
            };
            report.record(engine, result);
        }

        if !engines.is_empty() && report.is_success() {
            info!("Reloaded {} engine(s) via {}", report.attempted().count(), self.mode());
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_mode_parsing() {
        assert_eq!(RuntimeMode::from("systemd"), RuntimeMode::Systemd);
        assert_eq!(RuntimeMode::from(" SYSTEMD "), RuntimeMode::Systemd);
        assert_eq!(RuntimeMode::from("process"), RuntimeMode::Process);
        assert_eq!(RuntimeMode::from("anything"), RuntimeMode::Process);
        assert_eq!(RuntimeMode::Systemd.to_string(), "systemd");
    }

    #[test]
    fn test_report_joins_failures() {
        let mut report = ReloadReport::default();
        report.record(Engine::Singbox, Err(AgentError::Process("sing-box down".into())));
        report.record(Engine::Awg2, Err(AgentError::Process("awg2 down".into())));

        assert_eq!(report.attempted().count(), 2);
        assert!(!report.is_success());
        let err = report.into_result().unwrap_err();
        assert_eq!(err.to_string(), "sing-box down; awg2 down");
    }

    #[test]
    fn test_report_partial_failure() {
        let mut report = ReloadReport::default();
        report.record(Engine::Singbox, Ok(()));
        report.record(Engine::Awg2, Err(AgentError::Process("awg2 down".into())));

        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.into_result().unwrap_err().to_string(), "awg2 down");
    }

    #[test]
    fn test_empty_report_succeeds() {
        assert!(ReloadReport::default().into_result().is_ok());
    }

    #[test]
    fn test_from_config_selects_strategy() {
        let mut config = AgentConfig::default();
        assert_eq!(Reloader::from_config(&config).mode(), RuntimeMode::Process);

        config.runtime_mode = RuntimeMode::Systemd;
        assert_eq!(Reloader::from_config(&config).mode(), RuntimeMode::Systemd);
    }
}
