//! Direct process reloads
//!
//! Each engine is restarted through [`ProcessSupervisor::restart_process`]
//! using its configured run command and PID file.

use crate::config::AgentConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::supervisor::ProcessSupervisor;
use std::path::PathBuf;

/// Launch settings for one supervised engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineProcess {
    /// PID file tracking the running instance
    pub pid_path: PathBuf,
    /// Shell command launching the engine
    pub run_command: String,
}

/// Restarts directly supervised engine processes
#[derive(Debug, Clone)]
pub struct ProcessReloader {
    supervisor: ProcessSupervisor,
    singbox: EngineProcess,
    awg2: EngineProcess,
}

impl ProcessReloader {
    /// Create a reloader with explicit launch settings
    pub fn new(supervisor: ProcessSupervisor, singbox: EngineProcess, awg2: EngineProcess) -> Self {
        Self {
            supervisor,
            singbox,
            awg2,
        }
    }

    /// Create a reloader from agent configuration
    pub fn from_config(config: &AgentConfig) -> Self {
        let process = |engine: Engine| {
            let settings = config.engine(engine);
            EngineProcess {
                pid_path: settings.pid_path.clone(),
                run_command: settings.run_command.clone(),
            }
        };

        Self::new(
            ProcessSupervisor::new(config.stop_grace()),
            process(Engine::Singbox),
            process(Engine::Awg2),
        )
    }

    /// Launch settings for `engine`
    pub fn process(&self, engine: Engine) -> &EngineProcess {
        match engine {
            Engine::Singbox => &self.singbox,
            Engine::Awg2 => &self.awg2,
        }
    }

    /// Restart the process of `engine`
    pub async fn restart(&self, engine: Engine) -> Result<()> {
        let process = self.process(engine);
        self.supervisor
            .restart_process(&process.pid_path, &process.run_command, &engine.to_string())
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineSet;
    use crate::service::Reloader;
    use std::time::Duration;
    use tempfile::TempDir;

    fn reloader(dir: &TempDir, singbox_cmd: &str, awg2_cmd: &str) -> ProcessReloader {
        ProcessReloader::new(
            ProcessSupervisor::new(Duration::from_millis(20)),
            EngineProcess {
                pid_path: dir.path().join("singbox.pid"),
                run_command: singbox_cmd.to_string(),
            },
            EngineProcess {
                pid_path: dir.path().join("awg2.pid"),
                run_command: awg2_cmd.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_both_engines_attempted_and_joined() {
        let dir = TempDir::new().unwrap();
        let reloader = Reloader::Process(reloader(&dir, "", ""));

        let err = reloader.reload(EngineSet::new(true, true)).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "sing-box process restart failed: empty command; awg2 process restart failed: empty command"
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_engine() {
        let dir = TempDir::new().unwrap();
        let reloader = Reloader::Process(reloader(&dir, "", "exit 0"));

        let report = reloader.reload_report(EngineSet::new(true, true)).await;
        assert_eq!(report.failures().count(), 1);
        // awg2 was still launched after sing-box failed
        assert!(dir.path().join("awg2.pid").exists());
    }

    #[tokio::test]
    async fn test_only_selected_engines() {
        let dir = TempDir::new().unwrap();
        let reloader = Reloader::Process(reloader(&dir, "", "exit 0"));

        assert!(reloader.reload(EngineSet::new(false, true)).await.is_ok());
        assert!(reloader.reload(EngineSet::none()).await.is_ok());
        assert!(!dir.path().join("singbox.pid").exists());
    }
}
