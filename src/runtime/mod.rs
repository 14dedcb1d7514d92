//! Configuration reconciliation
//!
//! The [`Manager`] owns the root runtime configuration file and both engine
//! configuration files. An apply is one transaction:
//!
//! 1. extract the configuration of every enabled engine
//! 2. back up the root file and every effective engine's file
//! 3. write the root document
//! 4. write each effective engine's configuration
//! 5. reload the effective engines
//!
//! Any failure after step 2 restores all backups and reloads the same engines
//! again so they run on the restored configuration.

mod transaction;

pub use transaction::{ApplyStage, Transaction};

use crate::config::AgentConfig;
use crate::engine::{self, Engine, EngineConfig, EngineSet, EngineVersions, Payload};
use crate::error::{AgentError, Result};
use crate::service::Reloader;
use crate::store::ManagedFile;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Applies desired configurations to the local engines
#[derive(Debug, Clone)]
pub struct Manager {
    root: ManagedFile,
    singbox: ManagedFile,
    awg2: ManagedFile,
    reloader: Reloader,
    singbox_version_command: String,
    awg2_version_command: String,
    probe_timeout: Duration,
}

impl Manager {
    /// Create a manager from agent configuration
    pub fn new(config: &AgentConfig) -> Self {
        let managed = |engine: Engine| {
            let settings = config.engine(engine);
            ManagedFile::new(settings.config_path.clone(), settings.backup_path.clone())
        };

        Self {
            root: ManagedFile::new(config.config_path.clone(), config.backup_path.clone()),
            singbox: managed(Engine::Singbox),
            awg2: managed(Engine::Awg2),
            reloader: Reloader::from_config(config),
            singbox_version_command: config.singbox.version_command.clone(),
            awg2_version_command: config.awg2.version_command.clone(),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Replace the reload strategy
    pub fn with_reloader(mut self, reloader: Reloader) -> Self {
        self.reloader = reloader;
        self
    }

    /// Root runtime configuration file
    pub fn root_file(&self) -> &ManagedFile {
        &self.root
    }

    /// Configuration file of `engine`
    pub fn engine_file(&self, engine: Engine) -> &ManagedFile {
        match engine {
            Engine::Singbox => &self.singbox,
            Engine::Awg2 => &self.awg2,
        }
    }

    /// Active reload strategy
    pub fn reloader(&self) -> &Reloader {
        &self.reloader
    }

    /// Probe both engines' versions
    pub async fn engine_versions(&self) -> EngineVersions {
        let (singbox, awg2) = tokio::join!(
            engine::probe(&self.singbox_version_command, self.probe_timeout),
            engine::probe(&self.awg2_version_command, self.probe_timeout),
        );

        EngineVersions {
            singbox: singbox.to_string(),
            awg2: awg2.to_string(),
        }
    }

    /// Validate `payload` for the enabled engines without touching disk
    pub fn validate(&self, payload: &Payload, enabled: EngineSet) -> Result<()> {
        engine::validate(payload, enabled)
    }

    /// Apply `payload` for the enabled engines
    ///
    /// Returns the effective engines, i.e. the enabled engines whose
    /// configuration was present and has been activated.
    pub async fn apply(&self, payload: &Payload, enabled: EngineSet) -> Result<EngineSet> {
        let mut configs: Vec<(Engine, &EngineConfig)> = Vec::new();
        for engine in enabled.iter() {
            if let Some(config) = engine::extract(payload, engine)? {
                configs.push((engine, config));
            }
        }

        let mut effective = EngineSet::none();
        for (engine, _) in &configs {
            effective.set(*engine, true);
        }

        let mut txn = Transaction::begin(effective);
        info!(
            "Applying configuration (sing-box: {}, awg2: {})",
            effective.singbox, effective.awg2
        );

        // Nothing has been written yet, so a failed backup needs no rollback.
        self.backup(effective).await?;
        txn.advance();

        if let Err(e) = self.root.write(payload).await {
            return Err(self.abort(&mut txn, e).await);
        }
        txn.advance();

        for (engine, config) in &configs {
            if let Err(e) = self.engine_file(*engine).write(*config).await {
                return Err(self.abort(&mut txn, e).await);
            }
            debug!(engine = %engine, "Wrote engine configuration");
        }
        txn.advance();

        if let Err(e) = self.reloader.reload(effective).await {
            return Err(self.abort(&mut txn, e).await);
        }
        txn.advance();

        info!("Configuration applied ({})", txn.stage());
        Ok(effective)
    }

    async fn backup(&self, engines: EngineSet) -> Result<()> {
        self.root.backup().await?;
        for engine in engines.iter() {
            self.engine_file(engine).backup().await?;
        }
        Ok(())
    }

    async fn abort(&self, txn: &mut Transaction, cause: AgentError) -> AgentError {
        let failed_in = txn.roll_back();
        warn!("Apply failed after stage {}: {}", failed_in, cause);

        match self.rollback(txn.engines()).await {
            Ok(()) => {
                info!("Rolled back to previous configuration");
                cause
            }
            Err(rollback) => {
                error!("Rollback failed: {}", rollback);
                AgentError::RollbackFailed {
                    cause: Box::new(cause),
                    rollback: Box::new(rollback),
                }
            }
        }
    }

    /// Restore backups of the root file and `engines`' files, then reload `engines`
    ///
    /// Every step is attempted even if an earlier one fails.
    pub async fn rollback(&self, engines: EngineSet) -> Result<()> {
        let mut failures: Vec<String> = Vec::new();

        if let Err(e) = self.root.restore().await {
            failures.push(e.to_string());
        }
        for engine in engines.iter() {
            if let Err(e) = self.engine_file(engine).restore().await {
                failures.push(e.to_string());
            }
        }
        if let Err(e) = self.reloader.reload(engines).await {
            failures.push(e.to_string());
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Rollback(failures.join("; ")))
        }
    }
}
