//! Apply transaction stages

use crate::engine::EngineSet;
use tracing::debug;

/// Progress of a single apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    /// Nothing touched yet
    Idle,
    /// Every file that will be written has a fresh backup
    BackedUp,
    /// Root configuration replaced
    RootWritten,
    /// Every effective engine's configuration replaced
    EngineConfigsWritten,
    /// Engines restarted on the new configuration
    ServicesReloaded,
    /// A step failed and the previous state was restored
    RolledBack,
}

impl ApplyStage {
    /// The stage a successful step leads to
    pub fn next(&self) -> Option<ApplyStage> {
        match self {
            Self::Idle => Some(Self::BackedUp),
            Self::BackedUp => Some(Self::RootWritten),
            Self::RootWritten => Some(Self::EngineConfigsWritten),
            Self::EngineConfigsWritten => Some(Self::ServicesReloaded),
            Self::ServicesReloaded | Self::RolledBack => None,
        }
    }
}

impl std::fmt::Display for ApplyStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::BackedUp => write!(f, "backed-up"),
            Self::RootWritten => write!(f, "root-written"),
            Self::EngineConfigsWritten => write!(f, "engine-configs-written"),
            Self::ServicesReloaded => write!(f, "services-reloaded"),
            Self::RolledBack => write!(f, "rolled-back"),
        }
    }
}

/// Tracks one apply from backup to reload or rollback
#[derive(Debug, Clone)]
pub struct Transaction {
    stage: ApplyStage,
    engines: EngineSet,
}

impl Transaction {
    /// Start a transaction for the effective engines
    pub fn begin(engines: EngineSet) -> Self {
        Self {
            stage: ApplyStage::Idle,
            engines,
        }
    }

    /// Current stage
    pub fn stage(&self) -> ApplyStage {
        self.stage
    }

    /// Engines touched by this transaction
    pub fn engines(&self) -> EngineSet {
        self.engines
    }

    /// Move to the next forward stage
    pub fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            debug!("Apply stage: {} -> {}", self.stage, next);
            self.stage = next;
        }
    }

    /// Mark the transaction as rolled back; returns the stage it failed in
    pub fn roll_back(&mut self) -> ApplyStage {
        let failed_in = self.stage;
        debug!("Apply stage: {} -> {}", self.stage, ApplyStage::RolledBack);
        self.stage = ApplyStage::RolledBack;
        failed_in
    }
}
