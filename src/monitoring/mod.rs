//! Monitoring and observability
//!
//! The reconciliation loop records what happened on every tick into a shared
//! [`Monitor`]; the status endpoint reads it back as health and metrics.

use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;
use tracing::debug;

mod health;
mod metrics;

pub use health::{check_health, HealthCheck, HealthStatus, FETCH_FAILURE_THRESHOLD};
pub use metrics::{export_json, export_prometheus, MetricType};

use crate::engine::EngineVersions;

/// Counters and last-seen values of the agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStats {
    /// Successful heartbeats
    pub heartbeat_successes: u64,
    /// Failed heartbeats
    pub heartbeat_failures: u64,
    /// Whether the most recent heartbeat succeeded
    pub last_heartbeat_ok: Option<bool>,
    /// Failed desired-config fetches
    pub fetch_failures: u64,
    /// Fetch failures since the last successful fetch
    pub consecutive_fetch_failures: u64,
    /// Revision of the last fetched desired configuration
    pub desired_revision: Option<i64>,
    /// Revision most recently applied by this agent
    pub applied_revision: Option<i64>,
    /// Successful applies
    pub apply_successes: u64,
    /// Failed applies
    pub apply_failures: u64,
    /// Failed rollbacks
    pub rollback_failures: u64,
    /// Whether the most recent apply succeeded
    pub last_apply_ok: Option<bool>,
    /// Latest sing-box probe result
    pub singbox_version: Option<String>,
    /// Latest awg2 probe result
    pub awg2_version: Option<String>,
    /// When the last tick finished
    pub last_tick: Option<SystemTime>,
}

/// Thread-safe store for agent statistics
#[derive(Debug, Default)]
pub struct Monitor {
    stats: RwLock<AgentStats>,
}

impl Monitor {
    /// Create a new monitor
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F: FnOnce(&mut AgentStats)>(&self, f: F) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }

    /// Record the latest probe results
    pub fn record_versions(&self, versions: &EngineVersions) {
        self.update(|stats| {
            stats.singbox_version = Some(versions.singbox.clone());
            stats.awg2_version = Some(versions.awg2.clone());
        });
    }

    /// Record a heartbeat outcome
    pub fn record_heartbeat(&self, ok: bool) {
        self.update(|stats| {
            if ok {
                stats.heartbeat_successes += 1;
            } else {
                stats.heartbeat_failures += 1;
            }
            stats.last_heartbeat_ok = Some(ok);
        });
    }

    /// Record a successful desired-config fetch
    pub fn record_fetch(&self, desired_revision: i64) {
        self.update(|stats| {
            stats.consecutive_fetch_failures = 0;
            stats.desired_revision = Some(desired_revision);
        });
    }

    /// Record a failed desired-config fetch
    pub fn record_fetch_failure(&self) {
        self.update(|stats| {
            stats.fetch_failures += 1;
            stats.consecutive_fetch_failures += 1;
        });
    }

    /// Record an apply outcome
    pub fn record_apply(&self, revision: i64, ok: bool, rollback_failed: bool) {
        self.update(|stats| {
            if ok {
                stats.apply_successes += 1;
                stats.applied_revision = Some(revision);
            } else {
                stats.apply_failures += 1;
            }
            if rollback_failed {
                stats.rollback_failures += 1;
            }
            stats.last_apply_ok = Some(ok);
        });
        debug!("Recorded apply of revision {} (ok: {})", revision, ok);
    }

    /// Mark the end of a reconciliation tick
    pub fn record_tick(&self) {
        self.update(|stats| stats.last_tick = Some(SystemTime::now()));
    }

    /// Snapshot of the current statistics
    pub fn stats(&self) -> AgentStats {
        self.stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Perform health check
    pub fn health_check(&self) -> HealthCheck {
        check_health(&self.stats())
    }

    /// Export statistics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        export_prometheus(&self.stats())
    }
}
