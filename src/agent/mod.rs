//! Reconciliation loop
//!
//! Every tick the agent probes the local engines, sends a heartbeat, fetches
//! its desired configuration and applies it when the control plane reports a
//! newer revision than the one applied. Ticks never overlap.

use crate::api::{ApplyOutcome, ControlPlane, DesiredConfiguration};
use crate::config::AgentConfig;
use crate::error::Result;
use crate::monitoring::Monitor;
use crate::runtime::Manager;
use crate::store;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Drives the local engines towards the control plane's desired state
pub struct Reconciler<C> {
    client: C,
    manager: Manager,
    monitor: Arc<Monitor>,
    desired_path: PathBuf,
    interval: Duration,
}

impl<C: ControlPlane> Reconciler<C> {
    /// Create a reconciler
    pub fn new(client: C, manager: Manager, config: &AgentConfig) -> Self {
        Self {
            client,
            manager,
            monitor: Arc::new(Monitor::new()),
            desired_path: config.desired_path.clone(),
            interval: config.heartbeat_interval(),
        }
    }

    /// Share an existing monitor, e.g. one served by the status endpoint
    pub fn with_monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    /// Statistics recorded by this reconciler
    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::clone(&self.monitor)
    }

    /// Control-plane client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Run one reconciliation pass
    ///
    /// Returns the apply outcome when a new revision was attempted.
    pub async fn tick(&self) -> Option<ApplyOutcome> {
        let versions = self.manager.engine_versions().await;
        debug!(
            "Engine versions (sing-box: {}, awg2: {})",
            versions.singbox, versions.awg2
        );
        self.monitor.record_versions(&versions);

        match self.client.heartbeat(&versions).await {
            Ok(()) => self.monitor.record_heartbeat(true),
            Err(e) => {
                warn!("Heartbeat failed: {}", e);
                self.monitor.record_heartbeat(false);
            }
        }

        let outcome = match self.client.desired_config().await {
            Ok(desired) => {
                self.monitor.record_fetch(desired.revision);
                self.reconcile(&desired).await
            }
            Err(e) => {
                warn!("Fetching desired configuration failed: {}", e);
                self.monitor.record_fetch_failure();
                None
            }
        };

        self.monitor.record_tick();
        outcome
    }

    async fn reconcile(&self, desired: &DesiredConfiguration) -> Option<ApplyOutcome> {
        if let Err(e) = store::write_json(&self.desired_path, &desired.payload).await {
            warn!(
                "Failed to persist desired configuration to {}: {}",
                self.desired_path.display(),
                e
            );
        }

        if !desired.needs_apply() {
            debug!(
                revision = desired.revision,
                "Desired revision already applied ({})", desired.applied_revision
            );
            return None;
        }

        let outcome = self.apply_revision(desired).await;
        if let Err(e) = self.client.apply_result(&outcome).await {
            warn!(revision = outcome.revision, "Reporting apply result failed: {}", e);
        }
        Some(outcome)
    }

    /// Validate and apply `desired`, recording the outcome
    pub async fn apply_revision(&self, desired: &DesiredConfiguration) -> ApplyOutcome {
        info!(revision = desired.revision, "Applying new desired configuration");
        let enabled = desired.enabled();

        let result: Result<()> = match self.manager.validate(&desired.payload, enabled) {
            Ok(()) => self.manager.apply(&desired.payload, enabled).await.map(|_| ()),
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(()) => {
                info!(revision = desired.revision, "Desired configuration applied");
                ApplyOutcome::success(desired.revision)
            }
            Err(e) => {
                error!(revision = desired.revision, "Apply failed: {}", e);
                ApplyOutcome::failed(desired.revision, &e)
            }
        };

        let rollback_failed = outcome.details.contains_key("rollback_error");
        self.monitor
            .record_apply(outcome.revision, outcome.is_success(), rollback_failed);
        outcome
    }

    /// Run ticks at the heartbeat interval until `shutdown` resolves
    pub async fn run<F: Future<Output = ()>>(&self, shutdown: F) {
        info!(
            "Reconciliation loop started (interval: {:?})",
            self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Reconciliation loop stopped");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }
}
