//! Control-plane API
//!
//! The agent talks to the control plane over plain JSON/HTTP: it sends
//! heartbeats with the probed engine versions, fetches its desired
//! configuration and reports the result of every apply.

mod client;
mod types;

pub use client::{ApiClient, DEFAULT_REQUEST_TIMEOUT};
pub use types::{
    ApplyOutcome, ApplyResultRequest, ApplyStatus, DesiredConfiguration, HeartbeatRequest,
    UsageReport,
};

use crate::engine::EngineVersions;
use crate::error::Result;

/// Operations the reconciliation loop needs from the control plane
#[allow(async_fn_in_trait)]
pub trait ControlPlane {
    /// Report liveness and engine versions
    async fn heartbeat(&self, versions: &EngineVersions) -> Result<()>;

    /// Fetch the desired configuration of this node
    async fn desired_config(&self) -> Result<DesiredConfiguration>;

    /// Report the outcome of an apply
    async fn apply_result(&self, outcome: &ApplyOutcome) -> Result<()>;
}
