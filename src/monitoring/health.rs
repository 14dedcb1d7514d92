//! Health check implementation

use super::AgentStats;
use tracing::debug;

/// Consecutive fetch failures after which the agent reports unhealthy
pub const FETCH_FAILURE_THRESHOLD: u64 = 3;

/// Health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Agent is healthy
    Healthy,
    /// Agent runs but something needs attention
    Degraded,
    /// Agent cannot reach the control plane or failed to apply
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Overall health status
    pub status: HealthStatus,
    /// Health check timestamp
    pub timestamp: std::time::SystemTime,
    /// Reasons for a non-healthy status
    pub details: Vec<String>,
}

impl HealthCheck {
    /// Create a new health check
    pub fn new(status: HealthStatus) -> Self {
        Self {
            status,
            timestamp: std::time::SystemTime::now(),
            details: Vec::new(),
        }
    }

    /// Check if healthy
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// Check if unhealthy
    pub fn is_unhealthy(&self) -> bool {
        self.status == HealthStatus::Unhealthy
    }

    fn degrade(&mut self, status: HealthStatus, detail: String) {
        if status == HealthStatus::Unhealthy || self.status == HealthStatus::Healthy {
            self.status = status;
        }
        self.details.push(detail);
    }
}

/// Derive health from agent statistics
pub fn check_health(stats: &AgentStats) -> HealthCheck {
    debug!("Performing health check");
    let mut check = HealthCheck::new(HealthStatus::Healthy);

    if stats.consecutive_fetch_failures >= FETCH_FAILURE_THRESHOLD {
        check.degrade(
            HealthStatus::Unhealthy,
            format!(
                "{} consecutive desired-config fetch failures",
                stats.consecutive_fetch_failures
            ),
        );
    }
    if stats.last_apply_ok == Some(false) {
        check.degrade(HealthStatus::Unhealthy, "last apply failed".to_string());
    }
    if stats.last_heartbeat_ok == Some(false) {
        check.degrade(HealthStatus::Degraded, "last heartbeat failed".to_string());
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_agent_is_healthy() {
        assert!(check_health(&AgentStats::default()).is_healthy());
    }

    #[test]
    fn test_failed_apply_is_unhealthy() {
        let stats = AgentStats {
            last_apply_ok: Some(false),
            ..AgentStats::default()
        };
        let check = check_health(&stats);
        assert_eq!(check.status, HealthStatus::Unhealthy);
        assert_eq!(check.details, vec!["last apply failed".to_string()]);
    }

    #[test]
    fn test_failed_heartbeat_degrades() {
        let stats = AgentStats {
            last_heartbeat_ok: Some(false),
            last_apply_ok: Some(true),
            ..AgentStats::default()
        };
        assert_eq!(check_health(&stats).status, HealthStatus::Degraded);
    }

    #[test]
    fn test_fetch_failures_make_unhealthy() {
        let stats = AgentStats {
            consecutive_fetch_failures: FETCH_FAILURE_THRESHOLD,
            last_heartbeat_ok: Some(false),
            ..AgentStats::default()
        };
        let check = check_health(&stats);
        assert!(check.is_unhealthy());
        assert_eq!(check.details.len(), 2);
    }
}
