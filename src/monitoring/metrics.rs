//! Metrics export
//!
//! This module renders [`AgentStats`] in Prometheus text format and as JSON.

use super::AgentStats;

/// Metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// Successful heartbeats
    HeartbeatSuccess,
    /// Failed heartbeats
    HeartbeatFailure,
    /// Failed desired-config fetches
    FetchFailure,
    /// Successful applies
    ApplySuccess,
    /// Failed applies
    ApplyFailure,
    /// Failed rollbacks
    RollbackFailure,
    /// Last fetched desired revision
    DesiredRevision,
    /// Last applied revision
    AppliedRevision,
}

impl MetricType {
    /// All metrics, in export order
    pub const ALL: [MetricType; 8] = [
        Self::HeartbeatSuccess,
        Self::HeartbeatFailure,
        Self::FetchFailure,
        Self::ApplySuccess,
        Self::ApplyFailure,
        Self::RollbackFailure,
        Self::DesiredRevision,
        Self::AppliedRevision,
    ];

    /// Get metric help text
    pub fn help_text(&self) -> &'static str {
        match self {
            Self::HeartbeatSuccess => "Total successful heartbeats",
            Self::HeartbeatFailure => "Total failed heartbeats",
            Self::FetchFailure => "Total failed desired-config fetches",
            Self::ApplySuccess => "Total successful configuration applies",
            Self::ApplyFailure => "Total failed configuration applies",
            Self::RollbackFailure => "Total failed rollbacks",
            Self::DesiredRevision => "Revision of the last fetched desired configuration",
            Self::AppliedRevision => "Revision last applied by this agent",
        }
    }

    /// Get metric type (counter, gauge)
    pub fn metric_kind(&self) -> &'static str {
        match self {
            Self::DesiredRevision | Self::AppliedRevision => "gauge",
            _ => "counter",
        }
    }

    /// Current value, if the metric has one yet
    pub fn value(&self, stats: &AgentStats) -> Option<f64> {
        match self {
            Self::HeartbeatSuccess => Some(stats.heartbeat_successes as f64),
            Self::HeartbeatFailure => Some(stats.heartbeat_failures as f64),
            Self::FetchFailure => Some(stats.fetch_failures as f64),
            Self::ApplySuccess => Some(stats.apply_successes as f64),
            Self::ApplyFailure => Some(stats.apply_failures as f64),
            Self::RollbackFailure => Some(stats.rollback_failures as f64),
            Self::DesiredRevision => stats.desired_revision.map(|r| r as f64),
            Self::AppliedRevision => stats.applied_revision.map(|r| r as f64),
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HeartbeatSuccess => write!(f, "engine_agent_heartbeat_success_total"),
            Self::HeartbeatFailure => write!(f, "engine_agent_heartbeat_failure_total"),
            Self::FetchFailure => write!(f, "engine_agent_fetch_failure_total"),
            Self::ApplySuccess => write!(f, "engine_agent_apply_success_total"),
            Self::ApplyFailure => write!(f, "engine_agent_apply_failure_total"),
            Self::RollbackFailure => write!(f, "engine_agent_rollback_failure_total"),
            Self::DesiredRevision => write!(f, "engine_agent_desired_revision"),
            Self::AppliedRevision => write!(f, "engine_agent_applied_revision"),
        }
    }
}

/// Export statistics in Prometheus text format
pub fn export_prometheus(stats: &AgentStats) -> String {
    let mut output = String::new();

    output.push_str("# HELP engine_agent_info Agent information\n");
    output.push_str("# TYPE engine_agent_info gauge\n");
    output.push_str(&format!(
        "engine_agent_info{{version=\"{}\",singbox=\"{}\",awg2=\"{}\"}} 1\n",
        crate::VERSION,
        escape_label(stats.singbox_version.as_deref().unwrap_or("")),
        escape_label(stats.awg2_version.as_deref().unwrap_or("")),
    ));

    for metric in MetricType::ALL {
        let Some(value) = metric.value(stats) else {
            continue;
        };
        output.push_str(&format!("# HELP {} {}\n", metric, metric.help_text()));
        output.push_str(&format!("# TYPE {} {}\n", metric, metric.metric_kind()));
        output.push_str(&format!("{} {}\n", metric, value));
    }

    output
}

/// Export statistics as JSON
pub fn export_json(stats: &AgentStats) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for metric in MetricType::ALL {
        map.insert(
            metric.to_string(),
            metric.value(stats).map_or(serde_json::Value::Null, serde_json::Value::from),
        );
    }
    map.insert("singbox_version".to_string(), stats.singbox_version.clone().into());
    map.insert("awg2_version".to_string(), stats.awg2_version.clone().into());
    serde_json::Value::Object(map)
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
