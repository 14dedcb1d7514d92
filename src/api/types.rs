//! Control-plane wire types

use crate::engine::{EngineSet, EngineVersions, Payload};
use crate::error::AgentError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Desired state of this node as published by the control plane
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredConfiguration {
    /// Node identifier
    #[serde(default)]
    pub node_id: String,
    /// Revision of the desired configuration
    #[serde(rename = "desired_config_revision")]
    pub revision: i64,
    /// Revision the control plane last saw applied
    #[serde(rename = "applied_config_revision")]
    pub applied_revision: i64,
    /// Whether the tunnel engine is enabled
    #[serde(rename = "engine_awg2_enabled", default)]
    pub awg2_enabled: bool,
    /// Whether the proxy engine is enabled
    #[serde(rename = "engine_singbox_enabled", default)]
    pub singbox_enabled: bool,
    /// The desired-configuration document
    #[serde(rename = "desired_config", default, deserialize_with = "null_as_empty")]
    pub payload: Payload,
}

impl DesiredConfiguration {
    /// Check whether this revision is newer than what is applied
    pub fn needs_apply(&self) -> bool {
        self.revision > self.applied_revision
    }

    /// Engines enabled for this node
    pub fn enabled(&self) -> EngineSet {
        EngineSet::new(self.singbox_enabled, self.awg2_enabled)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// Heartbeat request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    /// Node credential
    pub node_token: String,
    /// awg2 probe result
    pub engine_awg2_version: String,
    /// sing-box probe result
    pub engine_singbox_version: String,
}

impl HeartbeatRequest {
    /// Build a heartbeat from probe results
    pub fn new(node_token: &str, versions: &EngineVersions) -> Self {
        Self {
            node_token: node_token.to_string(),
            engine_awg2_version: versions.awg2.clone(),
            engine_singbox_version: versions.singbox.clone(),
        }
    }
}

/// Apply status reported to the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyStatus {
    /// The revision is live
    Success,
    /// The revision was rejected or rolled back
    Failed,
}

impl std::fmt::Display for ApplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of applying one revision
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyOutcome {
    /// Apply status
    pub status: ApplyStatus,
    /// Revision that was attempted
    pub revision: i64,
    /// Free-form details; `error` and `rollback_error` on failure
    pub details: Map<String, Value>,
}

impl ApplyOutcome {
    /// Successful apply of `revision`
    pub fn success(revision: i64) -> Self {
        Self {
            status: ApplyStatus::Success,
            revision,
            details: Map::new(),
        }
    }

    /// Failed apply of `revision`
    pub fn failed(revision: i64, err: &AgentError) -> Self {
        let mut details = Map::new();
        details.insert("error".to_string(), Value::from(err.cause().to_string()));
        if let Some(rollback) = err.rollback_error() {
            details.insert("rollback_error".to_string(), Value::from(rollback.to_string()));
        }
        Self {
            status: ApplyStatus::Failed,
            revision,
            details,
        }
    }

    /// Check if the apply succeeded
    pub fn is_success(&self) -> bool {
        self.status == ApplyStatus::Success
    }

    /// The reported error message, if any
    pub fn error(&self) -> Option<&str> {
        self.details.get("error").and_then(Value::as_str)
    }
}

/// Apply-result request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResultRequest {
    /// Node credential
    pub node_token: String,
    /// Revision the result refers to
    pub applied_config_revision: i64,
    /// Apply status
    pub status: ApplyStatus,
    /// Result details
    pub details: Map<String, Value>,
}

impl ApplyResultRequest {
    /// Build the request for `outcome`
    pub fn new(node_token: &str, outcome: &ApplyOutcome) -> Self {
        Self {
            node_token: node_token.to_string(),
            applied_config_revision: outcome.revision,
            status: outcome.status,
            details: outcome.details.clone(),
        }
    }
}

/// Per-user traffic usage report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Node credential
    pub node_token: String,
    /// User the traffic belongs to
    pub user_uuid: String,
    /// Bytes transferred
    pub bytes_used: i64,
    /// Hash identifying the user's device
    pub device_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_desired_configuration_from_wire() {
        let desired: DesiredConfiguration = serde_json::from_value(json!({
            "node_id": "node-1",
            "desired_config_revision": 4,
            "applied_config_revision": 3,
            "engine_awg2_enabled": true,
            "engine_singbox_enabled": false,
            "desired_config": {"awg2": {"peers": []}}
        }))
        .unwrap();

        assert!(desired.needs_apply());
        assert_eq!(desired.enabled(), EngineSet::new(false, true));
        assert!(desired.payload.contains_key("awg2"));
    }

    #[test]
    fn test_null_desired_config_is_empty() {
        let desired: DesiredConfiguration = serde_json::from_value(json!({
            "node_id": "node-1",
            "desired_config_revision": 2,
            "applied_config_revision": 2,
            "desired_config": null
        }))
        .unwrap();

        assert!(!desired.needs_apply());
        assert!(desired.payload.is_empty());
        assert!(desired.enabled().is_empty());
    }

    #[test]
    fn test_failed_outcome_carries_rollback_error() {
        let err = AgentError::RollbackFailed {
            cause: Box::new(AgentError::Reload("awg2 systemd restart failed: exit status: 1".into())),
            rollback: Box::new(AgentError::Rollback("restore failed".into())),
        };
        let outcome = ApplyOutcome::failed(9, &err);

        assert!(!outcome.is_success());
        assert_eq!(outcome.error(), Some("awg2 systemd restart failed: exit status: 1"));
        assert_eq!(outcome.details["rollback_error"], "restore failed");
    }

    #[test]
    fn test_apply_result_request_wire_format() {
        let request = ApplyResultRequest::new("tok", &ApplyOutcome::success(5));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "node_token": "tok",
                "applied_config_revision": 5,
                "status": "success",
                "details": {}
            })
        );
    }
}
