//! HTTP client for the control plane

use super::types::{
    ApplyOutcome, ApplyResultRequest, DesiredConfiguration, HeartbeatRequest, UsageReport,
};
use super::ControlPlane;
use crate::config::AgentConfig;
use crate::engine::EngineVersions;
use crate::error::{AgentError, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Default timeout for a single control-plane request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Control-plane API client
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    node_token: String,
    http: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `base_url` authenticating with `node_token`
    pub fn new(base_url: &str, node_token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Api(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            node_token: node_token.to_string(),
            http,
        })
    }

    /// Create a client from agent configuration
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(&config.api_base_url, &config.node_token, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Control-plane base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Report traffic used by one user on this node
    pub async fn report_usage(&self, user_uuid: &str, bytes_used: i64, device_hash: &str) -> Result<()> {
        let body = UsageReport {
            node_token: self.node_token.clone(),
            user_uuid: user_uuid.to_string(),
            bytes_used,
            device_hash: device_hash.to_string(),
        };
        self.post_json("report-usage", "/agent/report-usage", &body).await
    }

    async fn post_json<T: Serialize + ?Sized>(&self, op: &str, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self.http.post(&url).json(body).send().await?;
        check_status(op, response).await?;
        Ok(())
    }
}

async fn check_status(op: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AgentError::Api(format!(
        "{} failed: {}: {}",
        op,
        status.as_u16(),
        body
    )))
}

impl ControlPlane for ApiClient {
    async fn heartbeat(&self, versions: &EngineVersions) -> Result<()> {
        let body = HeartbeatRequest::new(&self.node_token, versions);
        self.post_json("heartbeat", "/agent/heartbeat", &body).await
    }

    async fn desired_config(&self) -> Result<DesiredConfiguration> {
        let url = format!("{}/agent/desired-config", self.base_url);
        debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .query(&[("node_token", self.node_token.as_str())])
            .send()
            .await?;
        let response = check_status("desired-config", response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn apply_result(&self, outcome: &ApplyOutcome) -> Result<()> {
        let body = ApplyResultRequest::new(&self.node_token, outcome);
        self.post_json("apply-result", "/agent/apply-result", &body).await
    }
}
