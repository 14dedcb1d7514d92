//! `AGENT_*` environment overlay
//!
//! Empty values are treated as unset. Numeric values that fail to parse, or
//! parse to zero, are ignored and the previous value is kept.

use crate::config::{AgentConfig, EngineSettings};
use crate::engine::Engine;
use crate::service::RuntimeMode;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Overlay variables from the process environment
pub fn apply_env(config: &mut AgentConfig) {
    apply_env_with(config, |key| std::env::var(key).ok());
}

/// Overlay variables resolved through `lookup`
pub fn apply_env_with<F>(config: &mut AgentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

    if let Some(value) = get("AGENT_API_BASE_URL") {
        config.api_base_url = value;
    }
    if let Some(value) = get("AGENT_NODE_TOKEN") {
        config.node_token = value;
    }
    if let Some(secs) = get("AGENT_HEARTBEAT_INTERVAL_SEC")
        .and_then(|v| positive::<u64>("AGENT_HEARTBEAT_INTERVAL_SEC", &v))
    {
        config.heartbeat_interval_secs = secs;
    }
    if let Some(secs) = get("AGENT_PROBE_TIMEOUT_SEC")
        .and_then(|v| positive::<u64>("AGENT_PROBE_TIMEOUT_SEC", &v))
    {
        config.probe_timeout_secs = secs;
    }
    if let Some(ms) = get("AGENT_STOP_GRACE_MS")
        .and_then(|v| positive::<u64>("AGENT_STOP_GRACE_MS", &v))
    {
        config.stop_grace_ms = ms;
    }
    if let Some(value) = get("AGENT_DESIRED_PATH") {
        config.desired_path = PathBuf::from(value);
    }
    if let Some(value) = get("AGENT_CONFIG_PATH") {
        config.config_path = PathBuf::from(value);
    }
    if let Some(value) = get("AGENT_BACKUP_PATH") {
        config.backup_path = PathBuf::from(value);
    }
    if let Some(value) = get("AGENT_RUNTIME_MODE") {
        config.runtime_mode = RuntimeMode::from(value);
    }
    if let Some(value) = get("AGENT_SYSTEMCTL") {
        config.systemctl = value;
    }
    if let Some(value) = get("AGENT_STATUS_ADDR") {
        config.status_addr = Some(value);
    }

    for engine in Engine::ALL {
        apply_engine_env(config.engine_mut(engine), engine, &get);
    }
}

fn apply_engine_env<F>(settings: &mut EngineSettings, engine: Engine, get: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = engine.env_prefix();
    let key = |suffix: &str| format!("AGENT_{}_{}", prefix, suffix);

    if let Some(value) = get(&key("CONFIG_PATH")) {
        settings.config_path = PathBuf::from(value);
    }
    if let Some(value) = get(&key("BACKUP_PATH")) {
        settings.backup_path = PathBuf::from(value);
    }
    if let Some(value) = get(&key("RUN_COMMAND")) {
        settings.run_command = value;
    }
    if let Some(value) = get(&key("VERSION_COMMAND")) {
        settings.version_command = value;
    }
    if let Some(value) = get(&key("PID_PATH")) {
        settings.pid_path = PathBuf::from(value);
    }
    if let Some(value) = get(&format!("AGENT_SYSTEMD_{}_SERVICE", prefix)) {
        settings.systemd_unit = value;
    }
}

fn positive<T>(key: &str, raw: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
