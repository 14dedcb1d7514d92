//! Engine configuration extraction
//!
//! A desired-configuration document is an opaque JSON object. Each engine gets
//! a narrow view over it:
//!
//! - sing-box: the `singbox` object, or (legacy) the whole document when it
//!   carries a root-level `inbounds` key. `singbox` is checked first.
//! - awg2: the `awg2` object, or its alias `amneziawg`.
//!
//! A missing section means "not present", which is not an error by itself.

use crate::engine::{Engine, EngineSet};
use crate::error::{AgentError, Result};
use serde_json::{Map, Value};
use tracing::debug;

/// A desired-configuration document
pub type Payload = Map<String, Value>;

/// One engine's configuration object
pub type EngineConfig = Map<String, Value>;

/// Extract `engine`'s configuration from `payload`
///
/// Returns `Ok(None)` when the payload carries no section for the engine, and
/// an error when the section exists but is not a JSON object.
pub fn extract(payload: &Payload, engine: Engine) -> Result<Option<&EngineConfig>> {
    match engine {
        Engine::Singbox => extract_singbox(payload),
        Engine::Awg2 => extract_awg2(payload),
    }
}

fn extract_singbox(payload: &Payload) -> Result<Option<&EngineConfig>> {
    if let Some(raw) = payload.get("singbox") {
        return as_object(raw, "singbox").map(Some);
    }
    if payload.contains_key("inbounds") {
        debug!("Using root payload as sing-box config (legacy layout)");
        return Ok(Some(payload));
    }
    Ok(None)
}

fn extract_awg2(payload: &Payload) -> Result<Option<&EngineConfig>> {
    for key in ["awg2", "amneziawg"] {
        if let Some(raw) = payload.get(key) {
            return as_object(raw, key).map(Some);
        }
    }
    Ok(None)
}

fn as_object<'a>(value: &'a Value, field: &str) -> Result<&'a EngineConfig> {
    value.as_object().ok_or_else(|| {
        AgentError::Validation(format!("{} config validation failed: expected object", field))
    })
}

/// Validate a desired-configuration document for the enabled engines
///
/// At least one enabled engine must have a configuration present, and a
/// present sing-box configuration must carry `inbounds`. Nothing else about
/// the document is checked.
pub fn validate(payload: &Payload, enabled: EngineSet) -> Result<()> {
    let mut has_engine_config = false;

    for engine in enabled.iter() {
        let Some(config) = extract(payload, engine)? else {
            continue;
        };
        has_engine_config = true;

        if engine == Engine::Singbox && !config.contains_key("inbounds") {
            return Err(AgentError::Validation(
                "sing-box config validation failed: missing inbounds".to_string(),
            ));
        }
    }

    if !has_engine_config {
        return Err(AgentError::Validation(
            "config validation failed: no engine config found (`singbox`, root sing-box fields, or `awg2`)"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().expect("test payload must be an object")
    }

    #[test]
    fn test_singbox_section() {
        let doc = payload(json!({"singbox": {"inbounds": []}, "log": {}}));
        let config = extract(&doc, Engine::Singbox).unwrap().unwrap();
        assert!(config.contains_key("inbounds"));
        assert!(!config.contains_key("log"));
    }

    #[test]
    fn test_singbox_legacy_root() {
        let doc = payload(json!({"inbounds": [{"type": "mixed"}], "outbounds": []}));
        let config = extract(&doc, Engine::Singbox).unwrap().unwrap();
        assert_eq!(config, &doc);
    }

    #[test]
    fn test_singbox_section_wins_over_root_inbounds() {
        let doc = payload(json!({"singbox": {"inbounds": [1]}, "inbounds": [2]}));
        let config = extract(&doc, Engine::Singbox).unwrap().unwrap();
        assert_eq!(config.get("inbounds"), Some(&json!([1])));
    }

    #[test]
    fn test_singbox_section_must_be_object() {
        let doc = payload(json!({"singbox": "inbounds"}));
        let err = extract(&doc, Engine::Singbox).unwrap_err();
        assert_eq!(err.to_string(), "singbox config validation failed: expected object");
    }

    #[test]
    fn test_awg2_alias() {
        let doc = payload(json!({"amneziawg": {"peers": []}}));
        assert!(extract(&doc, Engine::Awg2).unwrap().is_some());

        let doc = payload(json!({"awg2": {"a": 1}, "amneziawg": {"b": 2}}));
        let config = extract(&doc, Engine::Awg2).unwrap().unwrap();
        assert!(config.contains_key("a"));
    }

    #[test]
    fn test_awg2_alias_must_be_object() {
        let doc = payload(json!({"amneziawg": [1, 2]}));
        let err = extract(&doc, Engine::Awg2).unwrap_err();
        assert_eq!(err.to_string(), "amneziawg config validation failed: expected object");
    }

    #[test]
    fn test_absent_sections() {
        let doc = payload(json!({"outbounds": []}));
        assert!(extract(&doc, Engine::Singbox).unwrap().is_none());
        assert!(extract(&doc, Engine::Awg2).unwrap().is_none());
    }

    #[test]
    fn test_validate_no_engine_config() {
        let doc = payload(json!({"route": {}}));
        let err = validate(&doc, EngineSet::new(true, true)).unwrap_err();
        assert!(err.to_string().contains("no engine config found"));
    }

    #[test]
    fn test_validate_awg2_only() {
        let doc = payload(json!({"awg2": {"peers": []}}));
        assert!(validate(&doc, EngineSet::new(false, true)).is_ok());
    }

    #[test]
    fn test_validate_ignores_disabled_engines() {
        // the only present section belongs to a disabled engine
        let doc = payload(json!({"awg2": {"peers": []}}));
        assert!(validate(&doc, EngineSet::new(true, false)).is_err());

        // a malformed section of a disabled engine is never looked at
        let doc = payload(json!({"awg2": {}, "singbox": 7}));
        assert!(validate(&doc, EngineSet::new(false, true)).is_ok());
    }

    #[test]
    fn test_validate_requires_inbounds() {
        let doc = payload(json!({"singbox": {"outbounds": []}, "awg2": {}}));
        let err = validate(&doc, EngineSet::new(true, true)).unwrap_err();
        assert_eq!(err.to_string(), "sing-box config validation failed: missing inbounds");
    }

    #[test]
    fn test_validate_nothing_enabled() {
        let doc = payload(json!({"singbox": {"inbounds": []}}));
        assert!(validate(&doc, EngineSet::none()).is_err());
    }
}
