//! Managed engines
//!
//! The agent manages exactly two engines per node: the sing-box proxy engine
//! and the AmneziaWG 2 tunnel engine. This module names them, extracts their
//! configuration from a desired-configuration document and probes their
//! versions.

mod extract;
mod probe;

pub use extract::{extract, validate, EngineConfig, Payload};
pub use probe::{probe, ProbeResult, VERSION_MAX_CHARS};

use serde::{Deserialize, Serialize};

/// A managed engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// sing-box proxy engine
    Singbox,
    /// AmneziaWG 2 tunnel engine
    Awg2,
}

impl Engine {
    /// Both engines, in apply order
    pub const ALL: [Engine; 2] = [Engine::Singbox, Engine::Awg2];

    /// Prefix used for `AGENT_<PREFIX>_*` environment variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Singbox => "SINGBOX",
            Self::Awg2 => "AWG2",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Singbox => write!(f, "sing-box"),
            Self::Awg2 => write!(f, "awg2"),
        }
    }
}

/// Which engines take part in an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineSet {
    /// Proxy engine selected
    pub singbox: bool,
    /// Tunnel engine selected
    pub awg2: bool,
}

impl EngineSet {
    /// Create a set from per-engine flags
    pub fn new(singbox: bool, awg2: bool) -> Self {
        Self { singbox, awg2 }
    }

    /// No engines
    pub fn none() -> Self {
        Self::default()
    }

    /// Check whether `engine` is in the set
    pub fn contains(&self, engine: Engine) -> bool {
        match engine {
            Engine::Singbox => self.singbox,
            Engine::Awg2 => self.awg2,
        }
    }

    /// Add or remove `engine`
    pub fn set(&mut self, engine: Engine, selected: bool) {
        match engine {
            Engine::Singbox => self.singbox = selected,
            Engine::Awg2 => self.awg2 = selected,
        }
    }

    /// Selected engines, in apply order
    pub fn iter(&self) -> impl Iterator<Item = Engine> + '_ {
        Engine::ALL.into_iter().filter(|engine| self.contains(*engine))
    }

    /// Check whether no engine is selected
    pub fn is_empty(&self) -> bool {
        !self.singbox && !self.awg2
    }
}

/// Version strings reported in the heartbeat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVersions {
    /// sing-box probe result
    pub singbox: String,
    /// awg2 probe result
    pub awg2: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_display() {
        assert_eq!(Engine::Singbox.to_string(), "sing-box");
        assert_eq!(Engine::Awg2.to_string(), "awg2");
    }

    #[test]
    fn test_engine_set_iteration_order() {
        let set = EngineSet::new(true, true);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Engine::Singbox, Engine::Awg2]);

        let set = EngineSet::new(false, true);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Engine::Awg2]);
        assert!(EngineSet::none().is_empty());
    }

    #[test]
    fn test_engine_set_mutation() {
        let mut set = EngineSet::none();
        set.set(Engine::Awg2, true);
        assert!(set.contains(Engine::Awg2));
        assert!(!set.contains(Engine::Singbox));
        set.set(Engine::Awg2, false);
        assert!(set.is_empty());
    }
}
