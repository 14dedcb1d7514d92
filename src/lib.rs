//! engine-agent: node agent for sing-box and AmneziaWG 2 engines
//!
//! This library keeps the proxy (sing-box) and tunnel (awg2) engines on a node
//! in sync with the desired configuration published by a control plane.
//!
//! # Architecture
//!
//! The agent polls the control plane, and whenever a newer revision is
//! published it validates the document, writes each engine's configuration
//! and reloads the engines, either through systemd or by supervising the
//! engine processes directly. Every apply is transactional: if any step fails
//! the previous files are restored and the engines reloaded on them.
//!
//! # Modules
//!
//! - `config`: Agent configuration (defaults, TOML file, environment)
//! - `engine`: Engine names, configuration extraction and version probing
//! - `store`: Managed files with backup and restore
//! - `supervisor`: PID-file based process supervision
//! - `service`: Service reload strategies (systemd, direct process)
//! - `runtime`: Transactional apply and rollback
//! - `api`: Control-plane client
//! - `agent`: Reconciliation loop
//! - `monitoring`: Health checks and metrics
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

// Process supervision relies on POSIX signals and process groups.
#[cfg(not(unix))]
compile_error!("engine-agent supports unix targets only");

pub mod agent;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod monitoring;
pub mod runtime;
pub mod service;
pub mod store;
pub mod supervisor;

// Re-export commonly used types
pub use error::{AgentError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
