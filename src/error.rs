//! Error types for engine-agent
//!
//! This module defines the error types used throughout the application.
//! We use `thiserror` for ergonomic error definitions and `anyhow` for
//! error propagation in the binary.

use thiserror::Error;

/// Main error type for engine-agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Agent configuration errors (env, TOML file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Desired-configuration validation errors; never leave side effects
    #[error("{0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Managed file backup/restore/write errors, with path context
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Process supervision errors
    #[error("{0}")]
    Process(String),

    /// Aggregated service reload errors (one message per failed engine)
    #[error("{0}")]
    Reload(String),

    /// Control-plane API errors
    #[error("API error: {0}")]
    Api(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Restoring the pre-apply state failed (one message per failed step)
    #[error("{0}")]
    Rollback(String),

    /// An apply failed and restoring the previous state failed as well
    #[error("{cause}; rollback failed: {rollback}")]
    RollbackFailed {
        /// The error that aborted the apply
        cause: Box<AgentError>,
        /// The error raised while rolling back
        rollback: Box<AgentError>,
    },
}

impl AgentError {
    /// The error that caused an apply to fail, unwrapping rollback context
    pub fn cause(&self) -> &AgentError {
        match self {
            AgentError::RollbackFailed { cause, .. } => cause,
            other => other,
        }
    }

    /// The rollback failure attached to this error, if any
    pub fn rollback_error(&self) -> Option<&AgentError> {
        match self {
            AgentError::RollbackFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }
}

/// Result type alias using AgentError
pub type Result<T> = std::result::Result<T, AgentError>;

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for AgentError {
    fn from(err: toml::de::Error) -> Self {
        AgentError::Config(format!("Failed to parse TOML config: {}", err))
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Timeout(err.to_string())
        } else {
            AgentError::Api(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_failed_display() {
        let err = AgentError::RollbackFailed {
            cause: Box::new(AgentError::Reload("awg2 process restart failed: empty command".into())),
            rollback: Box::new(AgentError::Store("restore /tmp/x: denied".into())),
        };
        assert_eq!(
            err.to_string(),
            "awg2 process restart failed: empty command; rollback failed: Store error: restore /tmp/x: denied"
        );
        assert!(matches!(err.cause(), AgentError::Reload(_)));
        assert!(err.rollback_error().is_some());
    }

    #[test]
    fn test_plain_error_has_no_rollback() {
        let err = AgentError::Validation("missing inbounds".into());
        assert!(err.rollback_error().is_none());
        assert_eq!(err.cause().to_string(), "missing inbounds");
    }
}
