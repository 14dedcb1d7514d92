//! Configuration validation functions

use crate::error::{AgentError, Result};
use std::path::Path;

/// Validate the control-plane base URL (http or https, non-empty host)
pub fn validate_base_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .ok_or_else(|| {
            AgentError::Config(format!(
                "API base URL '{}' must start with http:// or https://",
                url
            ))
        })?;

    if rest.trim_end_matches('/').is_empty() {
        return Err(AgentError::Config(format!(
            "API base URL '{}' has no host",
            url
        )));
    }

    Ok(())
}

/// Validate the node token
pub fn validate_node_token(token: &str) -> Result<()> {
    if token.trim().is_empty() {
        return Err(AgentError::Config("Node token cannot be empty".to_string()));
    }
    Ok(())
}

/// Validate an interval in seconds
pub fn validate_interval(secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(AgentError::Config(
            "Interval must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}

/// Validate a managed file path is set
pub fn validate_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(AgentError::Config("File path cannot be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_base_url() {
        assert!(validate_base_url("http://127.0.0.1:8080").is_ok());
        assert!(validate_base_url("https://panel.example.com/").is_ok());
        assert!(validate_base_url("ftp://example.com").is_err());
        assert!(validate_base_url("http://").is_err());
        assert!(validate_base_url("").is_err());
    }

    #[test]
    fn test_validate_node_token() {
        assert!(validate_node_token("abc").is_ok());
        assert!(validate_node_token("  ").is_err());
    }

    #[test]
    fn test_validate_interval() {
        assert!(validate_interval(1).is_ok());
        assert!(validate_interval(0).is_err());
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path(Path::new("/var/lib/x.json")).is_ok());
        assert!(validate_path(Path::new("")).is_err());
    }
}
