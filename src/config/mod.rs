//! Snapshot configuration.
//!
//! Loading configuration from files or remote stores is left to the host
//! application; this module only defines the shapes it deserializes into.

use serde::Deserialize;
use thiserror::Error;

/// Errors produced while parsing configuration documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a snapshot records when the evaluator fails for a feature.
///
/// The failure itself is always returned to the caller unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record nothing; the next lookup evaluates again.
    #[default]
    Retry,
    /// Record the feature as disabled for the rest of the request.
    RecordDisabled,
}

/// Options applied to every snapshot a [`FeatureManager`] creates.
///
/// ```rust
/// use flagscope::config::{FailurePolicy, SnapshotConfig};
///
/// let config = SnapshotConfig::from_json(r#"{"failure-policy": "record-disabled"}"#).unwrap();
/// assert_eq!(config.failure_policy, FailurePolicy::RecordDisabled);
/// ```
///
/// [`FeatureManager`]: crate::manager::FeatureManager
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SnapshotConfig {
    pub failure_policy: FailurePolicy,
}

impl SnapshotConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] on malformed input or unknown keys.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_retry() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Retry);
        assert_eq!(SnapshotConfig::default().failure_policy, FailurePolicy::Retry);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = SnapshotConfig::from_json("{}").unwrap();
        assert_eq!(config, SnapshotConfig::default());
    }

    #[test]
    fn parses_kebab_case_policy() {
        let config = SnapshotConfig::from_json(r#"{"failure-policy": "retry"}"#).unwrap();
        assert_eq!(config.failure_policy, FailurePolicy::Retry);
    }

    #[test]
    fn rejects_unknown_policy_and_keys() {
        assert!(SnapshotConfig::from_json(r#"{"failure-policy": "forever"}"#).is_err());
        assert!(SnapshotConfig::from_json(r#"{"ttl": 30}"#).is_err());
    }
}
