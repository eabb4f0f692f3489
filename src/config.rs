//! Binding-system configuration.
//!
//! All fields have defaults, so an empty JSON object is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BindError, BindResult};

/// Default sentinel suffix marking stream-typed properties.
pub const DEFAULT_STREAM_MARKER: char = '$';

/// Stream registry tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Entry count at which dead entries are swept before inserting.
    pub prune_threshold: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { prune_threshold: 64 }
    }
}

/// Top-level configuration for a [`BindingSystem`](crate::BindingSystem).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingSystemConfig {
    /// Suffix that marks a property as stream-typed.
    pub stream_marker: char,
    /// Only subscribe to the last property of a member chain.
    pub observe_leaf_properties_only: bool,
    #[allow(missing_docs)]
    pub registry: RegistryConfig,
}

impl Default for BindingSystemConfig {
    fn default() -> Self {
        Self {
            stream_marker: DEFAULT_STREAM_MARKER,
            observe_leaf_properties_only: false,
            registry: RegistryConfig::default(),
        }
    }
}

impl BindingSystemConfig {
    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Config`] on malformed JSON or invalid values.
    pub fn from_json_str(s: &str) -> BindResult<Self> {
        let config: Self =
            serde_json::from_str(s).map_err(|e| BindError::config(format!("parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Config`] if the file cannot be read or is invalid.
    pub fn from_json_file(path: impl AsRef<Path>) -> BindResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BindError::config(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::Config`] for a marker that could appear inside
    /// an ordinary identifier or path, or a zero prune threshold.
    pub fn validate(&self) -> BindResult<()> {
        let marker = self.stream_marker;
        if marker.is_alphanumeric() || marker.is_whitespace() || marker == '.' || marker == '_' {
            return Err(BindError::config(format!(
                "stream_marker '{marker}' must not be alphanumeric, whitespace, '.' or '_'"
            )));
        }
        if self.registry.prune_threshold == 0 {
            return Err(BindError::config("registry.prune_threshold must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BindingSystemConfig::default();
        assert_eq!(config.stream_marker, '$');
        assert!(!config.observe_leaf_properties_only);
        assert_eq!(config.registry.prune_threshold, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_object_is_default() {
        let config = BindingSystemConfig::from_json_str("{}").unwrap();
        assert_eq!(config, BindingSystemConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = BindingSystemConfig::from_json_str(
            r#"{"stream_marker": "@", "registry": {"prune_threshold": 8}}"#,
        )
        .unwrap();
        assert_eq!(config.stream_marker, '@');
        assert_eq!(config.registry.prune_threshold, 8);
    }

    #[test]
    fn test_rejects_bad_marker() {
        let err = BindingSystemConfig::from_json_str(r#"{"stream_marker": "a"}"#).unwrap_err();
        assert!(matches!(err, BindError::Config { .. }));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let err = BindingSystemConfig::from_json_str(r#"{"registry": {"prune_threshold": 0}}"#)
            .unwrap_err();
        assert!(matches!(err, BindError::Config { .. }));
    }

    #[test]
    fn test_rejects_unknown_field() {
        assert!(BindingSystemConfig::from_json_str(r#"{"marker": "$"}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = BindingSystemConfig::from_json_file("/nonexistent/streambind.json").unwrap_err();
        assert!(matches!(err, BindError::Config { .. }));
    }
}
