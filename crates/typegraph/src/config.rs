//! Schema configuration.
//!
//! Configuration can be loaded from TOML (for example a `[schema]` section of
//! the host's config file) and converted into [`BuildOptions`].
//!
//! # Example Configuration
//!
//! ```toml
//! [schema]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! auth_mode = "error"
//! ```
//!
//! [`BuildOptions`]: crate::schema::BuildOptions

use serde::{Deserialize, Serialize};

/// What an `authorized` stage does when the caller lacks the required roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Fail the field with an authorization error.
    #[default]
    Error,
    /// Resolve nullable fields to null; non-null fields still fail.
    Null,
}

/// Schema build and execution limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,

    /// Behaviour of `authorized` stages on refusal.
    /// Default: error
    #[serde(default)]
    pub auth_mode: AuthMode,
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
            auth_mode: AuthMode::default(),
        }
    }
}

impl SchemaConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_depth == 0 {
            return Err("schema.max_depth must be > 0".into());
        }
        if self.max_complexity == 0 {
            return Err("schema.max_complexity must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert_eq!(config.max_depth, 15);
        assert_eq!(config.max_complexity, 500);
        assert!(config.introspection);
        assert_eq!(config.auth_mode, AuthMode::Error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_limits() {
        let mut config = SchemaConfig::default();
        config.max_depth = 0;
        assert!(config.validate().is_err());

        let mut config = SchemaConfig::default();
        config.max_complexity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            max_depth = 20
            introspection = false
            auth_mode = "null"
        "#;

        let config: SchemaConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.max_complexity, 500);
        assert!(!config.introspection);
        assert_eq!(config.auth_mode, AuthMode::Null);
    }
}
