use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use typegraph::SchemaConfig;

/// The parts of a config file the CLI reads. Unknown sections are ignored
/// so the file can be shared with a host application.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub schema: SchemaConfig,
}

/// Loads and validates the `[schema]` section, falling back to defaults
/// when no file is given.
pub fn load(path: Option<&Path>) -> Result<SchemaConfig> {
    let Some(path) = path else {
        return Ok(SchemaConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read config file {}", path.display()))?;
    parse(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

fn parse(content: &str) -> Result<SchemaConfig> {
    let cfg: CliConfig = toml::from_str(content)?;
    cfg.schema.validate().map_err(|e| anyhow!(e))?;
    Ok(cfg.schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use typegraph::AuthMode;

    #[test]
    fn test_missing_section_uses_defaults() {
        let config = parse("[server]\nport = 8080\n").unwrap();
        assert_eq!(config, SchemaConfig::default());
    }

    #[test]
    fn test_schema_section() {
        let config = parse(
            r#"
[schema]
max_depth = 8
introspection = false
auth_mode = "null"
"#,
        )
        .unwrap();
        assert_eq!(config.max_depth, 8);
        assert_eq!(config.max_complexity, 500);
        assert!(!config.introspection);
        assert_eq!(config.auth_mode, AuthMode::Null);
    }

    #[test]
    fn test_invalid_limits_are_rejected() {
        let err = parse("[schema]\nmax_depth = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_no_file_means_defaults() {
        assert_eq!(load(None).unwrap(), SchemaConfig::default());
    }
}
