//! Options for binding and assembly.

use std::fmt;
use std::sync::Arc;

use crate::config::SchemaConfig;
use crate::resolvers::{AuthChecker, Container, Stage};

/// Everything the resolver binder and schema assembler need beyond the
/// type graph.
#[derive(Clone, Default)]
pub struct BuildOptions {
    /// Limits and authorization behaviour.
    pub config: SchemaConfig,
    /// Stages applied to every resolver, before class and field stages.
    pub global_stages: Vec<Stage>,
    /// Checker consulted by `authorized` stages.
    pub auth_checker: Option<Arc<dyn AuthChecker>>,
    /// Dependency container for injected parameters.
    pub container: Option<Arc<dyn Container>>,
}

impl BuildOptions {
    /// Creates options with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options from a loaded configuration.
    #[must_use]
    pub fn from_config(config: SchemaConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SchemaConfig) -> Self {
        self.config = config;
        self
    }

    /// Appends a global stage.
    #[must_use]
    pub fn with_global_stage(mut self, stage: Stage) -> Self {
        self.global_stages.push(stage);
        self
    }

    /// Sets the auth checker.
    #[must_use]
    pub fn with_auth_checker(mut self, checker: impl AuthChecker) -> Self {
        self.auth_checker = Some(Arc::new(checker));
        self
    }

    /// Sets the dependency container.
    #[must_use]
    pub fn with_container(mut self, container: impl Container) -> Self {
        self.container = Some(Arc::new(container));
        self
    }
}

impl fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("config", &self.config)
            .field("global_stages", &self.global_stages)
            .field("auth_checker", &self.auth_checker.is_some())
            .field("container", &self.container.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthMode;
    use crate::resolvers::RoleChecker;

    #[test]
    fn test_builder_methods() {
        let config = SchemaConfig {
            auth_mode: AuthMode::Null,
            ..SchemaConfig::default()
        };
        let options = BuildOptions::from_config(config)
            .with_global_stage(Stage::authorized(["USER"]))
            .with_auth_checker(RoleChecker);

        assert_eq!(options.config.auth_mode, AuthMode::Null);
        assert_eq!(options.global_stages.len(), 1);
        assert!(options.auth_checker.is_some());
        assert!(options.container.is_none());
        assert!(format!("{options:?}").contains("auth_checker: true"));
    }
}
