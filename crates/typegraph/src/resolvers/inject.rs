//! Dependency injection.
//!
//! Resolvers name dependencies by token with [`ParameterSource::Inject`].
//! The host supplies a [`Container`] through the build options; tokens whose
//! [`Scope`] is `Singleton` are resolved once per schema and cached.
//!
//! [`ParameterSource::Inject`]: super::ParameterSource::Inject

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::context::GraphContext;
use crate::error::ResolverError;

/// A resolved dependency instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Lifetime of a resolved instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Resolved once per assembled schema.
    Singleton,
    /// Resolved on every invocation.
    #[default]
    Transient,
}

/// Errors returned by a [`Container`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    /// No provider is registered for the token.
    #[error("no provider registered for '{0}'")]
    UnknownToken(String),

    /// The provider failed.
    #[error("provider for '{token}' failed: {message}")]
    Failed {
        /// Token being resolved.
        token: String,
        /// Provider message.
        message: String,
    },
}

/// Resolves dependency tokens to instances.
#[async_trait]
pub trait Container: Send + Sync + 'static {
    /// Resolves `token` for the current request.
    async fn resolve(
        &self,
        token: &str,
        context: &GraphContext,
    ) -> Result<Instance, ContainerError>;

    /// Returns the scope of `token`. Defaults to transient.
    fn scope(&self, _token: &str) -> Scope {
        Scope::Transient
    }
}

type Factory = Arc<dyn Fn(&GraphContext) -> Result<Instance, ContainerError> + Send + Sync>;

#[derive(Clone)]
enum Provider {
    Value(Instance),
    Factory { factory: Factory, scope: Scope },
}

/// A simple token-keyed container.
///
/// ```ignore
/// let container = ServiceContainer::new()
///     .with_value("recipes", RecipeStore::default())
///     .with_factory("clock", Scope::Transient, |_| Ok(SystemClock::now()));
/// ```
#[derive(Clone, Default)]
pub struct ServiceContainer {
    providers: HashMap<String, Provider>,
}

impl ServiceContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a shared instance.
    #[must_use]
    pub fn with_value<T: Any + Send + Sync>(mut self, token: impl Into<String>, value: T) -> Self {
        self.providers
            .insert(token.into(), Provider::Value(Arc::new(value)));
        self
    }

    /// Registers a factory invoked according to `scope`.
    #[must_use]
    pub fn with_factory<T, F>(mut self, token: impl Into<String>, scope: Scope, factory: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&GraphContext) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |ctx| factory(ctx).map(|v| Arc::new(v) as Instance));
        self.providers
            .insert(token.into(), Provider::Factory { factory, scope });
        self
    }

    /// Returns `true` if a provider is registered for `token`.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.providers.contains_key(token)
    }
}

#[async_trait]
impl Container for ServiceContainer {
    async fn resolve(
        &self,
        token: &str,
        context: &GraphContext,
    ) -> Result<Instance, ContainerError> {
        match self.providers.get(token) {
            Some(Provider::Value(instance)) => Ok(Arc::clone(instance)),
            Some(Provider::Factory { factory, .. }) => factory(context),
            None => Err(ContainerError::UnknownToken(token.to_string())),
        }
    }

    fn scope(&self, token: &str) -> Scope {
        match self.providers.get(token) {
            Some(Provider::Factory { scope, .. }) => *scope,
            _ => Scope::Transient,
        }
    }
}

/// Per-schema cache of singleton instances in front of a container.
pub(crate) struct DependencyCache {
    container: Arc<dyn Container>,
    singletons: DashMap<String, Instance>,
}

impl DependencyCache {
    pub(crate) fn new(container: Arc<dyn Container>) -> Self {
        Self {
            container,
            singletons: DashMap::new(),
        }
    }

    /// Resolves `token`, consulting the singleton cache first.
    pub(crate) async fn get(
        &self,
        token: &str,
        context: &GraphContext,
    ) -> Result<Instance, ResolverError> {
        if let Some(cached) = self.singletons.get(token) {
            return Ok(Arc::clone(cached.value()));
        }

        let instance = self
            .container
            .resolve(token, context)
            .await
            .map_err(|e| ResolverError::Dependency {
                token: token.to_string(),
                message: e.to_string(),
            })?;

        if self.container.scope(token) == Scope::Singleton {
            debug!(token, "caching singleton dependency");
            // A concurrent resolution may have won the race; keep the first.
            let entry = self
                .singletons
                .entry(token.to_string())
                .or_insert(instance);
            return Ok(Arc::clone(entry.value()));
        }

        Ok(instance)
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.singletons.len()
    }
}
