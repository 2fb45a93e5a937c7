//! Binds resolver declarations to graph fields.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, trace};

use super::middleware::compose;
use super::{Call, DependencyCache, Middleware, ParameterSource, Params, StageChain};
use crate::config::AuthMode;
use crate::error::{BuildError, BuildErrors, ResolverError};
use crate::graph::{FieldDefinition, ResolverId, ResolverSpec, TypeGraph};
use crate::invocation::{BoundResolver, InvocationState};
use crate::registry::ResolverOwner;
use crate::schema::BuildOptions;

/// Bound resolvers indexed by [`ResolverId`].
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    resolvers: Vec<Arc<BoundResolver>>,
}

impl Bindings {
    /// Returns the binding for `id`.
    #[must_use]
    pub fn get(&self, id: ResolverId) -> Option<&Arc<BoundResolver>> {
        self.resolvers.get(id.0)
    }

    /// Finds the binding of `owner.field`.
    #[must_use]
    pub fn find(&self, owner: &ResolverOwner, field: &str) -> Option<&Arc<BoundResolver>> {
        self.resolvers
            .iter()
            .find(|r| &r.owner == owner && r.field == field)
    }

    /// Number of bound resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Iterates bindings in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<BoundResolver>> {
        self.resolvers.iter()
    }
}

/// Validates parameter plans and composes stage chains.
pub struct ResolverBinder<'a> {
    graph: Arc<TypeGraph>,
    options: &'a BuildOptions,
    dependencies: Option<Arc<DependencyCache>>,
}

impl<'a> ResolverBinder<'a> {
    /// Creates a binder. Singleton dependencies are cached per binder, so
    /// every resolver of one schema shares them.
    #[must_use]
    pub fn new(graph: Arc<TypeGraph>, options: &'a BuildOptions) -> Self {
        let dependencies = options
            .container
            .clone()
            .map(|container| Arc::new(DependencyCache::new(container)));
        Self {
            graph,
            options,
            dependencies,
        }
    }

    /// Binds every resolver in the graph.
    ///
    /// # Errors
    ///
    /// Returns every binding error found.
    pub fn bind_all(&self) -> Result<Bindings, BuildErrors> {
        let mut errors = Vec::new();
        let mut resolvers = Vec::with_capacity(self.graph.resolvers().len());

        for spec in self.graph.resolvers() {
            let Some(field) = self.graph.field(&spec.owner, &spec.field) else {
                errors.push(BuildError::ResolverTargetMissing {
                    owner: spec.owner.to_string(),
                    field: spec.field.clone(),
                });
                continue;
            };
            if let Some(bound) = self.bind(spec, field, &mut errors) {
                resolvers.push(Arc::new(bound));
            }
        }

        debug!(bound = resolvers.len(), errors = errors.len(), "resolvers bound");
        BuildErrors::into_result(errors, Bindings { resolvers })
    }

    fn bind(
        &self,
        spec: &ResolverSpec,
        field: &FieldDefinition,
        errors: &mut Vec<BuildError>,
    ) -> Option<BoundResolver> {
        let before = errors.len();
        let owner = spec.owner.to_string();
        self.check_plan(spec, field, &owner, errors);

        let stages: Vec<_> = self
            .options
            .global_stages
            .iter()
            .chain(self.graph.class_stages(&spec.owner))
            .chain(spec.stages.iter())
            .collect();

        let checker = self.options.auth_checker.as_ref();
        if checker.is_none() && stages.iter().any(|s| s.is_authorized()) {
            errors.push(BuildError::MissingAuthChecker {
                owner: owner.clone(),
                field: spec.field.clone(),
            });
        }
        if errors.len() > before {
            return None;
        }

        let null_on_refusal = self.options.config.auth_mode == AuthMode::Null && field.ty.nullable;
        let middleware: Vec<Arc<dyn Middleware>> = stages
            .iter()
            .filter_map(|stage| stage.to_middleware(checker, null_on_refusal))
            .collect();

        let plan = Arc::new(spec.params.clone());
        let chain = compose(middleware, endpoint(spec, Arc::clone(&plan)));

        trace!(owner = %spec.owner, field = %spec.field, stages = stages.len(), "resolver bound");
        Some(BoundResolver {
            graph: Arc::clone(&self.graph),
            owner: spec.owner.clone(),
            field: spec.field.clone(),
            output: field.ty.clone(),
            arguments: field.args.clone(),
            plan,
            chain,
            dependencies: self.dependencies.clone(),
            source: spec.source.clone(),
        })
    }

    /// Every `Arg` source names a declared argument; every declared argument
    /// is read unless the plan takes all arguments; injections need a
    /// container.
    fn check_plan(
        &self,
        spec: &ResolverSpec,
        field: &FieldDefinition,
        owner: &str,
        errors: &mut Vec<BuildError>,
    ) {
        for source in &spec.params {
            match source {
                ParameterSource::Arg(name) if field.arg(name).is_none() => {
                    errors.push(BuildError::UndeclaredArgument {
                        owner: owner.to_string(),
                        field: spec.field.clone(),
                        argument: name.clone(),
                    });
                }
                ParameterSource::Inject(token) if self.options.container.is_none() => {
                    errors.push(BuildError::MissingContainer {
                        owner: owner.to_string(),
                        field: spec.field.clone(),
                        token: token.clone(),
                    });
                }
                _ => {}
            }
        }

        if spec.params.contains(&ParameterSource::Args) {
            return;
        }
        for arg in &field.args {
            let read = spec
                .params
                .iter()
                .any(|p| matches!(p, ParameterSource::Arg(name) if *name == arg.name));
            if !read {
                errors.push(BuildError::UnusedArgument {
                    owner: owner.to_string(),
                    field: spec.field.clone(),
                    argument: arg.name.clone(),
                });
            }
        }
    }
}

/// The innermost link of the chain: materializes parameters and calls the
/// handler. Subscriptions without a payload handler pass the event through.
fn endpoint(spec: &ResolverSpec, plan: Arc<Vec<ParameterSource>>) -> StageChain {
    let field = spec.field.clone();
    match spec.handler.clone() {
        Some(handler) => Arc::new(
            move |call: Call| -> BoxFuture<'static, Result<Value, ResolverError>> {
                trace!(
                    field = %field,
                    state = InvocationState::HandlerInvoked.as_str(),
                    "invocation state"
                );
                handler.call(Params::from_call(&plan, &call))
            },
        ),
        None => Arc::new(
            move |call: Call| -> BoxFuture<'static, Result<Value, ResolverError>> {
                Box::pin(async move { Ok(call.root) })
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ArgumentDecl, Registry, ResolverDecl};
    use crate::resolvers::{RoleChecker, ServiceContainer, Stage};

    async fn noop(_params: Params) -> Result<Value, ResolverError> {
        Ok(Value::Null)
    }

    fn bind(registry: &Registry, options: &BuildOptions) -> Result<Bindings, BuildErrors> {
        let graph = Arc::new(registry.build().unwrap());
        ResolverBinder::new(graph, options).bind_all()
    }

    #[test]
    fn test_undeclared_and_unused_arguments() {
        let registry = Registry::new();
        registry
            .declare_resolver(
                "Query",
                ResolverDecl::new("recipe", noop)
                    .returns("String")
                    .declare_arg(ArgumentDecl::new("id", "ID"))
                    .param(ParameterSource::arg("slug")),
            )
            .unwrap();

        let errors = bind(&registry, &BuildOptions::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.any(|e| matches!(e, BuildError::UndeclaredArgument { argument, .. } if argument == "slug")));
        assert!(errors.any(|e| matches!(e, BuildError::UnusedArgument { argument, .. } if argument == "id")));
    }

    #[test]
    fn test_args_param_reads_everything() {
        let registry = Registry::new();
        registry
            .declare_resolver(
                "Query",
                ResolverDecl::new("recipes", noop)
                    .returns("String")
                    .declare_arg(ArgumentDecl::new("first", "Int"))
                    .args(),
            )
            .unwrap();

        let bindings = bind(&registry, &BuildOptions::default()).unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(bindings.find(&ResolverOwner::Query, "recipes").is_some());
    }

    #[test]
    fn test_missing_container_and_checker() {
        let registry = Registry::new();
        registry
            .declare_resolver(
                "Query",
                ResolverDecl::new("secret", noop)
                    .returns("String")
                    .inject("store")
                    .stage(Stage::authorized(["ADMIN"])),
            )
            .unwrap();

        let errors = bind(&registry, &BuildOptions::default()).unwrap_err();
        assert!(errors.any(|e| matches!(e, BuildError::MissingContainer { .. })));
        assert!(errors.any(|e| matches!(e, BuildError::MissingAuthChecker { .. })));

        let options = BuildOptions::default()
            .with_container(ServiceContainer::new().with_value("store", 1_u8))
            .with_auth_checker(RoleChecker);
        assert!(bind(&registry, &options).is_ok());
    }
}
