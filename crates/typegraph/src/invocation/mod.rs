//! The per-field invocation pipeline.
//!
//! Each call of a bound resolver moves through
//!
//! ```text
//! Created -> ArgsExtracted -> DependenciesResolved -> GuardsEvaluating
//!         -> { Rejected | MiddlewareExecuting -> HandlerInvoked -> ResultCoercing }
//!         -> { Completed | Failed }
//! ```
//!
//! Transitions are logged at `trace` level under the `typegraph::invocation`
//! target. A failure at any step produces a [`ResolverError`] scoped to the
//! field; sibling fields are unaffected.

mod coerce;

use std::fmt;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::context::GraphContext;
use crate::error::ResolverError;
use crate::graph::{ArgumentDefinition, TypeGraph, TypeUse};
use crate::registry::ResolverOwner;
use crate::resolvers::{
    Call, DependencyCache, EventSource, FieldInfo, Instance, ParameterSource, Params, StageChain,
};

pub(crate) use coerce::{Resolved, coerce_input, coerce_output};

/// States of one resolver invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationState {
    /// Request received.
    Created,
    /// Arguments coerced and defaults applied.
    ArgsExtracted,
    /// Injected dependencies resolved.
    DependenciesResolved,
    /// Guards running.
    GuardsEvaluating,
    /// A guard refused.
    Rejected,
    /// Middleware running.
    MiddlewareExecuting,
    /// Handler called.
    HandlerInvoked,
    /// Result being checked against the declared type.
    ResultCoercing,
    /// Value produced.
    Completed,
    /// Error produced.
    Failed,
}

impl InvocationState {
    /// Stable lowercase name, used as the `phase` error extension.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ArgsExtracted => "args_extracted",
            Self::DependenciesResolved => "dependencies_resolved",
            Self::GuardsEvaluating => "guards_evaluating",
            Self::Rejected => "rejected",
            Self::MiddlewareExecuting => "middleware_executing",
            Self::HandlerInvoked => "handler_invoked",
            Self::ResultCoercing => "result_coercing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a single field resolution.
#[derive(Debug, Clone, Default)]
pub struct FieldRequest {
    /// Parent value (`Null` for root operations without a root value).
    pub root: Value,
    /// Raw argument values as supplied by the caller.
    pub args: Map<String, Value>,
    /// Request context.
    pub context: GraphContext,
    /// Response path, if known.
    pub path: Option<String>,
}

impl FieldRequest {
    /// Creates a request with the given context.
    #[must_use]
    pub fn new(context: GraphContext) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    /// Sets the parent value.
    #[must_use]
    pub fn with_root(mut self, root: Value) -> Self {
        self.root = root;
        self
    }

    /// Adds a raw argument.
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.args.insert(name.into(), value);
        self
    }

    /// Sets the response path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// A resolver bound to its field: validated parameter plan, composed stage
/// chain and output type.
pub struct BoundResolver {
    pub(crate) graph: Arc<TypeGraph>,
    pub(crate) owner: ResolverOwner,
    pub(crate) field: String,
    pub(crate) output: TypeUse,
    pub(crate) arguments: Vec<ArgumentDefinition>,
    pub(crate) plan: Arc<Vec<ParameterSource>>,
    pub(crate) chain: StageChain,
    pub(crate) dependencies: Option<Arc<DependencyCache>>,
    pub(crate) source: Option<Arc<dyn EventSource>>,
}

impl BoundResolver {
    /// Owner of the field.
    #[must_use]
    pub fn owner(&self) -> &ResolverOwner {
        &self.owner
    }

    /// Field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field
    }

    /// Parameter plan in handler order.
    #[must_use]
    pub fn plan(&self) -> &[ParameterSource] {
        &self.plan
    }

    /// Returns `true` for subscription fields.
    #[must_use]
    pub fn is_subscription(&self) -> bool {
        self.source.is_some()
    }

    /// Runs the full pipeline for one field and returns the coerced result
    /// as JSON (enum values by name, nested objects as returned).
    ///
    /// # Errors
    ///
    /// Returns the first error raised by argument extraction, dependency
    /// resolution, a guard, middleware, the handler or output coercion.
    pub async fn invoke(&self, request: FieldRequest) -> Result<Value, ResolverError> {
        self.resolve(request).await.map(Resolved::into_json)
    }

    pub(crate) async fn resolve(&self, request: FieldRequest) -> Result<Resolved, ResolverError> {
        let call = self.prepare(request).await?;
        self.run(call).await
    }

    /// Opens a subscription: the event source runs once, then every event
    /// is resolved through the chain with the payload as root value.
    pub(crate) async fn subscribe(
        self: Arc<Self>,
        request: FieldRequest,
    ) -> Result<BoxStream<'static, Result<Resolved, ResolverError>>, ResolverError> {
        let Some(source) = self.source.clone() else {
            return Err(ResolverError::handler(format!(
                "'{}.{}' is not a subscription field",
                self.owner, self.field
            )));
        };

        let call = self.prepare(request).await?;
        let events = source.subscribe(Params::from_call(&self.plan, &call)).await?;
        debug!(field = %self.field, "subscription opened");

        let stream = events.then(move |payload| {
            let this = Arc::clone(&self);
            let call = Call {
                root: payload,
                ..call.clone()
            };
            async move { this.run(call).await }
        });
        Ok(stream.boxed())
    }

    fn info(&self, path: Option<String>) -> FieldInfo {
        FieldInfo {
            parent_type: self.owner.type_name().to_string(),
            field_name: self.field.clone(),
            return_type: self.graph.render(&self.output),
            path,
        }
    }

    fn transition(&self, state: InvocationState) {
        trace!(
            target: "typegraph::invocation",
            parent = %self.owner,
            field = %self.field,
            state = state.as_str(),
            "invocation state"
        );
    }

    /// Created -> ArgsExtracted -> DependenciesResolved.
    async fn prepare(&self, request: FieldRequest) -> Result<Call, ResolverError> {
        self.transition(InvocationState::Created);
        let info = self.info(request.path);

        let args = self.extract_args(request.args).inspect_err(|_| {
            self.transition(InvocationState::Failed);
        })?;
        self.transition(InvocationState::ArgsExtracted);

        let dependencies = self
            .resolve_dependencies(&request.context)
            .await
            .inspect_err(|_| self.transition(InvocationState::Failed))?;
        self.transition(InvocationState::DependenciesResolved);

        Ok(Call {
            root: request.root,
            args,
            context: request.context,
            info,
            dependencies,
        })
    }

    /// GuardsEvaluating -> ... -> Completed | Failed.
    async fn run(&self, call: Call) -> Result<Resolved, ResolverError> {
        self.transition(InvocationState::GuardsEvaluating);
        let value = match (self.chain)(call).await {
            Ok(value) => value,
            Err(err) => {
                self.transition(err.phase());
                self.transition(InvocationState::Failed);
                return Err(err);
            }
        };

        self.transition(InvocationState::ResultCoercing);
        match coerce_output(&self.graph, &self.output, value) {
            Ok(resolved) => {
                self.transition(InvocationState::Completed);
                Ok(resolved)
            }
            Err(message) => {
                self.transition(InvocationState::Failed);
                Err(ResolverError::Coercion {
                    field: format!("{}.{}", self.owner, self.field),
                    message,
                })
            }
        }
    }

    /// Coerces supplied arguments and applies defaults. Arguments the
    /// caller omitted and that have no default stay absent.
    fn extract_args(&self, mut raw: Map<String, Value>) -> Result<Map<String, Value>, ResolverError> {
        let mut args = Map::new();
        for arg in &self.arguments {
            let supplied = raw.remove(&arg.name).or_else(|| arg.default.clone());
            match supplied {
                Some(value) => {
                    let coerced = coerce_input(&self.graph, &arg.ty, &value).map_err(|message| {
                        if value.is_null() && !arg.ty.nullable {
                            ResolverError::MissingArgument(arg.name.clone())
                        } else {
                            ResolverError::InvalidArgument {
                                argument: arg.name.clone(),
                                message,
                            }
                        }
                    })?;
                    args.insert(arg.name.clone(), coerced);
                }
                None if !arg.ty.nullable => {
                    return Err(ResolverError::MissingArgument(arg.name.clone()));
                }
                None => {}
            }
        }
        if let Some(unknown) = raw.keys().next() {
            return Err(ResolverError::InvalidArgument {
                argument: unknown.clone(),
                message: "unknown argument".to_string(),
            });
        }
        Ok(args)
    }

    async fn resolve_dependencies(
        &self,
        context: &GraphContext,
    ) -> Result<Vec<(String, Instance)>, ResolverError> {
        let mut resolved = Vec::new();
        for source in self.plan.iter() {
            let ParameterSource::Inject(token) = source else {
                continue;
            };
            let Some(cache) = &self.dependencies else {
                return Err(ResolverError::Dependency {
                    token: token.clone(),
                    message: "no container configured".to_string(),
                });
            };
            let instance = cache.get(token, context).await?;
            resolved.push((token.clone(), instance));
        }
        Ok(resolved)
    }
}

impl fmt::Debug for BoundResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundResolver")
            .field("owner", &self.owner)
            .field("field", &self.field)
            .field("output", &self.graph.render(&self.output))
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}
