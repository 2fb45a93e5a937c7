//! Resolver handlers, parameters, guards, middleware and dependency injection.
//!
//! A resolver is declared with a handler and an ordered list of
//! [`ParameterSource`]s. At bind time the [`ResolverBinder`] validates the
//! sources against the field's arguments, composes the stage chain and
//! produces a [`BoundResolver`](crate::invocation::BoundResolver) the engine
//! calls per field.

mod binder;
mod handler;
mod inject;
mod middleware;
mod params;

pub use binder::{Bindings, ResolverBinder};
pub use handler::{EventSource, EventStream, Handler, HandlerFuture};
pub use inject::{Container, ContainerError, Instance, Scope, ServiceContainer};
pub use middleware::{
    AuthChecker, Guard, Middleware, Next, RoleChecker, Stage, StageChain,
};
pub use params::{Call, FieldInfo, ParamValue, ParameterSource, Params};

pub(crate) use inject::DependencyCache;

/// Why a guard refused to run a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyReason {
    /// Short machine readable code, exposed as the `reason` error extension.
    pub code: String,
    /// Human readable message.
    pub message: String,
}

impl DenyReason {
    /// Creates a refusal with the default `forbidden` code.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: "forbidden".to_string(),
            message: message.into(),
        }
    }

    /// Overrides the reason code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }
}
