//! # typegraph
//!
//! Declare GraphQL types and resolvers once; build a validated schema and a
//! resolver pipeline from those declarations.
//!
//! ## Overview
//!
//! Declarations are collected in a [`Registry`] in any order, across
//! modules. [`Registry::build`] freezes the registry and resolves every type
//! reference into an immutable [`TypeGraph`]; circular references between
//! types are supported. The schema assembler binds each resolver to its
//! field (parameter plan, guards, middleware, injected dependencies) and
//! registers the result with the `async-graphql` dynamic schema engine.
//!
//! Every field call runs through the invocation pipeline:
//!
//! ```text
//! Created -> ArgsExtracted -> DependenciesResolved -> GuardsEvaluating
//!         -> { Rejected | MiddlewareExecuting -> HandlerInvoked -> ResultCoercing }
//!         -> { Completed | Failed }
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use typegraph::{BuildOptions, FieldDecl, GraphContext, Registry, ResolverDecl, TypeDecl};
//!
//! let registry = Registry::new();
//! registry.declare_type(TypeDecl::object("Recipe"))?;
//! registry.declare_field("Recipe", FieldDecl::new("title", "String!"))?;
//! registry.declare_resolver(
//!     "Query",
//!     ResolverDecl::new("recipes", list_recipes).returns("[Recipe!]!"),
//! )?;
//!
//! let schema = registry.build_schema(&BuildOptions::default())?;
//! let response = schema.execute("{ recipes { title } }", GraphContext::default()).await;
//! ```
//!
//! ## Configuration
//!
//! ```toml
//! [schema]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//! auth_mode = "error"
//! ```
//!
//! ## Modules
//!
//! - [`registry`] - Declarations and the registry lifecycle
//! - [`graph`] - The resolved type graph
//! - [`resolvers`] - Parameters, stages, dependency injection and binding
//! - [`invocation`] - The per-field pipeline
//! - [`schema`] - Assembly and lazy loading
//! - [`config`] - Configuration options
//! - [`context`] - Per-request context
//! - [`types`] - Type kinds, references and shapes
//! - [`error`] - Error types

pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod invocation;
pub mod registry;
pub mod resolvers;
pub mod schema;
pub mod types;

mod value;

// Re-export main types
pub use config::{AuthMode, SchemaConfig};
pub use context::{GraphContext, GraphContextBuilder, Principal};
pub use error::{BuildError, BuildErrors, BuildWarning, RegistryError, ResolverError, SchemaError};
pub use graph::TypeGraph;
pub use invocation::{BoundResolver, FieldRequest, InvocationState};
pub use registry::{
    ArgumentDecl, Declare, EnumValueDecl, FieldDecl, Registry, ResolverDecl, ResolverOwner,
    TypeDecl,
};
pub use resolvers::{
    AuthChecker, Container, DenyReason, Guard, Middleware, Next, ParameterSource, Params,
    RoleChecker, Scope, ServiceContainer, Stage,
};
pub use schema::{AssembledSchema, BuildOptions, LazySchema, SchemaState, assemble_schema};
pub use types::{TypeKind, TypeShape};

/// Result type for resolver handlers.
pub type Result<T> = std::result::Result<T, ResolverError>;
