//! Declaration records collected by the [`Registry`](super::Registry).
//!
//! Declarations are plain data plus closures. Nothing is resolved or
//! validated until the registry is built; a malformed type notation is
//! carried along and reported with every other build error.

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ResolverError;
use crate::resolvers::{EventSource, EventStream, Handler, ParameterSource, Params, Stage};
use crate::types::{IntoTypeShape, ShapeParseError, TypeKind, TypeShape};

/// Picks the concrete object type name for an abstract type's value.
pub type TypeResolver = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Validates a custom scalar value in either direction.
pub type ScalarValidator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One value of an enum declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDecl {
    /// GraphQL-facing name.
    pub name: String,
    /// Internal value handed to and returned by resolvers.
    pub value: Value,
    /// Description.
    pub description: Option<String>,
    /// Deprecation reason.
    pub deprecation: Option<String>,
}

impl EnumValueDecl {
    /// Creates a value whose internal representation is `value`.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            description: None,
            deprecation: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the value deprecated.
    #[must_use]
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }
}

/// A named type declaration.
///
/// The origin identifies where the declaration comes from. It defaults to
/// the source location of the constructor call and is only used in
/// messages: a second declaration of the same kind and name is a duplicate.
/// Declarations keyed with [`origin`](Self::origin) or created through
/// [`of`](Self::of) are partial; partials with the same key merge.
#[derive(Clone)]
pub struct TypeDecl {
    pub(crate) kind: TypeKind,
    pub(crate) name: String,
    pub(crate) origin: String,
    pub(crate) partial: bool,
    pub(crate) description: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) members: Vec<String>,
    pub(crate) values: Vec<EnumValueDecl>,
    pub(crate) resolve_type: Option<TypeResolver>,
    pub(crate) specified_by_url: Option<String>,
    pub(crate) validator: Option<ScalarValidator>,
    pub(crate) stages: Vec<Stage>,
}

impl TypeDecl {
    #[track_caller]
    fn new(kind: TypeKind, name: impl Into<String>) -> Self {
        let location = Location::caller();
        Self::with_origin(
            kind,
            name.into(),
            format!("{}:{}", location.file(), location.line()),
        )
    }

    fn with_origin(kind: TypeKind, name: String, origin: String) -> Self {
        Self {
            kind,
            name,
            origin,
            partial: false,
            description: None,
            interfaces: Vec::new(),
            members: Vec::new(),
            values: Vec::new(),
            resolve_type: None,
            specified_by_url: None,
            validator: None,
            stages: Vec::new(),
        }
    }

    /// Declares an output object type.
    #[track_caller]
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Object, name)
    }

    /// Declares an input object type.
    #[track_caller]
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Input, name)
    }

    /// Declares an interface.
    #[track_caller]
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Interface, name)
    }

    /// Declares a union.
    #[track_caller]
    pub fn union(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Union, name)
    }

    /// Declares an enum.
    #[track_caller]
    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Enum, name)
    }

    /// Declares a custom scalar.
    #[track_caller]
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(TypeKind::Scalar, name)
    }

    /// Declares a partial type named after the Rust type `T`, keyed by its
    /// full path.
    pub fn of<T: ?Sized>(kind: TypeKind) -> Self {
        let full = std::any::type_name::<T>();
        let base = full.split('<').next().unwrap_or(full);
        let short = base.rsplit("::").next().unwrap_or(base);
        Self::with_origin(kind, short.to_string(), full.to_string()).keyed()
    }

    /// Keys the declaration by `origin`, making it a partial declaration
    /// that merges with others of the same kind, name and origin.
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self.keyed()
    }

    fn keyed(mut self) -> Self {
        self.partial = true;
        self
    }

    /// Renames the type, keeping its origin.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds an implemented interface (objects only).
    #[must_use]
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Adds a union member.
    #[must_use]
    pub fn member(mut self, object: impl Into<String>) -> Self {
        self.members.push(object.into());
        self
    }

    /// Adds an enum value whose internal value is its name.
    #[must_use]
    pub fn value(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let internal = Value::String(name.clone());
        self.enum_value(EnumValueDecl::new(name, internal))
    }

    /// Adds an enum value with an explicit internal value.
    #[must_use]
    pub fn enum_value(mut self, value: EnumValueDecl) -> Self {
        self.values.push(value);
        self
    }

    /// Sets the concrete-type resolver of an interface or union.
    ///
    /// Without one, values are expected to carry a `__typename` property.
    #[must_use]
    pub fn resolve_type<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        self.resolve_type = Some(Arc::new(resolver));
        self
    }

    /// Sets the `@specifiedBy` URL of a custom scalar.
    #[must_use]
    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    /// Sets the value validator of a custom scalar.
    #[must_use]
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Adds a stage applied to every field resolver of this object.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// The declared kind.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    /// The declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declaration origin.
    #[must_use]
    pub fn origin_name(&self) -> &str {
        &self.origin
    }

    /// Returns `true` for keyed declarations that may be reopened.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDecl")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("origin", &self.origin)
            .field("partial", &self.partial)
            .field("interfaces", &self.interfaces)
            .field("members", &self.members)
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

/// An argument of a field or resolver.
#[derive(Debug, Clone)]
pub struct ArgumentDecl {
    pub(crate) name: String,
    pub(crate) shape: Result<TypeShape, ShapeParseError>,
    pub(crate) default: Option<Value>,
    pub(crate) description: Option<String>,
}

impl ArgumentDecl {
    /// Declares an argument of the given input type.
    pub fn new(name: impl Into<String>, shape: impl IntoTypeShape) -> Self {
        Self {
            name: name.into(),
            shape: shape.into_type_shape(),
            default: None,
            description: None,
        }
    }

    /// Sets the default, written the way a caller would supply it (enum
    /// values by name).
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The argument name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A plain data field of an object, interface or input type.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub(crate) name: String,
    pub(crate) shape: Result<TypeShape, ShapeParseError>,
    pub(crate) description: Option<String>,
    pub(crate) deprecation: Option<String>,
    pub(crate) args: Vec<ArgumentDecl>,
    pub(crate) default: Option<Value>,
}

impl FieldDecl {
    /// Declares a field of the given type.
    pub fn new(name: impl Into<String>, shape: impl IntoTypeShape) -> Self {
        Self {
            name: name.into(),
            shape: shape.into_type_shape(),
            description: None,
            deprecation: None,
            args: Vec::new(),
            default: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the field deprecated.
    #[must_use]
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    /// Adds an argument (output fields only).
    #[must_use]
    pub fn arg(mut self, arg: ArgumentDecl) -> Self {
        self.args.push(arg);
        self
    }

    /// Sets the default value (input fields only).
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Which type a resolver attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolverOwner {
    /// Root query field.
    Query,
    /// Root mutation field.
    Mutation,
    /// Root subscription field.
    Subscription,
    /// Field of a declared object type.
    Type(String),
}

impl ResolverOwner {
    /// The GraphQL type name of the owner.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
            Self::Subscription => "Subscription",
            Self::Type(name) => name,
        }
    }

    /// Returns `true` for root operation owners.
    #[must_use]
    pub fn is_root(&self) -> bool {
        !matches!(self, Self::Type(_))
    }
}

impl From<&str> for ResolverOwner {
    fn from(name: &str) -> Self {
        match name {
            "Query" => Self::Query,
            "Mutation" => Self::Mutation,
            "Subscription" => Self::Subscription,
            other => Self::Type(other.to_string()),
        }
    }
}

impl From<String> for ResolverOwner {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl fmt::Display for ResolverOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A resolver: a handler bound to a root operation field or an object field.
///
/// ```ignore
/// let recipe = ResolverDecl::new("recipe", |params: Params| async move {
///     let id: String = params.arg("id")?;
///     Ok(json!({ "id": id, "title": "Soup" }))
/// })
/// .returns("Recipe")
/// .arg(ArgumentDecl::new("id", "ID!"));
/// ```
#[derive(Clone)]
pub struct ResolverDecl {
    pub(crate) field: String,
    pub(crate) output: Option<Result<TypeShape, ShapeParseError>>,
    pub(crate) args: Vec<ArgumentDecl>,
    pub(crate) params: Vec<ParameterSource>,
    pub(crate) stages: Vec<Stage>,
    pub(crate) handler: Option<Arc<dyn Handler>>,
    pub(crate) source: Option<Arc<dyn EventSource>>,
    pub(crate) description: Option<String>,
    pub(crate) deprecation: Option<String>,
}

impl ResolverDecl {
    fn empty(field: String) -> Self {
        Self {
            field,
            output: None,
            args: Vec::new(),
            params: Vec::new(),
            stages: Vec::new(),
            handler: None,
            source: None,
            description: None,
            deprecation: None,
        }
    }

    /// Declares a query, mutation or field resolver backed by a closure.
    pub fn new<F, Fut>(field: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
    {
        Self::with_handler(field, Arc::new(handler))
    }

    /// Declares a resolver backed by a shared handler.
    pub fn with_handler(field: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        let mut decl = Self::empty(field.into());
        decl.handler = Some(handler);
        decl
    }

    /// Declares a subscription field fed by `source`.
    ///
    /// Each event is resolved as the root value. Without
    /// [`resolve_with`](Self::resolve_with) the payload itself is the result.
    pub fn subscription<F, Fut>(field: impl Into<String>, source: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<EventStream, ResolverError>> + Send + 'static,
    {
        let mut decl = Self::empty(field.into());
        decl.source = Some(Arc::new(source));
        decl
    }

    /// Sets the payload resolver of a subscription.
    #[must_use]
    pub fn resolve_with<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResolverError>> + Send + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets the return type.
    #[must_use]
    pub fn returns(mut self, shape: impl IntoTypeShape) -> Self {
        self.output = Some(shape.into_type_shape());
        self
    }

    /// Declares an argument and reads it as the next parameter.
    #[must_use]
    pub fn arg(mut self, arg: ArgumentDecl) -> Self {
        self.params.push(ParameterSource::Arg(arg.name.clone()));
        self.args.push(arg);
        self
    }

    /// Declares an argument without adding a parameter for it.
    #[must_use]
    pub fn declare_arg(mut self, arg: ArgumentDecl) -> Self {
        self.args.push(arg);
        self
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, source: ParameterSource) -> Self {
        self.params.push(source);
        self
    }

    /// Appends a root (parent value) parameter.
    #[must_use]
    pub fn root(self) -> Self {
        self.param(ParameterSource::Root)
    }

    /// Appends an all-arguments parameter.
    #[must_use]
    pub fn args(self) -> Self {
        self.param(ParameterSource::Args)
    }

    /// Appends a context parameter.
    #[must_use]
    pub fn context(self) -> Self {
        self.param(ParameterSource::Context)
    }

    /// Appends a field info parameter.
    #[must_use]
    pub fn info(self) -> Self {
        self.param(ParameterSource::Info)
    }

    /// Appends an injected dependency parameter.
    #[must_use]
    pub fn inject(self, token: impl Into<String>) -> Self {
        self.param(ParameterSource::Inject(token.into()))
    }

    /// Adds a field-level stage.
    #[must_use]
    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Marks the field deprecated.
    #[must_use]
    pub fn deprecated(mut self, reason: impl Into<String>) -> Self {
        self.deprecation = Some(reason.into());
        self
    }

    /// The target field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Debug for ResolverDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverDecl")
            .field("field", &self.field)
            .field("output", &self.output)
            .field("args", &self.args)
            .field("params", &self.params)
            .field("stages", &self.stages)
            .field("subscription", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct RecipeType;

    #[test]
    fn test_type_decl_of_uses_short_name() {
        let decl = TypeDecl::of::<RecipeType>(TypeKind::Object);
        assert_eq!(decl.name(), "RecipeType");
        assert!(decl.origin_name().ends_with("tests::RecipeType"));
    }

    #[test]
    fn test_origin_defaults_to_call_site() {
        let first = TypeDecl::object("Recipe");
        let second = TypeDecl::object("Recipe");
        assert_ne!(first.origin_name(), second.origin_name());
        assert!(first.origin_name().contains("declare.rs"));
    }

    #[test]
    fn test_enum_values() {
        let decl = TypeDecl::enumeration("Difficulty")
            .value("EASY")
            .enum_value(EnumValueDecl::new("HARD", 3));
        assert_eq!(decl.values[0].value, json!("EASY"));
        assert_eq!(decl.values[1].value, json!(3));
    }

    #[test]
    fn test_resolver_arg_adds_param() {
        let decl = ResolverDecl::new("recipe", |_params: Params| async { Ok(Value::Null) })
            .returns("Recipe")
            .arg(ArgumentDecl::new("id", "ID!"))
            .context()
            .declare_arg(ArgumentDecl::new("unused", "Int"));

        assert_eq!(
            decl.params,
            vec![ParameterSource::arg("id"), ParameterSource::Context]
        );
        assert_eq!(decl.args.len(), 2);
        assert!(decl.output.as_ref().unwrap().is_ok());
    }

    #[test]
    fn test_bad_notation_is_kept() {
        let field = FieldDecl::new("title", "[String");
        assert!(field.shape.is_err());
    }

    #[test]
    fn test_owner_from_name() {
        assert_eq!(ResolverOwner::from("Query"), ResolverOwner::Query);
        assert_eq!(
            ResolverOwner::from("Recipe"),
            ResolverOwner::Type("Recipe".into())
        );
        assert!(ResolverOwner::Mutation.is_root());
    }
}
