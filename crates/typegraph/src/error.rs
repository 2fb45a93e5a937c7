//! Error types for declaration, schema building and resolver invocation.
//!
//! Errors fall into two groups. Build-time errors ([`BuildError`]) are
//! collected into a [`BuildErrors`] batch so a single build reports every
//! problem at once; no partially valid schema is ever produced. Invocation
//! errors ([`ResolverError`]) are scoped to one field and are converted into
//! GraphQL errors with a `code` and `phase` extension.

use std::fmt;

use async_graphql::ErrorExtensions;

use crate::invocation::InvocationState;
use crate::resolvers::DenyReason;
use crate::types::TypeKind;

/// Errors raised by the registry while declarations are collected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A declaration arrived after the registry was frozen by a build.
    #[error("registry is frozen; cannot declare {what} after the type graph was built")]
    Frozen {
        /// Human readable description of the rejected declaration.
        what: String,
    },
}

/// A single declaration, reference or binding problem found while building.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A type, field, argument or enum value name is not a valid GraphQL name.
    #[error("invalid {what} name '{name}'")]
    InvalidName {
        /// What kind of item carries the name.
        what: &'static str,
        /// The offending name.
        name: String,
    },

    /// A declared type uses a name reserved for built-in or root types.
    #[error("type name '{name}' is reserved")]
    ReservedName {
        /// The offending name.
        name: String,
    },

    /// Two declarations from different origins define the same type.
    #[error("duplicate {kind} type '{name}' declared by '{first}' and '{second}'")]
    DuplicateType {
        /// Kind of both declarations.
        kind: TypeKind,
        /// The duplicated type name.
        name: String,
        /// Origin of the first declaration.
        first: String,
        /// Origin of the second declaration.
        second: String,
    },

    /// Two declarations of different kinds share a name within one namespace.
    #[error("type name '{name}' is declared as both {first} and {second}")]
    NameCollision {
        /// The colliding name.
        name: String,
        /// Kind of the first declaration.
        first: TypeKind,
        /// Kind of the second declaration.
        second: TypeKind,
    },

    /// Partial declarations of the same type disagree.
    #[error("conflicting declarations for type '{name}': {reason}")]
    ConflictingType {
        /// The type name.
        name: String,
        /// What disagrees.
        reason: String,
    },

    /// A field was declared for a type that was never declared.
    #[error("field '{field}' declared on unknown type '{owner}'")]
    UnknownOwner {
        /// The missing owner name.
        owner: String,
        /// The field name.
        field: String,
    },

    /// A field was declared on a type kind that cannot have fields.
    #[error("field '{field}' cannot be declared on {kind} type '{owner}'")]
    InvalidOwner {
        /// The owner name.
        owner: String,
        /// The owner kind.
        kind: TypeKind,
        /// The field name.
        field: String,
    },

    /// Two sibling fields share a name.
    #[error("duplicate field '{owner}.{field}'")]
    DuplicateField {
        /// Owning type.
        owner: String,
        /// Field name.
        field: String,
    },

    /// Two arguments of one field share a name.
    #[error("duplicate argument '{argument}' on '{owner}.{field}'")]
    DuplicateArgument {
        /// Owning type.
        owner: String,
        /// Field name.
        field: String,
        /// Argument name.
        argument: String,
    },

    /// A type reference names a type that is not registered.
    #[error("{location} references unknown type '{name}'")]
    UnresolvedReference {
        /// Where the reference appears (e.g. `Recipe.ratings`).
        location: String,
        /// The unresolved type name.
        name: String,
    },

    /// A type reference names a type of the wrong kind for its position.
    #[error("{location} references '{name}' which is not an {expected} type")]
    WrongTypeKind {
        /// Where the reference appears.
        location: String,
        /// The referenced name.
        name: String,
        /// `input` or `output`.
        expected: &'static str,
    },

    /// A field declaration is malformed.
    #[error("invalid field '{owner}.{field}': {reason}")]
    InvalidField {
        /// Owning type.
        owner: String,
        /// Field name.
        field: String,
        /// What is wrong.
        reason: String,
    },

    /// A field resolver disagrees with the data field it overrides.
    #[error("resolver for '{owner}.{field}' conflicts with the declared field: {reason}")]
    ConflictingField {
        /// Owning type.
        owner: String,
        /// Field name.
        field: String,
        /// What disagrees.
        reason: String,
    },

    /// An object lists an interface that is not a registered interface.
    #[error("type '{owner}' implements unknown interface '{name}'")]
    UnknownInterface {
        /// The implementing type.
        owner: String,
        /// The interface name.
        name: String,
    },

    /// An object does not provide a field required by one of its interfaces.
    #[error("type '{owner}' is missing field '{field}' required by interface '{interface}'")]
    MissingInterfaceField {
        /// The implementing type.
        owner: String,
        /// The interface.
        interface: String,
        /// The missing field.
        field: String,
    },

    /// An object's field type is not compatible with its interface's field.
    #[error(
        "field '{owner}.{field}' has type {found} which is not compatible with {expected} required by interface '{interface}'"
    )]
    IncompatibleInterfaceField {
        /// The implementing type.
        owner: String,
        /// The interface.
        interface: String,
        /// The field.
        field: String,
        /// Type declared on the interface.
        expected: String,
        /// Type declared on the object.
        found: String,
    },

    /// A union member is not a registered object type.
    #[error("union '{union}' member '{member}' is not an object type")]
    InvalidUnionMember {
        /// The union.
        union: String,
        /// The member name.
        member: String,
    },

    /// Two enum values share a name or an internal value.
    #[error("enum '{name}' declares value '{value}' more than once")]
    DuplicateEnumValue {
        /// The enum.
        name: String,
        /// The duplicated value.
        value: String,
    },

    /// A default value does not match the declared input type.
    #[error("invalid default value for {location}: {reason}")]
    InvalidDefault {
        /// Where the default appears.
        location: String,
        /// Why it does not match.
        reason: String,
    },

    /// A resolver targets a type or field that does not exist.
    #[error("resolver targets '{owner}.{field}' which does not exist")]
    ResolverTargetMissing {
        /// Declared owner.
        owner: String,
        /// Declared field.
        field: String,
    },

    /// Two resolvers target the same field.
    #[error("more than one resolver declared for '{owner}.{field}'")]
    DuplicateResolver {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
    },

    /// A resolver creating a new field did not declare its return type.
    #[error("resolver for '{owner}.{field}' must declare a return type")]
    MissingReturnType {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
    },

    /// Subscription resolvers must have an event source; others must not.
    #[error("invalid subscription declaration '{owner}.{field}': {reason}")]
    InvalidSubscription {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
        /// What is wrong.
        reason: String,
    },

    /// A resolver parameter reads an argument the field does not declare.
    #[error("resolver for '{owner}.{field}' reads undeclared argument '{argument}'")]
    UndeclaredArgument {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
        /// Argument name.
        argument: String,
    },

    /// A declared argument is never read by the resolver.
    #[error("argument '{argument}' of '{owner}.{field}' is not used by its resolver")]
    UnusedArgument {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
        /// Argument name.
        argument: String,
    },

    /// A resolver injects a dependency but no container was configured.
    #[error("resolver for '{owner}.{field}' injects '{token}' but no container is configured")]
    MissingContainer {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
        /// Dependency token.
        token: String,
    },

    /// An `authorized` stage is used but no auth checker was configured.
    #[error("'{owner}.{field}' uses an authorized stage but no auth checker is configured")]
    MissingAuthChecker {
        /// Owner.
        owner: String,
        /// Field.
        field: String,
    },

    /// At least one query must be declared.
    #[error("schema declares no queries; the Query root type would be empty")]
    EmptyQueryRoot,

    /// A composite type ended up with no fields, members or values.
    #[error("{kind} type '{name}' has no {what}")]
    EmptyType {
        /// Kind of the empty type.
        kind: TypeKind,
        /// Name of the empty type.
        name: String,
        /// `fields`, `members` or `values`.
        what: &'static str,
    },

    /// Two types in separate namespaces share a name the engine cannot tell apart.
    #[error("type name '{name}' is used by both {first} and {second} types")]
    TypeNameClash {
        /// The shared name.
        name: String,
        /// First kind.
        first: TypeKind,
        /// Second kind.
        second: TypeKind,
    },

    /// The execution engine rejected the assembled schema.
    #[error("execution engine rejected schema: {0}")]
    Engine(String),
}

/// A batch of build errors reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildErrors(Vec<BuildError>);

impl BuildErrors {
    /// Wraps a list of errors. The list should not be empty.
    #[must_use]
    pub fn new(errors: Vec<BuildError>) -> Self {
        Self(errors)
    }

    /// A batch holding a single error.
    #[must_use]
    pub fn single(error: BuildError) -> Self {
        Self(vec![error])
    }

    /// Number of collected errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no errors were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the collected errors in discovery order.
    pub fn iter(&self) -> std::slice::Iter<'_, BuildError> {
        self.0.iter()
    }

    /// Returns `true` if any collected error satisfies `predicate`.
    pub fn any(&self, predicate: impl Fn(&BuildError) -> bool) -> bool {
        self.0.iter().any(predicate)
    }

    pub(crate) fn into_result<T>(errors: Vec<BuildError>, value: T) -> Result<T, Self> {
        if errors.is_empty() {
            Ok(value)
        } else {
            Err(Self(errors))
        }
    }
}

impl fmt::Display for BuildErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema build failed with {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildErrors {}

impl IntoIterator for BuildErrors {
    type Item = BuildError;
    type IntoIter = std::vec::IntoIter<BuildError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<BuildError> for BuildErrors {
    fn from(error: BuildError) -> Self {
        Self::single(error)
    }
}

/// Non-fatal observations recorded in the type graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildWarning {
    /// A field resolver replaced a plain data field of the same name.
    #[error("resolver for '{owner}.{field}' overrides the declared data field")]
    ResolverOverridesField {
        /// Owning type.
        owner: String,
        /// Field name.
        field: String,
    },
}

/// Errors produced while invoking a bound resolver.
///
/// Every variant is scoped to a single field; the engine reports it at the
/// field's path and continues resolving siblings.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolverError {
    /// A required argument was not supplied.
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    /// An argument value does not match its declared type.
    #[error("invalid value for argument '{argument}': {message}")]
    InvalidArgument {
        /// Argument name.
        argument: String,
        /// What is wrong.
        message: String,
    },

    /// A guard refused to proceed.
    #[error("unauthorized: {}", .0.message)]
    Unauthorized(DenyReason),

    /// A dependency could not be resolved from the container.
    #[error("failed to resolve dependency '{token}': {message}")]
    Dependency {
        /// Dependency token.
        token: String,
        /// Container message.
        message: String,
    },

    /// The user handler returned an error.
    #[error("{0}")]
    Handler(String),

    /// The handler's result does not fit the field's declared type.
    #[error("cannot return value for '{field}': {message}")]
    Coercion {
        /// `Parent.field` of the failing field.
        field: String,
        /// What is wrong.
        message: String,
    },
}

impl ResolverError {
    /// Creates a handler error from any displayable message.
    #[must_use]
    pub fn handler(message: impl fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }

    /// Creates an authorization error.
    #[must_use]
    pub fn unauthorized(reason: DenyReason) -> Self {
        Self::Unauthorized(reason)
    }

    /// Returns the error code placed in GraphQL error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingArgument(_) | Self::InvalidArgument { .. } => "BAD_USER_INPUT",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Dependency { .. } => "DEPENDENCY_ERROR",
            Self::Handler(_) => "INTERNAL_SERVER_ERROR",
            Self::Coercion { .. } => "COERCION_ERROR",
        }
    }

    /// The pipeline state in which the error was raised.
    #[must_use]
    pub fn phase(&self) -> InvocationState {
        match self {
            Self::MissingArgument(_) | Self::InvalidArgument { .. } => {
                InvocationState::ArgsExtracted
            }
            Self::Dependency { .. } => InvocationState::DependenciesResolved,
            Self::Unauthorized(_) => InvocationState::Rejected,
            Self::Handler(_) => InvocationState::HandlerInvoked,
            Self::Coercion { .. } => InvocationState::ResultCoercing,
        }
    }

    /// Returns `true` for errors caused by the caller's input.
    #[must_use]
    pub fn is_caller_input(&self) -> bool {
        matches!(self, Self::MissingArgument(_) | Self::InvalidArgument { .. })
    }

    /// Returns `true` for guard refusals.
    #[must_use]
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Converts the error into an engine error with `code` and `phase` extensions.
    #[must_use]
    pub fn to_graphql_error(&self) -> async_graphql::Error {
        let code = self.error_code();
        let phase = self.phase();
        let reason_code = match self {
            Self::Unauthorized(reason) => Some(reason.code.clone()),
            _ => None,
        };

        async_graphql::Error::new(self.to_string()).extend_with(|_, e| {
            e.set("code", code);
            e.set("phase", phase.as_str());
            if let Some(reason) = &reason_code {
                e.set("reason", reason.clone());
            }
        })
    }
}

/// Errors returned by [`LazySchema`](crate::schema::LazySchema).
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// Schema is still being built; the caller should retry.
    #[error("schema is initializing, please retry")]
    Initializing,

    /// Schema build failed.
    #[error("failed to build schema: {0}")]
    BuildFailed(String),
}

impl SchemaError {
    /// Returns the HTTP status code a transport layer should use.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Initializing => 503,
            Self::BuildFailed(_) => 500,
        }
    }

    /// Returns the Retry-After value in seconds, if applicable.
    #[must_use]
    pub fn retry_after(&self) -> Option<u32> {
        match self {
            Self::Initializing => Some(5),
            Self::BuildFailed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_errors_display_lists_every_error() {
        let errors = BuildErrors::new(vec![
            BuildError::EmptyQueryRoot,
            BuildError::DuplicateField {
                owner: "Recipe".into(),
                field: "title".into(),
            },
        ]);

        let text = errors.to_string();
        assert!(text.starts_with("schema build failed with 2 error(s)"));
        assert!(text.contains("duplicate field 'Recipe.title'"));
        assert!(text.contains("no queries"));
    }

    #[test]
    fn test_resolver_error_codes() {
        assert_eq!(
            ResolverError::MissingArgument("id".into()).error_code(),
            "BAD_USER_INPUT"
        );
        assert_eq!(
            ResolverError::Unauthorized(DenyReason::new("nope")).error_code(),
            "UNAUTHORIZED"
        );
        assert_eq!(ResolverError::handler("boom").error_code(), "INTERNAL_SERVER_ERROR");
    }

    #[test]
    fn test_resolver_error_phase() {
        assert_eq!(
            ResolverError::MissingArgument("id".into()).phase(),
            InvocationState::ArgsExtracted
        );
        assert_eq!(
            ResolverError::Unauthorized(DenyReason::new("nope")).phase(),
            InvocationState::Rejected
        );
        assert!(ResolverError::Unauthorized(DenyReason::new("nope")).is_authorization());
        assert!(!ResolverError::handler("boom").is_authorization());
    }

    #[test]
    fn test_graphql_error_extensions() {
        let err = ResolverError::Unauthorized(DenyReason::new("admins only").with_code("forbidden"))
            .to_graphql_error();
        assert!(err.message.contains("admins only"));
        let extensions = err.extensions.expect("extensions set");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("UNAUTHORIZED"))
        );
        assert_eq!(
            extensions.get("reason"),
            Some(&async_graphql::Value::from("forbidden"))
        );
    }

    #[test]
    fn test_schema_error_status() {
        assert_eq!(SchemaError::Initializing.status_code(), 503);
        assert_eq!(SchemaError::Initializing.retry_after(), Some(5));
        assert_eq!(SchemaError::BuildFailed("x".into()).retry_after(), None);
    }
}
