//! Deferred type references.

use std::fmt;
use std::sync::Arc;

/// A pointer from a field or argument to the named type it denotes.
///
/// A `Named` reference may name a type that has not been declared yet. A
/// `Thunk` is only invoked while the graph is built, after every declaration
/// has been collected, which lets mutually dependent declarations refer to
/// each other regardless of the order they are registered in.
#[derive(Clone)]
pub enum TypeReference {
    /// A type name, looked up when the graph is built.
    Named(String),
    /// A function yielding the type name, invoked when the graph is built.
    Thunk(Arc<dyn Fn() -> String + Send + Sync>),
}

impl TypeReference {
    /// Creates a deferred reference from a thunk.
    pub fn lazy(thunk: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self::Thunk(Arc::new(thunk))
    }

    /// Returns the referenced name, invoking the thunk if necessary.
    #[must_use]
    pub fn resolve_name(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Thunk(thunk) => thunk(),
        }
    }

    /// Returns `true` for thunk references.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Thunk(_))
    }
}

impl fmt::Debug for TypeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Thunk(_) => f.write_str("Thunk(..)"),
        }
    }
}

impl From<&str> for TypeReference {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for TypeReference {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thunk_is_invoked_on_resolve() {
        let reference = TypeReference::lazy(|| "Rate".to_string());
        assert!(reference.is_deferred());
        assert_eq!(reference.resolve_name(), "Rate");
        assert_eq!(format!("{reference:?}"), "Thunk(..)");
    }

    #[test]
    fn test_named_from_str() {
        let reference = TypeReference::from("Recipe");
        assert!(!reference.is_deferred());
        assert_eq!(reference.resolve_name(), "Recipe");
    }
}
