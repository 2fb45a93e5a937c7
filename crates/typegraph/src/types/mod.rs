//! Type-level vocabulary shared by declarations and the built graph.
//!
//! - [`TypeKind`] and [`Namespace`]: the six kinds of named types and the
//!   name spaces they live in.
//! - [`TypeReference`]: a possibly deferred pointer to a named type.
//! - [`TypeShape`]: a reference plus nullability and list wrapping.
//! - [`BuiltinScalar`]: the five GraphQL built-in scalars.

mod reference;
mod scalars;
mod shape;

use std::fmt;

pub use reference::TypeReference;
pub use scalars::BuiltinScalar;
pub use shape::{IntoTypeShape, ShapeParseError, TypeShape};
pub(crate) use shape::{render_shape, to_type_ref};

/// The kind of a named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Output object type.
    Object,
    /// Input object type.
    Input,
    /// Interface type.
    Interface,
    /// Union of object types.
    Union,
    /// Enumeration.
    Enum,
    /// Scalar (built-in or custom).
    Scalar,
}

impl TypeKind {
    /// Returns the namespace type names of this kind are unique within.
    #[must_use]
    pub fn namespace(self) -> Namespace {
        match self {
            Self::Object | Self::Interface | Self::Union | Self::Enum => Namespace::Output,
            Self::Input => Namespace::Input,
            Self::Scalar => Namespace::Scalar,
        }
    }

    /// Lowercase name used in messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Input => "input",
            Self::Interface => "interface",
            Self::Union => "union",
            Self::Enum => "enum",
            Self::Scalar => "scalar",
        }
    }

    /// Whether values of this kind may appear in an output position.
    #[must_use]
    pub fn is_output(self) -> bool {
        !matches!(self, Self::Input)
    }

    /// Whether values of this kind may appear in an input position.
    #[must_use]
    pub fn is_input(self) -> bool {
        matches!(self, Self::Input | Self::Enum | Self::Scalar)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name spaces for type-name uniqueness.
///
/// Objects, interfaces, unions and enums share one namespace; inputs and
/// scalars each have their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Object, interface, union and enum names.
    Output,
    /// Input object names.
    Input,
    /// Scalar names.
    Scalar,
}

/// Root operation type names. They cannot be declared as ordinary types.
pub const ROOT_TYPE_NAMES: [&str; 3] = ["Query", "Mutation", "Subscription"];

/// Checks if a name is valid for GraphQL.
///
/// GraphQL names must match `/[_A-Za-z][_0-9A-Za-z]*/`.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
