//! Nullability and list wrapping around a type reference.

use std::fmt;

use async_graphql::dynamic::TypeRef;

use super::{TypeReference, is_valid_name};

/// A type reference together with its nullability and list wrapping.
///
/// `nullable` describes the outermost position. `lists` holds one entry per
/// list level, outermost first, each entry telling whether the items at that
/// level may be null. `[Rate!]!` is `nullable: false, lists: [false]`.
#[derive(Debug, Clone)]
pub struct TypeShape {
    /// The named type at the core of the shape.
    pub reference: TypeReference,
    /// Whether the outermost value may be null.
    pub nullable: bool,
    /// Per list level item nullability, outermost first.
    pub lists: Vec<bool>,
}

/// Error returned by [`TypeShape::parse`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type notation '{input}': {reason}")]
pub struct ShapeParseError {
    /// The rejected input.
    pub input: String,
    /// What is wrong with it.
    pub reason: &'static str,
}

impl TypeShape {
    /// A nullable, unwrapped reference to `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            reference: TypeReference::Named(name.into()),
            nullable: true,
            lists: Vec::new(),
        }
    }

    /// A nullable, unwrapped reference produced by a thunk.
    pub fn lazy(thunk: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            reference: TypeReference::lazy(thunk),
            nullable: true,
            lists: Vec::new(),
        }
    }

    /// Marks the outermost position non-null.
    #[must_use]
    pub fn non_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Wraps the current shape in a nullable list.
    #[must_use]
    pub fn list(mut self) -> Self {
        self.lists.insert(0, self.nullable);
        self.nullable = true;
        self
    }

    /// Parses SDL type notation such as `String`, `[Rate!]!` or `[[Int]!]`.
    ///
    /// # Errors
    ///
    /// Returns an error for unbalanced brackets, misplaced `!` or invalid names.
    pub fn parse(input: &str) -> Result<Self, ShapeParseError> {
        let fail = |reason| ShapeParseError {
            input: input.to_string(),
            reason,
        };

        let text: String = input.chars().filter(|c| !c.is_whitespace()).collect();
        let mut rest = text.as_str();
        let mut non_null_levels = Vec::new();

        // Peel wrappers from the outside in.
        loop {
            let non_null = rest.ends_with('!');
            if non_null {
                rest = &rest[..rest.len() - 1];
            }
            if rest.starts_with('[') {
                if !rest.ends_with(']') {
                    return Err(fail("unbalanced brackets"));
                }
                non_null_levels.push(non_null);
                rest = &rest[1..rest.len() - 1];
            } else {
                non_null_levels.push(non_null);
                break;
            }
        }

        if !is_valid_name(rest) {
            return Err(fail("invalid type name"));
        }

        // non_null_levels: outermost first, last entry is the named type itself.
        let nullable = !non_null_levels[0];
        let lists = non_null_levels[1..].iter().map(|nn| !nn).collect();

        Ok(Self {
            reference: TypeReference::Named(rest.to_string()),
            nullable,
            lists,
        })
    }

    /// Number of list levels.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.lists.len()
    }

    /// Renders the shape in SDL notation around `name`.
    #[must_use]
    pub fn render(&self, name: &str) -> String {
        render_shape(name, self.nullable, &self.lists)
    }

    /// Converts the shape into the engine's type reference around `name`.
    #[must_use]
    pub fn to_type_ref(&self, name: &str) -> TypeRef {
        to_type_ref(name, self.nullable, &self.lists)
    }

    /// Returns `true` if both shapes have the same wrapping.
    #[must_use]
    pub fn same_wrapping(&self, other: &Self) -> bool {
        self.nullable == other.nullable && self.lists == other.lists
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&self.reference.resolve_name()))
    }
}

/// Conversion into a [`TypeShape`], accepting SDL notation strings.
///
/// Parse failures are kept and reported when the graph is built, so a typo
/// in one declaration shows up alongside every other build error.
pub trait IntoTypeShape {
    /// Performs the conversion.
    ///
    /// # Errors
    ///
    /// Returns the parse error for malformed SDL notation.
    fn into_type_shape(self) -> Result<TypeShape, ShapeParseError>;
}

impl IntoTypeShape for TypeShape {
    fn into_type_shape(self) -> Result<TypeShape, ShapeParseError> {
        Ok(self)
    }
}

impl IntoTypeShape for &str {
    fn into_type_shape(self) -> Result<TypeShape, ShapeParseError> {
        TypeShape::parse(self)
    }
}

impl IntoTypeShape for String {
    fn into_type_shape(self) -> Result<TypeShape, ShapeParseError> {
        TypeShape::parse(&self)
    }
}

/// Wrapping levels innermost first: the named type's own nullability, then
/// each enclosing list's.
fn levels_inner_first(nullable: bool, lists: &[bool]) -> Vec<bool> {
    let mut levels = Vec::with_capacity(lists.len() + 1);
    levels.push(nullable);
    levels.extend_from_slice(lists);
    levels.reverse();
    levels
}

pub(crate) fn render_shape(name: &str, nullable: bool, lists: &[bool]) -> String {
    let mut out = name.to_string();
    for (i, level_nullable) in levels_inner_first(nullable, lists).into_iter().enumerate() {
        if i > 0 {
            out = format!("[{out}]");
        }
        if !level_nullable {
            out.push('!');
        }
    }
    out
}

pub(crate) fn to_type_ref(name: &str, nullable: bool, lists: &[bool]) -> TypeRef {
    let mut type_ref = TypeRef::Named(name.to_string().into());
    for (i, level_nullable) in levels_inner_first(nullable, lists).into_iter().enumerate() {
        if i > 0 {
            type_ref = TypeRef::List(Box::new(type_ref));
        }
        if !level_nullable {
            type_ref = TypeRef::NonNull(Box::new(type_ref));
        }
    }
    type_ref
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named() {
        let shape = TypeShape::parse("String").unwrap();
        assert!(shape.nullable);
        assert!(shape.lists.is_empty());
        assert_eq!(shape.reference.resolve_name(), "String");
    }

    #[test]
    fn test_parse_non_null_list_of_non_null() {
        let shape = TypeShape::parse("[Rate!]!").unwrap();
        assert!(!shape.nullable);
        assert_eq!(shape.lists, vec![false]);
        assert_eq!(shape.to_string(), "[Rate!]!");
    }

    #[test]
    fn test_parse_nested_lists() {
        let shape = TypeShape::parse("[[Int]!]").unwrap();
        assert!(shape.nullable);
        assert_eq!(shape.lists, vec![false, true]);
        assert_eq!(shape.to_string(), "[[Int]!]");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TypeShape::parse("[Rate").is_err());
        assert!(TypeShape::parse("Rate]").is_err());
        assert!(TypeShape::parse("[]").is_err());
        assert!(TypeShape::parse("my-type").is_err());
    }

    #[test]
    fn test_builders_match_parse() {
        let built = TypeShape::named("Rate").non_null().list().non_null();
        let parsed = TypeShape::parse("[Rate!]!").unwrap();
        assert!(built.same_wrapping(&parsed));
        assert_eq!(built.to_string(), parsed.to_string());
    }

    #[test]
    fn test_to_type_ref() {
        let shape = TypeShape::parse("[Rate!]!").unwrap();
        let type_ref = shape.to_type_ref("Rate");
        assert_eq!(type_ref.to_string(), "[Rate!]!");

        let nullable = TypeShape::parse("Recipe").unwrap();
        assert_eq!(nullable.to_type_ref("Recipe").to_string(), "Recipe");
    }
}
