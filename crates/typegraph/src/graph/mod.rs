//! The resolved type graph.
//!
//! Types live in an arena indexed by [`TypeId`]; every field and argument
//! points at its target through a [`TypeUse`], never by name. Circular and
//! self references (`Recipe.ratings: [Rate!]!`, `Rate.recipe: Recipe`) are
//! plain ids, so the graph needs no reference counting between types.

mod builder;
mod validate;

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::BuildWarning;
use crate::registry::{ResolverOwner, ScalarValidator, TypeResolver};
use crate::resolvers::{EventSource, Handler, ParameterSource, Stage};
use crate::types::{BuiltinScalar, Namespace, TypeKind, render_shape, to_type_ref};

pub(crate) use builder::build;

/// Index of a type in a [`TypeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    /// Arena position.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a resolver in a [`TypeGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolverId(pub(crate) usize);

/// A resolved reference to a type, with nullability and list wrapping.
///
/// Same layout as [`TypeShape`](crate::types::TypeShape): `nullable` is the
/// outermost position, `lists` the item nullability of each list level,
/// outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeUse {
    /// Target type.
    pub target: TypeId,
    /// Whether the outermost value may be null.
    pub nullable: bool,
    /// Per list level item nullability, outermost first.
    pub lists: Vec<bool>,
}

impl TypeUse {
    /// Returns `true` if the outermost position is a list.
    #[must_use]
    pub fn is_list(&self) -> bool {
        !self.lists.is_empty()
    }

    /// The item type of the outermost list, if any.
    #[must_use]
    pub fn list_item(&self) -> Option<TypeUse> {
        let (&item_nullable, rest) = self.lists.split_first()?;
        Some(TypeUse {
            target: self.target,
            nullable: item_nullable,
            lists: rest.to_vec(),
        })
    }

    pub(crate) fn with_nullable(&self, nullable: bool) -> TypeUse {
        TypeUse {
            nullable,
            ..self.clone()
        }
    }
}

/// An argument of an output field.
#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    /// Argument name.
    pub name: String,
    /// Input type.
    pub ty: TypeUse,
    /// Default value, as a caller would write it.
    pub default: Option<Value>,
    /// Description.
    pub description: Option<String>,
}

/// A field of an object, interface, input or root operation type.
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: TypeUse,
    /// Arguments (output fields only).
    pub args: Vec<ArgumentDefinition>,
    /// Default value (input fields only).
    pub default: Option<Value>,
    /// Description.
    pub description: Option<String>,
    /// Deprecation reason.
    pub deprecation: Option<String>,
    /// Resolver backing the field; `None` for plain data fields.
    pub resolver: Option<ResolverId>,
}

impl FieldDefinition {
    /// Looks up an argument by name.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&ArgumentDefinition> {
        self.args.iter().find(|a| a.name == name)
    }
}

/// An output object type.
#[derive(Debug, Clone)]
pub struct ObjectType {
    /// Arena id.
    pub id: TypeId,
    /// Type name.
    pub name: String,
    /// Declaration origin.
    pub origin: String,
    /// Description.
    pub description: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Implemented interfaces.
    pub interfaces: Vec<TypeId>,
}

/// An input object type.
#[derive(Debug, Clone)]
pub struct InputType {
    /// Arena id.
    pub id: TypeId,
    /// Type name.
    pub name: String,
    /// Declaration origin.
    pub origin: String,
    /// Description.
    pub description: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDefinition>,
}

/// An interface type.
#[derive(Clone)]
pub struct InterfaceType {
    /// Arena id.
    pub id: TypeId,
    /// Type name.
    pub name: String,
    /// Declaration origin.
    pub origin: String,
    /// Description.
    pub description: Option<String>,
    /// Fields every implementation must provide.
    pub fields: Vec<FieldDefinition>,
    pub(crate) resolve_type: Option<TypeResolver>,
}

/// A union of object types.
#[derive(Clone)]
pub struct UnionType {
    /// Arena id.
    pub id: TypeId,
    /// Type name.
    pub name: String,
    /// Declaration origin.
    pub origin: String,
    /// Description.
    pub description: Option<String>,
    /// Member object types.
    pub members: Vec<TypeId>,
    pub(crate) resolve_type: Option<TypeResolver>,
}

/// One value of an [`EnumType`].
#[derive(Debug, Clone)]
pub struct EnumValue {
    /// GraphQL-facing name.
    pub name: String,
    /// Internal value.
    pub value: Value,
    /// Description.
    pub description: Option<String>,
    /// Deprecation reason.
    pub deprecation: Option<String>,
}

/// An enum type.
#[derive(Debug, Clone)]
pub struct EnumType {
    /// Arena id.
    pub id: TypeId,
    /// Type name.
    pub name: String,
    /// Declaration origin.
    pub origin: String,
    /// Description.
    pub description: Option<String>,
    /// Values in declaration order.
    pub values: Vec<EnumValue>,
}

impl EnumType {
    /// Maps a GraphQL-facing name to its internal value.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.name == name).map(|v| &v.value)
    }

    /// Maps an internal value to its GraphQL-facing name.
    #[must_use]
    pub fn name_of(&self, value: &Value) -> Option<&str> {
        self.values
            .iter()
            .find(|v| &v.value == value)
            .map(|v| v.name.as_str())
    }
}

/// A built-in or custom scalar.
#[derive(Clone)]
pub struct ScalarType {
    /// Arena id.
    pub id: TypeId,
    /// Type name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Set for the five built-in scalars.
    pub builtin: Option<BuiltinScalar>,
    /// `@specifiedBy` URL.
    pub specified_by_url: Option<String>,
    pub(crate) validator: Option<ScalarValidator>,
}

impl ScalarType {
    /// Checks a non-null value against the scalar.
    pub(crate) fn check(&self, value: &Value) -> Result<Value, String> {
        match (self.builtin, &self.validator) {
            (Some(builtin), _) => builtin.coerce_output(value),
            (None, Some(validator)) if !validator(value) => {
                Err(format!("{} cannot represent value {value}", self.name))
            }
            (None, _) => Ok(value.clone()),
        }
    }
}

/// A node of the type graph.
#[derive(Clone)]
pub enum TypeDefinition {
    /// Output object.
    Object(ObjectType),
    /// Input object.
    Input(InputType),
    /// Interface.
    Interface(InterfaceType),
    /// Union.
    Union(UnionType),
    /// Enum.
    Enum(EnumType),
    /// Scalar.
    Scalar(ScalarType),
}

impl TypeDefinition {
    /// Arena id.
    #[must_use]
    pub fn id(&self) -> TypeId {
        match self {
            Self::Object(t) => t.id,
            Self::Input(t) => t.id,
            Self::Interface(t) => t.id,
            Self::Union(t) => t.id,
            Self::Enum(t) => t.id,
            Self::Scalar(t) => t.id,
        }
    }

    /// Type name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Object(t) => &t.name,
            Self::Input(t) => &t.name,
            Self::Interface(t) => &t.name,
            Self::Union(t) => &t.name,
            Self::Enum(t) => &t.name,
            Self::Scalar(t) => &t.name,
        }
    }

    /// Type kind.
    #[must_use]
    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Object(_) => TypeKind::Object,
            Self::Input(_) => TypeKind::Input,
            Self::Interface(_) => TypeKind::Interface,
            Self::Union(_) => TypeKind::Union,
            Self::Enum(_) => TypeKind::Enum,
            Self::Scalar(_) => TypeKind::Scalar,
        }
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Object(t) => t.description.as_deref(),
            Self::Input(t) => t.description.as_deref(),
            Self::Interface(t) => t.description.as_deref(),
            Self::Union(t) => t.description.as_deref(),
            Self::Enum(t) => t.description.as_deref(),
            Self::Scalar(t) => t.description.as_deref(),
        }
    }

    /// Fields of objects, interfaces and inputs; empty otherwise.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        match self {
            Self::Object(t) => &t.fields,
            Self::Input(t) => &t.fields,
            Self::Interface(t) => &t.fields,
            _ => &[],
        }
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub(crate) fn fields_mut(&mut self) -> Option<&mut Vec<FieldDefinition>> {
        match self {
            Self::Object(t) => Some(&mut t.fields),
            Self::Input(t) => Some(&mut t.fields),
            Self::Interface(t) => Some(&mut t.fields),
            _ => None,
        }
    }

    /// Returns `true` for the five built-in scalars.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::Scalar(ScalarType { builtin: Some(_), .. }))
    }
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .field("fields", &self.fields().len())
            .finish()
    }
}

/// The declaration snapshot behind a resolver-backed field.
#[derive(Clone)]
pub struct ResolverSpec {
    /// Owner of the field.
    pub owner: ResolverOwner,
    /// Field name.
    pub field: String,
    /// Parameter plan, in handler order.
    pub params: Vec<ParameterSource>,
    pub(crate) stages: Vec<Stage>,
    pub(crate) handler: Option<std::sync::Arc<dyn Handler>>,
    pub(crate) source: Option<std::sync::Arc<dyn EventSource>>,
}

impl fmt::Debug for ResolverSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverSpec")
            .field("owner", &self.owner)
            .field("field", &self.field)
            .field("params", &self.params)
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

/// The fully resolved type graph.
///
/// Built once from a frozen registry. Exactly one definition exists per
/// declared name and kind namespace; built-in scalars are always present.
#[derive(Clone)]
pub struct TypeGraph {
    types: Vec<TypeDefinition>,
    names: HashMap<(Namespace, String), TypeId>,
    query: Vec<FieldDefinition>,
    mutation: Vec<FieldDefinition>,
    subscription: Vec<FieldDefinition>,
    resolvers: Vec<ResolverSpec>,
    class_stages: HashMap<ResolverOwner, Vec<Stage>>,
    warnings: Vec<BuildWarning>,
}

impl TypeGraph {
    /// Returns the definition for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this graph.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &TypeDefinition {
        &self.types[id.0]
    }

    /// Looks up a type by namespace and name.
    #[must_use]
    pub fn lookup(&self, namespace: Namespace, name: &str) -> Option<&TypeDefinition> {
        self.names
            .get(&(namespace, name.to_string()))
            .map(|id| self.get(*id))
    }

    /// Looks up an output type (object, interface, union or enum) by name.
    #[must_use]
    pub fn output_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.lookup(Namespace::Output, name)
    }

    /// Looks up an object type by name.
    #[must_use]
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        match self.output_type(name) {
            Some(TypeDefinition::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Looks up an input type by name.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<&InputType> {
        match self.lookup(Namespace::Input, name) {
            Some(TypeDefinition::Input(input)) => Some(input),
            _ => None,
        }
    }

    /// Looks up an enum by name.
    #[must_use]
    pub fn enumeration(&self, name: &str) -> Option<&EnumType> {
        match self.output_type(name) {
            Some(TypeDefinition::Enum(e)) => Some(e),
            _ => None,
        }
    }

    /// Looks up a scalar by name.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&ScalarType> {
        match self.lookup(Namespace::Scalar, name) {
            Some(TypeDefinition::Scalar(s)) => Some(s),
            _ => None,
        }
    }

    /// All types, built-in scalars first, then declaration order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.iter()
    }

    /// Number of types including built-in scalars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always `false`; built-in scalars are always present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Fields of a root operation type; empty for object owners.
    #[must_use]
    pub fn root_fields(&self, owner: &ResolverOwner) -> &[FieldDefinition] {
        match owner {
            ResolverOwner::Query => &self.query,
            ResolverOwner::Mutation => &self.mutation,
            ResolverOwner::Subscription => &self.subscription,
            ResolverOwner::Type(_) => &[],
        }
    }

    /// Finds the field a resolver owner and field name designate.
    #[must_use]
    pub fn field(&self, owner: &ResolverOwner, field: &str) -> Option<&FieldDefinition> {
        match owner {
            ResolverOwner::Type(name) => self
                .output_type(name)
                .and_then(|t| t.fields().iter().find(|f| f.name == field)),
            root => self.root_fields(root).iter().find(|f| f.name == field),
        }
    }

    /// Resolver declarations, indexed by [`ResolverId`].
    #[must_use]
    pub fn resolvers(&self) -> &[ResolverSpec] {
        &self.resolvers
    }

    /// Returns the resolver declaration for `id`.
    #[must_use]
    pub fn resolver(&self, id: ResolverId) -> Option<&ResolverSpec> {
        self.resolvers.get(id.0)
    }

    /// Stages declared for every resolver of `owner`.
    #[must_use]
    pub fn class_stages(&self, owner: &ResolverOwner) -> &[Stage] {
        self.class_stages
            .get(owner)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Non-fatal observations from the build.
    #[must_use]
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Renders a type use in SDL notation, e.g. `[Rate!]!`.
    #[must_use]
    pub fn render(&self, ty: &TypeUse) -> String {
        render_shape(self.get(ty.target).name(), ty.nullable, &ty.lists)
    }

    pub(crate) fn type_ref(&self, ty: &TypeUse) -> async_graphql::dynamic::TypeRef {
        to_type_ref(self.get(ty.target).name(), ty.nullable, &ty.lists)
    }

    /// Returns `true` if object `concrete` can stand in for `abstract_type`
    /// (an implemented interface or a union containing it).
    #[must_use]
    pub fn is_possible_type(&self, abstract_type: TypeId, concrete: TypeId) -> bool {
        match (self.get(abstract_type), self.get(concrete)) {
            (TypeDefinition::Interface(_), TypeDefinition::Object(object)) => {
                object.interfaces.contains(&abstract_type)
            }
            (TypeDefinition::Union(union), TypeDefinition::Object(_)) => {
                union.members.contains(&concrete)
            }
            _ => false,
        }
    }
}

impl fmt::Debug for TypeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeGraph")
            .field("types", &self.types)
            .field("query", &self.query.len())
            .field("mutation", &self.mutation.len())
            .field("subscription", &self.subscription.len())
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}
