//! Input and output value coercion against the type graph.
//!
//! Input coercion turns caller-supplied JSON into the values handlers see:
//! enum names become internal values, input object defaults are applied and
//! a single value in a list position becomes a one-item list. Output
//! coercion checks a handler's result against the field's declared type and
//! produces a [`Resolved`] tree the engine can walk.

use async_graphql::dynamic::FieldValue;
use async_graphql::{Name, Value as GraphValue};
use serde_json::{Map, Value};

use crate::graph::{TypeDefinition, TypeGraph, TypeUse};
use crate::value::json_to_graphql_value;

/// Converts a caller-supplied value into its internal form.
///
/// # Errors
///
/// Returns a message describing the first mismatch found.
pub(crate) fn coerce_input(graph: &TypeGraph, ty: &TypeUse, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return if ty.nullable {
            Ok(Value::Null)
        } else {
            Err(format!("expected non-null {}", graph.render(ty)))
        };
    }

    if let Some(item) = ty.list_item() {
        return match value {
            Value::Array(items) => items
                .iter()
                .map(|v| coerce_input(graph, &item, v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![coerce_input(graph, &item, single)?])),
        };
    }

    match graph.get(ty.target) {
        TypeDefinition::Scalar(scalar) => match scalar.builtin {
            Some(builtin) => builtin.coerce_input(value),
            None => scalar
                .check(value)
                .map_err(|_| format!("invalid value {value} for scalar {}", scalar.name)),
        },
        TypeDefinition::Enum(enumeration) => value
            .as_str()
            .and_then(|name| enumeration.value_of(name))
            .cloned()
            .ok_or_else(|| format!("{value} is not a value of enum {}", enumeration.name)),
        TypeDefinition::Input(input) => {
            let Value::Object(fields) = value else {
                return Err(format!("expected an object for {}, found {value}", input.name));
            };
            if let Some(unknown) = fields.keys().find(|k| input.fields.iter().all(|f| &f.name != *k)) {
                return Err(format!("unknown field '{unknown}' for {}", input.name));
            }

            let mut out = Map::new();
            for field in &input.fields {
                let supplied = fields.get(&field.name).or(field.default.as_ref());
                match supplied {
                    Some(v) => {
                        let coerced = coerce_input(graph, &field.ty, v)
                            .map_err(|e| format!("{}.{}: {e}", input.name, field.name))?;
                        out.insert(field.name.clone(), coerced);
                    }
                    None if !field.ty.nullable => {
                        return Err(format!(
                            "missing required field '{}' for {}",
                            field.name, input.name
                        ));
                    }
                    None => {}
                }
            }
            Ok(Value::Object(out))
        }
        other => Err(format!("{} is not an input type", other.name())),
    }
}

/// A handler result checked against its declared type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    Null,
    Leaf(Value),
    Enum(String),
    Object {
        type_name: String,
        value: Value,
        is_abstract: bool,
    },
    List(Vec<Resolved>),
}

impl Resolved {
    /// Converts back to plain JSON (enum values by name).
    pub(crate) fn into_json(self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Leaf(value) | Self::Object { value, .. } => value,
            Self::Enum(name) => Value::String(name),
            Self::List(items) => Value::Array(items.into_iter().map(Self::into_json).collect()),
        }
    }

    /// Converts into the engine's field value. Objects are carried as owned
    /// JSON so nested fields read their properties from it.
    pub(crate) fn into_field_value<'a>(self) -> Option<FieldValue<'a>> {
        match self {
            Self::Null => None,
            other => Some(other.into_field_value_or_null()),
        }
    }

    pub(crate) fn into_field_value_or_null<'a>(self) -> FieldValue<'a> {
        match self {
            Self::Null => FieldValue::NULL,
            Self::Leaf(value) => FieldValue::value(json_to_graphql_value(value)),
            Self::Enum(name) => FieldValue::value(GraphValue::Enum(Name::new(name))),
            Self::Object {
                type_name,
                value,
                is_abstract,
            } => {
                let object = FieldValue::owned_any(value);
                if is_abstract {
                    object.with_type(type_name)
                } else {
                    object
                }
            }
            Self::List(items) => {
                FieldValue::list(items.into_iter().map(Self::into_field_value_or_null))
            }
        }
    }
}

/// Checks a handler result against `ty`.
///
/// # Errors
///
/// Returns a message describing the first mismatch found, including a null
/// in a non-null position.
pub(crate) fn coerce_output(graph: &TypeGraph, ty: &TypeUse, value: Value) -> Result<Resolved, String> {
    if value.is_null() {
        return if ty.nullable {
            Ok(Resolved::Null)
        } else {
            Err(format!("non-nullable {} resolved to null", graph.render(ty)))
        };
    }

    if let Some(item) = ty.list_item() {
        let Value::Array(items) = value else {
            return Err(format!("expected a list for {}, found {value}", graph.render(ty)));
        };
        return items
            .into_iter()
            .enumerate()
            .map(|(i, v)| coerce_output(graph, &item, v).map_err(|e| format!("item {i}: {e}")))
            .collect::<Result<Vec<_>, _>>()
            .map(Resolved::List);
    }

    match graph.get(ty.target) {
        TypeDefinition::Scalar(scalar) => scalar.check(&value).map(Resolved::Leaf),
        TypeDefinition::Enum(enumeration) => enumeration
            .name_of(&value)
            .map(|name| Resolved::Enum(name.to_string()))
            .ok_or_else(|| format!("{value} is not a value of enum {}", enumeration.name)),
        TypeDefinition::Object(object) => {
            if !value.is_object() {
                return Err(format!("expected an object for {}, found {value}", object.name));
            }
            Ok(Resolved::Object {
                type_name: object.name.clone(),
                value,
                is_abstract: false,
            })
        }
        TypeDefinition::Interface(iface) => {
            let concrete = concrete_type(graph, ty, iface.resolve_type.as_deref(), &value, &iface.name)?;
            Ok(Resolved::Object {
                type_name: concrete,
                value,
                is_abstract: true,
            })
        }
        TypeDefinition::Union(union) => {
            let concrete = concrete_type(graph, ty, union.resolve_type.as_deref(), &value, &union.name)?;
            Ok(Resolved::Object {
                type_name: concrete,
                value,
                is_abstract: true,
            })
        }
        TypeDefinition::Input(input) => Err(format!("{} is not an output type", input.name)),
    }
}

/// Picks the concrete object type for an abstract value and checks that it
/// belongs to the abstract type.
fn concrete_type(
    graph: &TypeGraph,
    ty: &TypeUse,
    resolve_type: Option<&(dyn Fn(&Value) -> Option<String> + Send + Sync)>,
    value: &Value,
    abstract_name: &str,
) -> Result<String, String> {
    if !value.is_object() {
        return Err(format!("expected an object for {abstract_name}, found {value}"));
    }
    let name = match resolve_type {
        Some(resolve) => resolve(value),
        None => value
            .get("__typename")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
    .ok_or_else(|| format!("cannot determine the concrete type of {abstract_name} value"))?;

    match graph.object(&name) {
        Some(object) if graph.is_possible_type(ty.target, object.id) => Ok(name),
        _ => Err(format!("'{name}' is not a possible type of {abstract_name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EnumValueDecl, FieldDecl, Registry, ResolverDecl, TypeDecl};
    use crate::resolvers::Params;
    use crate::types::Namespace;
    use serde_json::json;

    async fn noop(_params: Params) -> Result<Value, crate::error::ResolverError> {
        Ok(Value::Null)
    }

    fn graph() -> TypeGraph {
        let registry = Registry::new();
        registry
            .declare_type(
                TypeDecl::enumeration("Difficulty")
                    .enum_value(EnumValueDecl::new("EASY", 1))
                    .enum_value(EnumValueDecl::new("HARD", 3)),
            )
            .unwrap();
        registry.declare_type(TypeDecl::input("RecipeInput")).unwrap();
        registry
            .declare_field("RecipeInput", FieldDecl::new("title", "String!"))
            .unwrap();
        registry
            .declare_field(
                "RecipeInput",
                FieldDecl::new("difficulty", "Difficulty!").default_value("EASY"),
            )
            .unwrap();
        registry
            .declare_field("RecipeInput", FieldDecl::new("tags", "[String!]"))
            .unwrap();
        registry.declare_type(TypeDecl::object("Recipe")).unwrap();
        registry
            .declare_field("Recipe", FieldDecl::new("title", "String"))
            .unwrap();
        registry.declare_type(TypeDecl::object("Cook")).unwrap();
        registry
            .declare_field("Cook", FieldDecl::new("name", "String"))
            .unwrap();
        registry
            .declare_type(TypeDecl::union("SearchResult").member("Recipe"))
            .unwrap();
        registry
            .declare_resolver(
                "Query",
                ResolverDecl::new("search", noop).returns("[SearchResult!]!"),
            )
            .unwrap();
        registry.build().unwrap()
    }

    fn use_of(graph: &TypeGraph, ns: Namespace, name: &str, nullable: bool, lists: Vec<bool>) -> TypeUse {
        TypeUse {
            target: graph.lookup(ns, name).unwrap().id(),
            nullable,
            lists,
        }
    }

    #[test]
    fn test_input_object_defaults_and_enums() {
        let graph = graph();
        let ty = use_of(&graph, Namespace::Input, "RecipeInput", false, vec![]);

        let value = coerce_input(&graph, &ty, &json!({"title": "Soup", "tags": "quick"})).unwrap();
        assert_eq!(value, json!({"title": "Soup", "difficulty": 1, "tags": ["quick"]}));

        let value = coerce_input(&graph, &ty, &json!({"title": "Stew", "difficulty": "HARD"})).unwrap();
        assert_eq!(value["difficulty"], json!(3));
    }

    #[test]
    fn test_input_object_rejections() {
        let graph = graph();
        let ty = use_of(&graph, Namespace::Input, "RecipeInput", false, vec![]);

        assert!(coerce_input(&graph, &ty, &json!({})).unwrap_err().contains("title"));
        assert!(coerce_input(&graph, &ty, &json!({"title": "x", "chef": "y"})).is_err());
        assert!(coerce_input(&graph, &ty, &json!({"title": "x", "difficulty": "MEDIUM"})).is_err());
        assert!(coerce_input(&graph, &ty, &Value::Null).is_err());
    }

    #[test]
    fn test_output_enum_maps_internal_value() {
        let graph = graph();
        let ty = use_of(&graph, Namespace::Output, "Difficulty", true, vec![]);

        assert_eq!(
            coerce_output(&graph, &ty, json!(3)).unwrap(),
            Resolved::Enum("HARD".into())
        );
        assert!(coerce_output(&graph, &ty, json!(2)).is_err());
    }

    #[test]
    fn test_output_empty_list_is_not_null() {
        let graph = graph();
        let ty = use_of(&graph, Namespace::Output, "Recipe", false, vec![false]);

        assert_eq!(coerce_output(&graph, &ty, json!([])).unwrap(), Resolved::List(vec![]));
        assert!(coerce_output(&graph, &ty, Value::Null).is_err());
        assert!(coerce_output(&graph, &ty, json!([null])).is_err());
    }

    #[test]
    fn test_output_union_membership() {
        let graph = graph();
        let ty = use_of(&graph, Namespace::Output, "SearchResult", false, vec![]);

        let resolved = coerce_output(&graph, &ty, json!({"__typename": "Recipe", "title": "Soup"})).unwrap();
        assert!(matches!(resolved, Resolved::Object { ref type_name, is_abstract: true, .. } if type_name == "Recipe"));

        let err = coerce_output(&graph, &ty, json!({"__typename": "Cook"})).unwrap_err();
        assert!(err.contains("not a possible type"));
        assert!(coerce_output(&graph, &ty, json!({"title": "x"})).is_err());
    }

    #[test]
    fn test_output_scalars_are_strict() {
        let graph = graph();
        let ty = use_of(&graph, Namespace::Scalar, "Int", true, vec![]);
        assert!(coerce_output(&graph, &ty, json!("12")).is_err());
        assert_eq!(coerce_output(&graph, &ty, json!(12)).unwrap(), Resolved::Leaf(json!(12)));
    }
}
