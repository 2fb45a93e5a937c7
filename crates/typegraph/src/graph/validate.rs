//! Whole-graph checks run after every reference is resolved.

use super::{FieldDefinition, ObjectType, TypeDefinition, TypeGraph, TypeUse};
use crate::error::BuildError;
use crate::invocation::coerce_input;
use crate::registry::ResolverOwner;

pub(super) fn check(graph: &TypeGraph) -> Vec<BuildError> {
    let mut errors = Vec::new();

    for def in graph.types() {
        if let TypeDefinition::Object(object) = def {
            check_interfaces(graph, object, &mut errors);
        }
        for field in def.fields() {
            if let (TypeDefinition::Input(input), Some(default)) = (def, &field.default) {
                let location = format!("input field {}.{}", input.name, field.name);
                check_default(graph, &field.ty, default, location, &mut errors);
            }
            check_argument_defaults(graph, def.name(), field, &mut errors);
        }
    }

    for owner in [
        ResolverOwner::Query,
        ResolverOwner::Mutation,
        ResolverOwner::Subscription,
    ] {
        for field in graph.root_fields(&owner) {
            check_argument_defaults(graph, owner.type_name(), field, &mut errors);
        }
    }

    errors
}

fn check_argument_defaults(
    graph: &TypeGraph,
    owner: &str,
    field: &FieldDefinition,
    errors: &mut Vec<BuildError>,
) {
    for arg in &field.args {
        if let Some(default) = &arg.default {
            let location = format!("argument {owner}.{}({})", field.name, arg.name);
            check_default(graph, &arg.ty, default, location, errors);
        }
    }
}

fn check_default(
    graph: &TypeGraph,
    ty: &TypeUse,
    default: &serde_json::Value,
    location: String,
    errors: &mut Vec<BuildError>,
) {
    if let Err(reason) = coerce_input(graph, ty, default) {
        errors.push(BuildError::InvalidDefault { location, reason });
    }
}

/// Every interface field must be present with a compatible type and the
/// same arguments; extra arguments must be optional.
fn check_interfaces(graph: &TypeGraph, object: &ObjectType, errors: &mut Vec<BuildError>) {
    for &iface_id in &object.interfaces {
        let TypeDefinition::Interface(iface) = graph.get(iface_id) else {
            continue;
        };

        for expected in &iface.fields {
            let Some(found) = object.fields.iter().find(|f| f.name == expected.name) else {
                // Resolver-backed interface fields are inherited.
                if expected.resolver.is_some() {
                    continue;
                }
                errors.push(BuildError::MissingInterfaceField {
                    owner: object.name.clone(),
                    interface: iface.name.clone(),
                    field: expected.name.clone(),
                });
                continue;
            };

            let incompatible = |field: String, expected: String, found: String| {
                BuildError::IncompatibleInterfaceField {
                    owner: object.name.clone(),
                    interface: iface.name.clone(),
                    field,
                    expected,
                    found,
                }
            };

            if !is_valid_implementation(graph, &found.ty, &expected.ty) {
                errors.push(incompatible(
                    found.name.clone(),
                    graph.render(&expected.ty),
                    graph.render(&found.ty),
                ));
            }

            for arg in &expected.args {
                let location = format!("{}({})", found.name, arg.name);
                match found.arg(&arg.name) {
                    Some(own) if own.ty == arg.ty => {}
                    Some(own) => errors.push(incompatible(
                        location,
                        graph.render(&arg.ty),
                        graph.render(&own.ty),
                    )),
                    None => errors.push(incompatible(
                        location,
                        graph.render(&arg.ty),
                        "no such argument".to_string(),
                    )),
                }
            }

            for own in &found.args {
                let required = !own.ty.nullable && own.default.is_none();
                if required && expected.arg(&own.name).is_none() {
                    errors.push(incompatible(
                        format!("{}({})", found.name, own.name),
                        "an optional argument".to_string(),
                        graph.render(&own.ty),
                    ));
                }
            }
        }
    }
}

/// Covariant field type check: an implementation may strengthen
/// nullability and may narrow an abstract type to one of its possible
/// object types.
pub(crate) fn is_valid_implementation(graph: &TypeGraph, found: &TypeUse, expected: &TypeUse) -> bool {
    if !found.nullable {
        let expected = if expected.nullable {
            expected.clone()
        } else {
            expected.with_nullable(true)
        };
        return is_valid_implementation(graph, &found.with_nullable(true), &expected);
    }
    if !expected.nullable {
        return false;
    }

    match (found.list_item(), expected.list_item()) {
        (Some(found), Some(expected)) => is_valid_implementation(graph, &found, &expected),
        (None, None) => {
            found.target == expected.target || graph.is_possible_type(expected.target, found.target)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ArgumentDecl, FieldDecl, Registry, ResolverDecl, TypeDecl};
    use crate::resolvers::Params;
    use serde_json::{Value, json};

    async fn noop(_params: Params) -> Result<Value, crate::error::ResolverError> {
        Ok(Value::Null)
    }

    fn registry_with_node() -> Registry {
        let registry = Registry::new();
        registry.declare_type(TypeDecl::interface("Node")).unwrap();
        registry
            .declare_field("Node", FieldDecl::new("id", "ID!"))
            .unwrap();
        registry
            .declare_resolver(
                "Query",
                ResolverDecl::new("node", noop).returns("Node"),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_interface_satisfied_with_stronger_type() {
        let registry = registry_with_node();
        registry
            .declare_field("Node", FieldDecl::new("parent", "Node"))
            .unwrap();
        registry
            .declare_type(TypeDecl::object("Recipe").implements("Node"))
            .unwrap();
        registry
            .declare_field("Recipe", FieldDecl::new("id", "ID!"))
            .unwrap();
        registry
            .declare_field("Recipe", FieldDecl::new("parent", "Recipe!"))
            .unwrap();

        assert!(registry.build().is_ok());
    }

    #[test]
    fn test_interface_missing_and_incompatible_fields() {
        let registry = registry_with_node();
        registry
            .declare_field("Node", FieldDecl::new("name", "String!"))
            .unwrap();
        registry
            .declare_type(TypeDecl::object("Recipe").implements("Node"))
            .unwrap();
        registry
            .declare_field("Recipe", FieldDecl::new("id", "ID"))
            .unwrap();

        let errors = registry.build().unwrap_err();
        assert!(errors.any(|e| matches!(
            e,
            BuildError::MissingInterfaceField { field, .. } if field == "name"
        )));
        assert!(errors.any(|e| matches!(
            e,
            BuildError::IncompatibleInterfaceField { field, .. } if field == "id"
        )));
    }

    #[test]
    fn test_interface_arguments_must_match() {
        let registry = registry_with_node();
        registry
            .declare_field(
                "Node",
                FieldDecl::new("label", "String").arg(ArgumentDecl::new("lang", "String")),
            )
            .unwrap();
        registry
            .declare_type(TypeDecl::object("Recipe").implements("Node"))
            .unwrap();
        registry
            .declare_field("Recipe", FieldDecl::new("id", "ID!"))
            .unwrap();
        registry
            .declare_field(
                "Recipe",
                FieldDecl::new("label", "String").arg(ArgumentDecl::new("format", "String!")),
            )
            .unwrap();

        let errors = registry.build().unwrap_err();
        let count = errors
            .iter()
            .filter(|e| matches!(e, BuildError::IncompatibleInterfaceField { .. }))
            .count();
        // missing `lang`, extra required `format`
        assert_eq!(count, 2);
    }

    #[test]
    fn test_invalid_defaults() {
        let registry = Registry::new();
        registry
            .declare_type(TypeDecl::enumeration("Difficulty").value("EASY"))
            .unwrap();
        registry
            .declare_resolver(
                "Query",
                ResolverDecl::new("recipes", noop)
                    .returns("[String!]!")
                    .arg(ArgumentDecl::new("first", "Int").default_value("ten"))
                    .arg(ArgumentDecl::new("level", "Difficulty").default_value(json!("HARD")))
                    .arg(ArgumentDecl::new("ok", "Difficulty").default_value(json!("EASY"))),
            )
            .unwrap();

        let errors = registry.build().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, BuildError::InvalidDefault { .. })));
    }
}
