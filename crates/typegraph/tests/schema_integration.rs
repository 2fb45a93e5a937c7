//! Integration tests for declaring, building and executing schemas.
//!
//! A small recipes domain is declared through the public API and queried
//! through the execution engine.

use serde_json::{Value, json};
use typegraph::{
    ArgumentDecl, BuildError, BuildOptions, BuildWarning, EnumValueDecl, FieldDecl, GraphContext,
    Params, Registry, RegistryError, ResolverDecl, ResolverError, TypeDecl, TypeKind, TypeShape,
};

// =============================================================================
// Fixtures
// =============================================================================

const ORIGIN: &str = "recipes::model";

fn recipes_data() -> Value {
    json!([
        {
            "id": "r-1",
            "title": "Pancakes",
            "difficulty": 1,
            "ratings": [{"value": 5}, {"value": 4}]
        },
        {
            "id": "r-2",
            "title": "Soufflé",
            "difficulty": 3,
            "ratings": []
        }
    ])
}

async fn list_recipes(params: Params) -> Result<Value, ResolverError> {
    let difficulty: Option<i64> = params.arg("difficulty")?;
    let recipes = recipes_data();
    let Value::Array(items) = recipes else {
        return Ok(Value::Array(Vec::new()));
    };
    let matching = items
        .into_iter()
        .filter(|r| difficulty.is_none_or(|d| r["difficulty"] == json!(d)))
        .collect();
    Ok(Value::Array(matching))
}

async fn rate_recipe(params: Params) -> Result<Value, ResolverError> {
    // Every rate belongs to the first recipe in this fixture.
    let _rate = params.root().cloned().unwrap_or(Value::Null);
    Ok(recipes_data()[0].clone())
}

/// Recipe and Rate reference each other; Rate is declared after Recipe
/// refers to it, and Recipe.ratings goes through a lazy thunk.
fn recipes_registry() -> Registry {
    let registry = Registry::new();

    registry
        .declare_type(
            TypeDecl::enumeration("Difficulty")
                .enum_value(EnumValueDecl::new("EASY", 1))
                .enum_value(EnumValueDecl::new("MEDIUM", 2))
                .enum_value(EnumValueDecl::new("HARD", 3).description("Needs practice")),
        )
        .unwrap();

    registry
        .declare_type(
            TypeDecl::object("Recipe")
                .origin(ORIGIN)
                .description("A cooking recipe"),
        )
        .unwrap();
    registry
        .declare_field("Recipe", FieldDecl::new("id", "ID!"))
        .unwrap();
    registry
        .declare_field("Recipe", FieldDecl::new("title", "String!"))
        .unwrap();
    registry
        .declare_field("Recipe", FieldDecl::new("difficulty", "Difficulty!"))
        .unwrap();
    registry
        .declare_field(
            "Recipe",
            FieldDecl::new(
                "ratings",
                TypeShape::lazy(|| "Rate".to_string()).non_null().list().non_null(),
            ),
        )
        .unwrap();

    registry
        .declare_type(TypeDecl::object("Rate").origin(ORIGIN))
        .unwrap();
    registry
        .declare_field("Rate", FieldDecl::new("value", "Int!"))
        .unwrap();
    registry
        .declare_resolver(
            "Rate",
            ResolverDecl::new("recipe", rate_recipe).returns("Recipe!").root(),
        )
        .unwrap();

    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("recipes", list_recipes)
                .returns("[Recipe!]!")
                .arg(ArgumentDecl::new("difficulty", "Difficulty")),
        )
        .unwrap();

    registry
}

// =============================================================================
// Type graph
// =============================================================================

#[test]
fn test_circular_references_resolve() {
    let registry = recipes_registry();
    let graph = registry.build().unwrap();

    let recipe = graph.object("Recipe").unwrap();
    let ratings = recipe.fields.iter().find(|f| f.name == "ratings").unwrap();
    assert_eq!(graph.get(ratings.ty.target).name(), "Rate");
    assert_eq!(graph.render(&ratings.ty), "[Rate!]!");

    let rate = graph.object("Rate").unwrap();
    let back = rate.fields.iter().find(|f| f.name == "recipe").unwrap();
    assert_eq!(graph.get(back.ty.target).name(), "Recipe");
    assert!(back.resolver.is_some());
}

#[test]
fn test_one_definition_per_name() {
    let registry = recipes_registry();
    // A reopened declaration from the same origin merges.
    registry
        .declare_type(TypeDecl::object("Rate").origin(ORIGIN).description("A score"))
        .unwrap();
    let graph = registry.build().unwrap();

    let rates = graph.types().filter(|t| t.name() == "Rate").count();
    assert_eq!(rates, 1);
    assert_eq!(
        graph.output_type("Rate").and_then(|t| t.description()),
        Some("A score")
    );
    for def in graph.types() {
        for field in def.fields() {
            assert!(!graph.get(field.ty.target).name().is_empty());
        }
    }
}

#[test]
fn test_duplicate_object_names_both_origins() {
    let registry = Registry::new();
    registry
        .declare_type(TypeDecl::object("Recipe").origin("recipes::Recipe"))
        .unwrap();
    registry
        .declare_type(TypeDecl::object("Recipe").origin("legacy::Recipe"))
        .unwrap();

    let errors = registry.build().unwrap_err();
    let duplicate = errors
        .iter()
        .find(|e| matches!(e, BuildError::DuplicateType { .. }))
        .expect("duplicate type reported");
    match duplicate {
        BuildError::DuplicateType {
            kind,
            name,
            first,
            second,
        } => {
            assert_eq!(*kind, TypeKind::Object);
            assert_eq!(name, "Recipe");
            assert_eq!(first, "recipes::Recipe");
            assert_eq!(second, "legacy::Recipe");
        }
        _ => unreachable!(),
    }
    let message = duplicate.to_string();
    assert!(message.contains("recipes::Recipe") && message.contains("legacy::Recipe"));
}

/// Declares an object with one field, the way a shared module helper would.
fn declare_object(registry: &Registry, name: &str, field: &str) {
    registry.declare_type(TypeDecl::object(name)).unwrap();
    registry
        .declare_field(name, FieldDecl::new(field, "String"))
        .unwrap();
}

#[test]
fn test_duplicate_object_through_shared_helper() {
    let registry = Registry::new();
    declare_object(&registry, "Recipe", "title");
    declare_object(&registry, "Recipe", "chef");

    let errors = registry.build().unwrap_err();
    assert!(errors.any(|e| matches!(
        e,
        BuildError::DuplicateType { kind: TypeKind::Object, name, .. } if name == "Recipe"
    )));
}

#[test]
fn test_duplicate_object_declared_in_loop() {
    let registry = Registry::new();
    for _ in 0..2 {
        registry.declare_type(TypeDecl::object("Recipe")).unwrap();
    }
    registry
        .declare_field("Recipe", FieldDecl::new("title", "String"))
        .unwrap();

    let errors = registry.build().unwrap_err();
    let duplicates = errors
        .iter()
        .filter(|e| matches!(e, BuildError::DuplicateType { .. }))
        .count();
    assert_eq!(duplicates, 1);
}

#[test]
fn test_unkeyed_declaration_does_not_reopen_partial() {
    let registry = recipes_registry();
    registry.declare_type(TypeDecl::object("Rate")).unwrap();

    let errors = registry.build().unwrap_err();
    assert!(errors.any(|e| matches!(e, BuildError::DuplicateType { name, .. } if name == "Rate")));
}

#[test]
fn test_errors_are_reported_together() {
    let registry = Registry::new();
    registry.declare_type(TypeDecl::object("Recipe")).unwrap();
    registry
        .declare_field("Recipe", FieldDecl::new("author", "Author!"))
        .unwrap();
    registry
        .declare_field("Recipe", FieldDecl::new("title", "String!"))
        .unwrap();
    registry
        .declare_field("Recipe", FieldDecl::new("title", "String"))
        .unwrap();
    registry
        .declare_type(TypeDecl::union("SearchResult").member("Missing"))
        .unwrap();

    let errors = registry.build().unwrap_err();
    assert!(errors.len() >= 3, "{errors}");
    assert!(errors.any(|e| matches!(e, BuildError::UnresolvedReference { name, .. } if name == "Author")));
    assert!(errors.any(|e| matches!(e, BuildError::DuplicateField { field, .. } if field == "title")));
    assert!(errors.any(|e| matches!(e, BuildError::InvalidUnionMember { member, .. } if member == "Missing")));
}

#[test]
fn test_registry_frozen_after_build() {
    let registry = recipes_registry();
    registry.build().unwrap();

    let err = registry
        .declare_field("Recipe", FieldDecl::new("servings", "Int"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Frozen { .. }));
}

#[test]
fn test_rebuild_is_idempotent() {
    let registry = recipes_registry();
    let first = registry.build_schema(&BuildOptions::default()).unwrap();
    let second = registry.build_schema(&BuildOptions::default()).unwrap();

    assert_eq!(first.sdl(), second.sdl());
    assert_eq!(first.graph().len(), second.graph().len());
    assert_eq!(registry.len(), recipes_registry().len());
}

#[test]
fn test_resolver_overrides_data_field() {
    let registry = recipes_registry();
    registry
        .declare_resolver(
            "Recipe",
            ResolverDecl::new("title", |params: Params| async move {
                let root = params.root().cloned().unwrap_or(Value::Null);
                Ok(json!(root["title"].as_str().unwrap_or_default().to_uppercase()))
            })
            .root(),
        )
        .unwrap();

    let graph = registry.build().unwrap();
    assert!(graph.warnings().iter().any(|w| matches!(
        w,
        BuildWarning::ResolverOverridesField { owner, field } if owner == "Recipe" && field == "title"
    )));
}

// =============================================================================
// Execution
// =============================================================================

#[tokio::test]
async fn test_query_nested_cycle() {
    let schema = recipes_registry()
        .build_schema(&BuildOptions::default())
        .unwrap();

    let response = schema
        .execute(
            "{ recipes { title difficulty ratings { value recipe { id } } } }",
            GraphContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "recipes": [
                {
                    "title": "Pancakes",
                    "difficulty": "EASY",
                    "ratings": [
                        {"value": 5, "recipe": {"id": "r-1"}},
                        {"value": 4, "recipe": {"id": "r-1"}}
                    ]
                },
                {"title": "Soufflé", "difficulty": "HARD", "ratings": []}
            ]
        })
    );
}

#[tokio::test]
async fn test_enum_argument_maps_to_internal_value() {
    let schema = recipes_registry()
        .build_schema(&BuildOptions::default())
        .unwrap();

    let response = schema
        .execute("{ recipes(difficulty: HARD) { id } }", GraphContext::default())
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({"recipes": [{"id": "r-2"}]})
    );
}

#[tokio::test]
async fn test_empty_list_is_not_null() {
    let registry = recipes_registry();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("favorites", |_params: Params| async move { Ok(json!([])) })
                .returns("[Recipe!]!"),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();

    let response = schema
        .execute("{ favorites { title } }", GraphContext::default())
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(response.data.into_json().unwrap(), json!({"favorites": []}));
}

#[tokio::test]
async fn test_null_in_non_null_field_is_scoped() {
    let registry = recipes_registry();
    registry
        .declare_resolver(
            "Recipe",
            ResolverDecl::new("author", |_params: Params| async move { Ok(Value::Null) })
                .returns("String!"),
        )
        .unwrap();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("featured", |_params: Params| async move {
                Ok(recipes_data()[0].clone())
            })
            .returns("Recipe"),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();

    let response = schema
        .execute(
            "{ featured { title author } recipes { title } }",
            GraphContext::default(),
        )
        .await;

    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert!(error.message.contains("Recipe.author"), "{}", error.message);
    let code = error.extensions.as_ref().and_then(|e| e.get("code")).cloned();
    assert_eq!(code, Some(async_graphql::Value::from("COERCION_ERROR")));

    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "featured": null,
            "recipes": [{"title": "Pancakes"}, {"title": "Soufflé"}]
        })
    );
}

#[tokio::test]
async fn test_interfaces_and_unions() {
    let registry = recipes_registry();
    registry
        .declare_type(
            TypeDecl::interface("Node").resolve_type(|value: &Value| {
                value.get("title").map(|_| "Recipe".to_string())
            }),
        )
        .unwrap();
    registry
        .declare_field("Node", FieldDecl::new("id", "ID!"))
        .unwrap();
    registry
        .declare_type(TypeDecl::object("Recipe").origin(ORIGIN).implements("Node"))
        .unwrap();
    registry
        .declare_type(TypeDecl::union("SearchResult").member("Recipe").member("Rate"))
        .unwrap();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("node", |params: Params| async move {
                let id: String = params.arg("id")?;
                let Value::Array(items) = recipes_data() else {
                    return Ok(Value::Null);
                };
                Ok(items
                    .into_iter()
                    .find(|r| r["id"] == json!(id))
                    .unwrap_or(Value::Null))
            })
            .returns("Node")
            .arg(ArgumentDecl::new("id", "ID!")),
        )
        .unwrap();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("search", |_params: Params| async move {
                Ok(json!([
                    {"__typename": "Recipe", "id": "r-1", "title": "Pancakes", "difficulty": 1, "ratings": []},
                    {"__typename": "Rate", "value": 3}
                ]))
            })
            .returns("[SearchResult!]!"),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();

    let response = schema
        .execute(
            r#"{
                node(id: "r-2") { id ... on Recipe { title } }
                search {
                    __typename
                    ... on Recipe { title }
                    ... on Rate { value }
                }
            }"#,
            GraphContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "node": {"id": "r-2", "title": "Soufflé"},
            "search": [
                {"__typename": "Recipe", "title": "Pancakes"},
                {"__typename": "Rate", "value": 3}
            ]
        })
    );
}

#[tokio::test]
async fn test_interface_resolver_is_inherited() {
    let registry = recipes_registry();
    registry
        .declare_type(
            TypeDecl::interface("Node").resolve_type(|value: &Value| {
                value.get("title").map(|_| "Recipe".to_string())
            }),
        )
        .unwrap();
    registry
        .declare_field("Node", FieldDecl::new("id", "ID!"))
        .unwrap();
    registry
        .declare_resolver(
            "Node",
            ResolverDecl::new("label", |params: Params| async move {
                let id = params.root().and_then(|r| r["id"].as_str()).unwrap_or_default();
                Ok(json!(format!("node:{id}")))
            })
            .returns("String!")
            .root(),
        )
        .unwrap();
    registry
        .declare_type(TypeDecl::object("Recipe").origin(ORIGIN).implements("Node"))
        .unwrap();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("node", |params: Params| async move {
                let id: String = params.arg("id")?;
                let Value::Array(items) = recipes_data() else {
                    return Ok(Value::Null);
                };
                Ok(items
                    .into_iter()
                    .find(|r| r["id"] == json!(id))
                    .unwrap_or(Value::Null))
            })
            .returns("Node")
            .arg(ArgumentDecl::new("id", "ID!")),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();
    assert!(schema.sdl().contains("label: String!"));

    let response = schema
        .execute(
            r#"{
                node(id: "r-2") {
                    viaInterface: label
                    ... on Recipe { viaObject: label title }
                }
            }"#,
            GraphContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "node": {"viaInterface": "node:r-2", "viaObject": "node:r-2", "title": "Soufflé"}
        })
    );
}

#[tokio::test]
async fn test_input_objects_and_defaults() {
    let registry = recipes_registry();
    registry.declare_type(TypeDecl::input("RecipeInput")).unwrap();
    registry
        .declare_field("RecipeInput", FieldDecl::new("title", "String!"))
        .unwrap();
    registry
        .declare_field(
            "RecipeInput",
            FieldDecl::new("difficulty", "Difficulty!").default_value("MEDIUM"),
        )
        .unwrap();
    registry
        .declare_resolver(
            "Mutation",
            ResolverDecl::new("addRecipe", |params: Params| async move {
                let input: Value = params.arg("input")?;
                Ok(json!({
                    "id": "r-3",
                    "title": input["title"],
                    "difficulty": input["difficulty"],
                    "ratings": []
                }))
            })
            .returns("Recipe!")
            .arg(ArgumentDecl::new("input", "RecipeInput!")),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();
    assert!(schema.sdl().contains("type Mutation"));

    let response = schema
        .execute(
            r#"mutation { addRecipe(input: {title: "Toast"}) { id title difficulty } }"#,
            GraphContext::default(),
        )
        .await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({"addRecipe": {"id": "r-3", "title": "Toast", "difficulty": "MEDIUM"}})
    );
}

#[tokio::test]
async fn test_custom_scalar_validation() {
    let registry = recipes_registry();
    registry
        .declare_type(
            TypeDecl::scalar("Slug")
                .specified_by_url("https://example.com/slug")
                .validator(|value: &Value| {
                    value
                        .as_str()
                        .is_some_and(|s| s.chars().all(|c| c.is_ascii_lowercase() || c == '-'))
                }),
        )
        .unwrap();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("echoSlug", |params: Params| async move {
                params.arg::<Value>("slug")
            })
            .returns("Slug")
            .arg(ArgumentDecl::new("slug", "Slug!")),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();

    let ok = schema
        .execute(r#"{ echoSlug(slug: "lemon-tart") }"#, GraphContext::default())
        .await;
    assert!(ok.errors.is_empty(), "{:?}", ok.errors);
    assert_eq!(ok.data.into_json().unwrap(), json!({"echoSlug": "lemon-tart"}));

    let rejected = schema
        .execute(r#"{ echoSlug(slug: "Lemon Tart") }"#, GraphContext::default())
        .await;
    assert!(!rejected.errors.is_empty());
}

#[tokio::test]
async fn test_root_value_reaches_root_resolvers() {
    let registry = recipes_registry();
    registry
        .declare_resolver(
            "Query",
            ResolverDecl::new("tenant", |params: Params| async move {
                Ok(params.root().map(|r| r["tenant"].clone()).unwrap_or(Value::Null))
            })
            .returns("String")
            .root(),
        )
        .unwrap();
    let schema = registry.build_schema(&BuildOptions::default()).unwrap();

    let context = typegraph::GraphContextBuilder::new()
        .with_root_value(json!({"tenant": "kitchen-1"}))
        .build();
    let response = schema.execute("{ tenant }", context).await;

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(response.data.into_json().unwrap(), json!({"tenant": "kitchen-1"}));
}

#[test]
fn test_sdl_lists_declared_types() {
    let schema = recipes_registry()
        .build_schema(&BuildOptions::default())
        .unwrap();
    let sdl = schema.sdl();

    assert!(sdl.contains("type Recipe"));
    assert!(sdl.contains("ratings: [Rate!]!"));
    assert!(sdl.contains("enum Difficulty"));
    assert!(sdl.contains("recipes(difficulty: Difficulty): [Recipe!]!"));
}

#[test]
fn test_introspection_disabled_by_config() {
    let config = typegraph::SchemaConfig {
        introspection: false,
        ..typegraph::SchemaConfig::default()
    };
    let schema = recipes_registry()
        .build_schema(&BuildOptions::from_config(config))
        .unwrap();

    let response = tokio_test::block_on(
        schema.execute("{ __schema { queryType { name } } }", GraphContext::default()),
    );
    let refused = !response.errors.is_empty();
    let data = response.data.into_json().unwrap();
    assert!(refused || data["__schema"].is_null(), "{data}");
}
