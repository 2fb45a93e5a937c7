//! The recipes schema served by the CLI.

use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::debug;
use typegraph::resolvers::{Call, EventStream};
use typegraph::{
    ArgumentDecl, BuildOptions, EnumValueDecl, FieldDecl, Middleware, Next, Params, Registry,
    RegistryError, ResolverDecl, ResolverError, RoleChecker, SchemaConfig, ServiceContainer, Stage,
    TypeDecl,
};

const STORE: &str = "store";

/// In-memory recipe storage shared by every resolver.
pub struct RecipeStore {
    recipes: RwLock<Vec<Value>>,
}

impl RecipeStore {
    pub fn seeded() -> Self {
        Self {
            recipes: RwLock::new(vec![
                json!({"id": "r-1", "title": "Pancakes", "difficulty": 1, "ratings": [5, 4]}),
                json!({"id": "r-2", "title": "Soufflé", "difficulty": 3, "ratings": [3]}),
                json!({"id": "r-3", "title": "Risotto", "difficulty": 2, "ratings": []}),
            ]),
        }
    }

    async fn list(&self, difficulty: Option<i64>) -> Vec<Value> {
        self.recipes
            .read()
            .await
            .iter()
            .filter(|r| difficulty.is_none_or(|d| r["difficulty"].as_i64() == Some(d)))
            .cloned()
            .collect()
    }

    async fn find(&self, id: &str) -> Option<Value> {
        self.recipes
            .read()
            .await
            .iter()
            .find(|r| r["id"] == id)
            .cloned()
    }

    async fn rate(&self, id: &str, value: i64) -> Option<Value> {
        let mut recipes = self.recipes.write().await;
        let recipe = recipes.iter_mut().find(|r| r["id"] == id)?;
        if let Some(ratings) = recipe["ratings"].as_array_mut() {
            ratings.push(json!(value));
        }
        Some(recipe.clone())
    }
}

/// Logs how long each field took to resolve.
struct Timing;

#[async_trait]
impl Middleware for Timing {
    async fn call(&self, call: Call, next: Next) -> Result<Value, ResolverError> {
        let started = Instant::now();
        let field = format!("{}.{}", call.info.parent_type, call.info.field_name);
        let result = next.run(call).await;
        debug!(
            field = %field,
            elapsed_us = started.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "field resolved"
        );
        result
    }
}

async fn recipes(params: Params) -> Result<Value, ResolverError> {
    let difficulty: Option<i64> = params.arg("difficulty")?;
    let store = params.inject::<RecipeStore>(STORE)?;
    Ok(Value::Array(store.list(difficulty).await))
}

async fn recipe(params: Params) -> Result<Value, ResolverError> {
    let id: String = params.arg("id")?;
    let store = params.inject::<RecipeStore>(STORE)?;
    Ok(store.find(&id).await.unwrap_or(Value::Null))
}

async fn average_rating(params: Params) -> Result<Value, ResolverError> {
    let ratings: Vec<i64> = params
        .root()
        .and_then(|r| r["ratings"].as_array())
        .map(|values| values.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    if ratings.is_empty() {
        return Ok(Value::Null);
    }
    let total: i64 = ratings.iter().sum();
    Ok(json!(total as f64 / ratings.len() as f64))
}

async fn rate_recipe(params: Params) -> Result<Value, ResolverError> {
    let input: Value = params.arg("input")?;
    let id = input["recipeId"].as_str().unwrap_or_default();
    let value = input["value"].as_i64().unwrap_or_default();
    if !(1..=5).contains(&value) {
        return Err(ResolverError::InvalidArgument {
            argument: "input".to_string(),
            message: format!("rating must be between 1 and 5, got {value}"),
        });
    }
    let store = params.inject::<RecipeStore>(STORE)?;
    store
        .rate(id, value)
        .await
        .ok_or_else(|| ResolverError::handler(format!("recipe '{id}' not found")))
}

/// Replays stored ratings at or above `min` as events.
async fn rating_feed(params: Params) -> Result<EventStream, ResolverError> {
    let min: i64 = params.arg("min")?;
    let store = params.inject::<RecipeStore>(STORE)?;
    let events: Vec<Value> = store
        .list(None)
        .await
        .into_iter()
        .flat_map(|recipe| {
            let id = recipe["id"].clone();
            recipe["ratings"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(move |value| json!({"recipeId": id, "value": value}))
        })
        .filter(|event| event["value"].as_i64().unwrap_or_default() >= min)
        .collect();
    Ok(futures_util::stream::iter(events).boxed())
}

/// Declares the recipes schema.
pub fn registry() -> Result<Registry, RegistryError> {
    let registry = Registry::new();

    registry.declare_type(
        TypeDecl::enumeration("Difficulty")
            .description("How hard a recipe is to cook")
            .enum_value(EnumValueDecl::new("EASY", 1))
            .enum_value(EnumValueDecl::new("MEDIUM", 2))
            .enum_value(EnumValueDecl::new("HARD", 3)),
    )?;

    registry.declare_type(TypeDecl::object("Recipe").description("A recipe in the book"))?;
    registry.declare_field("Recipe", FieldDecl::new("id", "ID!"))?;
    registry.declare_field("Recipe", FieldDecl::new("title", "String!"))?;
    registry.declare_field("Recipe", FieldDecl::new("difficulty", "Difficulty!"))?;
    registry.declare_field("Recipe", FieldDecl::new("ratings", "[Int!]!"))?;
    registry.declare_resolver(
        "Recipe",
        ResolverDecl::new("averageRating", average_rating)
            .returns("Float")
            .root(),
    )?;

    registry.declare_type(TypeDecl::object("Rating"))?;
    registry.declare_field("Rating", FieldDecl::new("recipeId", "ID!"))?;
    registry.declare_field("Rating", FieldDecl::new("value", "Int!"))?;

    registry.declare_type(TypeDecl::input("RateInput"))?;
    registry.declare_field("RateInput", FieldDecl::new("recipeId", "ID!"))?;
    registry.declare_field("RateInput", FieldDecl::new("value", "Int!").default_value(5))?;

    registry.declare_resolver(
        "Query",
        ResolverDecl::new("recipes", recipes)
            .returns("[Recipe!]!")
            .arg(ArgumentDecl::new("difficulty", "Difficulty"))
            .inject(STORE),
    )?;
    registry.declare_resolver(
        "Query",
        ResolverDecl::new("recipe", recipe)
            .returns("Recipe")
            .arg(ArgumentDecl::new("id", "ID!"))
            .inject(STORE),
    )?;

    registry.declare_resolver(
        "Mutation",
        ResolverDecl::new("rateRecipe", rate_recipe)
            .description("Adds a rating; requires the CHEF role")
            .returns("Recipe!")
            .arg(ArgumentDecl::new("input", "RateInput!"))
            .inject(STORE)
            .stage(Stage::authorized(["CHEF"])),
    )?;

    registry.declare_resolver(
        "Subscription",
        ResolverDecl::subscription("ratingFeed", rating_feed)
            .returns("Rating!")
            .arg(ArgumentDecl::new("min", "Int").default_value(1))
            .inject(STORE),
    )?;

    Ok(registry)
}

/// Build options for the recipes schema.
pub fn options(config: SchemaConfig) -> BuildOptions {
    BuildOptions::from_config(config)
        .with_global_stage(Stage::middleware(Timing))
        .with_auth_checker(RoleChecker)
        .with_container(ServiceContainer::new().with_value(STORE, RecipeStore::seeded()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use typegraph::{GraphContext, GraphContextBuilder, Principal};

    fn schema() -> typegraph::AssembledSchema {
        registry()
            .unwrap()
            .build_schema(&options(SchemaConfig::default()))
            .unwrap()
    }

    #[test]
    fn test_demo_schema_builds() {
        let schema = schema();
        let sdl = schema.sdl();
        assert!(sdl.contains("enum Difficulty"));
        assert!(sdl.contains("input RateInput"));
        assert!(sdl.contains("ratingFeed"));
        assert!(schema.graph().warnings().is_empty());
    }

    #[tokio::test]
    async fn test_filter_by_difficulty() {
        let response = schema()
            .execute(
                "{ recipes(difficulty: HARD) { title difficulty averageRating } }",
                GraphContext::default(),
            )
            .await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"recipes": [{"title": "Soufflé", "difficulty": "HARD", "averageRating": 3.0}]})
        );
    }

    #[tokio::test]
    async fn test_rating_requires_chef() {
        let schema = schema();
        let mutation = r#"mutation { rateRecipe(input: {recipeId: "r-3"}) { ratings } }"#;

        let response = schema.execute(mutation, GraphContext::default()).await;
        assert_eq!(response.errors.len(), 1);

        let chef = GraphContextBuilder::new()
            .with_user(Principal::new("ana").with_role("CHEF"))
            .build();
        let response = schema.execute(mutation, chef).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({"rateRecipe": {"ratings": [5]}})
        );
    }

    #[tokio::test]
    async fn test_rating_feed() {
        let events: Vec<_> = schema()
            .execute_stream(
                "subscription { ratingFeed(min: 4) { recipeId value } }",
                GraphContext::default(),
            )
            .map(|r| r.data.into_json().unwrap())
            .collect()
            .await;
        assert_eq!(
            events,
            vec![
                json!({"ratingFeed": {"recipeId": "r-1", "value": 5}}),
                json!({"ratingFeed": {"recipeId": "r-1", "value": 4}}),
            ]
        );
    }
}
