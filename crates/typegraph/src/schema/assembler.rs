//! Translates a [`TypeGraph`] and its bindings into an executable schema.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Interface,
    InterfaceField, Object, ResolverContext, Scalar, Schema, SchemaBuilder, Subscription,
    SubscriptionField, SubscriptionFieldFuture, Union,
};
use async_graphql::{Name, Request, Response, Value as GraphValue};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde_json::Value;
use tracing::{debug, info};

use super::BuildOptions;
use crate::context::GraphContext;
use crate::error::{BuildError, BuildErrors, ResolverError};
use crate::graph::{
    ArgumentDefinition, EnumType, FieldDefinition, InputType, InterfaceType, ObjectType,
    ScalarType, TypeDefinition, TypeGraph, TypeUse, UnionType,
};
use crate::invocation::{BoundResolver, FieldRequest, Resolved, coerce_output};
use crate::registry::{Registry, ResolverOwner};
use crate::resolvers::{Bindings, ResolverBinder};
use crate::types::TypeKind;
use crate::value::{graphql_to_json_value, json_to_graphql_value};

/// Builds and assembles a schema from a registry in one step.
///
/// # Errors
///
/// Returns every graph, binding and assembly error found.
pub fn assemble_schema(
    registry: &Registry,
    options: &BuildOptions,
) -> Result<AssembledSchema, BuildErrors> {
    registry.build_schema(options)
}

/// The executable schema together with the graph and bindings it was
/// assembled from.
#[derive(Clone)]
pub struct AssembledSchema {
    schema: Schema,
    graph: Arc<TypeGraph>,
    bindings: Arc<Bindings>,
}

impl AssembledSchema {
    /// Executes an operation with the given request context.
    pub async fn execute(&self, request: impl Into<Request>, context: GraphContext) -> Response {
        let request = request.into().data(context);
        self.schema.execute(request).await
    }

    /// Executes a subscription operation; each event yields one response.
    pub fn execute_stream(
        &self,
        request: impl Into<Request>,
        context: GraphContext,
    ) -> BoxStream<'_, Response> {
        let request = request.into().data(context);
        self.schema.execute_stream(request).boxed()
    }

    /// The schema in SDL notation.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    /// The type graph the schema was assembled from.
    #[must_use]
    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    /// All resolver bindings.
    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// The binding of `owner.field`, for invoking a resolver directly.
    #[must_use]
    pub fn resolver(&self, owner: impl Into<ResolverOwner>, field: &str) -> Option<&Arc<BoundResolver>> {
        self.bindings.find(&owner.into(), field)
    }

    /// The underlying engine schema.
    #[must_use]
    pub fn engine(&self) -> &Schema {
        &self.schema
    }
}

impl std::fmt::Debug for AssembledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssembledSchema")
            .field("types", &self.graph.len())
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

/// Checks the graph for assembly-level problems, binds every resolver and
/// registers the result with the execution engine.
pub struct SchemaAssembler {
    graph: Arc<TypeGraph>,
    options: BuildOptions,
}

impl SchemaAssembler {
    /// Creates an assembler for `graph`.
    #[must_use]
    pub fn new(graph: TypeGraph, options: BuildOptions) -> Self {
        Self {
            graph: Arc::new(graph),
            options,
        }
    }

    /// Assembles the schema.
    ///
    /// # Errors
    ///
    /// Returns every assembly and binding error found, or the engine's
    /// rejection of the translated schema.
    pub fn assemble(self) -> Result<AssembledSchema, BuildErrors> {
        info!(types = self.graph.len(), "Assembling schema...");

        let mut errors = self.check();
        let bindings = match ResolverBinder::new(Arc::clone(&self.graph), &self.options).bind_all() {
            Ok(bindings) => Some(bindings),
            Err(binding_errors) => {
                errors.extend(binding_errors);
                None
            }
        };
        let Some(bindings) = bindings.filter(|_| errors.is_empty()) else {
            return Err(BuildErrors::new(errors));
        };

        let bindings = Arc::new(bindings);
        let schema = self.translate(&bindings)?;
        info!(bindings = bindings.len(), "Schema assembled");

        Ok(AssembledSchema {
            schema,
            graph: self.graph,
            bindings,
        })
    }

    /// Query root present, no empty composite types, and no name shared
    /// between separate namespaces.
    fn check(&self) -> Vec<BuildError> {
        let mut errors = Vec::new();
        if self.graph.root_fields(&ResolverOwner::Query).is_empty() {
            errors.push(BuildError::EmptyQueryRoot);
        }

        let mut seen: HashMap<&str, TypeKind> = HashMap::new();
        for def in self.graph.types() {
            let empty = match def {
                TypeDefinition::Object(t) if t.fields.is_empty() => Some("fields"),
                TypeDefinition::Interface(t) if t.fields.is_empty() => Some("fields"),
                TypeDefinition::Input(t) if t.fields.is_empty() => Some("fields"),
                TypeDefinition::Union(t) if t.members.is_empty() => Some("members"),
                TypeDefinition::Enum(t) if t.values.is_empty() => Some("values"),
                _ => None,
            };
            if let Some(what) = empty {
                errors.push(BuildError::EmptyType {
                    kind: def.kind(),
                    name: def.name().to_string(),
                    what,
                });
            }

            if let Some(&first) = seen.get(def.name()) {
                errors.push(BuildError::TypeNameClash {
                    name: def.name().to_string(),
                    first,
                    second: def.kind(),
                });
            } else {
                seen.insert(def.name(), def.kind());
            }
        }
        errors
    }

    fn translate(&self, bindings: &Arc<Bindings>) -> Result<Schema, BuildErrors> {
        let graph = &self.graph;
        let mutation = graph.root_fields(&ResolverOwner::Mutation);
        let subscription = graph.root_fields(&ResolverOwner::Subscription);

        let mut builder = Schema::build(
            "Query",
            (!mutation.is_empty()).then_some("Mutation"),
            (!subscription.is_empty()).then_some("Subscription"),
        );

        let mut errors = Vec::new();
        for owner in [ResolverOwner::Query, ResolverOwner::Mutation] {
            let fields = graph.root_fields(&owner);
            if fields.is_empty() {
                continue;
            }
            let mut root = Object::new(owner.type_name());
            for field in fields {
                match self.bound(&owner, field, bindings) {
                    Ok(bound) => root = root.field(self.bound_field(field, bound)),
                    Err(error) => errors.push(error),
                }
            }
            builder = builder.register(root);
        }

        if !subscription.is_empty() {
            let owner = ResolverOwner::Subscription;
            let mut root = Subscription::new(owner.type_name());
            for field in subscription {
                match self.bound(&owner, field, bindings) {
                    Ok(bound) => root = root.field(self.subscription_field(field, bound)),
                    Err(error) => errors.push(error),
                }
            }
            builder = builder.register(root);
        }

        for def in graph.types() {
            builder = match def {
                TypeDefinition::Object(object) => match self.object(object, bindings) {
                    Ok(object) => builder.register(object),
                    Err(error) => {
                        errors.push(error);
                        builder
                    }
                },
                TypeDefinition::Input(input) => builder.register(self.input_object(input)),
                TypeDefinition::Interface(iface) => builder.register(self.interface(iface)),
                TypeDefinition::Union(union) => builder.register(self.union(union)),
                TypeDefinition::Enum(enumeration) => builder.register(enum_type(enumeration)),
                TypeDefinition::Scalar(scalar) if scalar.builtin.is_none() => {
                    builder.register(scalar_type(scalar))
                }
                TypeDefinition::Scalar(_) => builder,
            };
        }
        if !errors.is_empty() {
            return Err(BuildErrors::new(errors));
        }

        builder = self.apply_limits(builder);
        builder
            .finish()
            .map_err(|e| BuildErrors::single(BuildError::Engine(e.to_string())))
    }

    fn apply_limits(&self, builder: SchemaBuilder) -> SchemaBuilder {
        let config = &self.options.config;
        let mut builder = builder
            .limit_depth(config.max_depth)
            .limit_complexity(config.max_complexity);
        if !config.introspection {
            debug!("introspection disabled");
            builder = builder.disable_introspection();
        }
        builder
    }

    /// Every resolver-backed field must have a binding.
    fn bound(
        &self,
        owner: &ResolverOwner,
        field: &FieldDefinition,
        bindings: &Bindings,
    ) -> Result<Arc<BoundResolver>, BuildError> {
        field
            .resolver
            .and_then(|id| bindings.get(id))
            .cloned()
            .ok_or_else(|| BuildError::ResolverTargetMissing {
                owner: owner.to_string(),
                field: field.name.clone(),
            })
    }

    fn object(&self, object: &ObjectType, bindings: &Bindings) -> Result<Object, BuildError> {
        let owner = ResolverOwner::Type(object.name.clone());
        let mut ty = Object::new(&object.name);
        if let Some(description) = &object.description {
            ty = ty.description(description);
        }
        for &iface in &object.interfaces {
            ty = ty.implement(self.graph.get(iface).name());
        }
        for field in &object.fields {
            let field = if field.resolver.is_some() {
                self.bound_field(field, self.bound(&owner, field, bindings)?)
            } else if let Some(inherited) = self.inherited(object, &field.name) {
                self.bound_field(field, self.bound(&owner, inherited, bindings)?)
            } else {
                self.data_field(&object.name, field)
            };
            ty = ty.field(field);
        }

        let mut added: Vec<&str> = Vec::new();
        for iface in self.interfaces_of(object) {
            for field in &iface.fields {
                if field.resolver.is_none()
                    || object.fields.iter().any(|f| f.name == field.name)
                    || added.contains(&field.name.as_str())
                {
                    continue;
                }
                added.push(&field.name);
                ty = ty.field(self.bound_field(field, self.bound(&owner, field, bindings)?));
            }
        }
        Ok(ty)
    }

    fn interfaces_of<'a>(
        &'a self,
        object: &'a ObjectType,
    ) -> impl Iterator<Item = &'a InterfaceType> {
        object
            .interfaces
            .iter()
            .filter_map(|&id| match self.graph.get(id) {
                TypeDefinition::Interface(iface) => Some(iface),
                _ => None,
            })
    }

    /// The resolver-backed interface field an object field falls back to.
    fn inherited<'a>(
        &'a self,
        object: &'a ObjectType,
        name: &str,
    ) -> Option<&'a FieldDefinition> {
        self.interfaces_of(object).find_map(|iface| {
            iface
                .fields
                .iter()
                .find(|f| f.name == name && f.resolver.is_some())
        })
    }

    /// A field read from the parent's JSON object.
    fn data_field(&self, owner: &str, field: &FieldDefinition) -> Field {
        let graph = Arc::clone(&self.graph);
        let ty = field.ty.clone();
        let name = field.name.clone();
        let location = format!("{owner}.{}", field.name);

        let resolved = Field::new(&field.name, graph.type_ref(&field.ty), move |ctx| {
            let graph = Arc::clone(&graph);
            let ty = ty.clone();
            let name = name.clone();
            let location = location.clone();
            FieldFuture::new(async move {
                let value = parent_property(&ctx, &name);
                let resolved = coerce_output(&graph, &ty, value).map_err(|message| {
                    ResolverError::Coercion {
                        field: location,
                        message,
                    }
                    .to_graphql_error()
                })?;
                Ok(resolved.into_field_value())
            })
        });
        self.decorate(resolved, field)
    }

    /// A field answered by the invocation pipeline.
    fn bound_field(&self, field: &FieldDefinition, bound: Arc<BoundResolver>) -> Field {
        let resolved = Field::new(&field.name, self.graph.type_ref(&field.ty), move |ctx| {
            let bound = Arc::clone(&bound);
            FieldFuture::new(async move {
                let request = field_request(&ctx, bound.owner());
                let resolved = bound
                    .resolve(request)
                    .await
                    .map_err(|e| e.to_graphql_error())?;
                Ok(resolved.into_field_value())
            })
        });
        self.decorate(resolved, field)
    }

    fn subscription_field(
        &self,
        field: &FieldDefinition,
        bound: Arc<BoundResolver>,
    ) -> SubscriptionField {
        let mut resolved = SubscriptionField::new(
            &field.name,
            self.graph.type_ref(&field.ty),
            move |ctx| {
                let bound = Arc::clone(&bound);
                let request = field_request(&ctx, bound.owner());
                SubscriptionFieldFuture::new(async move {
                    let events = bound
                        .subscribe(request)
                        .await
                        .map_err(|e| e.to_graphql_error())?;
                    Ok(events.map(|event| {
                        event
                            .map(Resolved::into_field_value_or_null)
                            .map_err(|e| e.to_graphql_error())
                    }))
                })
            },
        );
        if let Some(description) = &field.description {
            resolved = resolved.description(description);
        }
        if let Some(reason) = &field.deprecation {
            resolved = resolved.deprecation(Some(reason.as_str()));
        }
        for arg in &field.args {
            resolved = resolved.argument(self.argument(arg));
        }
        resolved
    }

    fn decorate(&self, mut resolved: Field, field: &FieldDefinition) -> Field {
        if let Some(description) = &field.description {
            resolved = resolved.description(description);
        }
        if let Some(reason) = &field.deprecation {
            resolved = resolved.deprecation(Some(reason.as_str()));
        }
        for arg in &field.args {
            resolved = resolved.argument(self.argument(arg));
        }
        resolved
    }

    fn argument(&self, arg: &ArgumentDefinition) -> InputValue {
        let mut input = InputValue::new(&arg.name, self.graph.type_ref(&arg.ty));
        if let Some(description) = &arg.description {
            input = input.description(description);
        }
        if let Some(default) = &arg.default {
            input = input.default_value(engine_default(&self.graph, &arg.ty, default));
        }
        input
    }

    fn input_object(&self, input: &InputType) -> InputObject {
        let mut ty = InputObject::new(&input.name);
        if let Some(description) = &input.description {
            ty = ty.description(description);
        }
        for field in &input.fields {
            let mut value = InputValue::new(&field.name, self.graph.type_ref(&field.ty));
            if let Some(description) = &field.description {
                value = value.description(description);
            }
            if let Some(default) = &field.default {
                value = value.default_value(engine_default(&self.graph, &field.ty, default));
            }
            ty = ty.field(value);
        }
        ty
    }

    fn interface(&self, iface: &InterfaceType) -> Interface {
        let mut ty = Interface::new(&iface.name);
        if let Some(description) = &iface.description {
            ty = ty.description(description);
        }
        for field in &iface.fields {
            let mut resolved = InterfaceField::new(&field.name, self.graph.type_ref(&field.ty));
            if let Some(description) = &field.description {
                resolved = resolved.description(description);
            }
            if let Some(reason) = &field.deprecation {
                resolved = resolved.deprecation(Some(reason.as_str()));
            }
            for arg in &field.args {
                resolved = resolved.argument(self.argument(arg));
            }
            ty = ty.field(resolved);
        }
        ty
    }

    fn union(&self, union: &UnionType) -> Union {
        let mut ty = Union::new(&union.name);
        if let Some(description) = &union.description {
            ty = ty.description(description);
        }
        for &member in &union.members {
            ty = ty.possible_type(self.graph.get(member).name());
        }
        ty
    }
}

fn enum_type(enumeration: &EnumType) -> Enum {
    let mut ty = Enum::new(&enumeration.name);
    if let Some(description) = &enumeration.description {
        ty = ty.description(description);
    }
    for value in &enumeration.values {
        let mut item = EnumItem::new(&value.name);
        if let Some(description) = &value.description {
            item = item.description(description);
        }
        if let Some(reason) = &value.deprecation {
            item = item.deprecation(Some(reason.as_str()));
        }
        ty = ty.item(item);
    }
    ty
}

fn scalar_type(scalar: &ScalarType) -> Scalar {
    let mut ty = Scalar::new(&scalar.name);
    if let Some(description) = &scalar.description {
        ty = ty.description(description);
    }
    if let Some(url) = &scalar.specified_by_url {
        ty = ty.specified_by_url(url);
    }
    if let Some(validator) = scalar.validator.clone() {
        ty = ty.validator(move |value: &GraphValue| validator(&graphql_to_json_value(value)));
    }
    ty
}

/// Converts a default written as JSON into an engine value; strings at enum
/// positions become enum literals.
fn engine_default(graph: &TypeGraph, ty: &TypeUse, value: &Value) -> GraphValue {
    if value.is_null() {
        return GraphValue::Null;
    }
    if let Some(item) = ty.list_item() {
        return match value {
            Value::Array(items) => GraphValue::List(
                items
                    .iter()
                    .map(|v| engine_default(graph, &item, v))
                    .collect(),
            ),
            single => engine_default(graph, &item, single),
        };
    }
    match (graph.get(ty.target), value) {
        (TypeDefinition::Enum(_), Value::String(name)) => GraphValue::Enum(Name::new(name)),
        (TypeDefinition::Input(input), Value::Object(map)) => GraphValue::Object(
            map.iter()
                .map(|(key, v)| {
                    let converted = match input.fields.iter().find(|f| &f.name == key) {
                        Some(field) => engine_default(graph, &field.ty, v),
                        None => json_to_graphql_value(v.clone()),
                    };
                    (Name::new(key), converted)
                })
                .collect(),
        ),
        _ => json_to_graphql_value(value.clone()),
    }
}

/// The parent value as JSON. Objects produced by resolvers are carried as
/// owned JSON; anything else goes through the engine value.
fn parent_json(ctx: &ResolverContext<'_>) -> Value {
    if let Some(parent) = ctx.parent_value.downcast_ref::<Value>() {
        return parent.clone();
    }
    ctx.parent_value
        .as_value()
        .map(graphql_to_json_value)
        .unwrap_or(Value::Null)
}

fn parent_property(ctx: &ResolverContext<'_>, name: &str) -> Value {
    if let Some(parent) = ctx.parent_value.downcast_ref::<Value>() {
        return parent.get(name).cloned().unwrap_or(Value::Null);
    }
    match ctx.parent_value.as_value() {
        Some(GraphValue::Object(map)) => map
            .get(name)
            .map(graphql_to_json_value)
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn field_request(ctx: &ResolverContext<'_>, owner: &ResolverOwner) -> FieldRequest {
    let context = ctx
        .ctx
        .data_opt::<GraphContext>()
        .cloned()
        .unwrap_or_default();
    let root = if owner.is_root() {
        context.root_value.clone().unwrap_or(Value::Null)
    } else {
        parent_json(ctx)
    };
    let args = ctx
        .args
        .iter()
        .map(|(name, value)| (name.to_string(), graphql_to_json_value(value.as_value())))
        .collect();

    FieldRequest {
        root,
        args,
        context,
        path: ctx.ctx.path_node.as_ref().map(ToString::to_string),
    }
}
