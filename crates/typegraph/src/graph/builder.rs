//! Two-pass construction of the type graph.
//!
//! Pass one merges partial declarations, assigns every type an id and
//! registers a skeleton definition. Pass two resolves every name used by
//! fields, arguments, interfaces and union members against the complete
//! name table, so declaration order never matters and cycles need no
//! special handling. Errors are collected rather than returned early.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{
    ArgumentDefinition, EnumType, EnumValue, FieldDefinition, InputType, InterfaceType,
    ObjectType, ResolverId, ResolverSpec, ScalarType, TypeDefinition, TypeGraph, TypeId,
    TypeUse, UnionType, validate,
};
use crate::error::{BuildError, BuildErrors, BuildWarning};
use crate::registry::{
    ArgumentDecl, Declarations, EnumValueDecl, FieldDecl, ResolverDecl, ResolverOwner, TypeDecl,
};
use crate::resolvers::Stage;
use crate::types::{
    BuiltinScalar, Namespace, ROOT_TYPE_NAMES, TypeKind, TypeShape, is_valid_name, render_shape,
};

/// Builds and validates a graph from a declaration snapshot.
pub(crate) fn build(declarations: &Declarations) -> Result<TypeGraph, BuildErrors> {
    let mut builder = Builder::default();

    let merged = builder.merge_types(&declarations.types);
    let ids = builder.assign_ids(&merged);
    builder.link_types(&merged, &ids);

    for (owner, field) in &declarations.fields {
        builder.attach_field(owner, field);
    }
    for (owner, decl) in &declarations.resolvers {
        builder.attach_resolver(owner, decl);
    }
    builder.collect_stages(&merged, &declarations.stages);

    let (graph, mut errors) = builder.finish();
    errors.extend(validate::check(&graph));

    debug!(
        types = graph.len(),
        resolvers = graph.resolvers().len(),
        errors = errors.len(),
        "type graph built"
    );
    BuildErrors::into_result(errors, graph)
}

/// Where a referenced type is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Input,
    Output,
}

#[derive(Default)]
struct Builder {
    types: Vec<TypeDefinition>,
    names: HashMap<(Namespace, String), TypeId>,
    query: Vec<FieldDefinition>,
    mutation: Vec<FieldDefinition>,
    subscription: Vec<FieldDefinition>,
    resolvers: Vec<ResolverSpec>,
    class_stages: HashMap<ResolverOwner, Vec<Stage>>,
    warnings: Vec<BuildWarning>,
    errors: Vec<BuildError>,
}

fn is_reserved(name: &str) -> bool {
    BuiltinScalar::from_name(name).is_some()
        || ROOT_TYPE_NAMES.contains(&name)
        || name.starts_with("__")
}

impl Builder {
    // ---- pass one -------------------------------------------------------

    /// Merges partial declarations sharing a name and origin; reports
    /// every other repeated name as a duplicate.
    fn merge_types(&mut self, decls: &[TypeDecl]) -> Vec<TypeDecl> {
        let mut merged: IndexMap<(Namespace, String), TypeDecl> = IndexMap::new();

        for decl in decls {
            if !is_valid_name(&decl.name) {
                self.errors.push(BuildError::InvalidName {
                    what: "type",
                    name: decl.name.clone(),
                });
                continue;
            }
            if is_reserved(&decl.name) {
                self.errors.push(BuildError::ReservedName {
                    name: decl.name.clone(),
                });
                continue;
            }

            let key = (decl.kind.namespace(), decl.name.clone());
            match merged.get_mut(&key) {
                None => {
                    merged.insert(key, decl.clone());
                }
                Some(existing) if existing.kind != decl.kind => {
                    self.errors.push(BuildError::NameCollision {
                        name: decl.name.clone(),
                        first: existing.kind,
                        second: decl.kind,
                    });
                }
                Some(existing)
                    if !(existing.partial && decl.partial && existing.origin == decl.origin) =>
                {
                    self.errors.push(BuildError::DuplicateType {
                        kind: decl.kind,
                        name: decl.name.clone(),
                        first: existing.origin.clone(),
                        second: decl.origin.clone(),
                    });
                }
                Some(existing) => {
                    if let Err(reason) = merge_partial(existing, decl) {
                        self.errors.push(BuildError::ConflictingType {
                            name: decl.name.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        merged.into_values().collect()
    }

    /// Registers built-in scalars and a skeleton for every declared type.
    fn assign_ids(&mut self, merged: &[TypeDecl]) -> Vec<TypeId> {
        for builtin in BuiltinScalar::ALL {
            let id = self.register(Namespace::Scalar, builtin.name());
            self.types.push(TypeDefinition::Scalar(ScalarType {
                id,
                name: builtin.name().to_string(),
                description: None,
                builtin: Some(builtin),
                specified_by_url: None,
                validator: None,
            }));
        }

        merged
            .iter()
            .map(|decl| {
                let id = self.register(decl.kind.namespace(), &decl.name);
                let skeleton = self.skeleton(id, decl);
                self.types.push(skeleton);
                id
            })
            .collect()
    }

    fn register(&mut self, namespace: Namespace, name: &str) -> TypeId {
        let id = TypeId(self.types.len());
        self.names.insert((namespace, name.to_string()), id);
        id
    }

    fn skeleton(&mut self, id: TypeId, decl: &TypeDecl) -> TypeDefinition {
        let name = decl.name.clone();
        let origin = decl.origin.clone();
        let description = decl.description.clone();

        match decl.kind {
            TypeKind::Object => TypeDefinition::Object(ObjectType {
                id,
                name,
                origin,
                description,
                fields: Vec::new(),
                interfaces: Vec::new(),
            }),
            TypeKind::Input => TypeDefinition::Input(InputType {
                id,
                name,
                origin,
                description,
                fields: Vec::new(),
            }),
            TypeKind::Interface => TypeDefinition::Interface(InterfaceType {
                id,
                name,
                origin,
                description,
                fields: Vec::new(),
                resolve_type: decl.resolve_type.clone(),
            }),
            TypeKind::Union => TypeDefinition::Union(UnionType {
                id,
                name,
                origin,
                description,
                members: Vec::new(),
                resolve_type: decl.resolve_type.clone(),
            }),
            TypeKind::Enum => {
                let values = self.enum_values(&decl.name, &decl.values);
                TypeDefinition::Enum(EnumType {
                    id,
                    name,
                    origin,
                    description,
                    values,
                })
            }
            TypeKind::Scalar => TypeDefinition::Scalar(ScalarType {
                id,
                name,
                description,
                builtin: None,
                specified_by_url: decl.specified_by_url.clone(),
                validator: decl.validator.clone(),
            }),
        }
    }

    fn enum_values(&mut self, enum_name: &str, decls: &[EnumValueDecl]) -> Vec<EnumValue> {
        let mut values: Vec<EnumValue> = Vec::with_capacity(decls.len());
        for decl in decls {
            if !is_valid_name(&decl.name) || matches!(decl.name.as_str(), "true" | "false" | "null")
            {
                self.errors.push(BuildError::InvalidName {
                    what: "enum value",
                    name: decl.name.clone(),
                });
                continue;
            }
            if values
                .iter()
                .any(|v| v.name == decl.name || v.value == decl.value)
            {
                self.errors.push(BuildError::DuplicateEnumValue {
                    name: enum_name.to_string(),
                    value: decl.name.clone(),
                });
                continue;
            }
            values.push(EnumValue {
                name: decl.name.clone(),
                value: decl.value.clone(),
                description: decl.description.clone(),
                deprecation: decl.deprecation.clone(),
            });
        }
        values
    }

    // ---- pass two -------------------------------------------------------

    /// Resolves implemented interfaces and union members.
    fn link_types(&mut self, merged: &[TypeDecl], ids: &[TypeId]) {
        for (decl, &id) in merged.iter().zip(ids) {
            match decl.kind {
                TypeKind::Object => {
                    let mut interfaces = Vec::new();
                    for name in &decl.interfaces {
                        match self.output_id(name, TypeKind::Interface) {
                            Some(iface) if !interfaces.contains(&iface) => interfaces.push(iface),
                            Some(_) => {}
                            None => self.errors.push(BuildError::UnknownInterface {
                                owner: decl.name.clone(),
                                name: name.clone(),
                            }),
                        }
                    }
                    if let TypeDefinition::Object(object) = &mut self.types[id.0] {
                        object.interfaces = interfaces;
                    }
                }
                TypeKind::Union => {
                    let mut members = Vec::new();
                    for name in &decl.members {
                        match self.output_id(name, TypeKind::Object) {
                            Some(member) if !members.contains(&member) => members.push(member),
                            Some(_) => {}
                            None => self.errors.push(BuildError::InvalidUnionMember {
                                union: decl.name.clone(),
                                member: name.clone(),
                            }),
                        }
                    }
                    if let TypeDefinition::Union(union) = &mut self.types[id.0] {
                        union.members = members;
                    }
                }
                _ => {}
            }
        }
    }

    fn output_id(&self, name: &str, kind: TypeKind) -> Option<TypeId> {
        self.names
            .get(&(Namespace::Output, name.to_string()))
            .copied()
            .filter(|id| self.types[id.0].kind() == kind)
    }

    /// Resolves a shape's named type for the given position.
    fn resolve(&mut self, shape: &TypeShape, position: Position, location: &str) -> Option<TypeUse> {
        let name = shape.reference.resolve_name();
        let candidates: Vec<TypeId> = [Namespace::Output, Namespace::Input, Namespace::Scalar]
            .into_iter()
            .filter_map(|ns| self.names.get(&(ns, name.clone())).copied())
            .collect();

        let fits = |id: &TypeId| {
            let kind = self.types[id.0].kind();
            match position {
                Position::Input => kind.is_input(),
                Position::Output => kind.is_output(),
            }
        };

        match candidates.iter().find(|id| fits(id)) {
            Some(&target) => Some(TypeUse {
                target,
                nullable: shape.nullable,
                lists: shape.lists.clone(),
            }),
            None if candidates.is_empty() => {
                self.errors.push(BuildError::UnresolvedReference {
                    location: location.to_string(),
                    name,
                });
                None
            }
            None => {
                self.errors.push(BuildError::WrongTypeKind {
                    location: location.to_string(),
                    name,
                    expected: match position {
                        Position::Input => "input",
                        Position::Output => "output",
                    },
                });
                None
            }
        }
    }

    fn check_field_name(&mut self, owner: &str, field: &str) -> bool {
        if is_valid_name(field) && !field.starts_with("__") {
            return true;
        }
        self.errors.push(BuildError::InvalidName {
            what: "field",
            name: format!("{owner}.{field}"),
        });
        false
    }

    fn shape<'a>(
        &mut self,
        owner: &str,
        field: &str,
        shape: &'a Result<TypeShape, crate::types::ShapeParseError>,
    ) -> Option<&'a TypeShape> {
        match shape {
            Ok(shape) => Some(shape),
            Err(err) => {
                self.errors.push(BuildError::InvalidField {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn resolve_args(
        &mut self,
        owner: &str,
        field: &str,
        decls: &[ArgumentDecl],
    ) -> Vec<ArgumentDefinition> {
        let mut args: Vec<ArgumentDefinition> = Vec::with_capacity(decls.len());
        for decl in decls {
            if !is_valid_name(&decl.name) || decl.name.starts_with("__") {
                self.errors.push(BuildError::InvalidName {
                    what: "argument",
                    name: format!("{owner}.{field}({})", decl.name),
                });
                continue;
            }
            if args.iter().any(|a| a.name == decl.name) {
                self.errors.push(BuildError::DuplicateArgument {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    argument: decl.name.clone(),
                });
                continue;
            }
            let Some(shape) = self.shape(owner, &format!("{field}({})", decl.name), &decl.shape)
            else {
                continue;
            };
            let location = format!("argument {owner}.{field}({})", decl.name);
            if let Some(ty) = self.resolve(shape, Position::Input, &location) {
                args.push(ArgumentDefinition {
                    name: decl.name.clone(),
                    ty,
                    default: decl.default.clone(),
                    description: decl.description.clone(),
                });
            }
        }
        args
    }

    /// Finds the type a data field is declared on.
    fn field_owner(&mut self, owner: &str, field: &str) -> Option<TypeId> {
        let lookup = |ns: Namespace| self.names.get(&(ns, owner.to_string())).copied();
        let output = lookup(Namespace::Output);
        let input = lookup(Namespace::Input);
        let scalar = lookup(Namespace::Scalar);

        if let Some(id) = output {
            if matches!(self.types[id.0].kind(), TypeKind::Object | TypeKind::Interface) {
                return Some(id);
            }
        }
        if input.is_some() {
            return input;
        }
        match output.or(scalar) {
            Some(id) => self.errors.push(BuildError::InvalidOwner {
                owner: owner.to_string(),
                kind: self.types[id.0].kind(),
                field: field.to_string(),
            }),
            None => self.errors.push(BuildError::UnknownOwner {
                owner: owner.to_string(),
                field: field.to_string(),
            }),
        }
        None
    }

    fn attach_field(&mut self, owner: &str, decl: &FieldDecl) {
        let Some(owner_id) = self.field_owner(owner, &decl.name) else {
            return;
        };
        if !self.check_field_name(owner, &decl.name) {
            return;
        }
        let Some(shape) = self.shape(owner, &decl.name, &decl.shape) else {
            return;
        };

        let is_input = self.types[owner_id.0].kind() == TypeKind::Input;
        let invalid = |reason: &str| BuildError::InvalidField {
            owner: owner.to_string(),
            field: decl.name.clone(),
            reason: reason.to_string(),
        };
        if is_input && !decl.args.is_empty() {
            self.errors
                .push(invalid("input fields cannot declare arguments"));
            return;
        }
        if !is_input && decl.default.is_some() {
            self.errors
                .push(invalid("only input fields may declare a default value"));
            return;
        }

        let location = format!("{owner}.{}", decl.name);
        let position = if is_input {
            Position::Input
        } else {
            Position::Output
        };
        let ty = self.resolve(shape, position, &location);
        let args = self.resolve_args(owner, &decl.name, &decl.args);
        let Some(ty) = ty else {
            return;
        };

        if self.types[owner_id.0].field(&decl.name).is_some() {
            self.errors.push(BuildError::DuplicateField {
                owner: owner.to_string(),
                field: decl.name.clone(),
            });
            return;
        }
        if let Some(fields) = self.types[owner_id.0].fields_mut() {
            fields.push(FieldDefinition {
                name: decl.name.clone(),
                ty,
                args,
                default: decl.default.clone(),
                description: decl.description.clone(),
                deprecation: decl.deprecation.clone(),
                resolver: None,
            });
        }
    }

    fn attach_resolver(&mut self, owner: &ResolverOwner, decl: &ResolverDecl) {
        let owner_name = owner.type_name().to_string();
        if !self.check_field_name(&owner_name, &decl.field) {
            return;
        }

        let is_subscription = *owner == ResolverOwner::Subscription;
        let reason = match (is_subscription, decl.source.is_some()) {
            (true, false) => Some("subscription fields need an event source"),
            (false, true) => Some("only Subscription fields may declare an event source"),
            _ => None,
        };
        if let Some(reason) = reason {
            self.errors.push(BuildError::InvalidSubscription {
                owner: owner_name,
                field: decl.field.clone(),
                reason: reason.to_string(),
            });
            return;
        }

        let id = ResolverId(self.resolvers.len());
        let attached = match owner {
            ResolverOwner::Type(name) => self.attach_object_resolver(name, decl, id),
            root => self.attach_root_resolver(root, decl, id),
        };
        if attached {
            self.resolvers.push(ResolverSpec {
                owner: owner.clone(),
                field: decl.field.clone(),
                params: decl.params.clone(),
                stages: decl.stages.clone(),
                handler: decl.handler.clone(),
                source: decl.source.clone(),
            });
        }
    }

    fn attach_root_resolver(&mut self, owner: &ResolverOwner, decl: &ResolverDecl, id: ResolverId) -> bool {
        let owner_name = owner.type_name();
        let Some(output) = &decl.output else {
            self.errors.push(BuildError::MissingReturnType {
                owner: owner_name.to_string(),
                field: decl.field.clone(),
            });
            return false;
        };
        let Some(shape) = self.shape(owner_name, &decl.field, output) else {
            return false;
        };

        let location = format!("{owner_name}.{}", decl.field);
        let ty = self.resolve(shape, Position::Output, &location);
        let args = self.resolve_args(owner_name, &decl.field, &decl.args);
        let Some(ty) = ty else {
            return false;
        };

        let roots = match owner {
            ResolverOwner::Query => &mut self.query,
            ResolverOwner::Mutation => &mut self.mutation,
            ResolverOwner::Subscription => &mut self.subscription,
            ResolverOwner::Type(_) => return false,
        };
        if roots.iter().any(|f| f.name == decl.field) {
            self.errors.push(BuildError::DuplicateResolver {
                owner: owner_name.to_string(),
                field: decl.field.clone(),
            });
            return false;
        }
        roots.push(FieldDefinition {
            name: decl.field.clone(),
            ty,
            args,
            default: None,
            description: decl.description.clone(),
            deprecation: decl.deprecation.clone(),
            resolver: Some(id),
        });
        true
    }

    fn attach_object_resolver(&mut self, owner: &str, decl: &ResolverDecl, id: ResolverId) -> bool {
        let field = decl.field.as_str();
        let Some(type_id) = self
            .names
            .get(&(Namespace::Output, owner.to_string()))
            .copied()
        else {
            self.errors.push(BuildError::ResolverTargetMissing {
                owner: owner.to_string(),
                field: field.to_string(),
            });
            return false;
        };
        let kind = self.types[type_id.0].kind();
        if !matches!(kind, TypeKind::Object | TypeKind::Interface) {
            self.errors.push(BuildError::InvalidOwner {
                owner: owner.to_string(),
                kind,
                field: field.to_string(),
            });
            return false;
        }

        let location = format!("{owner}.{field}");
        let declared = match &decl.output {
            None => None,
            Some(output) => {
                let Some(shape) = self.shape(owner, field, output) else {
                    return false;
                };
                match self.resolve(shape, Position::Output, &location) {
                    Some(ty) => Some(ty),
                    None => return false,
                }
            }
        };
        let new_args = self.resolve_args(owner, field, &decl.args);

        let existing = self.types[type_id.0]
            .fields()
            .iter()
            .position(|f| f.name == field);

        let Some(index) = existing else {
            let Some(ty) = declared else {
                self.errors.push(BuildError::MissingReturnType {
                    owner: owner.to_string(),
                    field: field.to_string(),
                });
                return false;
            };
            if let Some(fields) = self.types[type_id.0].fields_mut() {
                fields.push(FieldDefinition {
                    name: field.to_string(),
                    ty,
                    args: new_args,
                    default: None,
                    description: decl.description.clone(),
                    deprecation: decl.deprecation.clone(),
                    resolver: Some(id),
                });
            }
            return true;
        };

        // The resolver takes over an existing data field.
        let data_field = &self.types[type_id.0].fields()[index];
        if data_field.resolver.is_some() {
            self.errors.push(BuildError::DuplicateResolver {
                owner: owner.to_string(),
                field: field.to_string(),
            });
            return false;
        }
        if let Some(ty) = &declared {
            if *ty != data_field.ty {
                let reason = format!(
                    "resolver returns {} but the field is declared as {}",
                    self.render(ty),
                    self.render(&data_field.ty)
                );
                self.errors.push(BuildError::ConflictingField {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    reason,
                });
                return false;
            }
        }
        let mut args = data_field.args.clone();
        for arg in new_args {
            if args.iter().any(|a| a.name == arg.name) {
                self.errors.push(BuildError::ConflictingField {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    reason: format!("argument '{}' is declared on both", arg.name),
                });
                return false;
            }
            args.push(arg);
        }

        warn!(owner, field, "resolver overrides declared data field");
        self.warnings.push(BuildWarning::ResolverOverridesField {
            owner: owner.to_string(),
            field: field.to_string(),
        });

        if let Some(fields) = self.types[type_id.0].fields_mut() {
            let target = &mut fields[index];
            target.args = args;
            target.resolver = Some(id);
            if decl.description.is_some() {
                target.description = decl.description.clone();
            }
            if decl.deprecation.is_some() {
                target.deprecation = decl.deprecation.clone();
            }
        }
        true
    }

    fn collect_stages(&mut self, merged: &[TypeDecl], declared: &[(ResolverOwner, Stage)]) {
        for decl in merged {
            if matches!(decl.kind, TypeKind::Object | TypeKind::Interface) && !decl.stages.is_empty()
            {
                self.class_stages
                    .entry(ResolverOwner::Type(decl.name.clone()))
                    .or_default()
                    .extend(decl.stages.iter().cloned());
            }
        }

        for (owner, stage) in declared {
            if let ResolverOwner::Type(name) = owner {
                let owns_fields = self.output_id(name, TypeKind::Object).is_some()
                    || self.output_id(name, TypeKind::Interface).is_some();
                if !owns_fields {
                    self.errors.push(BuildError::UnknownOwner {
                        owner: name.clone(),
                        field: "*".to_string(),
                    });
                    continue;
                }
            }
            self.class_stages
                .entry(owner.clone())
                .or_default()
                .push(stage.clone());
        }
    }

    fn render(&self, ty: &TypeUse) -> String {
        render_shape(self.types[ty.target.0].name(), ty.nullable, &ty.lists)
    }

    fn finish(self) -> (TypeGraph, Vec<BuildError>) {
        let graph = TypeGraph {
            types: self.types,
            names: self.names,
            query: self.query,
            mutation: self.mutation,
            subscription: self.subscription,
            resolvers: self.resolvers,
            class_stages: self.class_stages,
            warnings: self.warnings,
        };
        (graph, self.errors)
    }
}

/// Folds a reopened partial declaration into the first one.
fn merge_partial(existing: &mut TypeDecl, decl: &TypeDecl) -> Result<(), String> {
    merge_text(&mut existing.description, &decl.description, "description")?;
    merge_text(
        &mut existing.specified_by_url,
        &decl.specified_by_url,
        "specified-by URL",
    )?;

    for value in &decl.values {
        match existing.values.iter().find(|v| v.name == value.name) {
            Some(known) if known != value => {
                return Err(format!(
                    "enum value '{}' declared with different values",
                    value.name
                ));
            }
            Some(_) => {}
            None => existing.values.push(value.clone()),
        }
    }
    for name in &decl.interfaces {
        if !existing.interfaces.contains(name) {
            existing.interfaces.push(name.clone());
        }
    }
    for name in &decl.members {
        if !existing.members.contains(name) {
            existing.members.push(name.clone());
        }
    }

    // Closures cannot be compared; the first declaration keeps its own.
    if existing.resolve_type.is_none() {
        existing.resolve_type = decl.resolve_type.clone();
    }
    if existing.validator.is_none() {
        existing.validator = decl.validator.clone();
    }
    existing.stages.extend(decl.stages.iter().cloned());
    Ok(())
}

fn merge_text(slot: &mut Option<String>, incoming: &Option<String>, what: &str) -> Result<(), String> {
    match (slot.as_ref(), incoming) {
        (Some(current), Some(new)) if current != new => {
            Err(format!("{what} differs ('{current}' vs '{new}')"))
        }
        (None, Some(new)) => {
            *slot = Some(new.clone());
            Ok(())
        }
        _ => Ok(()),
    }
}
