//! The metadata registry.
//!
//! Declarations are collected in any order, including across modules and
//! crates, and nothing is resolved until [`Registry::build`] runs. The
//! first build freezes the registry: later declarations fail with
//! [`RegistryError::Frozen`] and repeated builds return identical graphs.
//!
//! # Example
//!
//! ```ignore
//! use typegraph::{FieldDecl, Registry, ResolverDecl, ResolverOwner, TypeDecl};
//!
//! let registry = Registry::new();
//! registry.declare_type(TypeDecl::object("Recipe"))?;
//! registry.declare_field("Recipe", FieldDecl::new("title", "String!"))?;
//! registry.declare_resolver(ResolverOwner::Query, recipes_resolver())?;
//! let graph = registry.build()?;
//! ```

mod declare;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use tracing::{debug, error, info};

pub use declare::{
    ArgumentDecl, EnumValueDecl, FieldDecl, ResolverDecl, ResolverOwner, ScalarValidator,
    TypeDecl, TypeResolver,
};

use crate::error::{BuildErrors, RegistryError};
use crate::graph::TypeGraph;
use crate::resolvers::Stage;
use crate::schema::{AssembledSchema, BuildOptions, SchemaAssembler};

/// A set of declarations contributed by one Rust type or module.
///
/// ```ignore
/// struct RecipeTypes;
///
/// impl Declare for RecipeTypes {
///     fn declare(registry: &Registry) -> Result<(), RegistryError> {
///         registry.declare_type(TypeDecl::object("Recipe"))?;
///         registry.declare_field("Recipe", FieldDecl::new("title", "String!"))
///     }
/// }
///
/// registry.register::<RecipeTypes>()?;
/// ```
pub trait Declare {
    /// Adds this type's declarations to `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] after the registry was built.
    fn declare(registry: &Registry) -> Result<(), RegistryError>;
}

/// Everything declared so far, in declaration order.
#[derive(Clone, Default)]
pub(crate) struct Declarations {
    pub(crate) types: Vec<TypeDecl>,
    pub(crate) fields: Vec<(String, FieldDecl)>,
    pub(crate) resolvers: Vec<(ResolverOwner, ResolverDecl)>,
    pub(crate) stages: Vec<(ResolverOwner, Stage)>,
}

impl Declarations {
    fn len(&self) -> usize {
        self.types.len() + self.fields.len() + self.resolvers.len() + self.stages.len()
    }
}

/// Collects type, field and resolver declarations.
///
/// The registry is `Send + Sync`; declarations may be added from several
/// threads before the build.
#[derive(Default)]
pub struct Registry {
    declarations: RwLock<Declarations>,
    frozen: AtomicBool,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a named type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] after the registry was built.
    pub fn declare_type(&self, decl: TypeDecl) -> Result<(), RegistryError> {
        let what = format!("type '{}'", decl.name);
        self.mutate(what, |d| d.types.push(decl))
    }

    /// Declares a data field on an object, interface or input type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] after the registry was built.
    pub fn declare_field(
        &self,
        owner: impl Into<String>,
        field: FieldDecl,
    ) -> Result<(), RegistryError> {
        let owner = owner.into();
        let what = format!("field '{owner}.{}'", field.name);
        self.mutate(what, |d| d.fields.push((owner, field)))
    }

    /// Declares a resolver on a root operation type or an object type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] after the registry was built.
    pub fn declare_resolver(
        &self,
        owner: impl Into<ResolverOwner>,
        decl: ResolverDecl,
    ) -> Result<(), RegistryError> {
        let owner = owner.into();
        let what = format!("resolver '{owner}.{}'", decl.field);
        self.mutate(what, |d| d.resolvers.push((owner, decl)))
    }

    /// Adds a stage to every resolver of `owner`, after global stages and
    /// before field-level ones.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] after the registry was built.
    pub fn declare_stage(
        &self,
        owner: impl Into<ResolverOwner>,
        stage: Stage,
    ) -> Result<(), RegistryError> {
        let owner = owner.into();
        let what = format!("stage on '{owner}'");
        self.mutate(what, |d| d.stages.push((owner, stage)))
    }

    /// Runs a [`Declare`] implementation against this registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Frozen`] after the registry was built.
    pub fn register<T: Declare>(&self) -> Result<(), RegistryError> {
        T::declare(self)
    }

    /// Returns `true` once the registry has been built.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Number of declarations collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freezes the registry and builds the type graph.
    ///
    /// Every declaration is resolved and validated; all problems found are
    /// returned together. Building again yields an identical graph.
    ///
    /// # Errors
    ///
    /// Returns every build error found.
    pub fn build(&self) -> Result<TypeGraph, BuildErrors> {
        if !self.frozen.swap(true, Ordering::AcqRel) {
            info!("freezing type registry");
        }
        let declarations = self.read().clone();
        debug!(
            types = declarations.types.len(),
            fields = declarations.fields.len(),
            resolvers = declarations.resolvers.len(),
            "building type graph"
        );
        crate::graph::build(&declarations)
    }

    /// Builds the type graph, binds resolvers and assembles an executable
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns every graph, binding and assembly error found.
    pub fn build_schema(&self, options: &BuildOptions) -> Result<AssembledSchema, BuildErrors> {
        let graph = self.build()?;
        SchemaAssembler::new(graph, options.clone()).assemble()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Declarations> {
        self.declarations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate(
        &self,
        what: String,
        apply: impl FnOnce(&mut Declarations),
    ) -> Result<(), RegistryError> {
        let mut declarations = self
            .declarations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Checked under the write lock so a concurrent build cannot slip in.
        if self.is_frozen() {
            error!(what = %what, "declaration after the registry was built");
            return Err(RegistryError::Frozen { what });
        }
        apply(&mut declarations);
        Ok(())
    }
}
