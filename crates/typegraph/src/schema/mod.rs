//! Schema assembly.
//!
//! - [`SchemaAssembler`]: checks the type graph, binds resolvers and
//!   registers everything with the `async-graphql` dynamic schema.
//! - [`AssembledSchema`]: the executable result.
//! - [`LazySchema`]: builds on first access.
//! - [`BuildOptions`]: configuration, global stages, auth checker and
//!   dependency container.

mod assembler;
mod lazy;
mod options;

pub use assembler::{AssembledSchema, SchemaAssembler, assemble_schema};
pub use lazy::{LazySchema, SchemaState};
pub use options::BuildOptions;
