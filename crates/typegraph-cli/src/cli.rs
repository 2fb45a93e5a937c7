use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "typegraph")]
#[command(about = "Inspect and query the typegraph recipes schema")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// TOML file with a [schema] section
    #[arg(short, long, global = true, env = "TYPEGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the schema in SDL
    Sdl,
    /// Build the schema and list its types, resolvers and warnings
    Check,
    /// Execute a query or mutation
    Query(OperationArgs),
    /// Run a subscription and print every event
    Subscribe(OperationArgs),
}

#[derive(clap::Args)]
pub struct OperationArgs {
    /// GraphQL document
    pub document: String,
    /// Variables as a JSON object
    #[arg(long)]
    pub variables: Option<String>,
    /// Operation to run when the document holds several
    #[arg(long)]
    pub operation: Option<String>,
    /// Authenticated user id
    #[arg(short, long)]
    pub user: Option<String>,
    /// Role granted to the user (repeatable)
    #[arg(short, long = "role", requires = "user")]
    pub roles: Vec<String>,
}
