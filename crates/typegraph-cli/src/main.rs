mod cli;
mod config;
mod demo;
mod observability;
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_graphql::{Request, Variables};
use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use typegraph::{GraphContext, GraphContextBuilder, LazySchema, Principal, SchemaConfig};

use cli::{Cli, Commands, OperationArgs};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);
    let config = config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Check => check(config)?,
        Commands::Sdl => {
            let schema = lazy_schema(config)?.get_or_build_wait().await?;
            print!("{}", schema.sdl());
        }
        Commands::Query(args) => {
            let schema = lazy_schema(config)?.get_or_build_wait().await?;
            let response = schema.execute(request(args)?, context(args)).await;
            output::print_response(&response)?;
            if !response.errors.is_empty() {
                anyhow::bail!("operation returned {} error(s)", response.errors.len());
            }
        }
        Commands::Subscribe(args) => {
            let schema = lazy_schema(config)?.get_or_build_wait().await?;
            let mut events = schema.execute_stream(request(args)?, context(args));
            let mut received = 0usize;
            while let Some(response) = events.next().await {
                output::print_response(&response)?;
                received += 1;
            }
            output::print_success(&format!("stream closed after {received} event(s)"));
        }
    }

    Ok(())
}

fn lazy_schema(config: SchemaConfig) -> Result<LazySchema> {
    let registry = demo::registry()?;
    Ok(LazySchema::new(Arc::new(registry), demo::options(config)))
}

/// Builds the schema eagerly and reports every problem at once.
fn check(config: SchemaConfig) -> Result<()> {
    let registry = demo::registry()?;
    let schema = match registry.build_schema(&demo::options(config)) {
        Ok(schema) => schema,
        Err(errors) => {
            for error in errors.iter() {
                print_error(&error.to_string());
            }
            anyhow::bail!("schema has {} error(s)", errors.len());
        }
    };

    let graph = schema.graph();
    for ty in graph.types().filter(|t| !t.is_builtin()) {
        println!(
            "{:<10} {} ({} field(s))",
            ty.kind().as_str().cyan(),
            ty.name(),
            ty.fields().len()
        );
    }
    for bound in schema.bindings().iter() {
        let kind = if bound.is_subscription() { "source" } else { "resolver" };
        println!(
            "{:<10} {}.{} ({} param(s))",
            kind.cyan(),
            bound.owner(),
            bound.field_name(),
            bound.plan().len()
        );
    }
    for warning in graph.warnings() {
        output::print_warning(&warning.to_string());
    }

    output::print_success(&format!(
        "schema ok: {} type(s), {} resolver(s)",
        graph.types().filter(|t| !t.is_builtin()).count(),
        schema.bindings().len()
    ));
    Ok(())
}

fn request(args: &OperationArgs) -> Result<Request> {
    let mut request = Request::new(args.document.clone());
    if let Some(raw) = &args.variables {
        let variables: serde_json::Value =
            serde_json::from_str(raw).context("--variables must be a JSON object")?;
        request = request.variables(Variables::from_json(variables));
    }
    if let Some(operation) = &args.operation {
        request = request.operation_name(operation.clone());
    }
    Ok(request)
}

fn context(args: &OperationArgs) -> GraphContext {
    let mut builder = GraphContextBuilder::new();
    if let Some(user) = &args.user {
        let principal = args
            .roles
            .iter()
            .fold(Principal::new(user.clone()), |p, role| p.with_role(role.clone()));
        builder = builder.with_user(principal);
    }
    builder.build()
}
