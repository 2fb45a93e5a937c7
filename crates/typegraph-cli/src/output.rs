use anyhow::Result;
use async_graphql::{PathSegment, Response, ServerError};
use colored::Colorize;
use serde_json::Value;

pub fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints `data` on stdout and errors on stderr.
pub fn print_response(response: &Response) -> Result<()> {
    let data = response.data.clone().into_json()?;
    print_json(&data)?;
    for error in &response.errors {
        print_server_error(error);
    }
    Ok(())
}

fn print_server_error(error: &ServerError) {
    let code = match error.extensions.as_ref().and_then(|e| e.get("code")) {
        Some(async_graphql::Value::String(code)) => code.clone(),
        _ => "ERROR".to_string(),
    };
    let path = error
        .path
        .iter()
        .map(|segment| match segment {
            PathSegment::Field(name) => name.clone(),
            PathSegment::Index(index) => index.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".");

    if path.is_empty() {
        eprintln!("{} {} {}", "✗".red(), code.yellow(), error.message);
    } else {
        eprintln!(
            "{} {} {} {}",
            "✗".red(),
            code.yellow(),
            path.cyan(),
            error.message
        );
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}
