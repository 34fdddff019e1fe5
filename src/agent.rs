//! `srag agent`: propose schema changes for a request.
//!
//! Prints the model's answer, or with `--json` the full response envelope.
//! With `--out-dir` the answer is written as three files:
//!
//! | File | Content |
//! |------|---------|
//! | `response.md` | full generated text |
//! | `schema_changes.json` | proposed schema, pretty-printed when it parses |
//! | `schema_ddl.sql` | migration DDL |

use anyhow::{Context, Result};
use schema_rag_core::extract::pretty_json;
use schema_rag_core::models::AgentResponse;
use schema_rag_core::pipeline::Pipeline;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Inputs for one agent run.
pub struct AgentArgs {
    pub schema: Option<PathBuf>,
    pub request: Option<String>,
    pub request_file: Option<PathBuf>,
    pub namespace: String,
    pub top_k: usize,
    pub json: bool,
    pub out_dir: Option<PathBuf>,
}

pub async fn run_agent(pipeline: &Pipeline, args: AgentArgs) -> Result<()> {
    let request = read_request(args.request.as_deref(), args.request_file.as_deref())?;
    let schema = match &args.schema {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?,
        None => String::new(),
    };
    if !schema.trim().is_empty() {
        if let Err(e) = serde_json::from_str::<schema_rag_core::schema::Schema>(&schema) {
            warn!("schema file does not match the expected layout: {}", e);
        }
    }

    let resp = pipeline
        .run_agent(&args.namespace, &schema, &request, args.top_k)
        .await?;

    if let Some(dir) = &args.out_dir {
        write_outputs(dir, &resp)?;
        println!("Wrote response.md, schema_changes.json, schema_ddl.sql to {}", dir.display());
        if let Some(err) = &resp.schema_changes_error {
            println!("Warning: proposed schema is not valid JSON ({})", err);
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        println!("{}", resp.response.trim_end());
        if resp.schema_changes.is_empty() {
            println!("\n(no schema changes found in the response)");
        }
        if resp.schema_ddl.is_empty() {
            println!("(no DDL found in the response)");
        }
    }
    Ok(())
}

fn read_request(inline: Option<&str>, file: Option<&Path>) -> Result<String> {
    let request = match (inline, file) {
        (Some(text), _) => text.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {}", path.display()))?,
        (None, None) => anyhow::bail!("either --request or --request-file is required"),
    };
    if request.trim().is_empty() {
        anyhow::bail!("request must not be empty");
    }
    Ok(request)
}

/// Write the three agent artifacts into `dir`, creating it if needed.
pub fn write_outputs(dir: &Path, resp: &AgentResponse) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let changes = if resp.schema_changes_error.is_none() && !resp.schema_changes.is_empty() {
        pretty_json(&resp.schema_changes).unwrap_or_else(|_| resp.schema_changes.clone())
    } else {
        resp.schema_changes.clone()
    };

    for (name, content) in [
        ("response.md", resp.response.as_str()),
        ("schema_changes.json", changes.as_str()),
        ("schema_ddl.sql", resp.schema_ddl.as_str()),
    ] {
        let path = dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
