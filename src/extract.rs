//! `srag extract`: run the response extractor over a saved model answer.
//!
//! Works offline and needs no credentials. Useful for checking how a given
//! response will be split into schema JSON and DDL.

use anyhow::{Context, Result};
use schema_rag_core::extract::{ExtractedSegment, ExtractedSegments, Extractor, MarkerSet};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

#[derive(Serialize)]
struct ExtractOutput {
    schema_changes: String,
    schema_ddl: String,
    segments: Vec<ExtractedSegment>,
}

/// Extract from `path`, or stdin when `path` is `-`.
pub fn run_extract(path: &Path, markers: MarkerSet, json: bool) -> Result<()> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read response file: {}", path.display()))?
    };

    let segments = Extractor::new(markers).extract(&text);
    if json {
        let output = ExtractOutput {
            schema_changes: segments.json_text().to_string(),
            schema_ddl: segments.sql_text().to_string(),
            segments: segments.segments(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", summarize(&segments));
    }
    Ok(())
}

/// Human-readable summary of an extraction.
pub fn summarize(segments: &ExtractedSegments) -> String {
    let mut out = String::new();

    out.push_str("== schema changes ==\n");
    match &segments.primary_json {
        Some(seg) => {
            out.push_str(&format!("origin: {:?}\n", seg.origin));
            if let Some(err) = &seg.error {
                out.push_str(&format!("error: {}\n", err));
            }
            out.push_str(&seg.raw);
            out.push('\n');
        }
        None => out.push_str("(none)\n"),
    }

    out.push_str("\n== schema DDL ==\n");
    match &segments.primary_sql {
        Some(seg) => {
            out.push_str(&format!("origin: {:?}, kind: {}\n", seg.origin, seg.kind));
            out.push_str(&seg.code);
            out.push('\n');
        }
        None => out.push_str("(none)\n"),
    }

    out.push_str(&format!(
        "\n{} fenced block(s), {} JSON, {} SQL",
        segments.all_blocks.len(),
        segments.json_blocks.len(),
        segments.sql_blocks.len()
    ));
    out
}
