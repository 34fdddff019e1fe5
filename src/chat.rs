//! `srag chat`: answer database questions with cited sources.
//!
//! With `--query` a single question is answered. Without it, questions are
//! read from stdin one line at a time until `exit`, `quit`, or end of input.

use anyhow::Result;
use schema_rag_core::models::ChatResponse;
use schema_rag_core::pipeline::Pipeline;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

pub async fn run_chat(pipeline: &Pipeline, query: Option<&str>, top_k: usize, json: bool) -> Result<()> {
    if let Some(query) = query {
        if query.trim().is_empty() {
            anyhow::bail!("query must not be empty");
        }
        let resp = pipeline.run_chat(query, top_k).await?;
        print_response(&resp, json)?;
        return Ok(());
    }

    println!("Ask a question about databases (type 'exit' to quit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        // One failed question does not end the session.
        match pipeline.run_chat(line, top_k).await {
            Ok(resp) => print_response(&resp, json)?,
            Err(e) => {
                error!("chat request failed: {}", e);
                println!("Error: {}", e);
            }
        }
    }
    Ok(())
}

fn print_response(resp: &ChatResponse, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(resp)?);
    } else {
        println!("{}", format_response(resp));
    }
    Ok(())
}

/// Answer text followed by a numbered source list.
pub fn format_response(resp: &ChatResponse) -> String {
    let mut out = resp.response.trim_end().to_string();
    if !resp.sources.is_empty() {
        out.push_str("\n\nSources:");
        for (i, source) in resp.sources.iter().enumerate() {
            out.push_str(&format!("\n  {}. {}", i + 1, source));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_response_numbers_sources() {
        let resp = ChatResponse {
            response: "Use a B-tree index.\n".into(),
            sources: vec!["https://kb.test/a".into(), "https://kb.test/b".into()],
        };
        assert_eq!(
            format_response(&resp),
            "Use a B-tree index.\n\nSources:\n  1. https://kb.test/a\n  2. https://kb.test/b"
        );
    }

    #[test]
    fn test_format_response_without_sources() {
        let resp = ChatResponse {
            response: "Sorry.".into(),
            sources: vec![],
        };
        assert_eq!(format_response(&resp), "Sorry.");
    }
}
