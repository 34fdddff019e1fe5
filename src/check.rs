//! `srag check`: verify credentials and connectivity.
//!
//! Embeds a probe string and prints the index's vector counts, flagging the
//! configured namespaces that hold no vectors.

use anyhow::{Context, Result};
use schema_rag_core::services::Embedder;
use std::time::Instant;

use crate::config::Config;
use crate::gemini::{GeminiClient, GeminiEmbedder};
use crate::vector::{IndexStats, PineconeIndex};

pub async fn run_check(config: &Config) -> Result<()> {
    let gemini = GeminiClient::new(&config.gemini)?;
    let embedder = GeminiEmbedder::new(gemini, config.gemini.embedding_model.clone());
    let started = Instant::now();
    let vector = embedder
        .embed("connectivity check")
        .await
        .context("Embedding probe failed")?;
    println!(
        "gemini: ok ({}, {} dims, {:.2}s)",
        config.gemini.embedding_model,
        vector.len(),
        started.elapsed().as_secs_f64()
    );

    let index = PineconeIndex::new(&config.pinecone)?;
    let host = index.host().await?.to_string();
    let stats = index.describe_index_stats().await?;
    println!("pinecone: ok ({} at {})", config.pinecone.index_name, host);
    print!(
        "{}",
        format_stats(
            &stats,
            &[
                config.retrieval.agent_namespace.as_str(),
                config.retrieval.chat_namespace.as_str(),
            ]
        )
    );

    if stats.dimension != 0 && stats.dimension != vector.len() {
        anyhow::bail!(
            "embedding dimension {} does not match index dimension {}",
            vector.len(),
            stats.dimension
        );
    }
    Ok(())
}

fn format_stats(stats: &IndexStats, expected: &[&str]) -> String {
    let mut out = format!(
        "  dimension: {}\n  total vectors: {}\n",
        stats.dimension, stats.total_vector_count
    );
    for (name, ns) in &stats.namespaces {
        out.push_str(&format!("  namespace {}: {} vectors\n", name, ns.vector_count));
    }
    for name in expected {
        let count = stats.namespaces.get(*name).map(|n| n.vector_count).unwrap_or(0);
        if count == 0 {
            out.push_str(&format!("  warning: namespace {} is empty\n", name));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats_flags_empty_namespaces() {
        let stats: IndexStats = serde_json::from_str(
            r#"{"dimension": 768, "totalVectorCount": 12,
                "namespaces": {"schemas-json": {"vectorCount": 12}}}"#,
        )
        .unwrap();
        let out = format_stats(&stats, &["schemas-json", "database-articles"]);
        assert!(out.contains("namespace schemas-json: 12 vectors"));
        assert!(out.contains("warning: namespace database-articles is empty"));
        assert!(!out.contains("warning: namespace schemas-json"));
    }
}
