//! `srag report`: markdown report from analytics and schema files.

use anyhow::{Context, Result};
use schema_rag_core::pipeline::Pipeline;
use schema_rag_core::schema::{Analytics, Schema};
use std::path::Path;
use tracing::{info, warn};

pub async fn run_report(
    pipeline: &Pipeline,
    analytics_path: &Path,
    schema_path: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let analytics = read_input(analytics_path, "analytics")?;
    let schema = read_input(schema_path, "schema")?;
    check_inputs(&analytics, &schema);

    let report = pipeline.run_report(&analytics, &schema).await?;

    match out {
        Some(path) => {
            std::fs::write(path, &report)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{}", report.trim_end()),
    }
    Ok(())
}

fn read_input(path: &Path, what: &str) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    if content.trim().is_empty() {
        anyhow::bail!("{} file is empty: {}", what, path.display());
    }
    Ok(content)
}

/// Warn, without failing, when the inputs do not match the typed shapes.
/// The model sees the raw text either way.
fn check_inputs(analytics: &str, schema: &str) {
    match serde_json::from_str::<Analytics>(analytics) {
        Ok(a) => info!(
            months = a.monthly.len(),
            total_costs = a.total_costs(),
            "analytics loaded"
        ),
        Err(e) => warn!("analytics do not match the expected layout: {}", e),
    }
    if let Err(e) = serde_json::from_str::<Schema>(schema) {
        warn!("schema does not match the expected layout: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_input_rejects_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("analytics.json");
        std::fs::write(&path, "  \n").unwrap();
        let err = read_input(&path, "analytics").unwrap_err();
        assert!(err.to_string().contains("analytics file is empty"));
    }
}
