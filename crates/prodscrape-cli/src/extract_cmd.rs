//! `prodscrape extract <file.html> --url <source>`: offline extraction from a
//! saved page.

use crate::output;
use crate::scrape_cmd::SaveTarget;
use anyhow::{Context, Result};
use prodscrape::{ProductAssembler, ProductRecord, ScrapeConfig, SnapshotEngine};
use std::path::Path;
use std::sync::Arc;

/// Extract a record from the HTML in `file`, attributed to `source_url`.
pub async fn extract_file(
    config: &ScrapeConfig,
    file: &Path,
    source_url: &str,
) -> Result<ProductRecord> {
    let engine = Arc::new(SnapshotEngine::from_file(file)?);
    let record = ProductAssembler::new(engine, config.clone().for_snapshot())
        .assemble(source_url)
        .await
        .with_context(|| format!("extraction from {} failed", file.display()))?;
    Ok(record)
}

pub async fn run(
    config: &ScrapeConfig,
    file: &Path,
    source_url: &str,
    target: &SaveTarget,
) -> Result<()> {
    let record = extract_file(config, file, source_url).await?;
    output::print_record(&record)?;
    if let Some(path) = target.save(&record)? {
        eprintln!("Saved to {}", path.display());
    }
    Ok(())
}
