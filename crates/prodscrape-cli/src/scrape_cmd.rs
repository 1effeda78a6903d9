//! `prodscrape scrape <url>`: one-shot live extraction.

use crate::output;
use anyhow::{Context, Result};
use prodscrape::{ProductRecord, ScrapeConfig};
use std::path::{Path, PathBuf};

/// Where a scraped record goes after it is printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// A timestamped file inside this directory.
    Dir(PathBuf),
    /// Exactly this file.
    File(PathBuf),
    None,
}

impl SaveTarget {
    pub fn from_flags(out: Option<PathBuf>, out_dir: &Path, no_save: bool) -> Self {
        match (no_save, out) {
            (true, _) => SaveTarget::None,
            (false, Some(file)) => SaveTarget::File(file),
            (false, None) => SaveTarget::Dir(out_dir.to_path_buf()),
        }
    }

    /// Save `record`; returns the path written, if any.
    pub fn save(&self, record: &ProductRecord) -> Result<Option<PathBuf>> {
        match self {
            SaveTarget::Dir(dir) => output::save_record(record, dir).map(Some),
            SaveTarget::File(path) => output::save_record_to(record, path).map(|_| Some(path.clone())),
            SaveTarget::None => Ok(None),
        }
    }
}

pub async fn run(config: &ScrapeConfig, url: &str, target: &SaveTarget) -> Result<()> {
    let spinner = output::spinner(format!("Scraping {url}"));
    let result = prodscrape::scrape_once(config, url).await;
    spinner.finish_and_clear();

    let record = match result {
        Ok(record) => record,
        Err(e) => {
            let stage = e.stage();
            return Err(anyhow::Error::new(e)).with_context(|| format!("scrape failed ({stage})"));
        }
    };

    output::print_record(&record)?;
    eprintln!("{}", output::summary(&record));
    // The record is already on stdout; a failed save is reported, not fatal.
    match target.save(&record) {
        Ok(Some(path)) => eprintln!("Saved to {}", path.display()),
        Ok(None) => {}
        Err(e) => eprintln!("[!!] {e:#}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_target_from_flags() {
        let dir = Path::new("/tmp/out");
        assert_eq!(SaveTarget::from_flags(None, dir, false), SaveTarget::Dir(dir.into()));
        assert_eq!(
            SaveTarget::from_flags(Some("p.json".into()), dir, false),
            SaveTarget::File("p.json".into())
        );
        assert_eq!(SaveTarget::from_flags(Some("p.json".into()), dir, true), SaveTarget::None);
    }
}
