//! Record persistence and terminal output.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use indicatif::{ProgressBar, ProgressStyle};
use prodscrape::ProductRecord;
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// `product_<YYYYMMDD_HHMMSS>.json` for the given local time.
pub fn record_filename(at: DateTime<Local>) -> String {
    format!("product_{}.json", at.format("%Y%m%d_%H%M%S"))
}

/// Write `record` as pretty JSON into `dir` under a timestamped name.
pub fn save_record(record: &ProductRecord, dir: &Path) -> Result<PathBuf> {
    save_record_at(record, dir, Local::now())
}

/// Like [`save_record`], stamped with `at`. Never replaces an existing file:
/// a taken name gets a `_1`, `_2`, ... suffix.
pub fn save_record_at(record: &ProductRecord, dir: &Path, at: DateTime<Local>) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(record)?;
    let base = record_filename(at);
    let stem = base.trim_end_matches(".json");

    for n in 0u32.. {
        let name = match n {
            0 => base.clone(),
            n => format!("{stem}_{n}.json"),
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(json.as_bytes())
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "record saved");
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to write {}", path.display()))
            }
        }
    }
    anyhow::bail!("no free record file name for {base} in {}", dir.display())
}

/// Write `record` as pretty JSON to `path`.
pub fn save_record_to(record: &ProductRecord, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "record saved");
    Ok(())
}

/// Print `record` as pretty JSON on stdout.
pub fn print_record(record: &ProductRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

/// Short human-readable digest of a record.
pub fn summary(record: &ProductRecord) -> String {
    let mut lines = vec![format!(
        "Product: {}",
        record.product_name.as_deref().unwrap_or("(unnamed)")
    )];
    if let Some(price) = record.selling_price {
        lines.push(format!("Price:   {price:.2}"));
    }
    if let Some(rating) = record.rating {
        let count = record
            .num_ratings
            .map(|n| format!(" ({n} ratings)"))
            .unwrap_or_default();
        lines.push(format!("Rating:  {rating:.1}{count}"));
    }
    lines.push(format!("Fields:  {}/11 populated", record.populated_fields()));
    lines.join("\n")
}

/// Spinner on stderr, ticking until finished.
pub fn spinner(message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record() -> ProductRecord {
        let mut r = ProductRecord::new("https://www.amazon.in/dp/B0TEST", Utc::now());
        r.product_name = Some("Acme TV".into());
        r.selling_price = Some(1299.0);
        r.rating = Some(4.3);
        r.num_ratings = Some(1234);
        r
    }

    #[test]
    fn test_record_filename_format() {
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        assert_eq!(record_filename(at), "product_20260307_090501.json");
    }

    #[test]
    fn test_save_record_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_record(&record(), dir.path()).unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("product_") && name.ends_with(".json"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"product_name\": \"Acme TV\""));
        let back: ProductRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back.selling_price, Some(1299.0));
        assert_eq!(back.source_url, "https://www.amazon.in/dp/B0TEST");
    }

    #[test]
    fn test_same_second_saves_keep_both_records() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let mut second = record();
        second.product_name = Some("Acme Radio".into());

        let first_path = save_record_at(&record(), dir.path(), at).unwrap();
        let second_path = save_record_at(&second, dir.path(), at).unwrap();
        let third_path = save_record_at(&record(), dir.path(), at).unwrap();

        assert!(first_path.ends_with("product_20260307_090501.json"));
        assert!(second_path.ends_with("product_20260307_090501_1.json"));
        assert!(third_path.ends_with("product_20260307_090501_2.json"));
        let first = std::fs::read_to_string(&first_path).unwrap();
        let second = std::fs::read_to_string(&second_path).unwrap();
        assert!(first.contains("Acme TV"));
        assert!(second.contains("Acme Radio"));
    }

    #[test]
    fn test_save_into_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 1).unwrap();
        let err = save_record_at(&record(), &dir.path().join("nope"), at).unwrap_err();
        assert!(err.to_string().contains("failed to write"));
    }

    #[test]
    fn test_save_to_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = save_record_to(&record(), &dir.path().join("nope/out.json")).unwrap_err();
        assert!(err.to_string().contains("failed to write"));
    }

    #[test]
    fn test_summary_lists_key_fields() {
        let text = summary(&record());
        assert!(text.contains("Product: Acme TV"));
        assert!(text.contains("Price:   1299.00"));
        assert!(text.contains("Rating:  4.3 (1234 ratings)"));
        assert!(text.contains("Fields:  4/11"));
    }
}
