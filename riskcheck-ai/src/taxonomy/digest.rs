//! Prompt digests of reference sources

use std::path::Path;
use tracing::warn;

/// Data rows included in a table digest
pub const DIGEST_ROWS: usize = 20;

/// Characters of free text included in a text digest
pub const TEXT_DIGEST_CHARS: usize = 4000;

/// Read a free-text source; missing or unreadable files read as empty
pub fn read_text_source(path: &Path) -> String {
    if let Err(e) = super::reject_workbook(path) {
        warn!("{}", e);
        return String::new();
    }
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            warn!("Reference text {} unavailable: {}", path.display(), e);
            String::new()
        }
    }
}

/// Header plus the first [`DIGEST_ROWS`] rows of a CSV table, re-rendered as CSV
pub fn table_digest(path: Option<&Path>, label: &str) -> String {
    let Some(path) = path else {
        return format!("{}: reference file not configured.", label);
    };
    if !path.exists() {
        return format!("{}: reference file not found ({}).", label, path.display());
    }
    if let Err(e) = super::reject_workbook(path) {
        warn!("{}", e);
        return format!("{}: reference file unreadable ({}).", label, path.display());
    }

    match render_table_preview(path) {
        Ok(preview) => format!("{}:\n{}", label, preview),
        Err(e) => {
            warn!("Failed to build digest for {}: {}", path.display(), e);
            format!("{}: reference file unreadable ({}).", label, path.display())
        }
    }
}

fn render_table_preview(path: &Path) -> Result<String, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());

    for record in reader.records().take(DIGEST_ROWS + 1) {
        writer.write_record(&record?)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Leading [`TEXT_DIGEST_CHARS`] characters of a free-text corpus
pub fn text_digest(path: Option<&Path>, label: &str, text: &str) -> String {
    match path {
        None => format!("{}: reference file not configured.", label),
        Some(path) if text.trim().is_empty() => {
            format!("{}: reference file not found ({}).", label, path.display())
        }
        Some(_) => {
            let excerpt: String = text.chars().take(TEXT_DIGEST_CHARS).collect();
            format!("{}:\n{}", label, excerpt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_table_digest_truncates_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tag,definition,risk").unwrap();
        for i in 0..30 {
            writeln!(file, "tag{},def{},3", i, i).unwrap();
        }

        let digest = table_digest(Some(file.path()), "Tag list");
        assert!(digest.starts_with("Tag list:\n"));
        assert!(digest.contains("tag19,def19,3"));
        assert!(!digest.contains("tag20,"));
    }

    #[test]
    fn test_missing_sources_are_reported_not_fatal() {
        let digest = table_digest(Some(Path::new("/nonexistent.csv")), "Cases");
        assert!(digest.contains("not found"));
        assert!(text_digest(None, "Legal", "").contains("not configured"));
    }

    #[test]
    fn test_text_digest_truncates() {
        let long = "法".repeat(TEXT_DIGEST_CHARS + 10);
        let digest = text_digest(Some(Path::new("legal.txt")), "Legal", &long);
        assert_eq!(digest.chars().count(), "Legal:\n".chars().count() + TEXT_DIGEST_CHARS);
    }
}
