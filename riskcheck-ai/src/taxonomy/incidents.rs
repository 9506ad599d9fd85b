//! Historical incident corpus
//!
//! Each record names the phrase that triggered a past incident and the
//! taxonomy tag (and optionally sub-tag) it was filed under. Columns are
//! located by header name; unrecognised headers fall back to positions 0-2.

use super::TaxonomyError;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

const TRIGGER_HEADERS: [&str; 3] = ["trigger_phrase", "発火要因", "trigger"];
const TAG_HEADERS: [&str; 4] = ["tag", "tag_name", "タグ１", "タグ1"];
const SUB_TAG_HEADERS: [&str; 3] = ["sub_tag", "sub_tag_name", "細分化タグ"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentRecord {
    pub trigger_phrase: String,
    pub tag_name: String,
    pub sub_tag_name: Option<String>,
}

fn find_column(headers: &csv::StringRecord, names: &[&str], fallback: usize) -> usize {
    headers
        .iter()
        .position(|h| names.contains(&h.trim()))
        .unwrap_or(fallback)
}

/// Parse an incident table from any CSV reader
///
/// Rows missing a trigger phrase or tag are skipped.
pub fn parse_incidents<R: Read>(reader: R) -> Result<Vec<IncidentRecord>, TaxonomyError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let trigger_col = find_column(&headers, &TRIGGER_HEADERS, 0);
    let tag_col = find_column(&headers, &TAG_HEADERS, 1);
    let sub_tag_col = find_column(&headers, &SUB_TAG_HEADERS, 2);

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let trigger = row.get(trigger_col).unwrap_or("").trim();
        let tag = row.get(tag_col).unwrap_or("").trim();
        if trigger.is_empty() || tag.is_empty() {
            continue;
        }
        let sub_tag = row
            .get(sub_tag_col)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        records.push(IncidentRecord {
            trigger_phrase: trigger.to_string(),
            tag_name: tag.to_string(),
            sub_tag_name: sub_tag,
        });
    }
    Ok(records)
}

/// Load the incident corpus from disk, degrading to empty on any problem
pub fn load_incidents(path: &Path) -> Vec<IncidentRecord> {
    if !path.exists() {
        warn!("Incident corpus not found: {} (no incidents)", path.display());
        return Vec::new();
    }

    let result = super::reject_workbook(path)
        .and_then(|_| std::fs::File::open(path).map_err(TaxonomyError::from))
        .and_then(parse_incidents);

    result.unwrap_or_else(|e| {
        warn!("Failed to parse incident corpus {}: {}", path.display(), e);
        Vec::new()
    })
}
