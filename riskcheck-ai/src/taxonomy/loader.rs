//! Taxonomy table parser
//!
//! The taxonomy source is a three-column table: label, definition-or-marker,
//! numeric risk. The first row is a header.
//!
//! # Parsing rules
//! - A row whose definition cell is the marker `定義` opens a sub-tag block
//!   for the tag named in that row (created if not yet seen).
//! - Subsequent rows are sub-tags of that tag until a row with a blank tag
//!   cell closes the block.
//! - Outside a block, every non-blank row is a top-level tag.
//! - Repeated header rows (`タグ1`) are skipped.
//! - A risk cell is accepted only if it rounds to an integer in `1..=5`.

use super::{SubTagDefinition, TagDefinition, Taxonomy, TaxonomyError};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Definition-cell marker that opens a sub-tag block
pub const SUB_TAG_MARKER: &str = "定義";

const HEADER_LABELS: [&str; 2] = ["タグ1", "タグ１"];

/// Parse a numeric risk cell
///
/// Returns `None` for blank, non-numeric, non-positive or out-of-range values.
pub fn parse_risk_weight(cell: &str) -> Option<u8> {
    let numeric: f64 = cell.trim().parse().ok()?;
    if !numeric.is_finite() || numeric <= 0.0 {
        return None;
    }
    let rounded = numeric.round();
    if (1.0..=5.0).contains(&rounded) {
        Some(rounded as u8)
    } else {
        None
    }
}

/// Parse a taxonomy table from any CSV reader
pub fn parse_taxonomy<R: Read>(reader: R) -> Result<Taxonomy, TaxonomyError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut tags: Vec<TagDefinition> = Vec::new();
    // Index into `tags` of the tag whose sub-tag block is open
    let mut open_block: Option<usize> = None;

    for record in csv_reader.records() {
        let record = record?;
        let label = record.get(0).unwrap_or("").trim();
        let definition = record.get(1).unwrap_or("").trim();
        let risk_weight = record.get(2).and_then(parse_risk_weight);

        if label.is_empty() {
            open_block = None;
            continue;
        }
        if HEADER_LABELS.contains(&label) {
            continue;
        }

        if definition == SUB_TAG_MARKER {
            let index = match tags.iter().position(|t| t.name == label) {
                Some(index) => {
                    if risk_weight.is_some() {
                        tags[index].risk_weight = risk_weight;
                    }
                    index
                }
                None => {
                    tags.push(TagDefinition {
                        name: label.to_string(),
                        definition: String::new(),
                        risk_weight,
                        sub_tags: Vec::new(),
                    });
                    tags.len() - 1
                }
            };
            debug!("Sub-tag block opened for '{}'", label);
            open_block = Some(index);
            continue;
        }

        match open_block {
            Some(index) => {
                let parent = &mut tags[index];
                if parent.sub_tags.iter().any(|s| s.name == label) {
                    warn!("Duplicate sub-tag '{}' under '{}' ignored", label, parent.name);
                    continue;
                }
                parent.sub_tags.push(SubTagDefinition {
                    name: label.to_string(),
                    definition: definition.to_string(),
                    risk_weight,
                });
            }
            None => {
                if tags.iter().any(|t| t.name == label) {
                    warn!("Duplicate tag '{}' ignored", label);
                    continue;
                }
                tags.push(TagDefinition {
                    name: label.to_string(),
                    definition: definition.to_string(),
                    risk_weight,
                    sub_tags: Vec::new(),
                });
            }
        }
    }

    Ok(Taxonomy::new(tags))
}

/// Load the taxonomy from disk, degrading to empty on any problem
pub fn load_taxonomy(path: &Path) -> Taxonomy {
    if !path.exists() {
        warn!("Taxonomy source not found: {} (empty taxonomy)", path.display());
        return Taxonomy::empty();
    }

    let result = super::reject_workbook(path)
        .and_then(|_| std::fs::File::open(path).map_err(TaxonomyError::from))
        .and_then(parse_taxonomy);

    match result {
        Ok(taxonomy) => taxonomy,
        Err(e) => {
            warn!("Failed to parse taxonomy {}: {} (empty taxonomy)", path.display(), e);
            Taxonomy::empty()
        }
    }
}
