//! Reference data: risk taxonomy, incident corpus, legal corpus
//!
//! All reference data is loaded once, at construction, into an immutable
//! [`ReferenceData`] value that is shared by reference (`Arc`) with the
//! screener, the judgement adapter and the burn-risk scorer.
//!
//! Missing sources are not errors: they degrade to an empty taxonomy, an
//! empty incident list or a "not found" digest, and every consumer accepts
//! empty input.

pub mod digest;
pub mod incidents;
pub mod loader;

pub use incidents::IncidentRecord;
pub use loader::{parse_risk_weight, parse_taxonomy};

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Reference data loading error (malformed source, never a missing one)
#[derive(Debug, Error)]
pub enum TaxonomyError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is a spreadsheet workbook; export the sheet to UTF-8 CSV")]
    Workbook(String),
}

const WORKBOOK_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// Reject spreadsheet workbooks, which are read only after a CSV export
pub fn reject_workbook(path: &Path) -> Result<(), TaxonomyError> {
    let is_workbook = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if is_workbook {
        return Err(TaxonomyError::Workbook(path.display().to_string()));
    }
    Ok(())
}

/// Sub-tag definition (no further nesting)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubTagDefinition {
    pub name: String,
    pub definition: String,
    /// 1 = most severe; `None` = not independently weighted
    pub risk_weight: Option<u8>,
}

/// Top-level tag definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagDefinition {
    pub name: String,
    pub definition: String,
    pub risk_weight: Option<u8>,
    pub sub_tags: Vec<SubTagDefinition>,
}

/// Two-level tag / sub-tag risk taxonomy
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Taxonomy {
    tags: Vec<TagDefinition>,
    risk_lookup: HashMap<String, u8>,
}

impl Taxonomy {
    /// Build a taxonomy and its flattened `name → risk_weight` lookup
    ///
    /// Sub-tag weights shadow a top-level tag of the same name.
    pub fn new(tags: Vec<TagDefinition>) -> Self {
        let mut risk_lookup = HashMap::new();
        for tag in &tags {
            if let Some(weight) = tag.risk_weight {
                risk_lookup.insert(tag.name.clone(), weight);
            }
            for sub in &tag.sub_tags {
                if let Some(weight) = sub.risk_weight {
                    risk_lookup.insert(sub.name.clone(), weight);
                }
            }
        }
        Self { tags, risk_lookup }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn tags(&self) -> &[TagDefinition] {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn sub_tag_count(&self) -> usize {
        self.tags.iter().map(|t| t.sub_tags.len()).sum()
    }

    /// Flattened weight lookup by tag or sub-tag name
    pub fn risk_weight(&self, name: &str) -> Option<u8> {
        self.risk_lookup.get(name.trim()).copied()
    }

    pub fn risk_lookup(&self) -> &HashMap<String, u8> {
        &self.risk_lookup
    }

    pub fn find_tag(&self, name: &str) -> Option<&TagDefinition> {
        self.tags.iter().find(|t| t.name == name)
    }

    /// One line per tag, with up to six sub-tag examples
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for tag in &self.tags {
            if tag.definition.is_empty() {
                lines.push(format!("- {}", tag.name));
            } else {
                lines.push(format!("- {}: {}", tag.name, tag.definition));
            }
            let examples: Vec<&str> = tag
                .sub_tags
                .iter()
                .take(6)
                .map(|s| s.name.as_str())
                .filter(|n| !n.is_empty())
                .collect();
            if !examples.is_empty() {
                lines.push(format!("  sub-tags: {}", examples.join(", ")));
            }
        }
        lines.join("\n")
    }

    /// Compact JSON rendering of the tree, for prompts
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.tags).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Locations of the read-only reference sources
#[derive(Debug, Clone, Default)]
pub struct ReferencePaths {
    pub taxonomy: Option<PathBuf>,
    pub incidents: Option<PathBuf>,
    pub legal: Option<PathBuf>,
    pub social_cases: Option<PathBuf>,
}

/// Prompt-ready text digests of the reference sources
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceDigests {
    pub social_cases: String,
    pub incidents: String,
    pub tag_list: String,
    pub legal: String,
}

/// Immutable reference data loaded once per process
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub taxonomy: Taxonomy,
    pub incidents: Vec<IncidentRecord>,
    pub legal_corpus: String,
    pub digests: ReferenceDigests,
}

impl ReferenceData {
    /// Load every configured source; absent sources degrade to empty values
    pub fn load(paths: &ReferencePaths) -> Self {
        let taxonomy = paths
            .taxonomy
            .as_deref()
            .map(loader::load_taxonomy)
            .unwrap_or_default();
        let incidents = paths
            .incidents
            .as_deref()
            .map(incidents::load_incidents)
            .unwrap_or_default();
        let legal_corpus = paths
            .legal
            .as_deref()
            .map(digest::read_text_source)
            .unwrap_or_default();

        let digests = ReferenceDigests {
            social_cases: digest::table_digest(paths.social_cases.as_deref(), "Social cases"),
            incidents: digest::table_digest(paths.incidents.as_deref(), "Incident corpus"),
            tag_list: digest::table_digest(paths.taxonomy.as_deref(), "Tag list"),
            legal: digest::text_digest(paths.legal.as_deref(), "Legal references", &legal_corpus),
        };

        info!(
            tags = taxonomy.tags().len(),
            sub_tags = taxonomy.sub_tag_count(),
            incidents = incidents.len(),
            legal_chars = legal_corpus.chars().count(),
            "Reference data loaded"
        );

        Self {
            taxonomy,
            incidents,
            legal_corpus,
            digests,
        }
    }

    /// Reference data built from in-memory values (no digests)
    pub fn from_parts(taxonomy: Taxonomy, incidents: Vec<IncidentRecord>) -> Self {
        Self {
            taxonomy,
            incidents,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Taxonomy {
        Taxonomy::new(vec![TagDefinition {
            name: "女性表現".to_string(),
            definition: "女性に関する差別的表現".to_string(),
            risk_weight: Some(2),
            sub_tags: vec![SubTagDefinition {
                name: "結婚出産固定観念".to_string(),
                definition: "結婚や出産を固定観念で語る表現".to_string(),
                risk_weight: Some(1),
            }],
        }])
    }

    #[test]
    fn test_flattened_lookup_covers_sub_tags() {
        let taxonomy = sample();
        assert_eq!(taxonomy.risk_weight("女性表現"), Some(2));
        assert_eq!(taxonomy.risk_weight("結婚出産固定観念"), Some(1));
        assert_eq!(taxonomy.risk_weight("unknown"), None);
        assert_eq!(taxonomy.sub_tag_count(), 1);
    }

    #[test]
    fn test_summary_lists_sub_tags() {
        let summary = sample().summary();
        assert!(summary.starts_with("- 女性表現: 女性に関する差別的表現"));
        assert!(summary.contains("sub-tags: 結婚出産固定観念"));
    }

    #[test]
    fn test_workbooks_rejected_by_extension() {
        assert!(reject_workbook(Path::new("/ref/タグリスト.xlsx")).is_err());
        assert!(reject_workbook(Path::new("/ref/cases.XLS")).is_err());
        assert!(reject_workbook(Path::new("/ref/tags.csv")).is_ok());
        assert!(reject_workbook(Path::new("/ref/laws.txt")).is_ok());
        let message = reject_workbook(Path::new("tags.xlsx")).unwrap_err().to_string();
        assert!(message.contains("export the sheet to UTF-8 CSV"));
    }

    #[test]
    fn test_load_with_no_paths_is_empty() {
        let data = ReferenceData::load(&ReferencePaths::default());
        assert!(data.taxonomy.is_empty());
        assert!(data.incidents.is_empty());
        assert!(data.legal_corpus.is_empty());
        assert!(data.digests.tag_list.contains("not configured"));
    }
}
