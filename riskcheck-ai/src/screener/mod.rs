//! Heuristic screener
//!
//! Deterministic, AI-free candidate detection over `transcript + "\n" + ocr`:
//! - [`keyword::keyword_scan`] matches definition tokens literally
//! - [`similarity::similarity_scan`] compares the text against incident
//!   trigger phrases and taxonomy definitions
//!
//! Both scans are pure functions of their inputs. Their candidates are
//! combined per tag name into [`RiskTag`] entries that feed the consensus
//! aggregator.

pub mod keyword;
pub mod similarity;

pub use keyword::keyword_scan;
pub use similarity::{grade_for_ratio, similarity_scan, SimilarityMetric};

use crate::taxonomy::ReferenceData;
use crate::types::{RiskTag, SubRiskTag};
use tracing::debug;

/// Which scans run, and how similarity is measured
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenerConfig {
    pub keyword_scan: bool,
    pub similarity_scan: bool,
    pub metric: SimilarityMetric,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            keyword_scan: true,
            similarity_scan: true,
            metric: SimilarityMetric::MatchingBlocks,
        }
    }
}

/// Text the scans operate on
pub fn combined_text(transcript: &str, ocr: &str) -> String {
    format!("{}\n{}", transcript, ocr)
}

/// Run the enabled scans and combine their candidates
pub fn screen(
    reference: &ReferenceData,
    transcript: &str,
    ocr: &str,
    config: &ScreenerConfig,
) -> Vec<RiskTag> {
    if transcript.trim().is_empty() && ocr.trim().is_empty() {
        debug!("No extracted text to screen");
        return Vec::new();
    }

    let text = combined_text(transcript, ocr);
    let mut candidates = Vec::new();

    if config.keyword_scan {
        candidates.extend(keyword_scan(&reference.taxonomy, &text));
    }
    if config.similarity_scan {
        candidates.extend(similarity_scan(reference, &text, config.metric));
    }

    let combined = combine_candidates(candidates);
    debug!(candidates = combined.len(), "Screener finished");
    combined
}

/// Merge candidates sharing a tag name
///
/// The merged entry keeps the highest grade (and that candidate's reason and
/// detected text), unions sub-tags by name under the same rule, and the
/// output is ordered by severity descending, then first appearance.
pub fn combine_candidates(candidates: Vec<RiskTag>) -> Vec<RiskTag> {
    let mut merged: Vec<RiskTag> = Vec::new();

    for candidate in candidates {
        match merged.iter_mut().find(|t| t.name == candidate.name) {
            Some(existing) => {
                let RiskTag {
                    grade,
                    reason,
                    detected_text,
                    detected_timecode,
                    risk_level,
                    related_sub_tags,
                    ..
                } = candidate;
                if grade > existing.grade {
                    existing.grade = grade;
                    existing.reason = reason;
                    existing.detected_text = detected_text;
                    existing.detected_timecode = detected_timecode;
                }
                if existing.risk_level.is_none() {
                    existing.risk_level = risk_level;
                }
                for sub in related_sub_tags {
                    merge_sub_tag(&mut existing.related_sub_tags, sub);
                }
            }
            None => merged.push(candidate),
        }
    }

    // Stable sort keeps first-appearance order within a grade
    merged.sort_by(|a, b| b.grade.cmp(&a.grade));
    for tag in &mut merged {
        tag.related_sub_tags.sort_by(|a, b| b.grade.cmp(&a.grade));
    }
    merged
}

fn merge_sub_tag(subs: &mut Vec<SubRiskTag>, candidate: SubRiskTag) {
    match subs.iter_mut().find(|s| s.name == candidate.name) {
        Some(existing) => {
            if candidate.grade > existing.grade {
                let risk_level = existing.risk_level.or(candidate.risk_level);
                *existing = candidate;
                existing.risk_level = risk_level;
            }
        }
        None => subs.push(candidate),
    }
}
