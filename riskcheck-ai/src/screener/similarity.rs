//! Similarity scan against incident trigger phrases and taxonomy definitions
//!
//! The default metric is the Ratcliff/Obershelp "matching blocks" ratio
//! `2·M / (|a| + |b|)`, where `M` is the total length of the recursively
//! found longest common blocks. It is made symmetric by taking the larger of
//! the two argument orders.

use crate::taxonomy::ReferenceData;
use crate::types::{Grade, RiskTag, SubRiskTag};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Characters of a matched phrase quoted in a candidate's reason
const PHRASE_PREVIEW_CHARS: usize = 48;

/// String-similarity metric used by the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Ratcliff/Obershelp longest-matching-blocks ratio
    MatchingBlocks,
    /// `strsim::normalized_levenshtein`
    Levenshtein,
    /// `strsim::sorensen_dice` over character bigrams
    SorensenDice,
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "matching_blocks" | "ratcliff" => Ok(SimilarityMetric::MatchingBlocks),
            "levenshtein" => Ok(SimilarityMetric::Levenshtein),
            "sorensen_dice" | "dice" => Ok(SimilarityMetric::SorensenDice),
            other => Err(format!("unknown similarity metric: {}", other)),
        }
    }
}

impl SimilarityMetric {
    /// Symmetric similarity ratio in `0.0..=1.0`
    pub fn ratio(self, a: &str, b: &str) -> f64 {
        match self {
            SimilarityMetric::MatchingBlocks => {
                matching_blocks_ratio(a, b).max(matching_blocks_ratio(b, a))
            }
            SimilarityMetric::Levenshtein => strsim::normalized_levenshtein(a, b),
            SimilarityMetric::SorensenDice => strsim::sorensen_dice(a, b),
        }
    }
}

/// Ratio → grade mapping; only C and above are reported as candidates
pub fn grade_for_ratio(ratio: f64) -> Grade {
    if ratio > 0.75 {
        Grade::E
    } else if ratio > 0.6 {
        Grade::D
    } else if ratio > 0.45 {
        Grade::C
    } else if ratio > 0.3 {
        Grade::B
    } else {
        Grade::A
    }
}

/// Ratcliff/Obershelp ratio of `a` against `b` (order-sensitive on ties)
pub fn matching_blocks_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

/// Sum of the matching block lengths
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block within `a[alo..ahi]` × `b[blo..bhi]`
///
/// Returns `(start_a, start_b, len)`; the earliest block wins ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let col = j - blo + 1;
            if a[i] == b[j] {
                let len = prev[col - 1] + 1;
                curr[col] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                curr[col] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    best
}

fn preview(phrase: &str) -> String {
    let mut chars = phrase.chars();
    let head: String = chars.by_ref().take(PHRASE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn reason(source: &str, phrase: &str, ratio: f64) -> String {
    format!("Similar to {} '{}' (ratio {:.2})", source, preview(phrase), ratio)
}

/// Compare `text` against every incident phrase and taxonomy definition
///
/// Emits one candidate per reference string whose ratio grades C or above.
/// Incident hits name their tag (and sub-tag, if recorded); definition hits
/// name the defining tag or sub-tag.
pub fn similarity_scan(
    reference: &ReferenceData,
    text: &str,
    metric: SimilarityMetric,
) -> Vec<RiskTag> {
    let haystack = text.to_lowercase();
    let mut candidates = Vec::new();
    let taxonomy = &reference.taxonomy;

    for incident in &reference.incidents {
        let phrase = incident.trigger_phrase.trim();
        if phrase.is_empty() {
            continue;
        }
        let ratio = metric.ratio(&haystack, &phrase.to_lowercase());
        let grade = grade_for_ratio(ratio);
        if grade < Grade::C {
            continue;
        }

        debug!(tag = %incident.tag_name, ratio, "Incident phrase similarity hit");
        let reason = reason("past incident phrase", phrase, ratio);
        let related_sub_tags = incident
            .sub_tag_name
            .iter()
            .map(|sub| SubRiskTag {
                name: sub.clone(),
                grade,
                reason: reason.clone(),
                detected_text: Some(phrase.to_string()),
                detected_timecode: None,
                risk_level: taxonomy.risk_weight(sub),
            })
            .collect();

        candidates.push(RiskTag {
            name: incident.tag_name.clone(),
            grade,
            reason,
            detected_text: Some(phrase.to_string()),
            detected_timecode: None,
            risk_level: taxonomy.risk_weight(&incident.tag_name),
            related_sub_tags,
        });
    }

    for tag in taxonomy.tags() {
        let tag_grade = definition_grade(&tag.definition, &haystack, metric);

        let related_sub_tags: Vec<SubRiskTag> = tag
            .sub_tags
            .iter()
            .filter_map(|sub| {
                let (grade, ratio) = definition_grade(&sub.definition, &haystack, metric)?;
                Some(SubRiskTag {
                    name: sub.name.clone(),
                    grade,
                    reason: reason("definition", &sub.definition, ratio),
                    detected_text: Some(sub.definition.clone()),
                    detected_timecode: None,
                    risk_level: sub.risk_weight,
                })
            })
            .collect();

        let (grade, reason, detected_text) = match (tag_grade, related_sub_tags.first()) {
            (Some((grade, ratio)), _) => (
                grade,
                reason("definition", &tag.definition, ratio),
                Some(tag.definition.clone()),
            ),
            (None, Some(first)) => (first.grade, first.reason.clone(), first.detected_text.clone()),
            (None, None) => continue,
        };

        candidates.push(RiskTag {
            name: tag.name.clone(),
            grade,
            reason,
            detected_text,
            detected_timecode: None,
            risk_level: tag.risk_weight,
            related_sub_tags,
        });
    }

    candidates
}

fn definition_grade(definition: &str, haystack: &str, metric: SimilarityMetric) -> Option<(Grade, f64)> {
    let definition = definition.trim();
    if definition.is_empty() {
        return None;
    }
    let ratio = metric.ratio(haystack, &definition.to_lowercase());
    let grade = grade_for_ratio(ratio);
    (grade >= Grade::C).then_some((grade, ratio))
}
