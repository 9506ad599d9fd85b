//! Keyword scan over taxonomy definitions

use crate::taxonomy::Taxonomy;
use crate::types::{Grade, RiskTag, SubRiskTag};
use tracing::debug;

/// Split a definition into lowercase match tokens
///
/// Separators are `/`, `|`, `,` and any whitespace.
pub fn definition_tokens(definition: &str) -> Vec<String> {
    definition
        .split(|c: char| c == '/' || c == '|' || c == ',' || c.is_whitespace())
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// First definition token found in the (lowercased) text
fn first_hit(definition: &str, haystack: &str) -> Option<String> {
    definition_tokens(definition)
        .into_iter()
        .find(|token| haystack.contains(token.as_str()))
}

fn candidate_grade(risk_weight: Option<u8>) -> Grade {
    risk_weight.map(Grade::from_risk_weight).unwrap_or(Grade::C)
}

/// Match every tag and sub-tag definition against `text`, case-insensitively
///
/// A matched sub-tag promotes its parent even if the parent's own tokens did
/// not match. Output follows taxonomy order, so it depends only on which
/// tokens occur, never on where.
pub fn keyword_scan(taxonomy: &Taxonomy, text: &str) -> Vec<RiskTag> {
    let haystack = text.to_lowercase();
    let mut matches = Vec::new();

    for tag in taxonomy.tags() {
        let tag_hit = first_hit(&tag.definition, &haystack);

        let sub_hits: Vec<SubRiskTag> = tag
            .sub_tags
            .iter()
            .filter_map(|sub| {
                let token = first_hit(&sub.definition, &haystack)?;
                Some(SubRiskTag {
                    name: sub.name.clone(),
                    grade: candidate_grade(sub.risk_weight),
                    reason: format!("Keyword match: '{}'", token),
                    detected_text: Some(token),
                    detected_timecode: None,
                    risk_level: sub.risk_weight,
                })
            })
            .collect();

        if tag_hit.is_none() && sub_hits.is_empty() {
            continue;
        }

        let (reason, detected_text) = match tag_hit {
            Some(token) => (format!("Keyword match: '{}'", token), Some(token)),
            None => (
                format!("Promoted by sub-tag match: {}", sub_hits[0].name),
                sub_hits[0].detected_text.clone(),
            ),
        };

        debug!(tag = %tag.name, sub_tags = sub_hits.len(), "Keyword match");
        matches.push(RiskTag {
            name: tag.name.clone(),
            grade: candidate_grade(tag.risk_weight),
            reason,
            detected_text,
            detected_timecode: None,
            risk_level: tag.risk_weight,
            related_sub_tags: sub_hits,
        });
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{SubTagDefinition, TagDefinition};

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec![
            TagDefinition {
                name: "Alcohol".to_string(),
                definition: "beer/Sake|whisky".to_string(),
                risk_weight: Some(2),
                sub_tags: vec![],
            },
            TagDefinition {
                name: "Gender".to_string(),
                definition: "stereotype".to_string(),
                risk_weight: None,
                sub_tags: vec![SubTagDefinition {
                    name: "Age".to_string(),
                    definition: "女の子, 年齢".to_string(),
                    risk_weight: Some(1),
                }],
            },
            TagDefinition {
                name: "Unrelated".to_string(),
                definition: "".to_string(),
                risk_weight: Some(5),
                sub_tags: vec![],
            },
        ])
    }

    #[test]
    fn test_tokens_split_on_separators() {
        assert_eq!(
            definition_tokens("Beer / wine|sake,  whisky"),
            vec!["beer", "wine", "sake", "whisky"]
        );
        assert!(definition_tokens("  ").is_empty());
    }

    #[test]
    fn test_case_insensitive_match() {
        let tags = keyword_scan(&taxonomy(), "We drink SAKE tonight");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Alcohol");
        assert_eq!(tags[0].grade, Grade::D);
        assert_eq!(tags[0].detected_text.as_deref(), Some("sake"));
    }

    #[test]
    fn test_sub_tag_promotes_parent() {
        let tags = keyword_scan(&taxonomy(), "25歳は女の子じゃない");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "Gender");
        // Parent has no weight of its own
        assert_eq!(tags[0].grade, Grade::C);
        assert_eq!(tags[0].related_sub_tags[0].name, "Age");
        assert_eq!(tags[0].related_sub_tags[0].grade, Grade::E);
    }

    #[test]
    fn test_scan_is_order_independent() {
        let taxonomy = taxonomy();
        let forward = keyword_scan(&taxonomy, "beer\n女の子");
        let backward = keyword_scan(&taxonomy, "女の子\nbeer");
        assert_eq!(forward, backward);
        assert_eq!(forward.len(), 2);
    }

    #[test]
    fn test_empty_taxonomy_matches_nothing() {
        assert!(keyword_scan(&Taxonomy::empty(), "anything").is_empty());
    }
}
