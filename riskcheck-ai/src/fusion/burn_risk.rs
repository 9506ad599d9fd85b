//! Burn-risk scorer
//!
//! Weights are inverted (1 = most dangerous), so a low average means a high
//! likelihood of a viral incident.

use crate::taxonomy::Taxonomy;
use crate::types::{BurnEntryType, BurnRiskDetail, BurnRiskProfile, Grade, RiskTag};
use std::collections::HashSet;
use tracing::debug;

/// Grade for an average (or single) weight
pub fn burn_grade(value: f64) -> Grade {
    if value <= 1.5 {
        Grade::E
    } else if value <= 2.5 {
        Grade::D
    } else if value <= 3.5 {
        Grade::C
    } else if value <= 4.5 {
        Grade::B
    } else {
        Grade::A
    }
}

/// Human-readable danger label for an average (or single) weight
pub fn burn_label(value: f64) -> &'static str {
    match burn_grade(value) {
        Grade::E => "extremely high",
        Grade::D => "high",
        Grade::C => "moderate",
        Grade::B => "somewhat low",
        Grade::A => "very low",
    }
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Default)]
struct Collector {
    seen: HashSet<(BurnEntryType, String)>,
    details: Vec<BurnRiskDetail>,
}

impl Collector {
    fn register(
        &mut self,
        entry_type: BurnEntryType,
        name: &str,
        risk: Option<u8>,
        detected_text: Option<String>,
        reason: Option<String>,
        parent_tag: Option<String>,
    ) {
        let Some(risk) = risk else {
            return;
        };
        let name = match name.trim() {
            "" => format!(
                "{}_{}",
                entry_type.as_str().to_ascii_uppercase(),
                self.details.len() + 1
            ),
            trimmed => trimmed.to_string(),
        };
        if !self.seen.insert((entry_type, name.clone())) {
            return;
        }
        self.details.push(BurnRiskDetail {
            name,
            risk,
            label: burn_label(f64::from(risk)).to_string(),
            entry_type,
            detected_text,
            reason,
            parent_tag,
        });
    }
}

/// Score the merged tag set
///
/// Each tag and sub-tag takes its weight from the attached `risk_level`,
/// else from the taxonomy by name; unweighted entries are dropped. Entries
/// are deduplicated by `(type, name)` and `details` sorted most dangerous
/// first.
pub fn score_burn_risk(tags: &[RiskTag], taxonomy: &Taxonomy) -> BurnRiskProfile {
    let mut collector = Collector::default();

    for tag in tags {
        let tag_name = clean(Some(&tag.name));
        let tag_text = clean(tag.detected_text.as_deref());
        let tag_reason = clean(Some(&tag.reason));

        collector.register(
            BurnEntryType::Tag,
            &tag.name,
            tag.risk_level.or_else(|| taxonomy.risk_weight(&tag.name)),
            tag_text.clone(),
            tag_reason.clone(),
            None,
        );

        for sub in &tag.related_sub_tags {
            collector.register(
                BurnEntryType::Subtag,
                &sub.name,
                sub.risk_level.or_else(|| taxonomy.risk_weight(&sub.name)),
                clean(sub.detected_text.as_deref()).or_else(|| tag_text.clone()),
                clean(Some(&sub.reason)).or_else(|| tag_reason.clone()),
                tag_name.clone(),
            );
        }
    }

    let mut details = collector.details;
    if details.is_empty() {
        return BurnRiskProfile::empty();
    }

    let count = details.len();
    let sum: u32 = details.iter().map(|d| u32::from(d.risk)).sum();
    let average = f64::from(sum) / count as f64;
    let min = details.iter().map(|d| d.risk).min();
    let max = details.iter().map(|d| d.risk).max();
    details.sort_by_key(|d| d.risk);

    debug!(count, average, "Burn risk scored");

    BurnRiskProfile {
        count,
        average: Some((average * 100.0).round() / 100.0),
        grade: Some(burn_grade(average)),
        label: Some(burn_label(average).to_string()),
        min,
        max,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubRiskTag;

    fn tag(name: &str, risk_level: Option<u8>, subs: Vec<SubRiskTag>) -> RiskTag {
        RiskTag {
            name: name.to_string(),
            grade: Grade::C,
            reason: format!("{} reason", name),
            detected_text: Some("  ".to_string()),
            detected_timecode: None,
            risk_level,
            related_sub_tags: subs,
        }
    }

    #[test]
    fn test_average_of_five_and_three() {
        let profile = score_burn_risk(
            &[tag("low", Some(5), vec![]), tag("mid", Some(3), vec![])],
            &Taxonomy::empty(),
        );
        assert_eq!(profile.count, 2);
        assert_eq!(profile.average, Some(4.0));
        assert_eq!(profile.grade, Some(Grade::B));
        assert_eq!(profile.label.as_deref(), Some("somewhat low"));
        assert_eq!((profile.min, profile.max), (Some(3), Some(5)));
        assert_eq!(profile.details[0].name, "mid");
        assert_eq!(profile.details[0].label, "moderate");
    }

    #[test]
    fn test_unweighted_entries_dropped() {
        let profile = score_burn_risk(&[tag("none", None, vec![])], &Taxonomy::empty());
        assert!(profile.is_empty());
        assert!(profile.details.is_empty());
        assert_eq!(profile.average, None);
    }

    #[test]
    fn test_sub_tags_inherit_parent_context_and_dedupe() {
        let sub = SubRiskTag {
            name: "child".to_string(),
            grade: Grade::E,
            reason: String::new(),
            detected_text: None,
            detected_timecode: None,
            risk_level: Some(1),
        };
        let mut parent = tag("parent", Some(2), vec![sub.clone(), sub]);
        parent.detected_text = Some("quoted".to_string());

        let profile = score_burn_risk(&[parent], &Taxonomy::empty());
        assert_eq!(profile.count, 2);
        let child = &profile.details[0];
        assert_eq!(child.entry_type, BurnEntryType::Subtag);
        assert_eq!(child.parent_tag.as_deref(), Some("parent"));
        assert_eq!(child.detected_text.as_deref(), Some("quoted"));
        assert_eq!(child.reason.as_deref(), Some("parent reason"));
        assert_eq!(profile.average, Some(1.5));
        assert_eq!(profile.grade, Some(Grade::E));
    }

    #[test]
    fn test_unnamed_entries_get_positional_names() {
        let profile = score_burn_risk(&[tag(" ", Some(4), vec![])], &Taxonomy::empty());
        assert_eq!(profile.details[0].name, "TAG_1");
    }

    #[test]
    fn test_average_rounded_to_two_decimals() {
        let profile = score_burn_risk(
            &[tag("a", Some(1), vec![]), tag("b", Some(1), vec![]), tag("c", Some(2), vec![])],
            &Taxonomy::empty(),
        );
        assert_eq!(profile.average, Some(1.33));
        assert_eq!(profile.grade, Some(Grade::E));
    }
}
