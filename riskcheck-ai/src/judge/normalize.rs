//! Normalisation of raw structured judgements
//!
//! The service replies with loosely-typed JSON. This module turns it into a
//! [`RiskAssessmentResult`]:
//! - findings without a `detail` are dropped; a blank timecode becomes `N/A`
//! - violations keep `reference`, `expression`, `severity` and `timecode`
//! - tags without a name or with an unknown grade are dropped
//! - every tag and sub-tag receives a `risk_level` from the taxonomy
//!
//! Missing or unknown top-level grades are parse errors.

use super::JudgeError;
use crate::taxonomy::Taxonomy;
use crate::types::{
    Grade, LegalAssessment, LegalGrade, LegalViolation, RiskAssessmentResult, RiskFinding,
    RiskMatrix, RiskTag, SocialAssessment, SubRiskTag,
};
use serde_json::Value;
use tracing::warn;

fn text(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn findings(value: Option<&Value>) -> Vec<RiskFinding> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let detail = text(item, "detail")?;
            let timecode = text(item, "timecode").unwrap_or_else(|| "N/A".to_string());
            Some(RiskFinding { timecode, detail })
        })
        .collect()
}

fn violations(value: Option<&Value>) -> Vec<LegalViolation> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter(|item| item.is_object())
        .map(|item| LegalViolation {
            reference: text(item, "reference"),
            expression: text(item, "expression").unwrap_or_default(),
            severity: text(item, "severity"),
            timecode: text(item, "timecode"),
        })
        .collect()
}

fn parse_grade(value: &Value, key: &str) -> Option<Grade> {
    text(value, key)?.parse().ok()
}

fn sub_tag(value: &Value, taxonomy: &Taxonomy) -> Option<SubRiskTag> {
    let name = text(value, "name")?;
    let Some(grade) = parse_grade(value, "grade") else {
        warn!(sub_tag = %name, "Dropping sub-tag with unknown grade");
        return None;
    };
    Some(SubRiskTag {
        risk_level: taxonomy.risk_weight(&name),
        grade,
        reason: text(value, "reason").unwrap_or_default(),
        detected_text: Some(text(value, "detected_text").unwrap_or_default()),
        detected_timecode: text(value, "detected_timecode"),
        name,
    })
}

fn tag(value: &Value, taxonomy: &Taxonomy) -> Option<RiskTag> {
    let name = text(value, "name")?;
    let Some(grade) = parse_grade(value, "grade") else {
        warn!(tag = %name, "Dropping tag with unknown grade");
        return None;
    };
    let related_sub_tags = value
        .get("related_sub_tags")
        .and_then(Value::as_array)
        .map(|subs| subs.iter().filter_map(|s| sub_tag(s, taxonomy)).collect())
        .unwrap_or_default();

    Some(RiskTag {
        risk_level: taxonomy.risk_weight(&name),
        grade,
        reason: text(value, "reason").unwrap_or_default(),
        detected_text: Some(text(value, "detected_text").unwrap_or_default()),
        detected_timecode: text(value, "detected_timecode"),
        related_sub_tags,
        name,
    })
}

fn matrix(value: Option<&Value>) -> RiskMatrix {
    let mut matrix = RiskMatrix::default();
    let Some(value) = value else {
        return matrix;
    };
    if let Some(x_axis) = text(value, "x_axis") {
        matrix.x_axis = x_axis;
    }
    if let Some(y_axis) = text(value, "y_axis") {
        matrix.y_axis = y_axis;
    }
    if let Some(position) = value.get("position").and_then(Value::as_array) {
        let coords: Vec<i32> = position
            .iter()
            .filter_map(Value::as_i64)
            .map(|v| v as i32)
            .collect();
        if let [x, y] = coords[..] {
            matrix.position = [x, y];
        }
    }
    matrix
}

/// Convert a raw judgement reply into a typed result
pub fn normalize_judgement(raw: &Value, taxonomy: &Taxonomy) -> Result<RiskAssessmentResult, JudgeError> {
    let social = raw
        .get("social")
        .filter(|v| v.is_object())
        .ok_or_else(|| JudgeError::Parse("missing 'social' section".to_string()))?;
    let legal = raw
        .get("legal")
        .filter(|v| v.is_object())
        .ok_or_else(|| JudgeError::Parse("missing 'legal' section".to_string()))?;

    let social_grade = text(social, "grade")
        .ok_or_else(|| JudgeError::Parse("missing social grade".to_string()))?
        .parse::<Grade>()
        .map_err(|e| JudgeError::Parse(e.to_string()))?;
    let legal_grade = text(legal, "grade")
        .ok_or_else(|| JudgeError::Parse("missing legal grade".to_string()))?
        .parse::<LegalGrade>()
        .map_err(|e| JudgeError::Parse(e.to_string()))?;

    let tags = raw
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(|t| tag(t, taxonomy)).collect())
        .unwrap_or_default();

    Ok(RiskAssessmentResult {
        social: SocialAssessment {
            grade: social_grade,
            reason: text(social, "reason").unwrap_or_default(),
            findings: findings(social.get("findings")),
        },
        legal: LegalAssessment {
            grade: legal_grade,
            reason: text(legal, "reason").unwrap_or_default(),
            recommendations: text(legal, "recommendations"),
            violations: violations(legal.get("violations")),
            findings: findings(legal.get("findings")),
        },
        matrix: matrix(raw.get("matrix")),
        tags,
        burn_risk: None,
        note: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{SubTagDefinition, TagDefinition};
    use serde_json::json;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(vec![TagDefinition {
            name: "女性表現".to_string(),
            definition: String::new(),
            risk_weight: Some(2),
            sub_tags: vec![SubTagDefinition {
                name: "年齢".to_string(),
                definition: String::new(),
                risk_weight: Some(1),
            }],
        }])
    }

    #[test]
    fn test_normalize_full_reply() {
        let raw = json!({
            "social": {
                "grade": "D",
                "reason": "年齢に関する表現",
                "findings": [
                    {"timecode": "00:03", "detail": "25歳は女の子じゃない"},
                    {"timecode": "00:05"},
                    {"detail": "no timecode"}
                ]
            },
            "legal": {
                "grade": "抵触していない",
                "reason": "問題なし",
                "violations": [{"expression": "No.1", "severity": "低"}, "junk"]
            },
            "matrix": {"x_axis": "legal", "y_axis": "social", "position": [0, 3]},
            "tags": [
                {"name": "女性表現", "grade": "D", "reason": "r",
                 "related_sub_tags": [{"name": "年齢", "grade": "E", "reason": "s"}]},
                {"name": "", "grade": "C"},
                {"name": "Other", "grade": "Z"}
            ]
        });

        let result = normalize_judgement(&raw, &taxonomy()).unwrap();
        assert_eq!(result.social.grade, Grade::D);
        assert_eq!(result.social.findings.len(), 2);
        assert_eq!(result.social.findings[1].timecode, "N/A");
        assert_eq!(result.legal.grade, LegalGrade::NotInViolation);
        assert_eq!(result.legal.recommendations, None);
        assert_eq!(result.legal.violations.len(), 1);
        assert_eq!(result.legal.violations[0].reference, None);
        assert_eq!(result.matrix.position, [0, 3]);

        assert_eq!(result.tags.len(), 1);
        assert_eq!(result.tags[0].risk_level, Some(2));
        assert_eq!(result.tags[0].detected_text.as_deref(), Some(""));
        assert_eq!(result.tags[0].related_sub_tags[0].risk_level, Some(1));
    }

    #[test]
    fn test_missing_grade_is_parse_error() {
        let raw = json!({"social": {"reason": "x"}, "legal": {"grade": "抵触する"}});
        assert!(matches!(normalize_judgement(&raw, &taxonomy()), Err(JudgeError::Parse(_))));
        assert!(normalize_judgement(&json!([]), &taxonomy()).is_err());
    }

    #[test]
    fn test_matrix_defaults_when_absent() {
        let raw = json!({"social": {"grade": "A"}, "legal": {"grade": "B"}});
        let result = normalize_judgement(&raw, &taxonomy()).unwrap();
        assert_eq!(result.matrix, RiskMatrix::default());
        assert_eq!(result.legal.grade, LegalGrade::Graded(Grade::B));
        assert!(result.tags.is_empty());
    }
}
