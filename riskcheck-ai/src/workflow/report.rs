//! Step previews and the final report
//!
//! Previews are plain text meant for people; the final report is the
//! structured JSON document written to `final_report.json` and stored on the
//! project record.

use crate::types::{
    BurnRiskProfile, ExtractionSource, RiskAssessmentResult, RiskFinding, VisualResult,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Entries shown per list in the risk preview
const PREVIEW_ITEMS: usize = 5;

/// Footnote marker that flags an OCR line as an on-screen annotation
pub const ANNOTATION_MARKER: char = '※';

pub const REPORT_DISCLAIMER: &str = "*This analysis is for reference only and does not guarantee \
the absence of social or legal risk.";

pub fn format_transcript(transcript: &str) -> String {
    let excerpt = match transcript.trim() {
        "" => "No usable speech was transcribed.",
        text => text,
    };
    format!("Transcription\n{}", excerpt)
}

pub fn format_ocr(ocr_text: &str) -> String {
    let excerpt = match ocr_text.trim() {
        "" => "No on-screen text was detected.",
        text => text,
    };
    format!("On-screen text (OCR)\n{}", excerpt)
}

pub fn format_visual(visual: &VisualResult) -> String {
    let summary = match visual.summary.trim() {
        "" => "Nothing notable in the visuals.",
        text => text,
    };
    let mut lines = vec![format!("Visual analysis\n{}", summary)];

    if !visual.segments.is_empty() {
        lines.push("\nExpression patterns".to_string());
        for segment in &visual.segments {
            let label = if segment.label.is_empty() {
                "Unlabelled"
            } else {
                segment.label.as_str()
            };
            lines.push(format!("- {}", label));
            if !segment.description.is_empty() {
                lines.push(format!("  {}", segment.description));
            }
            for shot in &segment.shots {
                let timecode = if shot.timecode.is_empty() {
                    "unknown"
                } else {
                    shot.timecode.as_str()
                };
                lines.push(format!("    - {}: {}", timecode, shot.description));
            }
        }
    }

    if !visual.risk_flags.is_empty() {
        lines.push("\nPoints of attention".to_string());
        lines.extend(visual.risk_flags.iter().map(|f| format!("- {}", f)));
    }
    lines.join("\n")
}

fn push_findings(lines: &mut Vec<String>, heading: &str, findings: &[RiskFinding]) {
    if findings.is_empty() {
        return;
    }
    lines.push(format!("  {}:", heading));
    for finding in findings.iter().take(PREVIEW_ITEMS) {
        lines.push(format!("    - {}: {}", finding.timecode, finding.detail));
    }
}

/// Risk summary: grades, top findings, violations and tags, burn risk, position
pub fn format_risk(risk: &RiskAssessmentResult) -> String {
    let mut lines = vec![
        "Integrated risk assessment".to_string(),
        format!("Social sensitivity: {} - {}", risk.social.grade, risk.social.reason),
        format!("Legal assessment: {} - {}", risk.legal.grade, risk.legal.reason),
    ];
    push_findings(&mut lines, "Social findings", &risk.social.findings);

    if let Some(recommendations) = risk.legal.recommendations.as_deref().filter(|r| !r.is_empty()) {
        lines.push(format!("Recommendations: {}", recommendations));
    }
    push_findings(&mut lines, "Legal findings", &risk.legal.findings);

    if !risk.legal.violations.is_empty() {
        lines.push("  Possible violations:".to_string());
        for violation in risk.legal.violations.iter().take(PREVIEW_ITEMS) {
            let mut detail = violation.expression.clone();
            if let Some(severity) = violation.severity.as_deref().filter(|s| !s.is_empty()) {
                detail = format!("[{}] {}", severity, detail);
            }
            if let Some(reference) = violation.reference.as_deref().filter(|r| !r.is_empty()) {
                detail = format!("{}: {}", reference, detail);
            }
            lines.push(format!("    - {}", detail));
        }
    }

    if let Some(burn) = risk.burn_risk.as_ref().filter(|b| !b.is_empty()) {
        lines.push(format!(
            "Burn risk: {} ({}) average {}",
            burn.grade.map(|g| g.as_str()).unwrap_or("N/A"),
            burn.label.as_deref().unwrap_or(""),
            burn.average
                .map(|a| format!("{:.2}", a))
                .unwrap_or_else(|| "N/A".to_string()),
        ));
    }
    lines.push(format!(
        "Position: X={} / Y={}",
        risk.matrix.position[0], risk.matrix.position[1]
    ));

    if !risk.tags.is_empty() {
        lines.push("\nTags".to_string());
        for tag in risk.tags.iter().take(PREVIEW_ITEMS) {
            lines.push(format!("- {}: {} / {}", tag.name, tag.grade, tag.reason));
        }
    }
    lines.join("\n")
}

/// Trimmed OCR lines carrying the annotation marker
pub fn ocr_annotations(ocr_text: &str) -> Vec<String> {
    ocr_text
        .lines()
        .filter(|line| line.contains(ANNOTATION_MARKER))
        .map(|line| line.trim().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSections {
    pub transcription: String,
    pub ocr: String,
    pub video_analysis: String,
}

/// Paths of the selected / merged artifacts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFiles {
    pub transcription: PathBuf,
    pub ocr: PathBuf,
    pub video_analysis: PathBuf,
    pub risk_assessment: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub transcription_source: ExtractionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_note: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ocr_annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burn_risk: Option<BurnRiskProfile>,
}

/// One judgement run, with the extraction outputs of the run sharing its index
///
/// Extraction runs twice, so only iterations 1 and 2 carry extraction text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub index: usize,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub ocr: Option<String>,
    #[serde(default)]
    pub video_analysis: Option<VisualResult>,
    pub risk: RiskAssessmentResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub summary: String,
    pub sections: ReportSections,
    pub files: ReportFiles,
    pub metadata: ReportMetadata,
    pub risk: RiskAssessmentResult,
    pub iterations: Vec<IterationRecord>,
}

/// Selected extraction outputs with their provenance
#[derive(Debug, Clone)]
pub struct SelectedOutputs<'a> {
    pub transcript: &'a str,
    pub transcription_source: ExtractionSource,
    pub transcription_note: Option<String>,
    pub ocr_text: &'a str,
    pub ocr_note: Option<String>,
    pub visual: &'a VisualResult,
    pub video_note: Option<String>,
}

pub fn build_final_report(
    selected: SelectedOutputs<'_>,
    files: ReportFiles,
    risk: RiskAssessmentResult,
    iterations: Vec<IterationRecord>,
) -> FinalReport {
    let metadata = ReportMetadata {
        transcription_source: selected.transcription_source,
        transcription_note: selected.transcription_note,
        ocr_note: selected.ocr_note,
        video_note: selected.video_note,
        ocr_annotations: ocr_annotations(selected.ocr_text),
        burn_risk: risk.burn_risk.clone().filter(|b| !b.is_empty()),
    };

    FinalReport {
        summary: REPORT_DISCLAIMER.to_string(),
        sections: ReportSections {
            transcription: format_transcript(selected.transcript),
            ocr: format_ocr(selected.ocr_text),
            video_analysis: format_visual(selected.visual),
        },
        files,
        metadata,
        risk,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::adapter::risk_fallback;
    use crate::types::{Grade, LegalViolation, RiskTag, VisualSegment, VisualShot};

    fn files() -> ReportFiles {
        ReportFiles {
            transcription: PathBuf::from("/ws/transcription.txt"),
            ocr: PathBuf::from("/ws/ocr.txt"),
            video_analysis: PathBuf::from("/ws/video_analysis.json"),
            risk_assessment: PathBuf::from("/ws/risk_assessment.json"),
        }
    }

    #[test]
    fn test_empty_text_sections_use_placeholders() {
        assert_eq!(format_transcript("  "), "Transcription\nNo usable speech was transcribed.");
        assert!(format_ocr("").ends_with("No on-screen text was detected."));
    }

    #[test]
    fn test_visual_preview_lists_shots_and_flags() {
        let visual = VisualResult {
            summary: "Two scenes".to_string(),
            segments: vec![VisualSegment {
                label: "Opening".to_string(),
                description: "Product close-up".to_string(),
                shots: vec![VisualShot {
                    timecode: "00:01".to_string(),
                    description: "Bottle on table".to_string(),
                }],
            }],
            risk_flags: vec!["alcohol".to_string()],
        };
        let text = format_visual(&visual);
        assert!(text.contains("- Opening"));
        assert!(text.contains("    - 00:01: Bottle on table"));
        assert!(text.contains("Points of attention\n- alcohol"));
    }

    #[test]
    fn test_risk_preview_caps_tags_and_shows_position() {
        let mut risk = risk_fallback("down");
        risk.tags = (0..7)
            .map(|i| RiskTag {
                name: format!("tag{}", i),
                grade: Grade::B,
                reason: "r".to_string(),
                detected_text: None,
                detected_timecode: None,
                risk_level: None,
                related_sub_tags: Vec::new(),
            })
            .collect();
        risk.legal.violations = vec![LegalViolation {
            reference: Some("景品表示法".to_string()),
            expression: "No.1".to_string(),
            severity: Some("high".to_string()),
            timecode: None,
        }];

        let text = format_risk(&risk);
        assert!(text.contains("- tag4:"));
        assert!(!text.contains("- tag5:"));
        assert!(text.contains("景品表示法: [high] No.1"));
        assert!(text.contains("Position: X=1 / Y=2"));
    }

    #[test]
    fn test_final_report_metadata_omits_absent_fields() {
        let visual = VisualResult::default();
        let report = build_final_report(
            SelectedOutputs {
                transcript: "hello",
                transcription_source: ExtractionSource::Ai,
                transcription_note: None,
                ocr_text: "SALE\n ※ 個人の感想です \n",
                ocr_note: None,
                visual: &visual,
                video_note: Some("stub".to_string()),
            },
            files(),
            risk_fallback("down"),
            Vec::new(),
        );

        assert_eq!(report.metadata.ocr_annotations, vec!["※ 個人の感想です"]);
        let json = serde_json::to_value(&report).unwrap();
        let metadata = json["metadata"].as_object().unwrap();
        assert_eq!(metadata["transcription_source"], "ai");
        assert_eq!(metadata["video_note"], "stub");
        assert!(!metadata.contains_key("transcription_note"));
        assert!(!metadata.contains_key("burn_risk"));

        let parsed: FinalReport = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report);
    }
}
