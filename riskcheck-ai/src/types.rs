//! Core data model for risk analysis
//!
//! Every type here is serialised into the artifact JSON with stable
//! snake_case key names, so external report viewers can read artifacts
//! without depending on this crate.
//!
//! # Severity scale
//! Social grades run `A < B < C < D < E` (E = most severe). Legal grades map
//! onto the same five-level ordinal scale:
//! - not in violation → 0 (A)
//! - potential violation → 2 (C)
//! - in violation → 4 (E)
//! - an explicit letter grade keeps its own level

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Grades
// ============================================================================

/// Unrecognised grade string
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown grade: {0}")]
pub struct GradeParseError(pub String);

/// Five-level severity grade (`A` least severe, `E` most severe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
}

impl Grade {
    /// Ordinal severity, 0 (A) through 4 (E)
    pub fn severity(self) -> u8 {
        self as u8
    }

    pub fn from_severity(level: u8) -> Grade {
        match level {
            0 => Grade::A,
            1 => Grade::B,
            2 => Grade::C,
            3 => Grade::D,
            _ => Grade::E,
        }
    }

    /// Taxonomy weights are inverted: weight 1 is the most dangerous
    pub fn from_risk_weight(weight: u8) -> Grade {
        Grade::from_severity(5u8.saturating_sub(weight.clamp(1, 5)))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Grade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            "D" => Ok(Grade::D),
            "E" => Ok(Grade::E),
            _ => Err(GradeParseError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Grade {
    type Error = GradeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Grade> for String {
    fn from(grade: Grade) -> Self {
        grade.as_str().to_string()
    }
}

/// Legal compliance grade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LegalGrade {
    /// 抵触していない
    NotInViolation,
    /// 抵触する可能性がある
    PotentialViolation,
    /// 抵触している
    InViolation,
    /// Letter refinement emitted by the judgement service
    Graded(Grade),
}

impl LegalGrade {
    /// Position on the shared five-level ordinal scale
    pub fn severity(self) -> u8 {
        match self {
            LegalGrade::NotInViolation => 0,
            LegalGrade::PotentialViolation => 2,
            LegalGrade::InViolation => 4,
            LegalGrade::Graded(grade) => grade.severity(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LegalGrade::NotInViolation => "抵触していない",
            LegalGrade::PotentialViolation => "抵触する可能性がある",
            LegalGrade::InViolation => "抵触している",
            LegalGrade::Graded(grade) => grade.as_str(),
        }
    }
}

impl fmt::Display for LegalGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LegalGrade {
    type Err = GradeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "抵触していない" | "抵触しない" | "not_in_violation" | "compliant" => {
                Ok(LegalGrade::NotInViolation)
            }
            "抵触する可能性がある" | "potential_violation" | "possible_violation" => {
                Ok(LegalGrade::PotentialViolation)
            }
            "抵触している" | "抵触する" | "in_violation" | "violation" => {
                Ok(LegalGrade::InViolation)
            }
            _ => trimmed.parse::<Grade>().map(LegalGrade::Graded),
        }
    }
}

impl TryFrom<String> for LegalGrade {
    type Error = GradeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LegalGrade> for String {
    fn from(grade: LegalGrade) -> Self {
        grade.as_str().to_string()
    }
}

// ============================================================================
// Media and extraction
// ============================================================================

/// Uploaded media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Image,
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(MediaType::Video),
            "image" => Ok(MediaType::Image),
            other => Err(format!("unsupported media type: {}", other)),
        }
    }
}

/// Prefix of the offline payloads produced without an API key
pub const STUB_PREFIX: &str = "[stub]";

/// Where an extraction value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    Ai,
    Fallback,
    Skipped,
}

/// Text extraction output (transcript or OCR) for one (step, run) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub text: String,
    pub source: ExtractionSource,
    pub note: Option<String>,
}

impl ExtractionResult {
    pub fn from_judged(judged: Judged<String>) -> Self {
        match judged {
            Judged::Ok(text) => Self {
                text,
                source: ExtractionSource::Ai,
                note: None,
            },
            Judged::Fallback { value, note } => Self {
                text: value,
                source: ExtractionSource::Fallback,
                note: Some(note),
            },
        }
    }

    pub fn skipped(text: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ExtractionSource::Skipped,
            note: Some(note.into()),
        }
    }

    /// Text extracted from the media itself
    ///
    /// Empty for placeholders, skipped steps and offline stub output, none of
    /// which describe the media.
    pub fn evidence_text(&self) -> &str {
        if self.source == ExtractionSource::Ai && !self.text.trim_start().starts_with(STUB_PREFIX) {
            &self.text
        } else {
            ""
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualShot {
    #[serde(default)]
    pub timecode: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualSegment {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub shots: Vec<VisualShot>,
}

/// Visual analysis output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualResult {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub segments: Vec<VisualSegment>,
    #[serde(default)]
    pub risk_flags: Vec<String>,
}

impl VisualResult {
    /// Concatenated segment descriptions, used to compare runs
    pub fn description_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.description.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Placeholder or stub output rather than a real analysis
    pub fn is_stub(&self) -> bool {
        self.summary.starts_with(STUB_PREFIX)
            || self
                .risk_flags
                .iter()
                .any(|f| f == "analysis-unavailable" || f == "insight-unavailable")
    }
}

/// Visual analysis output for one run, with provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualExtraction {
    pub result: VisualResult,
    pub source: ExtractionSource,
    pub note: Option<String>,
}

impl VisualExtraction {
    pub fn from_judged(judged: Judged<VisualResult>) -> Self {
        match judged {
            Judged::Ok(result) => Self {
                result,
                source: ExtractionSource::Ai,
                note: None,
            },
            Judged::Fallback { value, note } => Self {
                result: value,
                source: ExtractionSource::Fallback,
                note: Some(note),
            },
        }
    }
}

// ============================================================================
// Risk assessment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskFinding {
    pub timecode: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalViolation {
    pub reference: Option<String>,
    pub expression: String,
    pub severity: Option<String>,
    pub timecode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubRiskTag {
    pub name: String,
    pub grade: Grade,
    pub reason: String,
    pub detected_text: Option<String>,
    pub detected_timecode: Option<String>,
    /// Taxonomy weight attached at judgement time (1 = most severe)
    pub risk_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTag {
    pub name: String,
    pub grade: Grade,
    pub reason: String,
    pub detected_text: Option<String>,
    pub detected_timecode: Option<String>,
    pub risk_level: Option<u8>,
    pub related_sub_tags: Vec<SubRiskTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialAssessment {
    pub grade: Grade,
    pub reason: String,
    pub findings: Vec<RiskFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalAssessment {
    pub grade: LegalGrade,
    pub reason: String,
    pub recommendations: Option<String>,
    pub violations: Vec<LegalViolation>,
    pub findings: Vec<RiskFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMatrix {
    pub x_axis: String,
    pub y_axis: String,
    pub position: [i32; 2],
}

impl Default for RiskMatrix {
    fn default() -> Self {
        Self {
            x_axis: "法務評価".to_string(),
            y_axis: "社会的感度".to_string(),
            position: [0, 0],
        }
    }
}

/// One structured risk judgement, or the merged consensus of several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessmentResult {
    pub social: SocialAssessment,
    pub legal: LegalAssessment,
    pub matrix: RiskMatrix,
    pub tags: Vec<RiskTag>,
    /// Present on merged results and on per-run results once scored
    pub burn_risk: Option<BurnRiskProfile>,
    /// Explanation attached to fallback results
    pub note: Option<String>,
}

// ============================================================================
// Burn risk
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurnEntryType {
    Tag,
    Subtag,
}

impl BurnEntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            BurnEntryType::Tag => "tag",
            BurnEntryType::Subtag => "subtag",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnRiskDetail {
    pub name: String,
    pub risk: u8,
    pub label: String,
    #[serde(rename = "type")]
    pub entry_type: BurnEntryType,
    pub detected_text: Option<String>,
    pub reason: Option<String>,
    pub parent_tag: Option<String>,
}

/// Virality / incident risk profile derived from tag weights
///
/// An empty profile serialises as `{"count": 0, "details": []}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BurnRiskProfile {
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<u8>,
    pub details: Vec<BurnRiskDetail>,
}

impl BurnRiskProfile {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

// ============================================================================
// Step outcome
// ============================================================================

/// Outcome of one call across the judgement boundary
///
/// The boundary never raises: a failed call still yields a usable value,
/// tagged with a human-readable note explaining the substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum Judged<T> {
    Ok(T),
    Fallback { value: T, note: String },
}

impl<T> Judged<T> {
    pub fn fallback(value: T, note: impl Into<String>) -> Self {
        Judged::Fallback {
            value,
            note: note.into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Judged::Fallback { .. })
    }

    pub fn value(&self) -> &T {
        match self {
            Judged::Ok(value) | Judged::Fallback { value, .. } => value,
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Judged::Ok(_) => None,
            Judged::Fallback { note, .. } => Some(note),
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Judged::Ok(value) | Judged::Fallback { value, .. } => value,
        }
    }

    pub fn into_parts(self) -> (T, Option<String>) {
        match self {
            Judged::Ok(value) => (value, None),
            Judged::Fallback { value, note } => (value, Some(note)),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Judged<U> {
        match self {
            Judged::Ok(value) => Judged::Ok(f(value)),
            Judged::Fallback { value, note } => Judged::Fallback {
                value: f(value),
                note,
            },
        }
    }
}
