//! Risk consensus aggregator
//!
//! Merges N independent risk judgements and the screener's candidates into
//! one assessment.
//!
//! # Rules
//! 1. Top-level social and legal grades take the maximum severity across
//!    runs; the legal value keeps the label of its first most-severe run.
//! 2. Top-level reasons (and legal recommendations) take the most frequent
//!    non-empty string, ties resolved by earliest run.
//! 3. Tags are bucketed by name, sub-tags by `(tag, sub-tag)`. A bucket's
//!    grade is the max severity seen, its reason the mode, its detected
//!    text / timecode the first non-empty value (runs 1..N, then screener).
//! 4. Findings are deduplicated per axis by exact `detail`, order-preserving.
//! 5. Violations are deduplicated by `(reference, expression, severity)`.
//!
//! Bucket promotion follows the [`MergePolicy`]. Under quorum, only runs
//! count toward the threshold; screener candidates add evidence to buckets
//! that reach it but never create an output tag on their own.

use super::burn_risk::score_burn_risk;
use super::{mode_earliest, FusionError};
use crate::taxonomy::Taxonomy;
use crate::types::{
    Grade, Judged, LegalAssessment, LegalGrade, LegalViolation, RiskAssessmentResult,
    RiskFinding, RiskMatrix, RiskTag, SocialAssessment, SubRiskTag,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info, warn};

/// Tag promotion policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Every bucket becomes an output tag
    Unconditional,
    /// A bucket needs observations from at least `min_runs` distinct runs
    /// (capped at the number of runs aggregated)
    Quorum { min_runs: usize },
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::Quorum { min_runs: 2 }
    }
}

impl MergePolicy {
    /// Parse a configured policy name
    pub fn from_name(name: &str, quorum_threshold: usize) -> Result<Self, String> {
        match name.trim().to_ascii_lowercase().as_str() {
            "quorum" | "majority" => Ok(MergePolicy::Quorum {
                min_runs: quorum_threshold.max(1),
            }),
            "unconditional" | "union" => Ok(MergePolicy::Unconditional),
            other => Err(format!("unknown merge policy: {}", other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MergePolicy::Unconditional => "unconditional",
            MergePolicy::Quorum { .. } => "quorum",
        }
    }

    /// Distinct runs a bucket needs, given `run_count` runs
    pub fn required_runs(&self, run_count: usize) -> usize {
        match self {
            MergePolicy::Unconditional => 0,
            MergePolicy::Quorum { min_runs } => (*min_runs).min(run_count).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Run(usize),
    Screener,
}

/// Evidence accumulated for one tag or sub-tag name
#[derive(Debug)]
struct Bucket {
    name: String,
    runs: BTreeSet<usize>,
    grades: Vec<Grade>,
    reasons: Vec<String>,
    detected_text: Option<String>,
    detected_timecode: Option<String>,
    risk_level: Option<u8>,
    subs: BucketSet,
}

impl Bucket {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: BTreeSet::new(),
            grades: Vec::new(),
            reasons: Vec::new(),
            detected_text: None,
            detected_timecode: None,
            risk_level: None,
            subs: BucketSet::default(),
        }
    }

    fn observe(
        &mut self,
        source: Source,
        grade: Grade,
        reason: &str,
        detected_text: Option<&str>,
        detected_timecode: Option<&str>,
        risk_level: Option<u8>,
    ) {
        if let Source::Run(index) = source {
            self.runs.insert(index);
        }
        self.grades.push(grade);
        self.reasons.push(reason.to_string());
        if self.detected_text.is_none() {
            self.detected_text = non_empty(detected_text);
        }
        if self.detected_timecode.is_none() {
            self.detected_timecode = non_empty(detected_timecode);
        }
        if self.risk_level.is_none() {
            self.risk_level = risk_level;
        }
    }

    fn grade(&self) -> Grade {
        self.grades.iter().copied().max().unwrap_or(Grade::A)
    }

    fn reason(&self) -> String {
        mode_earliest(self.reasons.iter().map(String::as_str)).unwrap_or_default()
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Buckets in first-appearance order
#[derive(Debug, Default)]
struct BucketSet {
    buckets: Vec<Bucket>,
    index: HashMap<String, usize>,
}

impl BucketSet {
    fn entry(&mut self, name: &str) -> &mut Bucket {
        let position = match self.index.get(name) {
            Some(&position) => position,
            None => {
                self.buckets.push(Bucket::new(name));
                self.index.insert(name.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[position]
    }

    fn observe_tag(&mut self, source: Source, tag: &RiskTag) {
        let bucket = self.entry(&tag.name);
        bucket.observe(
            source,
            tag.grade,
            &tag.reason,
            tag.detected_text.as_deref(),
            tag.detected_timecode.as_deref(),
            tag.risk_level,
        );
        for sub in &tag.related_sub_tags {
            bucket.subs.entry(&sub.name).observe(
                source,
                sub.grade,
                &sub.reason,
                sub.detected_text.as_deref(),
                sub.detected_timecode.as_deref(),
                sub.risk_level,
            );
        }
    }

    fn promoted(&self, required_runs: usize) -> impl Iterator<Item = &Bucket> {
        self.buckets
            .iter()
            .filter(move |b| b.runs.len() >= required_runs)
    }
}

fn merge_tags(runs: &[&RiskAssessmentResult], screener: &[RiskTag], policy: MergePolicy) -> Vec<RiskTag> {
    let mut buckets = BucketSet::default();
    for (index, run) in runs.iter().enumerate() {
        for tag in &run.tags {
            buckets.observe_tag(Source::Run(index), tag);
        }
    }
    for candidate in screener {
        buckets.observe_tag(Source::Screener, candidate);
    }

    let required = policy.required_runs(runs.len());
    let tags: Vec<RiskTag> = buckets
        .promoted(required)
        .map(|bucket| RiskTag {
            name: bucket.name.clone(),
            grade: bucket.grade(),
            reason: bucket.reason(),
            detected_text: bucket.detected_text.clone(),
            detected_timecode: bucket.detected_timecode.clone(),
            risk_level: bucket.risk_level,
            related_sub_tags: bucket
                .subs
                .promoted(required)
                .map(|sub| SubRiskTag {
                    name: sub.name.clone(),
                    grade: sub.grade(),
                    reason: sub.reason(),
                    detected_text: sub.detected_text.clone(),
                    detected_timecode: sub.detected_timecode.clone(),
                    risk_level: sub.risk_level,
                })
                .collect(),
        })
        .collect();

    debug!(
        buckets = buckets.buckets.len(),
        promoted = tags.len(),
        required_runs = required,
        "Tag buckets merged"
    );
    tags
}

fn dedupe_findings<'a, I>(findings: I) -> Vec<RiskFinding>
where
    I: IntoIterator<Item = &'a RiskFinding>,
{
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert(f.detail.clone()))
        .cloned()
        .collect()
}

fn dedupe_violations<'a, I>(violations: I) -> Vec<LegalViolation>
where
    I: IntoIterator<Item = &'a LegalViolation>,
{
    let mut seen = HashSet::new();
    violations
        .into_iter()
        .filter(|v| seen.insert((v.reference.clone(), v.expression.clone(), v.severity.clone())))
        .cloned()
        .collect()
}

/// Matrix column for a legal severity: 0 (clear), 1 (possible), 2 (violation)
fn legal_column(severity: u8) -> i32 {
    match severity {
        0 => 0,
        1 | 2 => 1,
        _ => 2,
    }
}

fn merged_legal_grade(runs: &[&RiskAssessmentResult]) -> LegalGrade {
    let mut best = runs[0].legal.grade;
    for run in &runs[1..] {
        if run.legal.grade.severity() > best.severity() {
            best = run.legal.grade;
        }
    }
    best
}

/// Merge runs and screener candidates into one assessment
///
/// `runs` must be non-empty and in run order. The result carries a burn-risk
/// profile scored against `taxonomy`.
pub fn aggregate(
    runs: &[&RiskAssessmentResult],
    screener: &[RiskTag],
    policy: MergePolicy,
    taxonomy: &Taxonomy,
) -> Result<RiskAssessmentResult, FusionError> {
    let first = runs.first().ok_or(FusionError::NoRuns)?;

    let social_grade = runs
        .iter()
        .map(|r| r.social.grade)
        .max()
        .unwrap_or(Grade::A);
    let legal_grade = merged_legal_grade(runs);

    let social = SocialAssessment {
        grade: social_grade,
        reason: mode_earliest(runs.iter().map(|r| r.social.reason.as_str())).unwrap_or_default(),
        findings: dedupe_findings(runs.iter().flat_map(|r| &r.social.findings)),
    };
    let legal = LegalAssessment {
        grade: legal_grade,
        reason: mode_earliest(runs.iter().map(|r| r.legal.reason.as_str())).unwrap_or_default(),
        recommendations: mode_earliest(
            runs.iter()
                .filter_map(|r| r.legal.recommendations.as_deref()),
        ),
        violations: dedupe_violations(runs.iter().flat_map(|r| &r.legal.violations)),
        findings: dedupe_findings(runs.iter().flat_map(|r| &r.legal.findings)),
    };
    let matrix = RiskMatrix {
        x_axis: first.matrix.x_axis.clone(),
        y_axis: first.matrix.y_axis.clone(),
        position: [
            legal_column(legal_grade.severity()),
            social_grade.severity() as i32,
        ],
    };

    let tags = merge_tags(runs, screener, policy);
    let burn_risk = score_burn_risk(&tags, taxonomy);

    info!(
        runs = runs.len(),
        policy = policy.name(),
        social = %social_grade,
        legal = %legal_grade,
        tags = tags.len(),
        "Risk consensus reached"
    );

    Ok(RiskAssessmentResult {
        social,
        legal,
        matrix,
        tags,
        burn_risk: Some(burn_risk),
        note: None,
    })
}

/// Aggregate judged runs, excluding fallback runs when any run succeeded
///
/// If every run fell back, all of them are aggregated and the result notes it.
pub fn aggregate_judged(
    runs: &[Judged<RiskAssessmentResult>],
    screener: &[RiskTag],
    policy: MergePolicy,
    taxonomy: &Taxonomy,
) -> Result<RiskAssessmentResult, FusionError> {
    let succeeded: Vec<&RiskAssessmentResult> = runs
        .iter()
        .filter(|r| !r.is_fallback())
        .map(Judged::value)
        .collect();

    if !succeeded.is_empty() {
        if succeeded.len() < runs.len() {
            warn!(
                excluded = runs.len() - succeeded.len(),
                "Fallback judgement runs excluded from consensus"
            );
        }
        return aggregate(&succeeded, screener, policy, taxonomy);
    }

    let all: Vec<&RiskAssessmentResult> = runs.iter().map(Judged::value).collect();
    let mut merged = aggregate(&all, screener, policy, taxonomy)?;
    warn!(runs = runs.len(), "Every judgement run fell back");
    merged.note = Some(format!(
        "All {} risk judgement runs failed; the assessment is provisional.",
        runs.len()
    ));
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(social: Grade, legal: LegalGrade, reason: &str, tags: Vec<RiskTag>) -> RiskAssessmentResult {
        RiskAssessmentResult {
            social: SocialAssessment {
                grade: social,
                reason: reason.to_string(),
                findings: vec![],
            },
            legal: LegalAssessment {
                grade: legal,
                reason: String::new(),
                recommendations: None,
                violations: vec![],
                findings: vec![],
            },
            matrix: RiskMatrix::default(),
            tags,
            burn_risk: None,
            note: None,
        }
    }

    fn tag(name: &str, grade: Grade) -> RiskTag {
        RiskTag {
            name: name.to_string(),
            grade,
            reason: format!("{} reason", name),
            detected_text: None,
            detected_timecode: None,
            risk_level: None,
            related_sub_tags: vec![],
        }
    }

    #[test]
    fn test_policy_parse_and_threshold() {
        let quorum = MergePolicy::from_name("Quorum", 2).unwrap();
        assert_eq!(quorum, MergePolicy::Quorum { min_runs: 2 });
        assert_eq!(quorum.required_runs(3), 2);
        assert_eq!(quorum.required_runs(1), 1);
        assert_eq!(MergePolicy::from_name("unconditional", 2).unwrap().required_runs(3), 0);
        assert!(MergePolicy::from_name("vote", 2).is_err());
    }

    #[test]
    fn test_no_runs_is_error() {
        let result = aggregate(&[], &[], MergePolicy::default(), &Taxonomy::empty());
        assert_eq!(result.unwrap_err(), FusionError::NoRuns);
    }

    #[test]
    fn test_legal_grade_keeps_first_most_severe_label() {
        let a = run(Grade::A, LegalGrade::PotentialViolation, "", vec![]);
        let b = run(Grade::A, LegalGrade::Graded(Grade::C), "", vec![]);
        let c = run(Grade::A, LegalGrade::NotInViolation, "", vec![]);
        let merged = aggregate(&[&a, &b, &c], &[], MergePolicy::default(), &Taxonomy::empty()).unwrap();
        assert_eq!(merged.legal.grade, LegalGrade::PotentialViolation);
        assert_eq!(merged.matrix.position, [1, 0]);
    }

    #[test]
    fn test_sub_tag_quorum_is_independent_of_parent() {
        let mut x1 = tag("X", Grade::B);
        x1.related_sub_tags.push(SubRiskTag {
            name: "x-sub".to_string(),
            grade: Grade::C,
            reason: String::new(),
            detected_text: None,
            detected_timecode: None,
            risk_level: None,
        });
        let x2 = tag("X", Grade::B);
        let a = run(Grade::A, LegalGrade::NotInViolation, "", vec![x1]);
        let b = run(Grade::A, LegalGrade::NotInViolation, "", vec![x2]);

        let merged = aggregate(&[&a, &b], &[], MergePolicy::default(), &Taxonomy::empty()).unwrap();
        assert_eq!(merged.tags.len(), 1);
        assert!(merged.tags[0].related_sub_tags.is_empty());

        let merged = aggregate(&[&a, &b], &[], MergePolicy::Unconditional, &Taxonomy::empty()).unwrap();
        assert_eq!(merged.tags[0].related_sub_tags.len(), 1);
    }

    #[test]
    fn test_all_fallback_runs_still_aggregate() {
        let runs = vec![
            Judged::fallback(run(Grade::C, LegalGrade::PotentialViolation, "failed", vec![]), "x"),
            Judged::fallback(run(Grade::C, LegalGrade::PotentialViolation, "failed", vec![]), "y"),
        ];
        let merged = aggregate_judged(&runs, &[], MergePolicy::default(), &Taxonomy::empty()).unwrap();
        assert_eq!(merged.social.grade, Grade::C);
        assert!(merged.note.unwrap().contains("All 2"));
    }

    #[test]
    fn test_fallback_runs_excluded_when_any_succeeded() {
        let runs = vec![
            Judged::fallback(run(Grade::C, LegalGrade::PotentialViolation, "failed", vec![]), "x"),
            Judged::Ok(run(Grade::A, LegalGrade::NotInViolation, "fine", vec![])),
        ];
        let merged = aggregate_judged(&runs, &[], MergePolicy::default(), &Taxonomy::empty()).unwrap();
        assert_eq!(merged.social.grade, Grade::A);
        assert_eq!(merged.social.reason, "fine");
        assert!(merged.note.is_none());
    }
}
