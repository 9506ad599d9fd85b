//! Judgement adapter: the never-failing side of the service boundary
//!
//! Each method makes exactly one service call and converts any failure
//! (transport, status, timeout, parse) into a typed fallback value with a
//! note explaining the substitution.

use super::normalize::normalize_judgement;
use super::prompts;
use super::{JudgeError, JudgementService};
use crate::taxonomy::ReferenceData;
use crate::types::{
    Grade, Judged, LegalAssessment, LegalGrade, MediaType, RiskAssessmentResult, RiskMatrix,
    SocialAssessment, VisualResult,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

pub const TRANSCRIPTION_PLACEHOLDER: &str =
    "Transcription could not be produced. No usable audio was recognised; upload again or try another model.";
pub const OCR_PLACEHOLDER: &str =
    "OCR extraction could not be produced. On-screen text may not have been readable.";
pub const VISUAL_PLACEHOLDER: &str =
    "Visual analysis could not be produced. Check the judgement service configuration and run again.";
pub const RISK_FALLBACK_REASON: &str =
    "Risk judgement failed; a provisional assessment is returned.";

/// Flag marking a placeholder visual result
pub const ANALYSIS_UNAVAILABLE_FLAG: &str = "analysis-unavailable";

/// Wraps a [`JudgementService`] and the shared reference data
#[derive(Clone)]
pub struct JudgementAdapter {
    service: Arc<dyn JudgementService>,
    reference: Arc<ReferenceData>,
}

impl JudgementAdapter {
    pub fn new(service: Arc<dyn JudgementService>, reference: Arc<ReferenceData>) -> Self {
        Self { service, reference }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub async fn transcribe(&self, media: &Path, media_type: MediaType) -> Judged<String> {
        match self.service.transcribe(media, media_type).await {
            Ok(text) => Judged::Ok(text),
            Err(e) => {
                warn!("Transcription failed: {}", e);
                Judged::fallback(
                    TRANSCRIPTION_PLACEHOLDER.to_string(),
                    format!("Transcription failed, placeholder text returned: {}", e),
                )
            }
        }
    }

    pub async fn ocr(&self, media: &Path, media_type: MediaType) -> Judged<String> {
        match self.service.ocr(media, media_type).await {
            Ok(text) => Judged::Ok(text),
            Err(e) => {
                warn!("OCR failed: {}", e);
                Judged::fallback(
                    OCR_PLACEHOLDER.to_string(),
                    format!("OCR failed, placeholder text returned: {}", e),
                )
            }
        }
    }

    pub async fn analyze_visual(&self, media: &Path, media_type: MediaType) -> Judged<VisualResult> {
        let result = match self.service.analyze_visual(media, media_type).await {
            Ok(raw) => serde_json::from_value::<VisualResult>(raw).map_err(JudgeError::from),
            Err(e) => Err(e),
        };
        match result {
            Ok(visual) => Judged::Ok(visual),
            Err(e) => {
                warn!("Visual analysis failed: {}", e);
                Judged::fallback(
                    visual_placeholder(),
                    format!("Visual analysis failed, placeholder result returned: {}", e),
                )
            }
        }
    }

    /// One structured risk judgement over the selected extraction outputs
    pub async fn judge_risk(
        &self,
        transcript: &str,
        ocr_text: &str,
        visual: &VisualResult,
    ) -> Judged<RiskAssessmentResult> {
        let content = prompts::risk_content(&self.reference, transcript, ocr_text, visual);

        let result = match self
            .service
            .generate_structured(prompts::RISK_INSTRUCTION, &content)
            .await
        {
            Ok(raw) => normalize_judgement(&raw, &self.reference.taxonomy),
            Err(e) => Err(e),
        };

        match result {
            Ok(assessment) => {
                debug!(
                    social = %assessment.social.grade,
                    legal = %assessment.legal.grade,
                    tags = assessment.tags.len(),
                    "Risk judgement normalised"
                );
                Judged::Ok(assessment)
            }
            Err(e) => {
                warn!("Risk judgement failed: {}", e);
                let message = e.to_string();
                Judged::fallback(risk_fallback(&message), message)
            }
        }
    }

    /// Free-text reply used for extraction arbitration (empty on failure)
    pub async fn generate_text(&self, prompt: &str) -> Judged<String> {
        match self.service.generate_text(prompt).await {
            Ok(text) => Judged::Ok(text),
            Err(e) => {
                warn!("Text generation failed: {}", e);
                Judged::fallback(String::new(), e.to_string())
            }
        }
    }
}

pub fn visual_placeholder() -> VisualResult {
    VisualResult {
        summary: VISUAL_PLACEHOLDER.to_string(),
        segments: Vec::new(),
        risk_flags: vec![ANALYSIS_UNAVAILABLE_FLAG.to_string()],
    }
}

/// Provisional assessment returned when a judgement run fails
pub fn risk_fallback(note: &str) -> RiskAssessmentResult {
    RiskAssessmentResult {
        social: SocialAssessment {
            grade: Grade::C,
            reason: RISK_FALLBACK_REASON.to_string(),
            findings: Vec::new(),
        },
        legal: LegalAssessment {
            grade: LegalGrade::PotentialViolation,
            reason: RISK_FALLBACK_REASON.to_string(),
            recommendations: Some(
                "Check the judgement service configuration and run the analysis again.".to_string(),
            ),
            violations: Vec::new(),
            findings: Vec::new(),
        },
        matrix: RiskMatrix {
            position: [1, 2],
            ..RiskMatrix::default()
        },
        tags: Vec::new(),
        burn_risk: None,
        note: Some(note.to_string()),
    }
}
