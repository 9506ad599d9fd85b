//! Shared fixtures for riskcheck-ai integration tests
//!
//! [`ScriptedJudge`] is an in-process [`JudgementService`] whose replies are
//! queued up front, so pipeline runs are deterministic and offline.

#![allow(dead_code)]

use async_trait::async_trait;
use riskcheck_ai::judge::{JudgeError, JudgementAdapter, JudgementService};
use riskcheck_ai::taxonomy::{ReferenceData, SubTagDefinition, TagDefinition, Taxonomy};
use riskcheck_ai::types::{
    Grade, LegalAssessment, LegalGrade, MediaType, RiskAssessmentResult, RiskMatrix, RiskTag,
    SocialAssessment,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DEFAULT_TRANSCRIPT: &str = "今日から新しい毎日が始まります。";
pub const DEFAULT_OCR: &str = "期間限定セール\n※ 効果には個人差があります";

/// Queued replies; an exhausted queue falls back to the defaults
pub struct ScriptedJudge {
    transcripts: Mutex<VecDeque<String>>,
    judgements: Mutex<VecDeque<Result<Value, String>>>,
    ocr_text: String,
    visual: Value,
    arbitration_reply: String,
    transcription_fails: bool,
    ocr_panics: AtomicUsize,
    delay: Duration,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for ScriptedJudge {
    fn default() -> Self {
        Self {
            transcripts: Mutex::new(VecDeque::new()),
            judgements: Mutex::new(VecDeque::new()),
            ocr_text: DEFAULT_OCR.to_string(),
            visual: json!({
                "summary": "A person walks through a kitchen.",
                "segments": [{
                    "label": "Lifestyle",
                    "description": "Kitchen scene with product on the counter",
                    "shots": [{"timecode": "00:02", "description": "Product close-up"}]
                }],
                "risk_flags": []
            }),
            arbitration_reply: "Both are fine.\n1".to_string(),
            transcription_fails: false,
            ocr_panics: AtomicUsize::new(0),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transcripts(self, transcripts: &[&str]) -> Self {
        *self.transcripts.lock().unwrap() = transcripts.iter().map(|t| t.to_string()).collect();
        self
    }

    /// `Err` entries reply with a 500 status
    pub fn with_judgements(self, judgements: Vec<Result<Value, String>>) -> Self {
        *self.judgements.lock().unwrap() = judgements.into();
        self
    }

    pub fn with_arbitration_reply(mut self, reply: &str) -> Self {
        self.arbitration_reply = reply.to_string();
        self
    }

    /// Every transcription times out
    pub fn with_failing_transcription(mut self) -> Self {
        self.transcription_fails = true;
        self
    }

    /// The next `count` OCR calls panic
    pub fn with_ocr_panics(self, count: usize) -> Self {
        self.ocr_panics.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    async fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl JudgementService for ScriptedJudge {
    async fn transcribe(&self, _media: &Path, _media_type: MediaType) -> Result<String, JudgeError> {
        self.record("transcribe").await;
        if self.transcription_fails {
            return Err(JudgeError::Timeout(120));
        }
        let next = self.transcripts.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| DEFAULT_TRANSCRIPT.to_string()))
    }

    async fn ocr(&self, _media: &Path, _media_type: MediaType) -> Result<String, JudgeError> {
        self.record("ocr").await;
        let crash = self
            .ocr_panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if crash {
            panic!("OCR backend crashed");
        }
        Ok(self.ocr_text.clone())
    }

    async fn analyze_visual(&self, _media: &Path, _media_type: MediaType) -> Result<Value, JudgeError> {
        self.record("analyze_visual").await;
        Ok(self.visual.clone())
    }

    async fn generate_text(&self, _prompt: &str) -> Result<String, JudgeError> {
        self.record("generate_text").await;
        Ok(self.arbitration_reply.clone())
    }

    async fn generate_structured(&self, _instruction: &str, _content: &str) -> Result<Value, JudgeError> {
        self.record("generate_structured").await;
        let next = self.judgements.lock().unwrap().pop_front();
        match next {
            Some(Ok(value)) => Ok(value),
            Some(Err(body)) => Err(JudgeError::Status { status: 500, body }),
            None => Ok(judgement("A", "抵触していない", &[])),
        }
    }
}

/// Raw judgement reply with `(tag name, grade)` entries
pub fn judgement(social: &str, legal: &str, tags: &[(&str, &str)]) -> Value {
    let tags: Vec<Value> = tags
        .iter()
        .map(|(name, grade)| {
            json!({
                "name": name,
                "grade": grade,
                "reason": format!("{} detected", name),
                "detected_text": "",
                "related_sub_tags": []
            })
        })
        .collect();
    json!({
        "social": {
            "grade": social,
            "reason": format!("social {}", social),
            "findings": [{"timecode": "00:01", "detail": "Opening line"}]
        },
        "legal": {
            "grade": legal,
            "reason": "legal review",
            "recommendations": "",
            "violations": [],
            "findings": []
        },
        "matrix": {"x_axis": "法務評価", "y_axis": "社会的感度", "position": [0, 0]},
        "tags": tags
    })
}

/// Two tags; the first carries one sub-tag
pub fn sample_taxonomy() -> Taxonomy {
    Taxonomy::new(vec![
        TagDefinition {
            name: "ジェンダー表現".to_string(),
            definition: "性別 / 女らしさ / 男らしさ".to_string(),
            risk_weight: Some(2),
            sub_tags: vec![SubTagDefinition {
                name: "性別役割".to_string(),
                definition: "家事は女性 / 主婦".to_string(),
                risk_weight: Some(1),
            }],
        },
        TagDefinition {
            name: "誇大広告".to_string(),
            definition: "No.1 / 最高 / 絶対".to_string(),
            risk_weight: Some(3),
            sub_tags: Vec::new(),
        },
    ])
}

pub fn reference() -> Arc<ReferenceData> {
    Arc::new(ReferenceData::from_parts(sample_taxonomy(), Vec::new()))
}

pub fn adapter(judge: Arc<ScriptedJudge>) -> JudgementAdapter {
    JudgementAdapter::new(judge, reference())
}

/// Minimal media file on disk
pub fn media_file(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();
    path
}

pub fn assessment(social: Grade, legal: LegalGrade, tags: Vec<RiskTag>) -> RiskAssessmentResult {
    RiskAssessmentResult {
        social: SocialAssessment {
            grade: social,
            reason: format!("social {}", social),
            findings: Vec::new(),
        },
        legal: LegalAssessment {
            grade: legal,
            reason: "legal review".to_string(),
            recommendations: None,
            violations: Vec::new(),
            findings: Vec::new(),
        },
        matrix: RiskMatrix::default(),
        tags,
        burn_risk: None,
        note: None,
    }
}

pub fn risk_tag(name: &str, grade: Grade) -> RiskTag {
    RiskTag {
        name: name.to_string(),
        grade,
        reason: format!("{} detected", name),
        detected_text: None,
        detected_timecode: None,
        risk_level: None,
        related_sub_tags: Vec::new(),
    }
}
