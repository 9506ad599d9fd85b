//! Extraction selector against the scripted arbiter

mod helpers;

use helpers::{adapter, ScriptedJudge};
use riskcheck_ai::fusion::extraction_selector::{select_text, select_visual};
use riskcheck_ai::fusion::{SelectionMethod, SelectorConfig};
use riskcheck_ai::types::{ExtractionResult, ExtractionSource, VisualResult};
use std::sync::Arc;

fn extraction(text: &str) -> ExtractionResult {
    ExtractionResult {
        text: text.to_string(),
        source: ExtractionSource::Ai,
        note: None,
    }
}

#[tokio::test]
async fn test_near_identical_runs_keep_run_one_without_arbitration() {
    let judge = Arc::new(ScriptedJudge::new().with_arbitration_reply("2"));
    let adapter = adapter(judge.clone());

    // 100 vs 97 characters: 3% apart, different content
    let first = extraction(&"a".repeat(100));
    let second = extraction(&"b".repeat(97));
    let selection = select_text(&adapter, "transcription", &first, &second, &SelectorConfig::default()).await;

    assert_eq!(selection.run, 1);
    assert_eq!(selection.method, SelectionMethod::NearIdentical);
    assert_eq!(judge.call_count("generate_text"), 0);
}

#[tokio::test]
async fn test_divergent_runs_follow_arbiter() {
    let judge = Arc::new(ScriptedJudge::new().with_arbitration_reply("Run 2 keeps the captions.\n2"));
    let adapter = adapter(judge.clone());

    let first = extraction("短い");
    let second = extraction("こちらはずっと長い書き起こしです");
    let selection = select_text(&adapter, "transcription", &first, &second, &SelectorConfig::default()).await;

    assert_eq!(selection.run, 2);
    assert_eq!(selection.method, SelectionMethod::Arbitrated);
    assert_eq!(judge.call_count("generate_text"), 1);
}

#[tokio::test]
async fn test_unusable_reply_selects_longer_run() {
    let judge = Arc::new(ScriptedJudge::new().with_arbitration_reply("Both look similar to me."));
    let adapter = adapter(judge);

    let first = extraction("short");
    let second = extraction("a much longer transcript");
    let selection = select_text(&adapter, "ocr", &first, &second, &SelectorConfig::default()).await;

    assert_eq!(selection.run, 2);
    assert_eq!(selection.method, SelectionMethod::LongerFallback);
}

#[tokio::test]
async fn test_selection_is_repeatable() {
    let judge = Arc::new(ScriptedJudge::new().with_arbitration_reply("1"));
    let adapter = adapter(judge);
    let first = extraction("first candidate text");
    let second = extraction("second");
    let config = SelectorConfig::default();

    let a = select_text(&adapter, "ocr", &first, &second, &config).await;
    let b = select_text(&adapter, "ocr", &first, &second, &config).await;
    assert_eq!(a.run, b.run);
    assert_eq!(a.method, b.method);
}

#[tokio::test]
async fn test_empty_visual_runs_are_near_identical() {
    let judge = Arc::new(ScriptedJudge::new());
    let adapter = adapter(judge.clone());

    let selection = select_visual(
        &adapter,
        &VisualResult::default(),
        &VisualResult::default(),
        &SelectorConfig::default(),
    )
    .await;

    assert_eq!(selection.run, 1);
    assert_eq!(judge.call_count("generate_text"), 0);
}
