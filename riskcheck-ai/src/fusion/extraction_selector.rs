//! Extraction selector: best of two runs per extraction step
//!
//! Near-identical runs (relative length delta below the configured ratio)
//! resolve to run 1 without any service call. Otherwise both candidates go
//! to an arbitration prompt whose last reply line must be `1` or `2`; an
//! unusable reply selects the longer text, run 1 on equal length.

use crate::judge::{prompts, JudgementAdapter};
use crate::types::{ExtractionResult, VisualResult};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Selector tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectorConfig {
    /// Relative length delta below which run 1 is kept
    pub near_identical_ratio: f64,
    /// Characters of each candidate shown to the arbiter
    pub preview_chars: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            near_identical_ratio: 0.05,
            preview_chars: 3000,
        }
    }
}

/// How a run was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    NearIdentical,
    Arbitrated,
    LongerFallback,
    /// Step not run for this media type; run 1 carries the skip note
    Skipped,
}

/// Selected run (1 or 2) and how it was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub run: usize,
    pub method: SelectionMethod,
}

impl Selection {
    pub fn pick<T>(&self, first: T, second: T) -> T {
        if self.run == 2 {
            second
        } else {
            first
        }
    }

    pub fn arbitrated(&self) -> bool {
        self.method == SelectionMethod::Arbitrated
    }
}

/// `|len1 - len2| / max(len1, len2, 1)`
pub fn relative_delta(len1: usize, len2: usize) -> f64 {
    let diff = len1.abs_diff(len2) as f64;
    diff / len1.max(len2).max(1) as f64
}

/// Parse the arbiter's choice from the last line of its reply
pub fn parse_choice(reply: &str) -> Option<usize> {
    let last = reply.trim().lines().last()?.trim();
    match last.parse::<usize>() {
        Ok(choice @ (1 | 2)) => Some(choice),
        _ => None,
    }
}

fn trimmed_len(text: &str) -> usize {
    text.trim().chars().count()
}

async fn select_by_length(
    adapter: &JudgementAdapter,
    kind: &str,
    lengths: (usize, usize),
    candidates: (&str, &str),
    config: &SelectorConfig,
) -> Selection {
    let (len1, len2) = lengths;

    if relative_delta(len1, len2) < config.near_identical_ratio {
        debug!(kind, len1, len2, "Runs near-identical, keeping run 1");
        return Selection {
            run: 1,
            method: SelectionMethod::NearIdentical,
        };
    }

    let prompt = prompts::arbitration_prompt(kind, candidates.0, candidates.1, config.preview_chars);
    let reply = adapter.generate_text(&prompt).await;

    match parse_choice(reply.value()) {
        Some(run) => {
            info!(kind, run, "Arbiter selected run");
            Selection {
                run,
                method: SelectionMethod::Arbitrated,
            }
        }
        None => {
            let run = if len1 >= len2 { 1 } else { 2 };
            warn!(kind, run, "Arbitration reply unusable, selecting longer run");
            Selection {
                run,
                method: SelectionMethod::LongerFallback,
            }
        }
    }
}

/// Choose between two transcript or OCR runs
pub async fn select_text(
    adapter: &JudgementAdapter,
    kind: &str,
    first: &ExtractionResult,
    second: &ExtractionResult,
    config: &SelectorConfig,
) -> Selection {
    select_by_length(
        adapter,
        kind,
        (trimmed_len(&first.text), trimmed_len(&second.text)),
        (&first.text, &second.text),
        config,
    )
    .await
}

/// Choose between two visual analysis runs
///
/// Lengths compare the joined segment descriptions; the arbiter sees the
/// pretty-printed JSON of each run.
pub async fn select_visual(
    adapter: &JudgementAdapter,
    first: &VisualResult,
    second: &VisualResult,
    config: &SelectorConfig,
) -> Selection {
    let json1 = serde_json::to_string_pretty(first).unwrap_or_default();
    let json2 = serde_json::to_string_pretty(second).unwrap_or_default();
    select_by_length(
        adapter,
        "visual analysis",
        (
            trimmed_len(&first.description_text()),
            trimmed_len(&second.description_text()),
        ),
        (&json1, &json2),
        config,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_delta() {
        assert_eq!(relative_delta(0, 0), 0.0);
        assert!((relative_delta(100, 96) - 0.04).abs() < 1e-9);
        assert_eq!(relative_delta(0, 10), 1.0);
    }

    #[test]
    fn test_parse_choice_reads_last_line() {
        assert_eq!(parse_choice("Run 2 misses captions.\n1"), Some(1));
        assert_eq!(parse_choice("reasoning\n 2 \n"), Some(2));
        assert_eq!(parse_choice("3"), None);
        assert_eq!(parse_choice("1\nbecause it is longer"), None);
        assert_eq!(parse_choice(""), None);
    }

    #[test]
    fn test_pick() {
        let selection = Selection {
            run: 2,
            method: SelectionMethod::Arbitrated,
        };
        assert_eq!(selection.pick("a", "b"), "b");
        assert!(selection.arbitrated());
    }
}
