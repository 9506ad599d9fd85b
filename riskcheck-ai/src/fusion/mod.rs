//! Fusion of independent AI outputs
//!
//! - [`extraction_selector`]: picks one of two extraction runs per step
//! - [`risk_aggregator`]: merges N risk judgements plus screener candidates
//! - [`burn_risk`]: scalar incident-risk profile from the merged tag set

pub mod burn_risk;
pub mod extraction_selector;
pub mod risk_aggregator;

pub use burn_risk::score_burn_risk;
pub use extraction_selector::{Selection, SelectionMethod, SelectorConfig};
pub use risk_aggregator::{aggregate, aggregate_judged, MergePolicy};

use thiserror::Error;

/// Fusion precondition failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FusionError {
    #[error("No risk judgement runs to aggregate")]
    NoRuns,
}

/// Most frequent value; ties go to the value seen first
///
/// Empty strings are ignored. Returns `None` when no non-empty value exists.
pub fn mode_earliest<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tally: Vec<(&'a str, usize)> = Vec::new();
    for value in values {
        if value.trim().is_empty() {
            continue;
        }
        match tally.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_prefers_frequency_then_first_seen() {
        assert_eq!(mode_earliest(["a", "b", "b"]), Some("b".to_string()));
        assert_eq!(mode_earliest(["a", "b", "b", "a"]), Some("a".to_string()));
        assert_eq!(mode_earliest(["", " ", "c"]), Some("c".to_string()));
        assert_eq!(mode_earliest(Vec::<&str>::new()), None);
    }
}
