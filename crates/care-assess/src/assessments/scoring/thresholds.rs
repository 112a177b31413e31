use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::super::domain::EvaluationThreshold;

/// Result label and description taken from the matching band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMatch {
    pub result: String,
    pub description: String,
}

/// Pair of bands whose ranges intersect once sorted by `min_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOverlap {
    pub first: EvaluationThreshold,
    pub second: EvaluationThreshold,
}

/// First band, in the order given, whose inclusive range contains `score`.
///
/// Overlapping bands are not rejected here; the earliest one wins.
pub fn match_threshold(score: f64, thresholds: &[EvaluationThreshold]) -> Option<ThresholdMatch> {
    thresholds
        .iter()
        .find(|band| band.contains(score))
        .map(|band| ThresholdMatch {
            result: band.result.clone(),
            description: band.description.clone(),
        })
}

/// Authoring-time check: sort by `min_score` and flag adjacent pairs where
/// `current.max_score >= next.min_score`. Advisory only.
pub fn find_overlaps(thresholds: &[EvaluationThreshold]) -> Vec<ThresholdOverlap> {
    let mut sorted: Vec<&EvaluationThreshold> = thresholds.iter().collect();
    sorted.sort_by(|a, b| {
        a.min_score
            .partial_cmp(&b.min_score)
            .unwrap_or(Ordering::Equal)
    });

    sorted
        .windows(2)
        .filter(|pair| pair[0].max_score >= pair[1].min_score)
        .map(|pair| ThresholdOverlap {
            first: pair[0].clone(),
            second: pair[1].clone(),
        })
        .collect()
}

/// Reasons a single band cannot be saved.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold bounds must be finite numbers")]
    NonFinite,
    #[error("threshold minimum {min} exceeds maximum {max}")]
    Inverted { min: f64, max: f64 },
    #[error("threshold result label is empty")]
    MissingResult,
}

pub fn validate_threshold(threshold: &EvaluationThreshold) -> Result<(), ThresholdError> {
    if !threshold.min_score.is_finite() || !threshold.max_score.is_finite() {
        return Err(ThresholdError::NonFinite);
    }
    if threshold.min_score > threshold.max_score {
        return Err(ThresholdError::Inverted {
            min: threshold.min_score,
            max: threshold.max_score,
        });
    }
    if threshold.result.trim().is_empty() {
        return Err(ThresholdError::MissingResult);
    }
    Ok(())
}
