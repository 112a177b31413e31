use serde::{Deserialize, Serialize};

pub const DEFAULT_DECIMAL_PLACES: u32 = 2;
pub const MAX_DECIMAL_PLACES: u32 = 6;

/// Knobs shared by the score calculator and the rule evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub decimal_places: u32,
    pub missing_score_policy: MissingScorePolicy,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            decimal_places: DEFAULT_DECIMAL_PLACES,
            missing_score_policy: MissingScorePolicy::Skip,
        }
    }
}

impl ScoringConfig {
    /// Round a raw score to the configured precision.
    pub fn round(&self, value: f64) -> f64 {
        let factor = 10f64.powi(self.decimal_places.min(MAX_DECIMAL_PLACES) as i32);
        (value * factor).round() / factor
    }
}

/// What a rule does when the patient has no score for one of its forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingScorePolicy {
    /// Leave the form out of the weighted sum.
    Skip,
    /// Treat the whole rule as non-qualifying.
    FailRule,
}

impl MissingScorePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "fail" | "fail_rule" => Some(Self::FailRule),
            _ => None,
        }
    }
}
