mod calculator;
mod config;
mod thresholds;

pub use calculator::{compute_total_score, score_answers};
pub use config::{MissingScorePolicy, ScoringConfig, DEFAULT_DECIMAL_PLACES, MAX_DECIMAL_PLACES};
pub use thresholds::{
    find_overlaps, match_threshold, validate_threshold, ThresholdError, ThresholdMatch,
    ThresholdOverlap,
};

use super::domain::{Answers, Form, QuestionId};
use serde::{Deserialize, Serialize};

/// Stateless evaluator that scores answers against a form and its bands.
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, form: &Form, answers: &Answers) -> EvaluationOutcome {
        let components = score_answers(answers, &form.questions);
        let raw_total: f64 = components.iter().map(|component| component.score).sum();
        let total_score = self.config.round(raw_total);
        let matched = match_threshold(total_score, &form.thresholds);

        EvaluationOutcome {
            total_score,
            evaluation_result: matched.as_ref().map(|band| band.result.clone()),
            evaluation_description: matched.map(|band| band.description),
            components,
        }
    }
}

/// Discrete contribution of one answered question, kept for audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub question_id: QuestionId,
    pub question_type: String,
    pub score: f64,
    pub notes: String,
}

/// Total score plus the qualitative result of the first matching band, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub total_score: f64,
    pub evaluation_result: Option<String>,
    pub evaluation_description: Option<String>,
    pub components: Vec<ScoreComponent>,
}

impl EvaluationOutcome {
    pub fn summary(&self) -> String {
        match &self.evaluation_result {
            Some(result) => format!("{result} (score {})", self.total_score),
            None => format!("no evaluation available (score {})", self.total_score),
        }
    }
}
