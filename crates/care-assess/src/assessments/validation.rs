use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::domain::{
    FormDraft, FormId, GroupAssignmentRule, QuestionId, QuestionOptions, RuleDraft, RuleId,
    RuleOperator,
};
use super::scoring::{find_overlaps, validate_threshold, ThresholdError, ThresholdOverlap};

/// Validation errors raised while authoring forms and rules.
#[derive(Debug, thiserror::Error)]
pub enum AuthoringViolation {
    #[error("form title is required")]
    MissingTitle,
    #[error("form must contain at least one question")]
    NoQuestions,
    #[error("question id {0} is used more than once")]
    DuplicateQuestion(QuestionId),
    #[error("multiple choice question {0} has no choices")]
    EmptyChoices(QuestionId),
    #[error("question {question_id} range is inverted (min {min} > max {max})")]
    InvertedRange {
        question_id: QuestionId,
        min: f64,
        max: f64,
    },
    #[error("threshold #{index} is invalid: {source}")]
    Threshold {
        index: usize,
        #[source]
        source: ThresholdError,
    },
    #[error("rule name is required")]
    MissingRuleName,
    #[error("rule must reference at least one form")]
    RuleWithoutForms,
    #[error("weight for form {form_id:?} must be a positive number (found {weight})")]
    InvalidWeight { form_id: FormId, weight: f64 },
    #[error("operator '{0}' requires a bound that was not provided")]
    MissingBound(String),
    #[error("rule bounds are inverted (min {min} > max {max})")]
    InvertedBounds { min: f64, max: f64 },
    #[error("unsupported rule operator '{0}'")]
    UnsupportedOperator(String),
}

/// Non-blocking findings returned alongside a saved form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthoringWarning {
    OverlappingThresholds { overlap: ThresholdOverlap },
}

impl AuthoringWarning {
    pub fn message(&self) -> String {
        match self {
            AuthoringWarning::OverlappingThresholds { overlap } => format!(
                "threshold '{}' [{}, {}] overlaps '{}' [{}, {}]",
                overlap.first.result,
                overlap.first.min_score,
                overlap.first.max_score,
                overlap.second.result,
                overlap.second.min_score,
                overlap.second.max_score
            ),
        }
    }
}

/// Guard turning form and rule drafts into values the engine can trust.
#[derive(Debug, Clone, Default)]
pub struct AuthoringGuard;

impl AuthoringGuard {
    pub fn new() -> Self {
        Self
    }

    /// Check a form draft; overlapping bands are reported, not rejected.
    pub fn check_form(&self, draft: &FormDraft) -> Result<Vec<AuthoringWarning>, AuthoringViolation> {
        if draft.title.trim().is_empty() {
            return Err(AuthoringViolation::MissingTitle);
        }
        if draft.questions.is_empty() {
            return Err(AuthoringViolation::NoQuestions);
        }

        let mut seen = BTreeSet::new();
        for question in &draft.questions {
            if !seen.insert(question.question_id) {
                return Err(AuthoringViolation::DuplicateQuestion(question.question_id));
            }

            match &question.options {
                QuestionOptions::MultipleChoice(options) if options.choices.is_empty() => {
                    return Err(AuthoringViolation::EmptyChoices(question.question_id));
                }
                QuestionOptions::Rating(options) if options.min > options.max => {
                    return Err(AuthoringViolation::InvertedRange {
                        question_id: question.question_id,
                        min: options.min as f64,
                        max: options.max as f64,
                    });
                }
                QuestionOptions::Number(options) => {
                    if let (Some(min), Some(max)) = (options.min, options.max) {
                        if min > max {
                            return Err(AuthoringViolation::InvertedRange {
                                question_id: question.question_id,
                                min,
                                max,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        for (index, threshold) in draft.thresholds.iter().enumerate() {
            validate_threshold(threshold)
                .map_err(|source| AuthoringViolation::Threshold { index, source })?;
        }

        Ok(find_overlaps(&draft.thresholds)
            .into_iter()
            .map(|overlap| AuthoringWarning::OverlappingThresholds { overlap })
            .collect())
    }

    /// Convert a rule draft into a persisted rule definition.
    pub fn rule_from_draft(
        &self,
        draft: RuleDraft,
        rule_id: RuleId,
        created_by: Option<String>,
    ) -> Result<GroupAssignmentRule, AuthoringViolation> {
        if draft.name.trim().is_empty() {
            return Err(AuthoringViolation::MissingRuleName);
        }
        if draft.forms.is_empty() {
            return Err(AuthoringViolation::RuleWithoutForms);
        }
        if let Some(bad) = draft
            .forms
            .iter()
            .find(|reference| !reference.weight.is_finite() || reference.weight <= 0.0)
        {
            return Err(AuthoringViolation::InvalidWeight {
                form_id: bad.form_id.clone(),
                weight: bad.weight,
            });
        }

        match (&draft.operator, draft.min_score, draft.max_score) {
            (RuleOperator::Unsupported(raw), _, _) => {
                return Err(AuthoringViolation::UnsupportedOperator(raw.clone()));
            }
            (RuleOperator::Between, Some(min), Some(max)) if min > max => {
                return Err(AuthoringViolation::InvertedBounds { min, max });
            }
            (RuleOperator::Between, Some(_), Some(_)) => {}
            (RuleOperator::Between, _, _) => {
                return Err(AuthoringViolation::MissingBound("between".to_string()));
            }
            (operator, None, _) => {
                return Err(AuthoringViolation::MissingBound(
                    operator.label().to_string(),
                ));
            }
            _ => {}
        }

        Ok(GroupAssignmentRule {
            rule_id,
            name: draft.name.trim().to_string(),
            group_id: draft.group_id,
            forms: draft.forms,
            operator: draft.operator,
            min_score: draft.min_score,
            max_score: draft.max_score,
            is_active: draft.is_active,
            created_by,
        })
    }
}
