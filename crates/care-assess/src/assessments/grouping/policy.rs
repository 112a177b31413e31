use serde::{Deserialize, Serialize};

use super::super::domain::{FormId, GroupAssignmentRule, RuleOperator};

const EQ_TOLERANCE: f64 = 1e-9;

/// Why a rule did or did not qualify a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    Qualified,
    NotMet,
    Inactive,
    MissingScores { forms: Vec<FormId> },
    Misconfigured { reason: String },
}

impl RuleOutcome {
    pub fn is_qualified(&self) -> bool {
        matches!(self, RuleOutcome::Qualified)
    }

    pub fn summary(&self) -> String {
        match self {
            RuleOutcome::Qualified => "qualifies".to_string(),
            RuleOutcome::NotMet => "aggregate outside rule bounds".to_string(),
            RuleOutcome::Inactive => "rule inactive".to_string(),
            RuleOutcome::MissingScores { forms } => {
                let ids: Vec<&str> = forms.iter().map(|form| form.0.as_str()).collect();
                format!("missing scores for: {}", ids.join(", "))
            }
            RuleOutcome::Misconfigured { reason } => format!("rule misconfigured: {reason}"),
        }
    }
}

/// Apply the rule's comparison. Missing bounds fail closed.
///
/// `lte` takes its bound from `min_score`, not `max_score`.
pub(crate) fn apply_operator(rule: &GroupAssignmentRule, aggregate: f64) -> RuleOutcome {
    let verdict = match (&rule.operator, rule.min_score, rule.max_score) {
        (RuleOperator::Gte, Some(bound), _) => aggregate >= bound,
        (RuleOperator::Lte, Some(bound), _) => aggregate <= bound,
        (RuleOperator::Eq, Some(bound), _) => (aggregate - bound).abs() <= EQ_TOLERANCE,
        (RuleOperator::Between, Some(min), Some(max)) if min <= max => {
            aggregate >= min && aggregate <= max
        }
        (RuleOperator::Between, Some(min), Some(max)) => {
            return RuleOutcome::Misconfigured {
                reason: format!("between bounds inverted ({min} > {max})"),
            };
        }
        (RuleOperator::Unsupported(raw), _, _) => {
            return RuleOutcome::Misconfigured {
                reason: format!("unsupported operator '{raw}'"),
            };
        }
        (operator, _, _) => {
            return RuleOutcome::Misconfigured {
                reason: format!("operator '{}' is missing a bound", operator.label()),
            };
        }
    };

    if verdict {
        RuleOutcome::Qualified
    } else {
        RuleOutcome::NotMet
    }
}
