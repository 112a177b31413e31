//! Weighted group-assignment rules over a patient's per-form scores.

mod policy;
mod rules;

pub use policy::RuleOutcome;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{FormId, GroupAssignmentRule, GroupId, RuleId, RuleOperator};
use super::scoring::ScoringConfig;
use policy::apply_operator;

/// Stateless evaluator applying group rules to per-form scores.
pub struct RuleEvaluator {
    config: ScoringConfig,
}

impl RuleEvaluator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        rule: &GroupAssignmentRule,
        scores_by_form: &BTreeMap<FormId, f64>,
    ) -> RuleEvaluation {
        let outcome_with = |aggregate, outcome| RuleEvaluation {
            rule_id: rule.rule_id.clone(),
            group_id: rule.group_id.clone(),
            aggregate,
            outcome,
        };

        if !rule.is_active {
            return outcome_with(None, RuleOutcome::Inactive);
        }
        if rule.forms.is_empty() {
            return outcome_with(
                None,
                RuleOutcome::Misconfigured {
                    reason: "rule references no forms".to_string(),
                },
            );
        }
        if let RuleOperator::Unsupported(raw) = &rule.operator {
            warn!(rule_id = %rule.rule_id.0, operator = %raw, "unsupported rule operator");
        }

        let signals = rules::weighted_aggregate(rule, scores_by_form, &self.config);
        let Some(aggregate) = signals.aggregate else {
            return outcome_with(
                None,
                RuleOutcome::MissingScores {
                    forms: signals.missing_forms,
                },
            );
        };

        outcome_with(Some(aggregate), apply_operator(rule, aggregate))
    }
}

/// Result of one rule against one patient's scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub rule_id: RuleId,
    pub group_id: GroupId,
    pub aggregate: Option<f64>,
    pub outcome: RuleOutcome,
}

impl RuleEvaluation {
    pub fn qualified(&self) -> bool {
        self.outcome.is_qualified()
    }
}

/// Whether `scores_by_form` qualifies for the rule's group under the default config.
pub fn evaluate_rule(rule: &GroupAssignmentRule, scores_by_form: &BTreeMap<FormId, f64>) -> bool {
    RuleEvaluator::new(ScoringConfig::default())
        .evaluate(rule, scores_by_form)
        .qualified()
}
