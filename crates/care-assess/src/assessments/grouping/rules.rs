use std::collections::BTreeMap;

use super::super::domain::{FormId, GroupAssignmentRule};
use super::super::scoring::{MissingScorePolicy, ScoringConfig};

/// Weighted sum over the forms a rule references, plus which forms had no score.
pub(crate) struct AggregateSignals {
    pub aggregate: Option<f64>,
    pub missing_forms: Vec<FormId>,
}

pub(crate) fn weighted_aggregate(
    rule: &GroupAssignmentRule,
    scores_by_form: &BTreeMap<FormId, f64>,
    config: &ScoringConfig,
) -> AggregateSignals {
    let mut total = 0.0;
    let mut contributing = 0usize;
    let mut missing_forms = Vec::new();

    for reference in &rule.forms {
        match scores_by_form.get(&reference.form_id) {
            Some(score) => {
                total += score * reference.weight;
                contributing += 1;
            }
            None => missing_forms.push(reference.form_id.clone()),
        }
    }

    let aggregate = match config.missing_score_policy {
        MissingScorePolicy::FailRule if !missing_forms.is_empty() => None,
        _ if contributing == 0 => None,
        _ => Some(config.round(total)),
    };

    AggregateSignals {
        aggregate,
        missing_forms,
    }
}
