use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Actor, Answers, Form, FormDraft, FormId, GroupAssignmentRule, GroupId, GroupMembership,
    MembershipSource, PatientId, RuleDraft, RuleId, SubmissionId, SubmissionRequest,
};
use super::grouping::{RuleEvaluation, RuleEvaluator};
use super::repository::{
    AssessmentRepository, FormRecord, GroupRepository, RepositoryError, SubmissionRecord,
};
use super::scoring::{EvaluationOutcome, ScoringConfig, ScoringEngine};
use super::validation::{AuthoringGuard, AuthoringViolation};

/// Service composing authoring validation, scoring, rule evaluation, and storage.
pub struct AssessmentService<R, G> {
    guard: AuthoringGuard,
    assessments: Arc<R>,
    groups: Arc<G>,
    engine: Arc<ScoringEngine>,
    evaluator: Arc<RuleEvaluator>,
}

static FORM_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static SUBMISSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_form_id() -> FormId {
    let id = FORM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    FormId(format!("form-{id:06}"))
}

fn next_submission_id() -> SubmissionId {
    let id = SUBMISSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SubmissionId(format!("sub-{id:06}"))
}

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

impl<R, G> AssessmentService<R, G>
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    pub fn new(assessments: Arc<R>, groups: Arc<G>, config: ScoringConfig) -> Self {
        Self {
            guard: AuthoringGuard::new(),
            assessments,
            groups,
            engine: Arc::new(ScoringEngine::new(config)),
            evaluator: Arc::new(RuleEvaluator::new(config)),
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        self.engine.config()
    }

    /// Validate and store a form authored by `actor`.
    pub fn create_form(
        &self,
        actor: &Actor,
        draft: FormDraft,
    ) -> Result<FormRecord, AssessmentServiceError> {
        let warnings = self.guard.check_form(&draft)?;
        for warning in &warnings {
            warn!(staff_id = %actor.staff_id, "{}", warning.message());
        }

        let form = Form {
            form_id: draft.form_id.unwrap_or_else(next_form_id),
            title: draft.title.trim().to_string(),
            description: draft.description,
            questions: draft.questions,
            thresholds: draft.thresholds,
            recurrence: draft.recurrence,
        };

        let record = FormRecord {
            form,
            created_by: actor.staff_id.clone(),
            created_at: Utc::now(),
            warnings,
        };

        let stored = self.assessments.insert_form(record)?;
        info!(
            form_id = %stored.form.form_id.0,
            questions = stored.form.questions.len(),
            thresholds = stored.form.thresholds.len(),
            staff_id = %actor.staff_id,
            "form created"
        );
        Ok(stored)
    }

    pub fn get_form(&self, form_id: &FormId) -> Result<FormRecord, AssessmentServiceError> {
        let record = self
            .assessments
            .fetch_form(form_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Score answers against a stored form without persisting anything.
    pub fn preview(
        &self,
        form_id: &FormId,
        answers: &Answers,
    ) -> Result<EvaluationOutcome, AssessmentServiceError> {
        let record = self.get_form(form_id)?;
        Ok(self.engine.score(&record.form, answers))
    }

    /// Score a completed answer set, match it to a band, and store the submission.
    pub fn submit(
        &self,
        form_id: &FormId,
        request: SubmissionRequest,
    ) -> Result<SubmissionRecord, AssessmentServiceError> {
        let record = self.get_form(form_id)?;
        let outcome = self.engine.score(&record.form, &request.answers);

        let submission = SubmissionRecord::from_outcome(
            next_submission_id(),
            request.patient_id,
            form_id.clone(),
            request.answers,
            outcome,
            Utc::now(),
        );

        let stored = self.assessments.insert_submission(submission)?;
        info!(
            submission_id = %stored.submission_id.0,
            patient_id = %stored.patient_id.0,
            form_id = %stored.form_id.0,
            score = stored.total_evaluation_score,
            result = stored.evaluation_result.as_deref().unwrap_or("none"),
            "submission recorded"
        );
        Ok(stored)
    }

    pub fn get_submission(
        &self,
        submission_id: &SubmissionId,
    ) -> Result<SubmissionRecord, AssessmentServiceError> {
        let record = self
            .assessments
            .fetch_submission(submission_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    /// Forms among `form_ids` the patient should fill in again at `now`.
    pub fn forms_due(
        &self,
        patient_id: &PatientId,
        form_ids: &[FormId],
        now: DateTime<Utc>,
    ) -> Result<Vec<FormId>, AssessmentServiceError> {
        let submissions = self.assessments.submissions_for_patient(patient_id)?;
        let mut due = Vec::new();

        for form_id in form_ids {
            let record = self.get_form(form_id)?;
            let last = submissions
                .iter()
                .filter(|submission| &submission.form_id == form_id)
                .map(|submission| submission.submitted_at)
                .max();
            if record.form.is_due(last, now) {
                due.push(form_id.clone());
            }
        }

        Ok(due)
    }

    /// Validate and store a group assignment rule authored by `actor`.
    pub fn create_rule(
        &self,
        actor: &Actor,
        draft: RuleDraft,
    ) -> Result<GroupAssignmentRule, AssessmentServiceError> {
        let rule =
            self.guard
                .rule_from_draft(draft, next_rule_id(), Some(actor.staff_id.clone()))?;
        let stored = self.groups.insert_rule(rule)?;
        info!(
            rule_id = %stored.rule_id.0,
            group_id = %stored.group_id.0,
            operator = stored.operator.label(),
            staff_id = %actor.staff_id,
            "group rule created"
        );
        Ok(stored)
    }

    /// Most recent score per form for the patient.
    pub fn latest_scores(
        &self,
        patient_id: &PatientId,
    ) -> Result<BTreeMap<FormId, f64>, AssessmentServiceError> {
        let submissions = self.assessments.submissions_for_patient(patient_id)?;
        let mut latest: BTreeMap<FormId, &SubmissionRecord> = BTreeMap::new();

        for submission in &submissions {
            let newer = latest
                .get(&submission.form_id)
                .map(|current| submission.submitted_at >= current.submitted_at)
                .unwrap_or(true);
            if newer {
                latest.insert(submission.form_id.clone(), submission);
            }
        }

        Ok(latest
            .into_iter()
            .map(|(form_id, submission)| (form_id, submission.total_evaluation_score))
            .collect())
    }

    /// Re-evaluate every active rule for one patient, appending new memberships.
    pub fn recalculate_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<PatientRecalculation, AssessmentServiceError> {
        let rules = self.groups.active_rules()?;
        self.recalculate_with_rules(patient_id, &rules)
    }

    /// Re-evaluate all patients. A failing patient is recorded and the pass continues.
    pub fn recalculate_all(&self) -> Result<RecalculationSummary, AssessmentServiceError> {
        let rules = self.groups.active_rules()?;
        let patients = self.assessments.patients()?;
        let mut summary = RecalculationSummary::default();

        for patient_id in patients {
            match self.recalculate_with_rules(&patient_id, &rules) {
                Ok(result) => {
                    summary.patients_processed += 1;
                    summary.memberships_added += result.added_groups.len();
                }
                Err(err) => {
                    warn!(patient_id = %patient_id.0, error = %err, "group recalculation failed");
                    summary.failures.push(RecalculationFailure {
                        patient_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            processed = summary.patients_processed,
            added = summary.memberships_added,
            failed = summary.failures.len(),
            "group recalculation finished"
        );
        Ok(summary)
    }

    fn recalculate_with_rules(
        &self,
        patient_id: &PatientId,
        rules: &[GroupAssignmentRule],
    ) -> Result<PatientRecalculation, AssessmentServiceError> {
        let scores = self.latest_scores(patient_id)?;
        let mut evaluations = Vec::with_capacity(rules.len());
        let mut added_groups = Vec::new();

        for rule in rules {
            let evaluation = self.evaluator.evaluate(rule, &scores);
            if evaluation.qualified() {
                let added = self.groups.add_membership(GroupMembership {
                    patient_id: patient_id.clone(),
                    group_id: rule.group_id.clone(),
                    source: MembershipSource::Rule {
                        rule_id: rule.rule_id.clone(),
                    },
                    assigned_at: Utc::now(),
                })?;
                if added {
                    added_groups.push(rule.group_id.clone());
                }
            }
            evaluations.push(evaluation);
        }

        Ok(PatientRecalculation {
            patient_id: patient_id.clone(),
            evaluations,
            added_groups,
        })
    }

    pub fn patient_groups(
        &self,
        patient_id: &PatientId,
    ) -> Result<Vec<GroupMembership>, AssessmentServiceError> {
        Ok(self.groups.memberships(patient_id)?)
    }

    /// Manual assignment by `actor`. Conflicts when the patient is already in the group.
    pub fn assign_membership(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        group_id: &GroupId,
    ) -> Result<GroupMembership, AssessmentServiceError> {
        let membership = GroupMembership {
            patient_id: patient_id.clone(),
            group_id: group_id.clone(),
            source: MembershipSource::Manual {
                staff_id: actor.staff_id.clone(),
            },
            assigned_at: Utc::now(),
        };
        if !self.groups.add_membership(membership.clone())? {
            return Err(RepositoryError::Conflict.into());
        }
        info!(
            patient_id = %patient_id.0,
            group_id = %group_id.0,
            staff_id = %actor.staff_id,
            "group membership assigned"
        );
        Ok(membership)
    }

    /// Manual removal; automatic recalculation never revokes memberships.
    pub fn remove_membership(
        &self,
        actor: &Actor,
        patient_id: &PatientId,
        group_id: &GroupId,
    ) -> Result<(), AssessmentServiceError> {
        if !self.groups.remove_membership(patient_id, group_id)? {
            return Err(RepositoryError::NotFound.into());
        }
        info!(
            patient_id = %patient_id.0,
            group_id = %group_id.0,
            staff_id = %actor.staff_id,
            "group membership removed"
        );
        Ok(())
    }
}

/// Rule evaluations for one patient and the groups newly joined.
#[derive(Debug, Clone, Serialize)]
pub struct PatientRecalculation {
    pub patient_id: PatientId,
    pub evaluations: Vec<RuleEvaluation>,
    pub added_groups: Vec<GroupId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculationFailure {
    pub patient_id: PatientId,
    pub error: String,
}

/// Aggregate counts for a bulk recalculation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecalculationSummary {
    pub patients_processed: usize,
    pub memberships_added: usize,
    pub failures: Vec<RecalculationFailure>,
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error(transparent)]
    Authoring(#[from] AuthoringViolation),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
