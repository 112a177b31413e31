use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Answers, Form, FormId, GroupAssignmentRule, GroupId, GroupMembership, PatientId,
    SubmissionId, SubmissionStatus,
};
use super::scoring::{EvaluationOutcome, ScoreComponent};
use super::validation::AuthoringWarning;

/// Stored form together with authoring metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRecord {
    pub form: Form,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub warnings: Vec<AuthoringWarning>,
}

/// One patient's completed answer set for one form, with its computed evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub submission_id: SubmissionId,
    pub patient_id: PatientId,
    pub form_id: FormId,
    pub answers: Answers,
    pub total_evaluation_score: f64,
    pub evaluation_result: Option<String>,
    pub evaluation_description: Option<String>,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub components: Vec<ScoreComponent>,
}

impl SubmissionRecord {
    pub fn from_outcome(
        submission_id: SubmissionId,
        patient_id: PatientId,
        form_id: FormId,
        answers: Answers,
        outcome: EvaluationOutcome,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let status = if outcome.evaluation_result.is_some() {
            SubmissionStatus::Evaluated
        } else {
            SubmissionStatus::Completed
        };

        Self {
            submission_id,
            patient_id,
            form_id,
            answers,
            total_evaluation_score: outcome.total_score,
            evaluation_result: outcome.evaluation_result,
            evaluation_description: outcome.evaluation_description,
            status,
            submitted_at,
            components: outcome.components,
        }
    }

    pub fn evaluation_summary(&self) -> String {
        match &self.evaluation_result {
            Some(result) => result.clone(),
            None => "no evaluation available".to_string(),
        }
    }

    pub fn view(&self) -> SubmissionView {
        SubmissionView {
            submission_id: self.submission_id.clone(),
            patient_id: self.patient_id.clone(),
            form_id: self.form_id.clone(),
            status: self.status.label(),
            total_evaluation_score: self.total_evaluation_score,
            evaluation_result: self.evaluation_result.clone(),
            evaluation_description: self.evaluation_description.clone(),
            evaluation_summary: self.evaluation_summary(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Staff-facing representation of a stored submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionView {
    pub submission_id: SubmissionId,
    pub patient_id: PatientId,
    pub form_id: FormId,
    pub status: &'static str,
    pub total_evaluation_score: f64,
    pub evaluation_result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_description: Option<String>,
    pub evaluation_summary: String,
    pub submitted_at: DateTime<Utc>,
}

/// Storage for forms and submissions so the service can be exercised in isolation.
pub trait AssessmentRepository: Send + Sync {
    fn insert_form(&self, record: FormRecord) -> Result<FormRecord, RepositoryError>;
    fn fetch_form(&self, id: &FormId) -> Result<Option<FormRecord>, RepositoryError>;
    fn insert_submission(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError>;
    fn fetch_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError>;
    fn submissions_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError>;
    /// Every patient with at least one stored submission.
    fn patients(&self) -> Result<Vec<PatientId>, RepositoryError>;
}

/// Storage for assignment rules and the patient/group membership set.
pub trait GroupRepository: Send + Sync {
    fn insert_rule(&self, rule: GroupAssignmentRule)
        -> Result<GroupAssignmentRule, RepositoryError>;
    fn active_rules(&self) -> Result<Vec<GroupAssignmentRule>, RepositoryError>;
    /// Returns `false` when the patient already belongs to the group.
    fn add_membership(&self, membership: GroupMembership) -> Result<bool, RepositoryError>;
    /// Returns `false` when there was no such membership.
    fn remove_membership(
        &self,
        patient_id: &PatientId,
        group_id: &GroupId,
    ) -> Result<bool, RepositoryError>;
    fn memberships(&self, patient_id: &PatientId)
        -> Result<Vec<GroupMembership>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
