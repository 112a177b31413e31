use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::assessments::domain::{
    AnswerValue, Answers, Choice, EvaluationThreshold, FormDraft, FormId, GroupAssignmentRule,
    GroupId, GroupMembership, MultipleChoiceOptions, NumberOptions, PatientId, Question,
    QuestionId, QuestionOptions, RatingOptions, RuleDraft, RuleForm, RuleId, RuleOperator,
    SubmissionId, SubmissionStatus, TextOptions, TrueFalseOptions,
};
use crate::assessments::repository::{
    AssessmentRepository, FormRecord, GroupRepository, RepositoryError, SubmissionRecord,
};
use crate::assessments::scoring::ScoringConfig;
use crate::assessments::{assessment_router, AssessmentService};

pub(super) fn answers(pairs: &[(u32, &str)]) -> Answers {
    pairs
        .iter()
        .map(|(id, value)| (QuestionId(*id), AnswerValue::from(*value)))
        .collect()
}

pub(super) fn multiple_choice(id: u32, choices: &[(&str, f64)]) -> Question {
    Question {
        question_id: QuestionId(id),
        question_text: format!("Question {id}"),
        options: QuestionOptions::MultipleChoice(MultipleChoiceOptions {
            choices: choices
                .iter()
                .map(|(text, score)| Choice {
                    text: text.to_string(),
                    score: *score,
                })
                .collect(),
            allow_other: true,
        }),
        is_required: true,
    }
}

pub(super) fn rating(id: u32, multiplier: Option<f64>) -> Question {
    Question {
        question_id: QuestionId(id),
        question_text: "How independent is the patient today?".to_string(),
        options: QuestionOptions::Rating(RatingOptions {
            min: 1,
            max: 5,
            score_multiplier: multiplier,
            ..RatingOptions::default()
        }),
        is_required: true,
    }
}

pub(super) fn number(id: u32, multiplier: Option<f64>) -> Question {
    Question {
        question_id: QuestionId(id),
        question_text: "Falls in the past month".to_string(),
        options: QuestionOptions::Number(NumberOptions {
            min: Some(0.0),
            max: Some(30.0),
            unit: Some("falls".to_string()),
            score_multiplier: multiplier,
            ..NumberOptions::default()
        }),
        is_required: false,
    }
}

pub(super) fn true_false(id: u32, true_score: Option<f64>, false_score: Option<f64>) -> Question {
    Question {
        question_id: QuestionId(id),
        question_text: "Needs walking aid".to_string(),
        options: QuestionOptions::TrueFalse(TrueFalseOptions {
            true_label: Some("ใช่".to_string()),
            false_label: Some("ไม่ใช่".to_string()),
            true_score,
            false_score,
        }),
        is_required: true,
    }
}

pub(super) fn text(id: u32) -> Question {
    Question {
        question_id: QuestionId(id),
        question_text: "Notes".to_string(),
        options: QuestionOptions::Text(TextOptions {
            placeholder: Some("Anything else?".to_string()),
            max_length: Some(500),
            multiline: true,
        }),
        is_required: false,
    }
}

pub(super) fn band(min: f64, max: f64, result: &str) -> EvaluationThreshold {
    EvaluationThreshold {
        min_score: min,
        max_score: max,
        result: result.to_string(),
        description: format!("{result} band"),
    }
}

/// Two multiple choice questions (A = 3, B = 0) with low/high bands.
pub(super) fn screening_draft(form_id: &str) -> FormDraft {
    FormDraft {
        form_id: Some(FormId(form_id.to_string())),
        title: "Daily living screening".to_string(),
        description: "Baseline functional screening".to_string(),
        questions: vec![
            multiple_choice(1, &[("A", 3.0), ("B", 0.0)]),
            multiple_choice(2, &[("A", 3.0), ("B", 0.0)]),
        ],
        thresholds: vec![band(0.0, 3.0, "low"), band(4.0, 6.0, "high")],
        recurrence: None,
    }
}

pub(super) fn rule_draft(group: &str, forms: &[(&str, f64)], operator: RuleOperator) -> RuleDraft {
    RuleDraft {
        name: format!("{group} intake"),
        group_id: GroupId(group.to_string()),
        forms: forms
            .iter()
            .map(|(form_id, weight)| RuleForm {
                form_id: FormId(form_id.to_string()),
                weight: *weight,
            })
            .collect(),
        operator,
        min_score: Some(4.0),
        max_score: None,
        is_active: true,
    }
}

pub(super) fn rule(
    operator: RuleOperator,
    min_score: Option<f64>,
    max_score: Option<f64>,
    forms: &[(&str, f64)],
) -> GroupAssignmentRule {
    GroupAssignmentRule {
        rule_id: RuleId("rule-test".to_string()),
        name: "test rule".to_string(),
        group_id: GroupId("mobility".to_string()),
        forms: forms
            .iter()
            .map(|(form_id, weight)| RuleForm {
                form_id: FormId(form_id.to_string()),
                weight: *weight,
            })
            .collect(),
        operator,
        min_score,
        max_score,
        is_active: true,
        created_by: None,
    }
}

pub(super) fn scores(pairs: &[(&str, f64)]) -> BTreeMap<FormId, f64> {
    pairs
        .iter()
        .map(|(form_id, score)| (FormId(form_id.to_string()), *score))
        .collect()
}

pub(super) fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn stored_submission(
    id: &str,
    patient: &str,
    form: &str,
    score: f64,
    submitted_at: DateTime<Utc>,
) -> SubmissionRecord {
    SubmissionRecord {
        submission_id: SubmissionId(id.to_string()),
        patient_id: PatientId(patient.to_string()),
        form_id: FormId(form.to_string()),
        answers: Answers::new(),
        total_evaluation_score: score,
        evaluation_result: None,
        evaluation_description: None,
        status: SubmissionStatus::Completed,
        submitted_at,
        components: Vec::new(),
    }
}

pub(super) type TestService = AssessmentService<MemoryAssessments, MemoryGroups>;

pub(super) fn build_service() -> (TestService, Arc<MemoryAssessments>, Arc<MemoryGroups>) {
    build_service_with(ScoringConfig::default())
}

pub(super) fn build_service_with(
    config: ScoringConfig,
) -> (TestService, Arc<MemoryAssessments>, Arc<MemoryGroups>) {
    let assessments = Arc::new(MemoryAssessments::default());
    let groups = Arc::new(MemoryGroups::default());
    let service = AssessmentService::new(assessments.clone(), groups.clone(), config);
    (service, assessments, groups)
}

#[derive(Default, Clone)]
pub(super) struct MemoryAssessments {
    pub(super) forms: Arc<Mutex<HashMap<FormId, FormRecord>>>,
    pub(super) submissions: Arc<Mutex<Vec<SubmissionRecord>>>,
}

impl AssessmentRepository for MemoryAssessments {
    fn insert_form(&self, record: FormRecord) -> Result<FormRecord, RepositoryError> {
        let mut guard = self.forms.lock().expect("form mutex poisoned");
        if guard.contains_key(&record.form.form_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.form.form_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch_form(&self, id: &FormId) -> Result<Option<FormRecord>, RepositoryError> {
        let guard = self.forms.lock().expect("form mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn insert_submission(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = self.submissions.lock().expect("submission mutex poisoned");
        guard.push(record.clone());
        Ok(record)
    }

    fn fetch_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        let guard = self.submissions.lock().expect("submission mutex poisoned");
        Ok(guard
            .iter()
            .find(|record| &record.submission_id == id)
            .cloned())
    }

    fn submissions_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        let guard = self.submissions.lock().expect("submission mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| &record.patient_id == patient_id)
            .cloned()
            .collect())
    }

    fn patients(&self) -> Result<Vec<PatientId>, RepositoryError> {
        let guard = self.submissions.lock().expect("submission mutex poisoned");
        let mut patients: Vec<PatientId> = guard
            .iter()
            .map(|record| record.patient_id.clone())
            .collect();
        patients.sort();
        patients.dedup();
        Ok(patients)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryGroups {
    pub(super) rules: Arc<Mutex<Vec<GroupAssignmentRule>>>,
    pub(super) memberships: Arc<Mutex<Vec<GroupMembership>>>,
}

impl GroupRepository for MemoryGroups {
    fn insert_rule(
        &self,
        rule: GroupAssignmentRule,
    ) -> Result<GroupAssignmentRule, RepositoryError> {
        self.rules
            .lock()
            .expect("rule mutex poisoned")
            .push(rule.clone());
        Ok(rule)
    }

    fn active_rules(&self) -> Result<Vec<GroupAssignmentRule>, RepositoryError> {
        let guard = self.rules.lock().expect("rule mutex poisoned");
        Ok(guard.iter().filter(|rule| rule.is_active).cloned().collect())
    }

    fn add_membership(&self, membership: GroupMembership) -> Result<bool, RepositoryError> {
        let mut guard = self.memberships.lock().expect("membership mutex poisoned");
        let exists = guard.iter().any(|existing| {
            existing.patient_id == membership.patient_id
                && existing.group_id == membership.group_id
        });
        if exists {
            return Ok(false);
        }
        guard.push(membership);
        Ok(true)
    }

    fn remove_membership(
        &self,
        patient_id: &PatientId,
        group_id: &GroupId,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.memberships.lock().expect("membership mutex poisoned");
        let before = guard.len();
        guard.retain(|existing| {
            !(&existing.patient_id == patient_id && &existing.group_id == group_id)
        });
        Ok(guard.len() != before)
    }

    fn memberships(&self, patient_id: &PatientId) -> Result<Vec<GroupMembership>, RepositoryError> {
        let guard = self.memberships.lock().expect("membership mutex poisoned");
        Ok(guard
            .iter()
            .filter(|membership| &membership.patient_id == patient_id)
            .cloned()
            .collect())
    }
}

/// Fails every read for one patient so bulk passes can be checked for isolation.
pub(super) struct FlakyAssessments {
    pub(super) inner: MemoryAssessments,
    pub(super) broken_patient: PatientId,
}

impl AssessmentRepository for FlakyAssessments {
    fn insert_form(&self, record: FormRecord) -> Result<FormRecord, RepositoryError> {
        self.inner.insert_form(record)
    }

    fn fetch_form(&self, id: &FormId) -> Result<Option<FormRecord>, RepositoryError> {
        self.inner.fetch_form(id)
    }

    fn insert_submission(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        self.inner.insert_submission(record)
    }

    fn fetch_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        self.inner.fetch_submission(id)
    }

    fn submissions_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        if patient_id == &self.broken_patient {
            return Err(RepositoryError::Unavailable("replica lagging".to_string()));
        }
        self.inner.submissions_for_patient(patient_id)
    }

    fn patients(&self) -> Result<Vec<PatientId>, RepositoryError> {
        self.inner.patients()
    }
}

pub(super) struct UnavailableAssessments;

impl AssessmentRepository for UnavailableAssessments {
    fn insert_form(&self, _record: FormRecord) -> Result<FormRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_form(&self, _id: &FormId) -> Result<Option<FormRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_submission(
        &self,
        _record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_submission(
        &self,
        _id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn submissions_for_patient(
        &self,
        _patient_id: &PatientId,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn patients(&self) -> Result<Vec<PatientId>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn router_with_service(service: TestService) -> axum::Router {
    assessment_router(Arc::new(service))
}
