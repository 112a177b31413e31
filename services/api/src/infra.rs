use care_assess::assessments::{
    AssessmentRepository, FormId, FormRecord, GroupAssignmentRule, GroupId, GroupMembership,
    GroupRepository, PatientId, RepositoryError, SubmissionId, SubmissionRecord,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAssessmentRepository {
    forms: Arc<Mutex<HashMap<FormId, FormRecord>>>,
    submissions: Arc<Mutex<Vec<SubmissionRecord>>>,
}

impl AssessmentRepository for InMemoryAssessmentRepository {
    fn insert_form(&self, record: FormRecord) -> Result<FormRecord, RepositoryError> {
        let mut guard = lock(&self.forms)?;
        if guard.contains_key(&record.form.form_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.form.form_id.clone(), record.clone());
        Ok(record)
    }

    fn fetch_form(&self, id: &FormId) -> Result<Option<FormRecord>, RepositoryError> {
        Ok(lock(&self.forms)?.get(id).cloned())
    }

    fn insert_submission(
        &self,
        record: SubmissionRecord,
    ) -> Result<SubmissionRecord, RepositoryError> {
        let mut guard = lock(&self.submissions)?;
        if guard
            .iter()
            .any(|existing| existing.submission_id == record.submission_id)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn fetch_submission(
        &self,
        id: &SubmissionId,
    ) -> Result<Option<SubmissionRecord>, RepositoryError> {
        Ok(lock(&self.submissions)?
            .iter()
            .find(|record| &record.submission_id == id)
            .cloned())
    }

    fn submissions_for_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Vec<SubmissionRecord>, RepositoryError> {
        Ok(lock(&self.submissions)?
            .iter()
            .filter(|record| &record.patient_id == patient_id)
            .cloned()
            .collect())
    }

    fn patients(&self) -> Result<Vec<PatientId>, RepositoryError> {
        let mut patients: Vec<PatientId> = lock(&self.submissions)?
            .iter()
            .map(|record| record.patient_id.clone())
            .collect();
        patients.sort();
        patients.dedup();
        Ok(patients)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryGroupRepository {
    rules: Arc<Mutex<Vec<GroupAssignmentRule>>>,
    memberships: Arc<Mutex<Vec<GroupMembership>>>,
}

impl GroupRepository for InMemoryGroupRepository {
    fn insert_rule(&self, rule: GroupAssignmentRule) -> Result<GroupAssignmentRule, RepositoryError> {
        let mut guard = lock(&self.rules)?;
        if guard.iter().any(|existing| existing.rule_id == rule.rule_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(rule.clone());
        Ok(rule)
    }

    fn active_rules(&self) -> Result<Vec<GroupAssignmentRule>, RepositoryError> {
        Ok(lock(&self.rules)?
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect())
    }

    fn add_membership(&self, membership: GroupMembership) -> Result<bool, RepositoryError> {
        let mut guard = lock(&self.memberships)?;
        let exists = guard.iter().any(|existing| {
            existing.patient_id == membership.patient_id && existing.group_id == membership.group_id
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
        let mut guard = lock(&self.memberships)?;
        let before = guard.len();
        guard.retain(|existing| {
            !(&existing.patient_id == patient_id && &existing.group_id == group_id)
        });
        Ok(guard.len() != before)
    }

    fn memberships(&self, patient_id: &PatientId) -> Result<Vec<GroupMembership>, RepositoryError> {
        Ok(lock(&self.memberships)?
            .iter()
            .filter(|membership| &membership.patient_id == patient_id)
            .cloned()
            .collect())
    }
}
