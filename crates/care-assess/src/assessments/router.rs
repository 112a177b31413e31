use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    Actor, Answers, FormDraft, FormId, GroupId, PatientId, RuleDraft, SubmissionId,
    SubmissionRequest,
};
use super::repository::{AssessmentRepository, GroupRepository, RepositoryError};
use super::service::{AssessmentService, AssessmentServiceError};

/// Header carrying the acting staff member. Recorded, never verified.
pub const STAFF_HEADER: &str = "x-staff-id";

type SharedService<R, G> = Arc<AssessmentService<R, G>>;

/// Router builder exposing HTTP endpoints for forms, submissions, and groups.
pub fn assessment_router<R, G>(service: SharedService<R, G>) -> Router
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    Router::new()
        .route("/api/v1/forms", post(create_form_handler::<R, G>))
        .route("/api/v1/forms/:form_id", get(form_handler::<R, G>))
        .route(
            "/api/v1/forms/:form_id/submissions",
            post(submit_handler::<R, G>),
        )
        .route(
            "/api/v1/forms/:form_id/preview",
            post(preview_handler::<R, G>),
        )
        .route(
            "/api/v1/submissions/:submission_id",
            get(submission_handler::<R, G>),
        )
        .route("/api/v1/groups/rules", post(create_rule_handler::<R, G>))
        .route(
            "/api/v1/groups/recalculate",
            post(recalculate_all_handler::<R, G>),
        )
        .route(
            "/api/v1/patients/:patient_id/groups",
            get(patient_groups_handler::<R, G>),
        )
        .route(
            "/api/v1/patients/:patient_id/groups/recalculate",
            post(recalculate_patient_handler::<R, G>),
        )
        .route(
            "/api/v1/patients/:patient_id/groups/:group_id",
            post(assign_membership_handler::<R, G>).delete(remove_membership_handler::<R, G>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct PreviewRequest {
    pub(crate) answers: Answers,
}

pub(crate) fn actor_from_headers(headers: &HeaderMap) -> Actor {
    headers
        .get(STAFF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Actor::new)
        .unwrap_or_else(Actor::system)
}

pub(crate) fn error_response(error: AssessmentServiceError) -> Response {
    let status = match &error {
        AssessmentServiceError::Authoring(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AssessmentServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        AssessmentServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        AssessmentServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn create_form_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    headers: HeaderMap,
    axum::Json(draft): axum::Json<FormDraft>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.create_form(&actor, draft) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn form_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(form_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.get_form(&FormId(form_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(form_id): Path<String>,
    axum::Json(request): axum::Json<SubmissionRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.submit(&FormId(form_id), request) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn preview_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(form_id): Path<String>,
    axum::Json(request): axum::Json<PreviewRequest>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.preview(&FormId(form_id), &request.answers) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submission_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(submission_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.get_submission(&SubmissionId(submission_id)) {
        Ok(record) => (StatusCode::OK, axum::Json(record.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_rule_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    headers: HeaderMap,
    axum::Json(draft): axum::Json<RuleDraft>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.create_rule(&actor, draft) {
        Ok(rule) => (StatusCode::CREATED, axum::Json(rule)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recalculate_all_handler<R, G>(
    State(service): State<SharedService<R, G>>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.recalculate_all() {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn patient_groups_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(patient_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.patient_groups(&PatientId(patient_id)) {
        Ok(memberships) => (StatusCode::OK, axum::Json(memberships)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn recalculate_patient_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    Path(patient_id): Path<String>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    match service.recalculate_patient(&PatientId(patient_id)) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn assign_membership_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    headers: HeaderMap,
    Path((patient_id, group_id)): Path<(String, String)>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.assign_membership(&actor, &PatientId(patient_id), &GroupId(group_id)) {
        Ok(membership) => (StatusCode::CREATED, axum::Json(membership)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn remove_membership_handler<R, G>(
    State(service): State<SharedService<R, G>>,
    headers: HeaderMap,
    Path((patient_id, group_id)): Path<(String, String)>,
) -> Response
where
    R: AssessmentRepository + 'static,
    G: GroupRepository + 'static,
{
    let actor = actor_from_headers(&headers);
    match service.remove_membership(&actor, &PatientId(patient_id), &GroupId(group_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}
