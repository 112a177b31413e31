use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::assessments::domain::{Actor, PatientId, RuleOperator};
use crate::assessments::repository::AssessmentRepository;
use crate::assessments::router::STAFF_HEADER;
use crate::assessments::scoring::ScoringConfig;
use crate::assessments::{assessment_router, AssessmentService};

fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header(STAFF_HEADER, "nurse-3")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn form_payload(form_id: &str) -> serde_json::Value {
    json!({
        "form_id": form_id,
        "title": "Fall risk check",
        "description": "Weekly fall risk review",
        "questions": [
            {
                "question_id": 1,
                "question_text": "Walks unaided?",
                "question_type": "multiple_choice",
                "options": [{"text": "A", "score": 3}, {"text": "B", "score": 0}],
                "is_required": true
            },
            {
                "question_id": 2,
                "question_text": "Falls this month",
                "question_type": "number",
                "options": {"min": 0, "max": 10, "scoreMultiplier": 1}
            }
        ],
        "thresholds": [
            {"minScore": 0, "maxScore": 3, "result": "low", "description": "routine review"},
            {"minScore": 4, "maxScore": 13, "result": "high", "description": "refer to physio"}
        ]
    })
}

#[tokio::test]
async fn create_form_returns_created_with_author() {
    let (service, _, _) = build_service();
    let app = router_with_service(service);

    let response = app
        .oneshot(json_request(Method::POST, "/api/v1/forms", form_payload("falls")))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["form"]["form_id"], "falls");
    assert_eq!(payload["created_by"], "nurse-3");
    assert_eq!(payload["form"]["questions"][1]["question_type"], "number");
}

#[tokio::test]
async fn invalid_form_returns_unprocessable_entity() {
    let (service, _, _) = build_service();
    let app = router_with_service(service);
    let mut payload = form_payload("broken");
    payload["title"] = json!("");

    let response = app
        .oneshot(json_request(Method::POST, "/api/v1/forms", payload))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"].as_str().expect("message").contains("title"));
}

#[tokio::test]
async fn missing_form_returns_not_found() {
    let (service, _, _) = build_service();
    let app = router_with_service(service);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/forms/unknown")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn submission_round_trip_exposes_evaluation_view() {
    let (service, _, _) = build_service();
    service
        .create_form(&Actor::new("nurse-3"), screening_draft("screening"))
        .expect("form saved");
    let app = router_with_service(service);

    let created = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/forms/screening/submissions",
            json!({"patient_id": "patient-1", "answers": {"1": "A", "2": "A"}}),
        ))
        .await
        .expect("router response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let view = read_json_body(created).await;
    assert_eq!(view["total_evaluation_score"], 6.0);
    assert_eq!(view["evaluation_result"], "high");
    assert_eq!(view["status"], "evaluated");

    let submission_id = view["submission_id"].as_str().expect("id").to_string();
    let fetched = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/submissions/{submission_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    assert_eq!(fetched.status(), StatusCode::OK);
    let fetched = read_json_body(fetched).await;
    assert_eq!(fetched["evaluation_summary"], "high");
}

#[tokio::test]
async fn unmatched_submission_reports_no_evaluation() {
    let (service, _, _) = build_service();
    let mut draft = screening_draft("gappy");
    draft.thresholds = vec![band(5.0, 6.0, "high")];
    service
        .create_form(&Actor::system(), draft)
        .expect("form saved");
    let app = router_with_service(service);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/forms/gappy/submissions",
            json!({"patient_id": "patient-1", "answers": {"1": "A"}}),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let view = read_json_body(response).await;
    assert!(view["evaluation_result"].is_null());
    assert_eq!(view["status"], "completed");
    assert_eq!(view["evaluation_summary"], "no evaluation available");
}

#[tokio::test]
async fn preview_scores_without_storing() {
    let (service, assessments, _) = build_service();
    service
        .create_form(&Actor::system(), screening_draft("screening"))
        .expect("form saved");
    let app = router_with_service(service);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/forms/screening/preview",
            json!({"answers": {"1": "A", "2": "B"}}),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let outcome = read_json_body(response).await;
    assert_eq!(outcome["total_score"], 3.0);
    assert_eq!(outcome["evaluation_result"], "low");
    assert!(assessments.patients().expect("patients").is_empty());
}

#[tokio::test]
async fn rule_creation_and_patient_recalculation() {
    let (service, assessments, _) = build_service();
    assessments
        .insert_submission(stored_submission("s1", "patient-7", "adl", 8.0, at(2)))
        .expect("insert");
    let app = router_with_service(service);

    let created = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/groups/rules",
            json!({
                "name": "High dependency",
                "group_id": "high-dependency",
                "forms": [{"form_id": "adl", "weight": 1.5}],
                "operator": "gte",
                "min_score": 10
            }),
        ))
        .await
        .expect("router response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let rule = read_json_body(created).await;
    assert_eq!(rule["created_by"], "nurse-3");
    assert_eq!(rule["operator"], "gte");

    let recalculated = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/patients/patient-7/groups/recalculate",
            json!({}),
        ))
        .await
        .expect("router response");
    assert_eq!(recalculated.status(), StatusCode::OK);
    let result = read_json_body(recalculated).await;
    assert_eq!(result["added_groups"], json!(["high-dependency"]));
    assert_eq!(result["evaluations"][0]["aggregate"], 12.0);

    let groups = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/patients/patient-7/groups")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    let memberships = read_json_body(groups).await;
    assert_eq!(memberships[0]["group_id"], "high-dependency");
    assert_eq!(memberships[0]["source"]["kind"], "rule");
}

#[tokio::test]
async fn invalid_rule_returns_unprocessable_entity() {
    let (service, _, _) = build_service();
    let app = router_with_service(service);

    let response = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/groups/rules",
            json!({
                "name": "Broken",
                "group_id": "g",
                "forms": [{"form_id": "adl"}],
                "operator": "between",
                "min_score": 20,
                "max_score": 10
            }),
        ))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bulk_recalculation_returns_summary() {
    let (service, assessments, _) = build_service();
    service
        .create_rule(
            &Actor::system(),
            rule_draft("mobility", &[("adl", 1.0)], RuleOperator::Gte),
        )
        .expect("rule saved");
    for record in [
        stored_submission("b1", "patient-1", "adl", 6.0, at(1)),
        stored_submission("b2", "patient-2", "adl", 1.0, at(1)),
    ] {
        assessments.insert_submission(record).expect("insert");
    }
    let app = router_with_service(service);

    let response = app
        .oneshot(json_request(Method::POST, "/api/v1/groups/recalculate", json!({})))
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    let summary = read_json_body(response).await;
    assert_eq!(summary["patients_processed"], 2);
    assert_eq!(summary["memberships_added"], 1);
    assert_eq!(summary["failures"], json!([]));
}

#[tokio::test]
async fn delete_membership_returns_no_content_then_not_found() {
    let (service, assessments, groups) = build_service();
    service
        .create_rule(
            &Actor::system(),
            rule_draft("mobility", &[("adl", 1.0)], RuleOperator::Gte),
        )
        .expect("rule saved");
    assessments
        .insert_submission(stored_submission("x1", "patient-5", "adl", 9.0, at(1)))
        .expect("insert");
    service
        .recalculate_patient(&PatientId("patient-5".to_string()))
        .expect("recalculates");
    let app = router_with_service(service);

    let delete = || {
        Request::builder()
            .method(Method::DELETE)
            .uri("/api/v1/patients/patient-5/groups/mobility")
            .header(STAFF_HEADER, "nurse-3")
            .body(Body::empty())
            .expect("request")
    };

    let first = app.clone().oneshot(delete()).await.expect("router response");
    assert_eq!(first.status(), StatusCode::NO_CONTENT);
    assert!(groups
        .memberships
        .lock()
        .expect("membership mutex poisoned")
        .is_empty());

    let second = app.oneshot(delete()).await.expect("router response");
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unavailable_repository_returns_internal_error() {
    let service = AssessmentService::new(
        Arc::new(UnavailableAssessments),
        Arc::new(MemoryGroups::default()),
        ScoringConfig::default(),
    );
    let app = assessment_router(Arc::new(service));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/forms/any")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .expect("message")
        .contains("database offline"));
}

#[tokio::test]
async fn manual_assignment_is_kept_through_recalculation() {
    let (service, assessments, _) = build_service();
    service
        .create_rule(
            &Actor::system(),
            rule_draft("memory", &[("cognition", 1.0)], RuleOperator::Gte),
        )
        .expect("rule saved");
    assessments
        .insert_submission(stored_submission("c1", "patient-8", "cognition", 2.0, at(1)))
        .expect("insert");
    let app = router_with_service(service);

    let assigned = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/patients/patient-8/groups/memory",
            json!({}),
        ))
        .await
        .expect("router response");
    assert_eq!(assigned.status(), StatusCode::CREATED);
    let membership = read_json_body(assigned).await;
    assert_eq!(membership["source"]["kind"], "manual");
    assert_eq!(membership["source"]["staff_id"], "nurse-3");

    let recalculated = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/patients/patient-8/groups/recalculate",
            json!({}),
        ))
        .await
        .expect("router response");
    let result = read_json_body(recalculated).await;
    assert_eq!(result["added_groups"], json!([]));

    let groups = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/patients/patient-8/groups")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");
    let memberships = read_json_body(groups).await;
    assert_eq!(memberships[0]["group_id"], "memory");
    assert_eq!(memberships[0]["source"]["kind"], "manual");

    let duplicate = app
        .oneshot(json_request(
            Method::POST,
            "/api/v1/patients/patient-8/groups/memory",
            json!({}),
        ))
        .await
        .expect("router response");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}
