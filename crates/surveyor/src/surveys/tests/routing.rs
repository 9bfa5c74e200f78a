use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::config::EngineConfig;
use crate::surveys::domain::Survey;
use crate::surveys::memory::InMemorySubmissionStore;
use crate::surveys::router::{survey_router, PARTICIPANT_HEADER, PRIVILEGED_HEADER};
use crate::surveys::service::SurveyService;

fn request(
    method: &str,
    uri: &str,
    caller: Option<(&str, bool)>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, privileged)) = caller {
        builder = builder
            .header(PARTICIPANT_HEADER, id)
            .header(PRIVILEGED_HEADER, if privileged { "true" } else { "false" });
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

fn app() -> (axum::Router, Arc<MemoryService>) {
    let (service, _, _) = build_service();
    let service = Arc::new(service);
    (survey_router(service.clone()), service)
}

fn draft_json(start: i64, end: i64) -> Value {
    serde_json::to_value(single_question_draft(hours(start), hours(end))).expect("draft json")
}

fn live_survey(service: &MemoryService) -> Survey {
    let now = chrono::Utc::now();
    let hour = chrono::Duration::hours(1);
    let draft = single_question_draft(now - hour, now + hour);
    service.create(&admin(), draft).expect("created")
}

#[tokio::test]
async fn create_route_returns_admin_view() {
    let (router, _) = app();

    let response = router
        .oneshot(request("POST", "/api/survey", Some(("admin-1", true)), Some(draft_json(1, 2))))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["event_code"].as_str().map(str::len), Some(6));
    assert_eq!(payload["submissions"], json!(0));
    assert_eq!(payload["avg_score"], json!(0.0));
    assert_eq!(payload["questions"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn create_route_requires_privilege_and_identity() {
    let (router, _) = app();

    let forbidden = router
        .clone()
        .oneshot(request("POST", "/api/survey", Some(("p-1", false)), Some(draft_json(1, 2))))
        .await
        .expect("route executes");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let anonymous = router
        .oneshot(request("POST", "/api/survey", None, Some(draft_json(1, 2))))
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_route_rejects_invalid_drafts() {
    let (router, _) = app();
    let mut body = draft_json(1, 2);
    body["questions"] = json!([]);

    let response = router
        .oneshot(request("POST", "/api/survey", Some(("admin-1", true)), Some(body)))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"].as_str().unwrap_or_default().contains("1"));
}

#[tokio::test]
async fn submit_route_updates_aggregate() {
    let (router, service) = app();
    let survey = live_survey(&service);

    let response = router
        .clone()
        .oneshot(request(
            "POST",
            "/api/survey/submit",
            Some(("p-1", false)),
            Some(json!({ "event_code": survey.event_code.0, "answers": ["a2"] })),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["participant_id"], json!("p-1"));
    assert_eq!(payload["answers"], json!(["a2"]));

    let admin_view = router
        .oneshot(request(
            "GET",
            &format!("/api/survey/{}", survey.id.0),
            Some(("admin-1", true)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(admin_view.status(), StatusCode::OK);
    let payload = read_json_body(admin_view).await;
    assert_eq!(payload["total_score"], json!(2));
    assert_eq!(payload["submissions"], json!(1));
    assert_eq!(payload["avg_score"], json!(2.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_submit_routes_keep_every_update() {
    let (router, service) = app();
    let survey = live_survey(&service);

    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let router = router.clone();
            let body = json!({ "event_code": survey.event_code.0, "answers": ["a1"] });
            tokio::spawn(async move {
                let caller = format!("p-{n}");
                router
                    .oneshot(request(
                        "POST",
                        "/api/survey/submit",
                        Some((caller.as_str(), false)),
                        Some(body),
                    ))
                    .await
                    .expect("route executes")
                    .status()
            })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.expect("task joins"), StatusCode::OK);
    }

    let stored = service.get_admin(&admin(), &survey.id).expect("admin read");
    assert_eq!(stored.aggregate.total_score, 32);
    assert_eq!(stored.aggregate.submission_count, 32);
}

#[tokio::test]
async fn submit_route_rejects_surveys_that_are_not_running() {
    let (router, service) = app();
    let future = chrono::Utc::now() + chrono::Duration::days(1);
    let survey = service
        .create(
            &admin(),
            single_question_draft(future, future + chrono::Duration::hours(1)),
        )
        .expect("created");

    let response = router
        .oneshot(request(
            "POST",
            "/api/survey/submit",
            Some(("p-1", false)),
            Some(json!({ "event_code": survey.event_code.0, "answers": ["a1"] })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("not started"));
}

#[tokio::test]
async fn participant_route_hides_aggregate_and_maps_not_found() {
    let (router, service) = app();
    let survey = live_survey(&service);

    let response = router
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/survey/participant/{}", survey.event_code.0),
            Some(("p-1", false)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["event_code"], json!(survey.event_code.0));
    assert!(payload.get("total_score").is_none());

    let missing = router
        .oneshot(request(
            "GET",
            "/api/survey/participant/abcdef",
            Some(("p-1", false)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn edit_and_delete_routes_follow_lifecycle() {
    let (router, service) = app();
    let live = live_survey(&service);

    let blocked = router
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/survey/{}", live.id.0),
            Some(("admin-1", true)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(blocked.status(), StatusCode::BAD_REQUEST);

    let future = chrono::Utc::now() + chrono::Duration::days(1);
    let pending = service
        .create(
            &admin(),
            single_question_draft(future, future + chrono::Duration::hours(1)),
        )
        .expect("created");

    let mut edited = serde_json::to_value(three_question_draft(
        future,
        future + chrono::Duration::hours(2),
    ))
    .expect("draft json");
    edited["questions"][0]["question"] = json!("Venue (revised)");
    let response = router
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/survey/{}", pending.id.0),
            Some(("admin-1", true)),
            Some(edited),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["questions"][0]["question"], json!("Venue (revised)"));

    let deleted = router
        .clone()
        .oneshot(request(
            "DELETE",
            &format!("/api/survey/{}", pending.id.0),
            Some(("admin-1", true)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(deleted.status(), StatusCode::OK);

    let gone = router
        .oneshot(request(
            "DELETE",
            &format!("/api/survey/{}", pending.id.0),
            Some(("admin-1", true)),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_route_returns_all_surveys() {
    let (router, service) = app();
    live_survey(&service);
    live_survey(&service);

    let response = router
        .oneshot(request("GET", "/api/survey", Some(("admin-1", true)), None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn exhausted_conflicts_map_to_conflict_status() {
    let store = Arc::new(ContendedSurveyStore::new(u32::MAX));
    let service = Arc::new(SurveyService::new(
        store,
        Arc::new(InMemorySubmissionStore::default()),
        EngineConfig {
            submit_retry_limit: 2,
            event_code_attempts: 1,
        },
    ));
    let survey = {
        let now = chrono::Utc::now();
        let hour = chrono::Duration::hours(1);
        service
            .create(&admin(), single_question_draft(now - hour, now + hour))
            .expect("created")
    };

    let response = survey_router(service)
        .oneshot(request(
            "POST",
            "/api/survey/submit",
            Some(("p-1", false)),
            Some(json!({ "event_code": survey.event_code.0, "answers": ["a1"] })),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn offline_store_maps_to_internal_error() {
    let service = Arc::new(SurveyService::new(
        Arc::new(UnavailableSurveyStore),
        Arc::new(InMemorySubmissionStore::default()),
        EngineConfig::default(),
    ));

    let response = survey_router(service)
        .oneshot(request("GET", "/api/survey", Some(("admin-1", true)), None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
