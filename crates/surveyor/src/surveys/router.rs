use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde_json::json;

use super::domain::{Caller, ParticipantId, SurveyDraft, SurveyId};
use super::repository::{StoreError, SubmissionStore, SurveyStore};
use super::service::{SubmitRequest, SurveyService, SurveyServiceError};

/// Header carrying the verified participant id from the identity layer.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";
/// Header carrying the identity layer's privileged flag (`true`/`1`).
pub const PRIVILEGED_HEADER: &str = "x-privileged";

/// Router builder exposing the survey administration and participation endpoints.
pub fn survey_router<S, B>(service: Arc<SurveyService<S, B>>) -> Router
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    Router::new()
        .route(
            "/api/survey",
            get(list_handler::<S, B>).post(create_handler::<S, B>),
        )
        .route("/api/survey/submit", post(submit_handler::<S, B>))
        .route(
            "/api/survey/participant/:event_code",
            get(participant_handler::<S, B>),
        )
        .route(
            "/api/survey/:survey_id",
            get(admin_handler::<S, B>)
                .put(edit_handler::<S, B>)
                .delete(delete_handler::<S, B>),
        )
        .with_state(service)
}

pub(crate) fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, Response> {
    let participant = headers
        .get(PARTICIPANT_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let Some(participant) = participant else {
        let payload = json!({ "error": "missing caller identity" });
        return Err((StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response());
    };

    let is_privileged = headers
        .get(PRIVILEGED_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| matches!(value.trim(), "true" | "1"))
        .unwrap_or(false);

    Ok(Caller {
        participant_id: ParticipantId(participant.to_string()),
        is_privileged,
    })
}

pub(crate) fn error_response(error: SurveyServiceError) -> Response {
    let status = match &error {
        SurveyServiceError::SurveyNotFound(_)
        | SurveyServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        SurveyServiceError::Lifecycle(_) | SurveyServiceError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        SurveyServiceError::Forbidden => StatusCode::FORBIDDEN,
        SurveyServiceError::ConcurrentConflict { .. } => StatusCode::CONFLICT,
        SurveyServiceError::EventCodeExhausted { .. } | SurveyServiceError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn list_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.list(&caller) {
        Ok(surveys) => {
            let views: Vec<_> = surveys.iter().map(|survey| survey.admin_view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn admin_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.get_admin(&caller, &SurveyId(survey_id)) {
        Ok(survey) => (StatusCode::OK, axum::Json(survey.admin_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn participant_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
    Path(event_code): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    if let Err(response) = caller_from_headers(&headers) {
        return response;
    }

    match service.get_participant(&event_code, Utc::now()) {
        Ok(survey) => (StatusCode::OK, axum::Json(survey.participant_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
    axum::Json(draft): axum::Json<SurveyDraft>,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.create(&caller, draft) {
        Ok(survey) => (StatusCode::CREATED, axum::Json(survey.admin_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn edit_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
    axum::Json(draft): axum::Json<SurveyDraft>,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.edit(&caller, &SurveyId(survey_id), draft, Utc::now()) {
        Ok(survey) => (StatusCode::OK, axum::Json(survey.admin_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn delete_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
    Path(survey_id): Path<String>,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    match service.delete(&caller, &SurveyId(survey_id), Utc::now()) {
        Ok(survey) => (StatusCode::OK, axum::Json(survey.admin_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, B>(
    State(service): State<Arc<SurveyService<S, B>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<SubmitRequest>,
) -> Response
where
    S: SurveyStore + 'static,
    B: SubmissionStore + 'static,
{
    let caller = match caller_from_headers(&headers) {
        Ok(caller) => caller,
        Err(response) => return response,
    };

    // The registry blocks on a per-event lock.
    let outcome =
        tokio::task::spawn_blocking(move || service.submit(&caller, request, Utc::now())).await;

    match outcome {
        Ok(Ok(receipt)) => (StatusCode::OK, axum::Json(receipt.submission)).into_response(),
        Ok(Err(error)) => error_response(error),
        Err(join_error) => {
            let payload = json!({ "error": format!("submission task failed: {join_error}") });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}
