use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use tracing::error;

use super::proxy::ConsentDetails;
use super::service::{ConsentQuery, ConsentRequest, ConsentService, ConsentServiceError};

pub const CONSENT_PATH: &str = "/consent/api/v1/data_sharing_consent";

/// Router exposing the data-sharing consent API.
pub fn consent_router(service: Arc<ConsentService>) -> Router {
    Router::new()
        .route(
            CONSENT_PATH,
            get(get_handler).post(post_handler).delete(delete_handler),
        )
        .with_state(service)
}

#[derive(Clone, Copy)]
enum ConsentAction {
    Read,
    Grant,
    Refuse,
}

// GET and DELETE prefer the query string; POST prefers the body. Either
// source fills in parameters the other one lacks.
pub(crate) async fn get_handler(
    State(service): State<Arc<ConsentService>>,
    Query(query): Query<ConsentQuery>,
    body: Bytes,
) -> Response {
    match body_params(&body) {
        Ok(body) => dispatch(service, query.or(body), ConsentAction::Read).await,
        Err(response) => response,
    }
}

pub(crate) async fn post_handler(
    State(service): State<Arc<ConsentService>>,
    Query(query): Query<ConsentQuery>,
    body: Bytes,
) -> Response {
    match body_params(&body) {
        Ok(body) => dispatch(service, body.or(query), ConsentAction::Grant).await,
        Err(response) => response,
    }
}

pub(crate) async fn delete_handler(
    State(service): State<Arc<ConsentService>>,
    Query(query): Query<ConsentQuery>,
    body: Bytes,
) -> Response {
    match body_params(&body) {
        Ok(body) => dispatch(service, query.or(body), ConsentAction::Refuse).await,
        Err(response) => response,
    }
}

/// Consent parameters carried in a JSON body. An empty body carries none.
fn body_params(body: &Bytes) -> Result<ConsentQuery, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ConsentQuery::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Malformed request body: {err}"),
        )
    })
}

async fn dispatch(service: Arc<ConsentService>, query: ConsentQuery, action: ConsentAction) -> Response {
    let request = match query.validate() {
        Ok(request) => request,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let outcome = tokio::task::spawn_blocking(move || run(&service, &request, action)).await;

    match outcome {
        Ok(Ok(details)) => (StatusCode::OK, axum::Json(details)).into_response(),
        Ok(Err(ConsentServiceError::Request(err))) => {
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Ok(Err(other)) => {
            error!(error = %other, "consent request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
        Err(join_error) => {
            error!(error = %join_error, "consent worker panicked");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, join_error.to_string())
        }
    }
}

// The learner named in the request acts on their own consent.
fn run(
    service: &ConsentService,
    request: &ConsentRequest,
    action: ConsentAction,
) -> Result<ConsentDetails, ConsentServiceError> {
    let request_user = request.username.as_str();
    match action {
        ConsentAction::Read => service.details(request, request_user),
        ConsentAction::Grant => service.provide(request, request_user),
        ConsentAction::Refuse => service.revoke(request, request_user),
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let payload = json!({ "error": message });
    (status, axum::Json(payload)).into_response()
}
