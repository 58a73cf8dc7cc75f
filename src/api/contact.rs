//! Contact form endpoint
//!
//! `POST /api/contact` and its CORS preflight. Unlike the `/api/v1` routes
//! this one answers with a flat `{ok, error}` envelope and allows any origin,
//! so the form can be embedded on partner sites.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::services::contact::{ContactError, ContactSubmission};

const CORS_HEADERS: [(HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/contact", post(submit).options(preflight))
}

fn with_cors(status: StatusCode, body: Option<ContactResponse>) -> Response {
    let mut response = match body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    };
    let headers = response.headers_mut();
    for (name, value) in CORS_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

fn failure(message: impl Into<String>) -> Response {
    with_cors(
        StatusCode::BAD_REQUEST,
        Some(ContactResponse {
            ok: false,
            error: Some(message.into()),
        }),
    )
}

/// OPTIONS /api/contact
async fn preflight() -> Response {
    with_cors(StatusCode::NO_CONTENT, None)
}

/// POST /api/contact
///
/// The body is parsed by hand so malformed JSON gets the same envelope as
/// validation failures.
async fn submit(State(state): State<AppState>, body: Bytes) -> Response {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return failure("Invalid JSON"),
    };

    let submission = match ContactSubmission::from_json(value) {
        Ok(s) => s,
        Err(e @ ContactError::MissingField(_)) => return failure(e.to_string()),
        Err(ContactError::NotAnObject) => return failure("Invalid JSON"),
    };

    state.contact_service.submit(submission);
    with_cors(StatusCode::OK, Some(ContactResponse { ok: true, error: None }))
}
