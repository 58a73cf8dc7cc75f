//! Support ticket endpoints
//!
//! - POST /api/v1/support - Open a ticket (public)
//! - GET /api/v1/admin/support - List tickets, `?status=` filter
//! - GET|PUT|DELETE /api/v1/admin/support/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{default_page, default_per_page};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    CreateSupportMessageInput, ListParams, PagedResult, SupportMessage, SupportStatus,
    UpdateSupportMessageInput,
};

#[derive(Debug, Deserialize)]
pub struct SupportListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default)]
    pub status: Option<String>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(create_message))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_messages))
        .route(
            "/{id}",
            get(get_message).put(update_message).delete(delete_message),
        )
}

async fn create_message(
    State(state): State<AppState>,
    Json(body): Json<CreateSupportMessageInput>,
) -> Result<(StatusCode, Json<SupportMessage>), ApiError> {
    let message = state.support_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(
    State(state): State<AppState>,
    Query(query): Query<SupportListQuery>,
) -> Result<Json<PagedResult<SupportMessage>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty() && *s != "all")
        .map(str::parse::<SupportStatus>)
        .transpose()
        .map_err(|e| ApiError::validation_error(e.to_string()))?;

    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.support_service.list(status, &params).await?))
}

async fn get_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<SupportMessage>, ApiError> {
    Ok(Json(state.support_service.get(id).await?))
}

async fn update_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateSupportMessageInput>,
) -> Result<Json<SupportMessage>, ApiError> {
    Ok(Json(state.support_service.update(id, body).await?))
}

async fn delete_message(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.support_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
