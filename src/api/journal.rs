//! Mood journal endpoints (signed in, own entries only)
//!
//! - GET|POST /api/v1/journal
//! - DELETE /api/v1/journal/{id}
//! - GET /api/v1/journal/stats

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateJournalEntryInput, JournalEntry, JournalStats};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/stats", get(stats))
        .route("/{id}", delete(delete_entry))
}

async fn list_entries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    Ok(Json(state.journal_service.list(user.0.id).await?))
}

async fn create_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateJournalEntryInput>,
) -> Result<(StatusCode, Json<JournalEntry>), ApiError> {
    let entry = state.journal_service.create(user.0.id, body).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.journal_service.delete(user.0.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<JournalStats>, ApiError> {
    Ok(Json(state.journal_service.stats(user.0.id).await?))
}
