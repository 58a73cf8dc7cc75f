//! Community story endpoints
//!
//! - GET /api/v1/stories, GET /api/v1/stories/{id} (public)
//! - POST /api/v1/stories, DELETE /api/v1/stories/{id} (signed in)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::api::common::ListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateStoryInput, PagedResult, Story};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stories))
        .route("/{id}", get(get_story))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_story))
        .route("/{id}", delete(delete_story))
}

async fn list_stories(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PagedResult<Story>>, ApiError> {
    let result = state
        .story_service
        .list(query.category.as_deref(), &query.params())
        .await?;
    Ok(Json(result))
}

async fn get_story(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Story>, ApiError> {
    Ok(Json(state.story_service.get(id).await?))
}

async fn create_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateStoryInput>,
) -> Result<(StatusCode, Json<Story>), ApiError> {
    let story = state.story_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(story)))
}

async fn delete_story(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.story_service.delete(&user.0, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
