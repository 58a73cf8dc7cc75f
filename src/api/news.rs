//! News endpoints
//!
//! Public:
//! - GET /api/v1/news - Published posts, `?category=&page=&per_page=`
//! - GET /api/v1/news/{id} - One published post
//!
//! Admin:
//! - GET|POST /api/v1/admin/news
//! - GET|PUT|DELETE /api/v1/admin/news/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::api::common::ListQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CreateNewsPostInput, NewsPost, PagedResult, UpdateNewsPostInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{id}", get(get_published))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create_post))
        .route("/{id}", get(get_any).put(update_post).delete(delete_post))
}

async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PagedResult<NewsPost>>, ApiError> {
    let result = state
        .news_service
        .list_published(query.category.as_deref(), &query.params())
        .await?;
    Ok(Json(result))
}

async fn get_published(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NewsPost>, ApiError> {
    Ok(Json(state.news_service.get_published(id).await?))
}

async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PagedResult<NewsPost>>, ApiError> {
    Ok(Json(state.news_service.list_all(&query.params()).await?))
}

async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateNewsPostInput>,
) -> Result<(StatusCode, Json<NewsPost>), ApiError> {
    let post = state.news_service.create(&user.0, body).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_any(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NewsPost>, ApiError> {
    Ok(Json(state.news_service.get_any(id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateNewsPostInput>,
) -> Result<Json<NewsPost>, ApiError> {
    Ok(Json(state.news_service.update(id, body).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.news_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
