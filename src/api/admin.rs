//! Admin API endpoints
//!
//! - GET /api/v1/admin/dashboard - Counts for the dashboard cards and database health
//! - GET /api/v1/admin/settings - All settings, SMTP password masked
//! - PUT /api/v1/admin/settings - Update settings
//! - POST /api/v1/admin/settings/test-email - Send an SMTP test email
//!
//! Support tickets and news have their own admin routers.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::config::DatabaseDriver;

/// Response for dashboard stats
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    /// Ticket count per status
    pub support_messages: BTreeMap<String, i64>,
    pub total_news: i64,
    pub published_news: i64,
    pub total_stories: i64,
    pub total_users: i64,
    pub cache_entries: u64,
    pub database: DatabaseStatus,
}

#[derive(Debug, Serialize)]
pub struct DatabaseStatus {
    pub driver: DatabaseDriver,
    pub healthy: bool,
}

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    /// Defaults to the signed-in admin's address
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestEmailResponse {
    pub sent_to: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/test-email", post(send_test_email))
}

async fn get_dashboard(State(state): State<AppState>) -> Result<Json<DashboardResponse>, ApiError> {
    let support_messages = state.support_service.counts().await?;
    let (total_news, published_news) = state.news_service.counts().await?;
    let total_stories = state.story_service.count().await?;
    let total_users = state.user_service.count().await?;

    let healthy = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Database ping failed: {:#}", e);
            false
        }
    };

    Ok(Json(DashboardResponse {
        support_messages,
        total_news,
        published_news,
        total_stories,
        total_users,
        cache_entries: state.cache.entry_count(),
        database: DatabaseStatus {
            driver: state.pool.driver(),
            healthy,
        },
    }))
}

async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    Ok(Json(state.settings_service.get_admin_settings().await?))
}

async fn update_settings(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<HashMap<String, String>>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let keys: Vec<String> = body.keys().cloned().collect();
    state.settings_service.update_settings(body).await?;
    tracing::info!(user_id = user.0.id, ?keys, "Settings updated");

    Ok(Json(state.settings_service.get_admin_settings().await?))
}

async fn send_test_email(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<TestEmailRequest>,
) -> Result<Json<TestEmailResponse>, ApiError> {
    let to = body
        .to
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or(user.0.email);

    state.email_service.send_test_email(&to).await.map_err(|e| {
        tracing::warn!("Test email failed: {:#}", e);
        ApiError::upstream_error(format!("Failed to send test email: {}", e))
    })?;

    Ok(Json(TestEmailResponse { sent_to: to }))
}
