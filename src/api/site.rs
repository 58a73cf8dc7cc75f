//! Public site information API
//!
//! - GET /api/v1/site/info - Site name, description, feature flags
//! - GET /api/v1/site/resources - Configured crisis lines

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::{is_demo_mode, AppState};
use crate::config::CrisisLine;
use crate::services::settings::SiteSettings;

/// Response for public site info
#[derive(Debug, Serialize)]
pub struct SiteInfoResponse {
    pub version: String,
    pub site_name: String,
    pub site_description: String,
    pub contact_email: String,
    pub chat_enabled: bool,
    pub demo_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct ResourcesResponse {
    pub crisis_lines: Vec<CrisisLine>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/info", get(get_site_info))
        .route("/resources", get(get_resources))
}

/// Falls back to defaults when settings cannot be read
async fn get_site_info(State(state): State<AppState>) -> Json<SiteInfoResponse> {
    let settings = match state.settings_service.get_site_settings().await {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Failed to load site settings: {}", e);
            SiteSettings::default()
        }
    };

    Json(SiteInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        site_name: settings.site_name,
        site_description: settings.site_description,
        contact_email: settings.contact_email,
        chat_enabled: state.chat_service.is_enabled(),
        demo_mode: is_demo_mode(),
    })
}

async fn get_resources(State(state): State<AppState>) -> Json<ResourcesResponse> {
    Json(ResourcesResponse {
        crisis_lines: state.crisis_lines.as_ref().clone(),
    })
}
