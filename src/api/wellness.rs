//! Wellness tool endpoints
//!
//! - GET /api/v1/wellness/breathing - Timer state after `elapsed` seconds
//! - GET /api/v1/wellness/pose - Simulated pose frame at `t` seconds

use axum::{extract::Query, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::services::breathing::{BreathingPattern, BreathingPhase, BreathingTimer};
use crate::services::pose::{frame_at, PoseFrame};

/// Longest simulated session, one hour
const MAX_ELAPSED_SECS: u32 = 3600;

#[derive(Debug, Deserialize)]
pub struct BreathingQuery {
    pub inhale: Option<u32>,
    pub hold: Option<u32>,
    pub exhale: Option<u32>,
    #[serde(default)]
    pub elapsed: u32,
}

#[derive(Debug, Serialize)]
pub struct BreathingResponse {
    pub pattern: BreathingPattern,
    pub phase: BreathingPhase,
    pub prompt: &'static str,
    pub remaining: u32,
    pub cycles: u32,
}

#[derive(Debug, Deserialize)]
pub struct PoseQuery {
    pub t: Option<f64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/breathing", get(breathing))
        .route("/pose", get(pose))
}

async fn breathing(Query(query): Query<BreathingQuery>) -> Result<Json<BreathingResponse>, ApiError> {
    if query.elapsed > MAX_ELAPSED_SECS {
        return Err(ApiError::validation_error(format!(
            "elapsed must be at most {} seconds",
            MAX_ELAPSED_SECS
        )));
    }

    let defaults = BreathingPattern::default();
    let pattern = BreathingPattern::new(
        query.inhale.unwrap_or(defaults.inhale),
        query.hold.unwrap_or(defaults.hold),
        query.exhale.unwrap_or(defaults.exhale),
    );

    let mut timer = BreathingTimer::new(pattern);
    timer.toggle();
    for _ in 0..query.elapsed {
        timer.tick();
    }

    Ok(Json(BreathingResponse {
        pattern: timer.pattern(),
        phase: timer.phase(),
        prompt: timer.phase().prompt(),
        remaining: timer.remaining(),
        cycles: timer.cycles(),
    }))
}

async fn pose(Query(query): Query<PoseQuery>) -> Json<PoseFrame> {
    let t = query.t.unwrap_or_else(|| {
        let now = chrono::Utc::now();
        now.timestamp() as f64 + now.timestamp_subsec_millis() as f64 / 1000.0
    });
    Json(frame_at(t))
}
