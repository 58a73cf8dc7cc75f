//! Chat endpoint
//!
//! `POST /api/gemini-chat` answers with a `text/plain` body of `0:` frames.
//! Failures before the first byte are JSON errors; later ones arrive as a
//! `3:` frame.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::StreamExt;

use crate::api::middleware::{ApiError, AppState};
use crate::chat::ChatRequest;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/gemini-chat", post(chat))
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    tracing::debug!(turns = body.messages.len(), "Chat request");
    let frames = state.chat_service.stream_frames(body.messages).await?;
    let body = Body::from_stream(frames.map(Ok::<_, std::convert::Infallible>));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
