//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Create an account and sign in
//! - POST /api/v1/auth/login - Email/password login
//! - POST /api/v1/auth/forgot-password - Email a reset link
//! - POST /api/v1/auth/reset-password - Redeem a reset token
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update display name and/or password

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{clear_session_cookie, session_cookie};
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser, ClientIp};
use crate::models::{RegisterInput, Session, UpdateProfileInput, User};
use crate::services::user::{LoginInput, SESSION_LIFETIME_DAYS};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: String,
}

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub status: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role.to_string(),
            status: user.status.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Generic acknowledgement
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
}

fn session_response(session: Session, user: User) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let cookie = session_cookie(&session.id, SESSION_LIFETIME_DAYS * 24 * 60 * 60);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );

    Ok((
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
            expires_at: session.expires_at.to_rfc3339(),
        }),
    ))
}

/// Refuse the request when this address is over its limit, else count it
async fn check_ip(state: &AppState, ip: ClientIp) -> Result<(), ApiError> {
    if let ClientIp(Some(ip)) = ip {
        if state.rate_limiter.is_ip_limited(ip).await {
            tracing::warn!(%ip, "Auth request refused: IP rate limit");
            return Err(ApiError::rate_limited("Too many requests, slow down", 60));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }
    Ok(())
}

/// POST /api/v1/auth/register
///
/// The first account becomes admin. Signs the new user in.
async fn register(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    check_ip(&state, ip).await?;

    let email = body.email.clone();
    let password = body.password.clone();
    state.user_service.register(body).await?;

    let (session, user) = state
        .user_service
        .login(LoginInput { email, password })
        .await?;

    let (headers, json) = session_response(session, user)?;
    Ok((StatusCode::CREATED, headers, json))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    check_ip(&state, ip).await?;

    let (session, user) = state.user_service.login(body).await?;
    session_response(session, user)
}

/// POST /api/v1/auth/forgot-password
///
/// Always answers the same way whether or not the account exists.
async fn forgot_password(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    check_ip(&state, ip).await?;
    state.user_service.request_password_reset(&body.email).await?;

    Ok(Json(MessageResponse {
        message: "If an account exists for that email, a reset link has been sent".to_string(),
    }))
}

/// POST /api/v1/auth/reset-password
async fn reset_password(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    check_ip(&state, ip).await?;
    state
        .user_service
        .reset_password(&body.token, &body.password)
        .await?;

    Ok(Json(MessageResponse {
        message: "Password updated, please sign in".to_string(),
    }))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&clear_session_cookie()).map_err(ApiError::internal)?,
    );
    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// GET /api/v1/auth/me
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0, body).await?;
    Ok(Json(updated.into()))
}
