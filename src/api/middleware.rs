//! API middleware
//!
//! Contains:
//! - `AppState`, the shared services handed to every handler
//! - `ApiError`, the JSON error envelope and its status mapping
//! - Authentication (session token from bearer header or cookie)
//! - Authorization (admin routes)
//! - Client IP resolution for rate limiting

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::cache::{create_cache, Cache};
use crate::chat::{ChatError, ChatService};
use crate::config::{Config, CrisisLine};
use crate::db::repositories::{
    SqlxJournalRepository, SqlxNewsPostRepository, SqlxPasswordResetRepository,
    SqlxSessionRepository, SqlxSettingsRepository, SqlxStoryRepository,
    SqlxSupportMessageRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    ContactService, EmailService, JournalService, JournalServiceError, LoginRateLimiter, Mailer,
    NewsService, NewsServiceError, SettingsService, SettingsServiceError, SmtpMailer,
    StoryService, StoryServiceError, SupportService, SupportServiceError, UserService,
    UserServiceError,
};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub cache: Arc<Cache>,
    pub user_service: Arc<UserService>,
    pub settings_service: Arc<SettingsService>,
    pub email_service: Arc<EmailService>,
    pub support_service: Arc<SupportService>,
    pub news_service: Arc<NewsService>,
    pub story_service: Arc<StoryService>,
    pub journal_service: Arc<JournalService>,
    pub contact_service: Arc<ContactService>,
    pub chat_service: Arc<ChatService>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub crisis_lines: Arc<Vec<CrisisLine>>,
    /// Forwarded client address headers are honoured only when set
    pub trust_proxy: bool,
}

impl AppState {
    /// Wire repositories and services over one pool.
    ///
    /// `mailer` defaults to SMTP with the credentials stored in settings.
    pub fn new(
        pool: DynDatabasePool,
        config: &Config,
        mailer: Option<Arc<dyn Mailer>>,
        chat_service: ChatService,
    ) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let rate_limiter = Arc::new(LoginRateLimiter::new());

        let settings_service = Arc::new(SettingsService::new(SqlxSettingsRepository::boxed(pool.clone())));
        let mailer = mailer.unwrap_or_else(|| Arc::new(SmtpMailer::new(settings_service.clone())));
        let email_service = Arc::new(EmailService::new(mailer, settings_service.clone())?);

        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            rate_limiter.clone(),
            email_service.clone(),
            config.server.public_url.clone(),
        ));

        Ok(Self {
            cache: cache.clone(),
            user_service,
            settings_service,
            support_service: Arc::new(SupportService::new(SqlxSupportMessageRepository::boxed(pool.clone()))),
            news_service: Arc::new(NewsService::new(SqlxNewsPostRepository::boxed(pool.clone()), cache)),
            story_service: Arc::new(StoryService::new(SqlxStoryRepository::boxed(pool.clone()))),
            journal_service: Arc::new(JournalService::new(SqlxJournalRepository::boxed(pool.clone()))),
            contact_service: Arc::new(ContactService::new(
                email_service.clone(),
                config.contact.notify_email.clone(),
            )),
            email_service,
            chat_service: Arc::new(chat_service),
            rate_limiter,
            crisis_lines: Arc::new(config.resources.crisis_lines.clone()),
            trust_proxy: config.server.trust_proxy,
            pool,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>, retry_after_secs: u64) -> Self {
        Self::with_details(
            "RATE_LIMITED",
            message,
            serde_json::json!({ "retry_after": retry_after_secs }),
        )
    }

    pub fn upstream_error(message: impl Into<String>) -> Self {
        Self::new("UPSTREAM_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", cause);
        Self::internal_error("Something went wrong, please try again later")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
            "SERVICE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

// ============================================================================
// Service error mapping
// ============================================================================

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::RateLimited => {
                ApiError::rate_limited("Too many failed attempts, try again in 15 minutes", 900)
            }
            UserServiceError::InvalidResetToken => ApiError::validation_error(e.to_string()),
            UserServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<SupportServiceError> for ApiError {
    fn from(e: SupportServiceError) -> Self {
        match e {
            SupportServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            SupportServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            SupportServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<NewsServiceError> for ApiError {
    fn from(e: NewsServiceError) -> Self {
        match e {
            NewsServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            NewsServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            NewsServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<StoryServiceError> for ApiError {
    fn from(e: StoryServiceError) -> Self {
        match e {
            StoryServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            StoryServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            StoryServiceError::Forbidden => ApiError::forbidden(e.to_string()),
            StoryServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<JournalServiceError> for ApiError {
    fn from(e: JournalServiceError) -> Self {
        match e {
            JournalServiceError::NotFound(_) => ApiError::not_found(e.to_string()),
            JournalServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            JournalServiceError::InternalError(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<SettingsServiceError> for ApiError {
    fn from(e: SettingsServiceError) -> Self {
        match e {
            SettingsServiceError::UnknownKey(_) | SettingsServiceError::InvalidValue(_) => {
                ApiError::validation_error(e.to_string())
            }
            SettingsServiceError::Internal(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::EmptyConversation => ApiError::validation_error(e.to_string()),
            ChatError::Disabled => ApiError::new("SERVICE_UNAVAILABLE", e.to_string()),
            ChatError::Upstream(detail) => {
                tracing::warn!("Chat provider error: {}", detail);
                ApiError::upstream_error("The assistant is unavailable right now")
            }
            ChatError::Internal(e) => ApiError::internal(format!("{:#}", e)),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Session token from `Authorization: Bearer` or the session cookie.
/// The header wins when both are present.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|s| s.split(';'))
        .filter_map(|c| c.trim().strip_prefix("session="))
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware; runs after `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Demo builds refuse writes to admin routes
pub async fn demo_guard(request: Request, next: Next) -> Result<Response, ApiError> {
    if is_demo_mode()
        && request.method() != Method::GET
        && request.uri().path().starts_with("/api/v1/admin")
    {
        return Err(ApiError::forbidden("Changes are disabled in the demo"));
    }
    Ok(next.run(request).await)
}

pub fn is_demo_mode() -> bool {
    cfg!(feature = "demo")
}

// ============================================================================
// Client address
// ============================================================================

/// Client address. With `trust_proxy` the first `X-Forwarded-For` hop wins,
/// then `X-Real-IP`; otherwise only the socket peer counts, since clients can
/// set those headers to anything.
pub fn client_ip(
    headers: &HeaderMap,
    peer: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .and_then(|ip| ip.trim().parse().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    peer.map(|ConnectInfo(addr)| addr.ip())
}

/// Extractor wrapper around [`client_ip`]
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>();
        Ok(ClientIp(client_ip(&parts.headers, peer, state.trust_proxy)))
    }
}
