//! User service
//!
//! Account lifecycle for the members area and the admin CMS:
//! - registration (the first account becomes admin)
//! - email/password login with failure rate limiting, logout
//! - session validation
//! - password reset by emailed single-use token
//! - profile updates (display name, password)

use crate::db::repositories::{PasswordResetRepository, SessionRepository, UserRepository};
use crate::models::{PasswordReset, RegisterInput, Session, UpdateProfileInput, User, UserRole};
use crate::services::email::EmailService;
use crate::services::password::{
    generate_reset_token, hash_password, hash_token, is_acceptable_password, verify_password,
    MIN_PASSWORD_LENGTH,
};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Session lifetime
pub const SESSION_LIFETIME_DAYS: i64 = 7;

/// Reset token lifetime
const RESET_TOKEN_LIFETIME_HOURS: i64 = 1;

const MAX_DISPLAY_NAME_LENGTH: usize = 100;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Too many attempts, try again later")]
    RateLimited,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Login credentials
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    reset_repo: Arc<dyn PasswordResetRepository>,
    rate_limiter: Arc<LoginRateLimiter>,
    email: Arc<EmailService>,
    /// Base URL used to build reset links
    public_url: String,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        reset_repo: Arc<dyn PasswordResetRepository>,
        rate_limiter: Arc<LoginRateLimiter>,
        email: Arc<EmailService>,
        public_url: impl Into<String>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            reset_repo,
            rate_limiter,
            email,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create an account. The first account in the system is made admin.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let email = normalize_email(&input.email)?;
        let display_name = validate_display_name(&input.display_name)?;
        validate_new_password(&input.password)?;

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Member
        };

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&User::new(email, display_name, password_hash, role))
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Verify credentials and open a session.
    ///
    /// Unknown emails and wrong passwords produce the same error. Repeated
    /// failures for one email are refused with `RateLimited`.
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let email = input.email.trim().to_lowercase();

        if self.rate_limiter.is_email_limited(&email).await {
            tracing::warn!(email = %email, "Login refused: too many failures");
            return Err(UserServiceError::RateLimited);
        }

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        {
            Some(user) => user,
            None => {
                self.rate_limiter.record_failed_attempt(&email).await;
                return Err(UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
            }
        };

        if !verify_password(&input.password, &user.password_hash)? {
            self.rate_limiter.record_failed_attempt(&email).await;
            return Err(UserServiceError::AuthenticationError(INVALID_CREDENTIALS.to_string()));
        }

        if user.is_banned() {
            return Err(UserServiceError::AuthenticationError(
                "This account has been suspended".to_string(),
            ));
        }

        self.rate_limiter.clear_email(&email).await;

        let session = self
            .session_repo
            .create(&Session::start(user.id, Duration::days(SESSION_LIFETIME_DAYS)))
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok((session, user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are deleted and yield `None`, as do sessions of
    /// banned users.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(session) => session,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user.filter(|u| !u.is_banned()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user")?)
    }

    pub async fn count(&self) -> Result<i64, UserServiceError> {
        Ok(self.user_repo.count().await.context("Failed to count users")?)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        Ok(self.count().await? == 0)
    }

    /// Start a password reset.
    ///
    /// Always succeeds for well-formed emails so callers cannot probe which
    /// addresses have accounts. Mail delivery failures are only logged.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), UserServiceError> {
        let email = normalize_email(email)?;

        let user = match self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up user")?
        {
            Some(user) if !user.is_banned() => user,
            _ => {
                tracing::debug!("Password reset requested for unknown account");
                return Ok(());
            }
        };

        let token = generate_reset_token();
        let now = Utc::now();
        self.reset_repo
            .create(&PasswordReset {
                token_hash: hash_token(&token),
                user_id: user.id,
                expires_at: now + Duration::hours(RESET_TOKEN_LIFETIME_HOURS),
                used: false,
                created_at: now,
            })
            .await
            .context("Failed to store reset token")?;

        let reset_url = format!(
            "{}/reset-password?token={}",
            self.public_url,
            urlencoding::encode(&token)
        );
        if let Err(e) = self
            .email
            .send_password_reset(&user.email, &user.display_name, &reset_url)
            .await
        {
            tracing::error!(user_id = user.id, "Failed to send password reset email: {:#}", e);
        } else {
            tracing::info!(user_id = user.id, "Password reset email sent");
        }

        Ok(())
    }

    /// Redeem a reset token: set the new password and revoke every session
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), UserServiceError> {
        validate_new_password(new_password)?;

        let token_hash = hash_token(token.trim());
        let reset = self
            .reset_repo
            .get_by_hash(&token_hash)
            .await
            .context("Failed to look up reset token")?
            .filter(PasswordReset::is_redeemable)
            .ok_or(UserServiceError::InvalidResetToken)?;

        if !self
            .reset_repo
            .mark_used(&token_hash)
            .await
            .context("Failed to consume reset token")?
        {
            return Err(UserServiceError::InvalidResetToken);
        }

        let mut user = self
            .user_repo
            .get_by_id(reset.user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::InvalidResetToken)?;

        user.password_hash = hash_password(new_password)?;
        self.user_repo.update(&user).await.context("Failed to update password")?;
        let revoked = self
            .session_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to revoke sessions")?;

        tracing::info!(user_id = user.id, revoked, "Password reset completed");
        Ok(())
    }

    /// Update display name and/or password.
    ///
    /// Changing the password requires the current one.
    pub async fn update_profile(
        &self,
        mut user: User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        if let Some(name) = input.display_name.as_deref() {
            user.display_name = validate_display_name(name)?;
        }

        if let Some(new_password) = input.new_password.as_deref() {
            let current = input.current_password.as_deref().ok_or_else(|| {
                UserServiceError::ValidationError("Current password is required".to_string())
            })?;
            if !verify_password(current, &user.password_hash)? {
                return Err(UserServiceError::AuthenticationError(
                    "Current password is incorrect".to_string(),
                ));
            }
            validate_new_password(new_password)?;
            user.password_hash = hash_password(new_password)?;
        }

        Ok(self.user_repo.update(&user).await.context("Failed to update user")?)
    }

    /// Delete expired sessions and spent reset tokens
    pub async fn cleanup_expired(&self) -> Result<u64, UserServiceError> {
        let sessions = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        let tokens = self
            .reset_repo
            .delete_stale()
            .await
            .context("Failed to delete stale reset tokens")?;
        Ok(sessions + tokens)
    }
}

/// Trim and lowercase an email, rejecting obviously malformed ones
pub fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 255 {
        return Err(UserServiceError::ValidationError("Invalid email address".to_string()));
    }
    Ok(email)
}

fn validate_display_name(name: &str) -> Result<String, UserServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(UserServiceError::ValidationError("Display name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Display name must be at most {} characters",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }
    Ok(name.to_string())
}

fn validate_new_password(password: &str) -> Result<(), UserServiceError> {
    if !is_acceptable_password(password) {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxPasswordResetRepository, SqlxSessionRepository, SqlxSettingsRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::services::email::testing::RecordingMailer;
    use crate::services::settings::SettingsService;

    pub(crate) struct Harness {
        pub pool: DynDatabasePool,
        pub service: UserService,
        pub mailer: Arc<RecordingMailer>,
    }

    pub(crate) async fn harness() -> Harness {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool).await.expect("Failed to run migrations");

        let settings = Arc::new(SettingsService::new(SqlxSettingsRepository::boxed(pool.clone())));
        let mailer = Arc::new(RecordingMailer::default());
        let email = Arc::new(EmailService::new(mailer.clone(), settings).unwrap());
        let service = UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxPasswordResetRepository::boxed(pool.clone()),
            Arc::new(LoginRateLimiter::new()),
            email,
            "http://localhost:8080/",
        );
        Harness { pool, service, mailer }
    }

    fn register_input(email: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: "password123".to_string(),
            display_name: "Hawa".to_string(),
        }
    }

    fn login_input(email: &str, password: &str) -> LoginInput {
        LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    /// Pull the token out of the last reset email
    async fn last_reset_token(mailer: &RecordingMailer) -> String {
        let sent = mailer.sent.lock().await;
        let body = &sent.last().expect("no email sent").body;
        let start = body.find("token=").expect("no token in email") + "token=".len();
        body[start..].split_whitespace().next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let h = harness().await;
        let first = h.service.register(register_input("first@example.com")).await.unwrap();
        let second = h.service.register(register_input("second@example.com")).await.unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::Member);
    }

    #[tokio::test]
    async fn test_register_normalizes_email_and_rejects_duplicates() {
        let h = harness().await;
        let user = h.service.register(register_input("  Hawa@Example.COM ")).await.unwrap();
        assert_eq!(user.email, "hawa@example.com");

        let err = h.service.register(register_input("hawa@example.com")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::UserExists(_)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let h = harness().await;

        let mut short = register_input("a@example.com");
        short.password = "short".to_string();
        assert!(matches!(
            h.service.register(short).await.unwrap_err(),
            UserServiceError::ValidationError(_)
        ));

        assert!(matches!(
            h.service.register(register_input("not-an-email")).await.unwrap_err(),
            UserServiceError::ValidationError(_)
        ));

        let mut blank = register_input("b@example.com");
        blank.display_name = "   ".to_string();
        assert!(h.service.register(blank).await.is_err());
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let h = harness().await;
        let user = h.service.register(register_input("login@example.com")).await.unwrap();

        let (session, logged_in) = h
            .service
            .login(login_input("LOGIN@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let validated = h.service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(validated.id, user.id);

        h.service.logout(&session.id).await.unwrap();
        assert!(h.service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let h = harness().await;
        h.service.register(register_input("wrong@example.com")).await.unwrap();

        let err = h.service.login(login_input("wrong@example.com", "nope-nope")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::AuthenticationError(_)));

        let unknown = h.service.login(login_input("ghost@example.com", "password123")).await.unwrap_err();
        assert_eq!(err.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_failures() {
        let h = harness().await;
        h.service.register(register_input("limit@example.com")).await.unwrap();

        for _ in 0..5 {
            let _ = h.service.login(login_input("limit@example.com", "bad-password")).await;
        }
        let err = h.service.login(login_input("limit@example.com", "password123")).await.unwrap_err();
        assert!(matches!(err, UserServiceError::RateLimited));
    }

    #[tokio::test]
    async fn test_password_reset_flow_is_single_use() {
        let h = harness().await;
        h.service.register(register_input("reset@example.com")).await.unwrap();
        let (old_session, _) = h
            .service
            .login(login_input("reset@example.com", "password123"))
            .await
            .unwrap();

        h.service.request_password_reset("reset@example.com").await.unwrap();
        let token = last_reset_token(&h.mailer).await;

        h.service.reset_password(&token, "new-password-1").await.unwrap();

        // old sessions revoked, new password works, old one does not
        assert!(h.service.validate_session(&old_session.id).await.unwrap().is_none());
        assert!(h.service.login(login_input("reset@example.com", "new-password-1")).await.is_ok());
        assert!(h.service.login(login_input("reset@example.com", "password123")).await.is_err());

        let err = h.service.reset_password(&token, "another-password").await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidResetToken));
    }

    #[tokio::test]
    async fn test_reset_token_stored_only_as_hash() {
        let h = harness().await;
        h.service.register(register_input("hash@example.com")).await.unwrap();
        h.service.request_password_reset("hash@example.com").await.unwrap();
        let token = last_reset_token(&h.mailer).await;

        let stored: Vec<String> = sqlx::query_scalar("SELECT token_hash FROM password_resets")
            .fetch_all(crate::db::pool::sqlite(&h.pool).unwrap())
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].len(), 64);
        assert_ne!(stored[0], token);
    }

    #[tokio::test]
    async fn test_reset_request_for_unknown_email_is_silent() {
        let h = harness().await;
        h.service.request_password_reset("nobody@example.com").await.unwrap();
        assert!(h.mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_reset_with_bogus_token() {
        let h = harness().await;
        let err = h.service.reset_password("bogus", "new-password-1").await.unwrap_err();
        assert!(matches!(err, UserServiceError::InvalidResetToken));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let h = harness().await;
        let user = h.service.register(register_input("profile@example.com")).await.unwrap();

        let renamed = h
            .service
            .update_profile(
                user.clone(),
                UpdateProfileInput {
                    display_name: Some("Hawa B.".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.display_name, "Hawa B.");

        let missing_current = h
            .service
            .update_profile(
                renamed.clone(),
                UpdateProfileInput {
                    new_password: Some("brand-new-pass".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(missing_current, UserServiceError::ValidationError(_)));

        let wrong_current = h
            .service
            .update_profile(
                renamed.clone(),
                UpdateProfileInput {
                    current_password: Some("not-it-at-all".to_string()),
                    new_password: Some("brand-new-pass".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(wrong_current, UserServiceError::AuthenticationError(_)));

        h.service
            .update_profile(
                renamed,
                UpdateProfileInput {
                    current_password: Some("password123".to_string()),
                    new_password: Some("brand-new-pass".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(h.service.login(login_input("profile@example.com", "brand-new-pass")).await.is_ok());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" A@B.org ").unwrap(), "a@b.org");
        assert!(normalize_email("@b.org").is_err());
        assert!(normalize_email("a@").is_err());
        assert!(normalize_email("a b@c.org").is_err());
        assert!(normalize_email("a@b@c").is_err());
    }
}
