//! Services layer - Business logic
//!
//! Services own validation and business rules, and coordinate repositories,
//! the cache and outgoing email. Handlers in `api` stay thin.

pub mod breathing;
pub mod contact;
pub mod email;
pub mod journal;
pub mod markdown;
pub mod news;
pub mod password;
pub mod pose;
pub mod rate_limiter;
pub mod settings;
pub mod story;
pub mod support;
pub mod user;

pub use breathing::{BreathingPattern, BreathingPhase, BreathingTimer};
pub use contact::{ContactError, ContactService, ContactSubmission};
pub use email::{EmailService, Mailer, SmtpMailer};
pub use journal::{compute_stats, JournalService, JournalServiceError};
pub use markdown::MarkdownRenderer;
pub use news::{NewsService, NewsServiceError};
pub use password::{hash_password, verify_password};
pub use pose::{frame_at, Keypoint, PoseFrame};
pub use rate_limiter::LoginRateLimiter;
pub use settings::{SettingsService, SettingsServiceError, SiteSettings, SmtpSettings};
pub use story::{StoryService, StoryServiceError};
pub use support::{SupportService, SupportServiceError};
pub use user::{LoginInput, UserService, UserServiceError};
