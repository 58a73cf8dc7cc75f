//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for one table on both backends.

pub mod journal;
pub mod news_post;
pub mod password_reset;
pub mod session;
pub mod settings;
pub mod story;
pub mod support_message;
pub mod user;

pub use journal::{JournalRepository, SqlxJournalRepository};
pub use news_post::{NewsFilter, NewsPostRepository, SqlxNewsPostRepository};
pub use password_reset::{PasswordResetRepository, SqlxPasswordResetRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use settings::{SettingsRepository, SqlxSettingsRepository};
pub use story::{SqlxStoryRepository, StoryRepository};
pub use support_message::{SqlxSupportMessageRepository, SupportMessageRepository};
pub use user::{SqlxUserRepository, UserRepository};
