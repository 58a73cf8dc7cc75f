//! Data models
//!
//! Database entities, API input types and a few derived values shared by
//! the services and handlers.

mod journal;
mod news_post;
mod pagination;
mod password_reset;
mod session;
mod story;
mod support_message;
mod user;

pub use journal::{CreateJournalEntryInput, JournalEntry, JournalStats, MAX_MOOD, MIN_MOOD};
pub use news_post::{CreateNewsPostInput, NewsPost, UpdateNewsPostInput, DEFAULT_NEWS_CATEGORY};
pub use pagination::{ListParams, PagedResult};
pub use password_reset::PasswordReset;
pub use session::Session;
pub use story::{derive_excerpt, CreateStoryInput, Story, EXCERPT_CHARS};
pub use support_message::{
    CreateSupportMessageInput, SupportMessage, SupportStatus, UpdateSupportMessageInput,
};
pub use user::{RegisterInput, UpdateProfileInput, User, UserRole, UserStatus};
