//! Community story model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the derived excerpt, in characters
pub const EXCERPT_CHARS: usize = 160;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub category: String,
    pub title: String,
    pub excerpt: String,
    pub content: String,
    pub author_name: String,
    pub image_url: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateStoryInput {
    pub category: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Defaults to the author's display name
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// First `EXCERPT_CHARS` characters of `content`, whitespace-trimmed,
/// with an ellipsis when truncated
pub fn derive_excerpt(content: &str) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() <= EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(EXCERPT_CHARS).collect();
    format!("{}…", cut.trim_end())
}
