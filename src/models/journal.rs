//! Journal entry model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const MIN_MOOD: i32 = 1;
pub const MAX_MOOD: i32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: i64,
    /// 1 (very low) to 5 (great)
    pub mood: i32,
    pub content: String,
    pub entry_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJournalEntryInput {
    pub mood: i32,
    pub content: String,
    /// Defaults to today (UTC)
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
}

/// Aggregate figures shown on the journal page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalStats {
    pub total_entries: i64,
    /// Mean mood rounded to one decimal; `None` without entries
    pub average_mood: Option<f64>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub entries_last_7_days: i64,
}
