//! Mood journal service
//!
//! Private per-user entries plus the statistics shown on the journal page.

use crate::db::repositories::JournalRepository;
use crate::models::{CreateJournalEntryInput, JournalEntry, JournalStats, MAX_MOOD, MIN_MOOD};
use anyhow::Context;
use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

const MAX_CONTENT_LENGTH: usize = 20_000;

#[derive(Debug, thiserror::Error)]
pub enum JournalServiceError {
    #[error("Journal entry not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct JournalService {
    repo: Arc<dyn JournalRepository>,
}

impl JournalService {
    pub fn new(repo: Arc<dyn JournalRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(
        &self,
        user_id: i64,
        input: CreateJournalEntryInput,
    ) -> Result<JournalEntry, JournalServiceError> {
        if !(MIN_MOOD..=MAX_MOOD).contains(&input.mood) {
            return Err(JournalServiceError::ValidationError(format!(
                "mood must be between {} and {}",
                MIN_MOOD, MAX_MOOD
            )));
        }
        let content = input.content.trim();
        if content.is_empty() {
            return Err(JournalServiceError::ValidationError("content is required".to_string()));
        }
        if content.chars().count() > MAX_CONTENT_LENGTH {
            return Err(JournalServiceError::ValidationError(format!(
                "content must be at most {} characters",
                MAX_CONTENT_LENGTH
            )));
        }

        let now = Utc::now();
        let today = now.date_naive();
        let entry_date = input.entry_date.unwrap_or(today);
        if entry_date > today {
            return Err(JournalServiceError::ValidationError(
                "entry_date cannot be in the future".to_string(),
            ));
        }

        let entry = JournalEntry {
            id: 0,
            user_id,
            mood: input.mood,
            content: content.to_string(),
            entry_date,
            created_at: now,
        };
        Ok(self.repo.create(&entry).await.context("Failed to create journal entry")?)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<JournalEntry>, JournalServiceError> {
        Ok(self
            .repo
            .list_by_user(user_id)
            .await
            .context("Failed to list journal entries")?)
    }

    /// Delete one of the user's own entries
    pub async fn delete(&self, user_id: i64, id: i64) -> Result<(), JournalServiceError> {
        if !self
            .repo
            .delete(id, user_id)
            .await
            .context("Failed to delete journal entry")?
        {
            return Err(JournalServiceError::NotFound(id));
        }
        Ok(())
    }

    pub async fn stats(&self, user_id: i64) -> Result<JournalStats, JournalServiceError> {
        let entries = self.list(user_id).await?;
        Ok(compute_stats(&entries, Utc::now().date_naive()))
    }
}

/// Aggregate a user's entries as of `today`.
///
/// The current streak counts consecutive days with at least one entry,
/// ending today or yesterday; otherwise it is zero.
pub fn compute_stats(entries: &[JournalEntry], today: NaiveDate) -> JournalStats {
    let total_entries = entries.len() as i64;

    let average_mood = if entries.is_empty() {
        None
    } else {
        let sum: i64 = entries.iter().map(|e| e.mood as i64).sum();
        let mean = sum as f64 / entries.len() as f64;
        Some((mean * 10.0).round() / 10.0)
    };

    let days: BTreeSet<NaiveDate> = entries.iter().map(|e| e.entry_date).collect();

    let mut longest_streak = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest_streak = longest_streak.max(run);
        previous = Some(*day);
    }

    let yesterday = today - Duration::days(1);
    let mut current_streak = 0u32;
    let mut cursor = if days.contains(&today) {
        Some(today)
    } else if days.contains(&yesterday) {
        Some(yesterday)
    } else {
        None
    };
    while let Some(day) = cursor {
        if !days.contains(&day) {
            break;
        }
        current_streak += 1;
        cursor = day.pred_opt();
    }

    let week_start = today - Duration::days(6);
    let entries_last_7_days = entries
        .iter()
        .filter(|e| e.entry_date >= week_start && e.entry_date <= today)
        .count() as i64;

    JournalStats {
        total_entries,
        average_mood,
        current_streak,
        longest_streak,
        entries_last_7_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::session::tests::insert_user;
    use crate::db::repositories::SqlxJournalRepository;
    use crate::db::{create_test_pool, migrations};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(mood: i32, date: NaiveDate) -> JournalEntry {
        JournalEntry {
            id: 0,
            user_id: 1,
            mood,
            content: "note".to_string(),
            entry_date: date,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stats_empty() {
        let stats = compute_stats(&[], day(2024, 3, 10));
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.average_mood, None);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 0);
        assert_eq!(stats.entries_last_7_days, 0);
    }

    #[test]
    fn test_stats_streaks_and_average() {
        let today = day(2024, 3, 10);
        let entries = vec![
            entry(4, day(2024, 3, 10)),
            entry(2, day(2024, 3, 10)),
            entry(3, day(2024, 3, 9)),
            entry(5, day(2024, 3, 8)),
            // gap on the 7th
            entry(1, day(2024, 3, 1)),
            entry(1, day(2024, 3, 2)),
            entry(1, day(2024, 3, 3)),
            entry(1, day(2024, 3, 4)),
        ];
        let stats = compute_stats(&entries, today);

        assert_eq!(stats.total_entries, 8);
        assert_eq!(stats.average_mood, Some(2.3));
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 4);
        assert_eq!(stats.entries_last_7_days, 5);
    }

    #[test]
    fn test_current_streak_may_end_yesterday() {
        let today = day(2024, 3, 10);
        let entries = vec![entry(3, day(2024, 3, 9)), entry(3, day(2024, 3, 8))];
        assert_eq!(compute_stats(&entries, today).current_streak, 2);

        let stale = vec![entry(3, day(2024, 3, 7))];
        assert_eq!(compute_stats(&stale, today).current_streak, 0);
    }

    #[test]
    fn test_streak_across_month_boundary() {
        let today = day(2024, 3, 1);
        let entries = vec![entry(3, day(2024, 2, 28)), entry(3, day(2024, 2, 29)), entry(3, today)];
        let stats = compute_stats(&entries, today);
        assert_eq!(stats.current_streak, 3);
        assert_eq!(stats.longest_streak, 3);
    }

    async fn setup() -> JournalService {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        insert_user(&pool, 1).await;
        insert_user(&pool, 2).await;
        JournalService::new(SqlxJournalRepository::boxed(pool))
    }

    #[tokio::test]
    async fn test_entries_persist_and_reload() {
        let service = setup().await;
        service
            .create(
                1,
                CreateJournalEntryInput {
                    mood: 4,
                    content: "  A calmer day.  ".to_string(),
                    entry_date: None,
                },
            )
            .await
            .unwrap();

        let entries = service.list(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "A calmer day.");
        assert_eq!(entries[0].entry_date, Utc::now().date_naive());
        assert!(service.list(2).await.unwrap().is_empty());

        let stats = service.stats(1).await.unwrap();
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.average_mood, Some(4.0));
    }

    #[tokio::test]
    async fn test_mood_out_of_range_rejected() {
        let service = setup().await;
        for mood in [0, 6] {
            let err = service
                .create(
                    1,
                    CreateJournalEntryInput {
                        mood,
                        content: "x".to_string(),
                        entry_date: None,
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, JournalServiceError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn test_cannot_delete_another_users_entry() {
        let service = setup().await;
        let created = service
            .create(
                1,
                CreateJournalEntryInput {
                    mood: 3,
                    content: "mine".to_string(),
                    entry_date: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.delete(2, created.id).await.unwrap_err(),
            JournalServiceError::NotFound(_)
        ));
        service.delete(1, created.id).await.unwrap();
        assert!(service.list(1).await.unwrap().is_empty());
    }
}
