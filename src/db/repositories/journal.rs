//! Journal entry repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::JournalEntry;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const SELECT_BY_USER: &str = "SELECT id, user_id, mood, content, entry_date, created_at FROM journal_entries WHERE user_id = ? ORDER BY entry_date DESC, id DESC";

#[async_trait]
pub trait JournalRepository: Send + Sync {
    async fn create(&self, entry: &JournalEntry) -> Result<JournalEntry>;

    /// All entries of a user, most recent day first
    async fn list_by_user(&self, user_id: i64) -> Result<Vec<JournalEntry>>;

    /// Delete an entry owned by `user_id`; false when no such entry
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool>;
}

pub struct SqlxJournalRepository {
    pool: DynDatabasePool,
}

impl SqlxJournalRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn JournalRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl JournalRepository for SqlxJournalRepository {
    async fn create(&self, entry: &JournalEntry) -> Result<JournalEntry> {
        let sql = "INSERT INTO journal_entries (user_id, mood, content, entry_date, created_at) VALUES (?, ?, ?, ?, ?)";
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(entry.user_id)
                .bind(entry.mood)
                .bind(&entry.content)
                .bind(entry.entry_date)
                .bind(now)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to create journal entry")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(entry.user_id)
                .bind(entry.mood)
                .bind(&entry.content)
                .bind(entry.entry_date)
                .bind(now)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to create journal entry")?
                .last_insert_id() as i64,
        };

        Ok(JournalEntry {
            id,
            created_at: now,
            ..entry.clone()
        })
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<JournalEntry>> {
        let entries = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SELECT_BY_USER)
                .bind(user_id)
                .fetch_all(sqlite(&self.pool)?)
                .await
                .context("Failed to list journal entries")?
                .into_iter()
                .map(|row| JournalEntry {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    mood: row.get("mood"),
                    content: row.get("content"),
                    entry_date: row.get("entry_date"),
                    created_at: row.get("created_at"),
                })
                .collect(),
            DatabaseDriver::Mysql => sqlx::query(SELECT_BY_USER)
                .bind(user_id)
                .fetch_all(mysql(&self.pool)?)
                .await
                .context("Failed to list journal entries")?
                .into_iter()
                .map(|row| JournalEntry {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    mood: row.get("mood"),
                    content: row.get("content"),
                    entry_date: row.get("entry_date"),
                    created_at: row.get("created_at"),
                })
                .collect(),
        };
        Ok(entries)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM journal_entries WHERE id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete journal entry")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete journal entry")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::session::tests::insert_user;
    use crate::db::{create_test_pool, migrations};
    use chrono::NaiveDate;

    async fn setup() -> SqlxJournalRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        insert_user(&pool, 1).await;
        insert_user(&pool, 2).await;
        SqlxJournalRepository::new(pool)
    }

    fn entry(user_id: i64, day: u32, mood: i32) -> JournalEntry {
        JournalEntry {
            id: 0,
            user_id,
            mood,
            content: format!("day {}", day),
            entry_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_entries_persist_and_reload() {
        let repo = setup().await;
        repo.create(&entry(1, 1, 3)).await.unwrap();
        repo.create(&entry(1, 3, 5)).await.unwrap();
        repo.create(&entry(2, 2, 1)).await.unwrap();

        let entries = repo.list_by_user(1).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry_date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
        assert_eq!(entries[0].mood, 5);
        assert_eq!(entries[1].content, "day 1");
    }

    #[tokio::test]
    async fn test_delete_requires_owner() {
        let repo = setup().await;
        let created = repo.create(&entry(1, 1, 3)).await.unwrap();

        assert!(!repo.delete(created.id, 2).await.unwrap());
        assert!(repo.delete(created.id, 1).await.unwrap());
        assert!(repo.list_by_user(1).await.unwrap().is_empty());
    }
}
