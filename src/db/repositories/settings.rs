//! Settings repository
//!
//! Key/value site settings (site name, SMTP credentials, ...).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Every stored setting
    async fn get_all(&self) -> Result<HashMap<String, String>>;

    /// Insert or overwrite a setting
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn set_many(&self, settings: &HashMap<String, String>) -> Result<()> {
        for (key, value) in settings {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

pub struct SqlxSettingsRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingsRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingsRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SettingsRepository for SqlxSettingsRepository {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_sqlite(sqlite(&self.pool)?, key).await,
            DatabaseDriver::Mysql => get_mysql(mysql(&self.pool)?, key).await,
        }
    }

    async fn get_all(&self) -> Result<HashMap<String, String>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_all_sqlite(sqlite(&self.pool)?).await,
            DatabaseDriver::Mysql => get_all_mysql(mysql(&self.pool)?).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => set_sqlite(sqlite(&self.pool)?, key, value).await,
            DatabaseDriver::Mysql => set_mysql(mysql(&self.pool)?, key, value).await,
        }
    }
}

// SQLite implementations
async fn get_sqlite(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to read setting")?;
    Ok(row.map(|r| r.get("value")))
}

async fn get_all_sqlite(pool: &SqlitePool) -> Result<HashMap<String, String>> {
    let rows = sqlx::query("SELECT key, value FROM settings")
        .fetch_all(pool)
        .await
        .context("Failed to read settings")?;
    Ok(rows.into_iter().map(|r| (r.get("key"), r.get("value"))).collect())
}

async fn set_sqlite(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to write setting")?;
    Ok(())
}

// MySQL implementations (`key` is reserved)
async fn get_mysql(pool: &MySqlPool, key: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT value FROM settings WHERE `key` = ?")
        .bind(key)
        .fetch_optional(pool)
        .await
        .context("Failed to read setting")?;
    Ok(row.map(|r| r.get("value")))
}

async fn get_all_mysql(pool: &MySqlPool) -> Result<HashMap<String, String>> {
    let rows = sqlx::query("SELECT `key`, value FROM settings")
        .fetch_all(pool)
        .await
        .context("Failed to read settings")?;
    Ok(rows.into_iter().map(|r| (r.get("key"), r.get("value"))).collect())
}

async fn set_mysql(pool: &MySqlPool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (`key`, value) VALUES (?, ?)
         ON DUPLICATE KEY UPDATE value = VALUES(value)",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .context("Failed to write setting")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxSettingsRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxSettingsRepository::new(pool)
    }

    #[tokio::test]
    async fn test_seeded_defaults() {
        let repo = setup().await;
        assert_eq!(repo.get("site_name").await.unwrap().as_deref(), Some("HopeLine AI"));
        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let repo = setup().await;
        repo.set("smtp_host", "smtp.example.com").await.unwrap();
        repo.set("smtp_host", "mail.example.com").await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.get("smtp_host").map(String::as_str), Some("mail.example.com"));
    }

    #[tokio::test]
    async fn test_set_many() {
        let repo = setup().await;
        let mut values = HashMap::new();
        values.insert("a".to_string(), "1".to_string());
        values.insert("b".to_string(), "2".to_string());
        repo.set_many(&values).await.unwrap();

        assert_eq!(repo.get("b").await.unwrap().as_deref(), Some("2"));
    }
}
