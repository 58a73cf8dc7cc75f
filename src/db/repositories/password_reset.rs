//! Password reset token repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::PasswordReset;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    async fn create(&self, reset: &PasswordReset) -> Result<()>;

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>>;

    /// Mark a token used. Returns false when it was already used.
    async fn mark_used(&self, token_hash: &str) -> Result<bool>;

    /// Drop expired or used tokens
    async fn delete_stale(&self) -> Result<u64>;
}

pub struct SqlxPasswordResetRepository {
    pool: DynDatabasePool,
}

impl SqlxPasswordResetRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PasswordResetRepository> {
        Arc::new(Self::new(pool))
    }
}

const INSERT_SQL: &str =
    "INSERT INTO password_resets (token_hash, user_id, expires_at, used, created_at) VALUES (?, ?, ?, ?, ?)";
const SELECT_SQL: &str =
    "SELECT token_hash, user_id, expires_at, used, created_at FROM password_resets WHERE token_hash = ?";
const MARK_USED_SQL: &str =
    "UPDATE password_resets SET used = ? WHERE token_hash = ? AND used = ?";
const DELETE_STALE_SQL: &str = "DELETE FROM password_resets WHERE used = ? OR expires_at < ?";

#[async_trait]
impl PasswordResetRepository for SqlxPasswordResetRepository {
    async fn create(&self, reset: &PasswordReset) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(INSERT_SQL)
                    .bind(&reset.token_hash)
                    .bind(reset.user_id)
                    .bind(reset.expires_at)
                    .bind(reset.used)
                    .bind(reset.created_at)
                    .execute(sqlite(&self.pool)?)
                    .await
                    .context("Failed to store password reset")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(INSERT_SQL)
                    .bind(&reset.token_hash)
                    .bind(reset.user_id)
                    .bind(reset.expires_at)
                    .bind(reset.used)
                    .bind(reset.created_at)
                    .execute(mysql(&self.pool)?)
                    .await
                    .context("Failed to store password reset")?;
            }
        }
        Ok(())
    }

    async fn get_by_hash(&self, token_hash: &str) -> Result<Option<PasswordReset>> {
        let reset = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(SELECT_SQL)
                .bind(token_hash)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get password reset")?
                .map(|row| PasswordReset {
                    token_hash: row.get("token_hash"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    used: row.get("used"),
                    created_at: row.get("created_at"),
                }),
            DatabaseDriver::Mysql => sqlx::query(SELECT_SQL)
                .bind(token_hash)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get password reset")?
                .map(|row| PasswordReset {
                    token_hash: row.get("token_hash"),
                    user_id: row.get("user_id"),
                    expires_at: row.get("expires_at"),
                    used: row.get("used"),
                    created_at: row.get("created_at"),
                }),
        };
        Ok(reset)
    }

    async fn mark_used(&self, token_hash: &str) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(MARK_USED_SQL)
                .bind(true)
                .bind(token_hash)
                .bind(false)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to mark password reset used")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(MARK_USED_SQL)
                .bind(true)
                .bind(token_hash)
                .bind(false)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to mark password reset used")?
                .rows_affected(),
        };
        Ok(affected == 1)
    }

    async fn delete_stale(&self) -> Result<u64> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(DELETE_STALE_SQL)
                .bind(true)
                .bind(now)
                .execute(sqlite(&self.pool)?)
                .await?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(DELETE_STALE_SQL)
                .bind(true)
                .bind(now)
                .execute(mysql(&self.pool)?)
                .await?
                .rows_affected(),
        };
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::session::tests::insert_user;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> SqlxPasswordResetRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        insert_user(&pool, 1).await;
        SqlxPasswordResetRepository::new(pool)
    }

    fn reset(hash: &str, expires_in: Duration) -> PasswordReset {
        let now = Utc::now();
        PasswordReset {
            token_hash: hash.to_string(),
            user_id: 1,
            expires_at: now + expires_in,
            used: false,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_mark_used_only_once() {
        let repo = setup().await;
        repo.create(&reset("h1", Duration::hours(1))).await.unwrap();

        assert!(repo.mark_used("h1").await.unwrap());
        assert!(!repo.mark_used("h1").await.unwrap());

        let stored = repo.get_by_hash("h1").await.unwrap().unwrap();
        assert!(stored.used);
        assert!(!stored.is_redeemable());
    }

    #[tokio::test]
    async fn test_delete_stale() {
        let repo = setup().await;
        repo.create(&reset("expired", Duration::hours(-2))).await.unwrap();
        repo.create(&reset("fresh", Duration::hours(1))).await.unwrap();

        assert_eq!(repo.delete_stale().await.unwrap(), 1);
        assert!(repo.get_by_hash("expired").await.unwrap().is_none());
        assert!(repo.get_by_hash("fresh").await.unwrap().is_some());
    }
}
