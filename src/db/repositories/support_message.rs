//! Support message repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, SupportMessage, SupportStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const COLUMNS: &str =
    "id, name, email, subject, message, status, admin_response, created_at, updated_at";

#[async_trait]
pub trait SupportMessageRepository: Send + Sync {
    async fn create(&self, message: &SupportMessage) -> Result<SupportMessage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<SupportMessage>>;

    /// Newest first, optionally restricted to one status
    async fn list(
        &self,
        status: Option<SupportStatus>,
        params: &ListParams,
    ) -> Result<(Vec<SupportMessage>, i64)>;

    /// Persist status and admin response
    async fn update(&self, message: &SupportMessage) -> Result<SupportMessage>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Number of messages with the given status
    async fn count_by_status(&self, status: SupportStatus) -> Result<i64>;
}

pub struct SqlxSupportMessageRepository {
    pool: DynDatabasePool,
}

impl SqlxSupportMessageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SupportMessageRepository> {
        Arc::new(Self::new(pool))
    }
}

fn where_clause(status: Option<SupportStatus>) -> &'static str {
    if status.is_some() {
        " WHERE status = ?"
    } else {
        ""
    }
}

#[async_trait]
impl SupportMessageRepository for SqlxSupportMessageRepository {
    async fn create(&self, message: &SupportMessage) -> Result<SupportMessage> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite(&self.pool)?, message).await,
            DatabaseDriver::Mysql => create_mysql(mysql(&self.pool)?, message).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<SupportMessage>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn list(
        &self,
        status: Option<SupportStatus>,
        params: &ListParams,
    ) -> Result<(Vec<SupportMessage>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite(&self.pool)?, status, params).await,
            DatabaseDriver::Mysql => list_mysql(mysql(&self.pool)?, status, params).await,
        }
    }

    async fn update(&self, message: &SupportMessage) -> Result<SupportMessage> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(sqlite(&self.pool)?, message).await,
            DatabaseDriver::Mysql => update_mysql(mysql(&self.pool)?, message).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM support_messages WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete support message")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete support message")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_by_status(&self, status: SupportStatus) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM support_messages WHERE status = ?";
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(sql)
                    .bind(status.to_string())
                    .fetch_one(sqlite(&self.pool)?)
                    .await
                    .context("Failed to count support messages")?;
                row.get::<i64, _>("count")
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(sql)
                    .bind(status.to_string())
                    .fetch_one(mysql(&self.pool)?)
                    .await
                    .context("Failed to count support messages")?;
                row.get::<i64, _>("count")
            }
        };
        Ok(count)
    }
}

fn parse_status(value: &str) -> SupportStatus {
    SupportStatus::from_str(value).unwrap_or_default()
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, message: &SupportMessage) -> Result<SupportMessage> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO support_messages (name, email, subject, message, status, admin_response, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.name)
    .bind(&message.email)
    .bind(&message.subject)
    .bind(&message.message)
    .bind(message.status.to_string())
    .bind(&message.admin_response)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create support message")?;

    Ok(SupportMessage {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..message.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<SupportMessage>> {
    let row = sqlx::query(&format!("SELECT {} FROM support_messages WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get support message")?;
    Ok(row.as_ref().map(row_to_message_sqlite))
}

async fn list_sqlite(
    pool: &SqlitePool,
    status: Option<SupportStatus>,
    params: &ListParams,
) -> Result<(Vec<SupportMessage>, i64)> {
    let filter = where_clause(status);

    let sql = format!(
        "SELECT {} FROM support_messages{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.to_string());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list support messages")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM support_messages{}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = status {
        count_query = count_query.bind(status.to_string());
    }
    let total: i64 = count_query.fetch_one(pool).await?.get("count");

    Ok((rows.iter().map(row_to_message_sqlite).collect(), total))
}

async fn update_sqlite(pool: &SqlitePool, message: &SupportMessage) -> Result<SupportMessage> {
    sqlx::query("UPDATE support_messages SET status = ?, admin_response = ?, updated_at = ? WHERE id = ?")
        .bind(message.status.to_string())
        .bind(&message.admin_response)
        .bind(Utc::now())
        .bind(message.id)
        .execute(pool)
        .await
        .context("Failed to update support message")?;

    get_by_id_sqlite(pool, message.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Support message not found after update"))
}

fn row_to_message_sqlite(row: &sqlx::sqlite::SqliteRow) -> SupportMessage {
    let status: String = row.get("status");
    SupportMessage {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        subject: row.get("subject"),
        message: row.get("message"),
        status: parse_status(&status),
        admin_response: row.get("admin_response"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, message: &SupportMessage) -> Result<SupportMessage> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO support_messages (name, email, subject, message, status, admin_response, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&message.name)
    .bind(&message.email)
    .bind(&message.subject)
    .bind(&message.message)
    .bind(message.status.to_string())
    .bind(&message.admin_response)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create support message")?;

    Ok(SupportMessage {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..message.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<SupportMessage>> {
    let row = sqlx::query(&format!("SELECT {} FROM support_messages WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get support message")?;
    Ok(row.as_ref().map(row_to_message_mysql))
}

async fn list_mysql(
    pool: &MySqlPool,
    status: Option<SupportStatus>,
    params: &ListParams,
) -> Result<(Vec<SupportMessage>, i64)> {
    let filter = where_clause(status);

    let sql = format!(
        "SELECT {} FROM support_messages{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS, filter
    );
    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.to_string());
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list support messages")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM support_messages{}", filter);
    let mut count_query = sqlx::query(&count_sql);
    if let Some(status) = status {
        count_query = count_query.bind(status.to_string());
    }
    let total: i64 = count_query.fetch_one(pool).await?.get("count");

    Ok((rows.iter().map(row_to_message_mysql).collect(), total))
}

async fn update_mysql(pool: &MySqlPool, message: &SupportMessage) -> Result<SupportMessage> {
    sqlx::query("UPDATE support_messages SET status = ?, admin_response = ?, updated_at = ? WHERE id = ?")
        .bind(message.status.to_string())
        .bind(&message.admin_response)
        .bind(Utc::now())
        .bind(message.id)
        .execute(pool)
        .await
        .context("Failed to update support message")?;

    get_by_id_mysql(pool, message.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Support message not found after update"))
}

fn row_to_message_mysql(row: &sqlx::mysql::MySqlRow) -> SupportMessage {
    let status: String = row.get("status");
    SupportMessage {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        subject: row.get("subject"),
        message: row.get("message"),
        status: parse_status(&status),
        admin_response: row.get("admin_response"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> SqlxSupportMessageRepository {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        SqlxSupportMessageRepository::new(pool)
    }

    fn message(subject: &str) -> SupportMessage {
        SupportMessage::new(
            "Ibrahim".to_string(),
            "ibrahim@example.com".to_string(),
            subject.to_string(),
            "I have been feeling low".to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = setup().await;
        let created = repo.create(&message("Need help")).await.unwrap();
        assert!(created.id > 0);

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.subject, "Need help");
        assert_eq!(found.status, SupportStatus::New);
        assert!(found.admin_response.is_none());
    }

    #[tokio::test]
    async fn test_list_with_status_filter() {
        let repo = setup().await;
        let first = repo.create(&message("one")).await.unwrap();
        repo.create(&message("two")).await.unwrap();
        repo.create(&message("three")).await.unwrap();

        let mut resolved = first.clone();
        resolved.status = SupportStatus::Resolved;
        repo.update(&resolved).await.unwrap();

        let (all, total) = repo.list(None, &ListParams::new(1, 10)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].subject, "three");

        let (new_only, new_total) = repo
            .list(Some(SupportStatus::New), &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(new_total, 2);
        assert!(new_only.iter().all(|m| m.status == SupportStatus::New));

        let (page2, _) = repo.list(None, &ListParams::new(2, 2)).await.unwrap();
        assert_eq!(page2.len(), 1);
    }

    #[tokio::test]
    async fn test_update_response_and_count() {
        let repo = setup().await;
        let mut msg = repo.create(&message("follow up")).await.unwrap();
        msg.status = SupportStatus::InProgress;
        msg.admin_response = Some("We will call you today".to_string());

        let updated = repo.update(&msg).await.unwrap();
        assert_eq!(updated.status, SupportStatus::InProgress);
        assert_eq!(updated.admin_response.as_deref(), Some("We will call you today"));

        assert_eq!(repo.count_by_status(SupportStatus::InProgress).await.unwrap(), 1);
        assert_eq!(repo.count_by_status(SupportStatus::New).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = setup().await;
        let msg = repo.create(&message("bye")).await.unwrap();
        assert!(repo.delete(msg.id).await.unwrap());
        assert!(!repo.delete(msg.id).await.unwrap());
        assert!(repo.get_by_id(msg.id).await.unwrap().is_none());
    }
}
