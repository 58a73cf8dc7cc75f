//! News post repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, NewsPost};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const COLUMNS: &str = "id, title, content, content_html, category, published, author_id, author_name, created_at, updated_at";

/// Filter for news listings
#[derive(Debug, Clone, Default)]
pub struct NewsFilter {
    pub published_only: bool,
    pub category: Option<String>,
}

impl NewsFilter {
    fn where_clause(&self) -> String {
        let mut conditions = Vec::new();
        if self.published_only {
            conditions.push("published = 1");
        }
        if self.category.is_some() {
            conditions.push("category = ?");
        }
        if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        }
    }
}

#[async_trait]
pub trait NewsPostRepository: Send + Sync {
    async fn create(&self, post: &NewsPost) -> Result<NewsPost>;

    async fn get_by_id(&self, id: i64) -> Result<Option<NewsPost>>;

    /// Newest first
    async fn list(&self, filter: &NewsFilter, params: &ListParams) -> Result<(Vec<NewsPost>, i64)>;

    async fn update(&self, post: &NewsPost) -> Result<NewsPost>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Count posts matching the filter
    async fn count(&self, filter: &NewsFilter) -> Result<i64>;
}

pub struct SqlxNewsPostRepository {
    pool: DynDatabasePool,
}

impl SqlxNewsPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NewsPostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NewsPostRepository for SqlxNewsPostRepository {
    async fn create(&self, post: &NewsPost) -> Result<NewsPost> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite(&self.pool)?, post).await,
            DatabaseDriver::Mysql => create_mysql(mysql(&self.pool)?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<NewsPost>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(sqlite(&self.pool)?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(mysql(&self.pool)?, id).await,
        }
    }

    async fn list(&self, filter: &NewsFilter, params: &ListParams) -> Result<(Vec<NewsPost>, i64)> {
        let (items, total) = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = sqlite(&self.pool)?;
                (list_sqlite(pool, filter, params).await?, count_sqlite(pool, filter).await?)
            }
            DatabaseDriver::Mysql => {
                let pool = mysql(&self.pool)?;
                (list_mysql(pool, filter, params).await?, count_mysql(pool, filter).await?)
            }
        };
        Ok((items, total))
    }

    async fn update(&self, post: &NewsPost) -> Result<NewsPost> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_sqlite(sqlite(&self.pool)?, post).await,
            DatabaseDriver::Mysql => update_mysql(mysql(&self.pool)?, post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM news_posts WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete news post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete news post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count(&self, filter: &NewsFilter) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_sqlite(sqlite(&self.pool)?, filter).await,
            DatabaseDriver::Mysql => count_mysql(mysql(&self.pool)?, filter).await,
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, post: &NewsPost) -> Result<NewsPost> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO news_posts (title, content, content_html, category, published, author_id, author_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.category)
    .bind(post.published)
    .bind(post.author_id)
    .bind(&post.author_name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create news post")?;

    Ok(NewsPost {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<NewsPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM news_posts WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get news post")?;
    Ok(row.as_ref().map(row_to_post_sqlite))
}

async fn list_sqlite(pool: &SqlitePool, filter: &NewsFilter, params: &ListParams) -> Result<Vec<NewsPost>> {
    let sql = format!(
        "SELECT {} FROM news_posts{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS,
        filter.where_clause()
    );
    let mut query = sqlx::query(&sql);
    if let Some(category) = &filter.category {
        query = query.bind(category);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list news posts")?;
    Ok(rows.iter().map(row_to_post_sqlite).collect())
}

async fn count_sqlite(pool: &SqlitePool, filter: &NewsFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) as count FROM news_posts{}", filter.where_clause());
    let mut query = sqlx::query(&sql);
    if let Some(category) = &filter.category {
        query = query.bind(category);
    }
    let row = query.fetch_one(pool).await.context("Failed to count news posts")?;
    Ok(row.get("count"))
}

async fn update_sqlite(pool: &SqlitePool, post: &NewsPost) -> Result<NewsPost> {
    sqlx::query(
        "UPDATE news_posts SET title = ?, content = ?, content_html = ?, category = ?, published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.category)
    .bind(post.published)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update news post")?;

    get_by_id_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("News post not found after update"))
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> NewsPost {
    NewsPost {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        category: row.get("category"),
        published: row.get("published"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, post: &NewsPost) -> Result<NewsPost> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO news_posts (title, content, content_html, category, published, author_id, author_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.category)
    .bind(post.published)
    .bind(post.author_id)
    .bind(&post.author_name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create news post")?;

    Ok(NewsPost {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<NewsPost>> {
    let row = sqlx::query(&format!("SELECT {} FROM news_posts WHERE id = ?", COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get news post")?;
    Ok(row.as_ref().map(row_to_post_mysql))
}

async fn list_mysql(pool: &MySqlPool, filter: &NewsFilter, params: &ListParams) -> Result<Vec<NewsPost>> {
    let sql = format!(
        "SELECT {} FROM news_posts{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS,
        filter.where_clause()
    );
    let mut query = sqlx::query(&sql);
    if let Some(category) = &filter.category {
        query = query.bind(category);
    }
    let rows = query
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await
        .context("Failed to list news posts")?;
    Ok(rows.iter().map(row_to_post_mysql).collect())
}

async fn count_mysql(pool: &MySqlPool, filter: &NewsFilter) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) as count FROM news_posts{}", filter.where_clause());
    let mut query = sqlx::query(&sql);
    if let Some(category) = &filter.category {
        query = query.bind(category);
    }
    let row = query.fetch_one(pool).await.context("Failed to count news posts")?;
    Ok(row.get("count"))
}

async fn update_mysql(pool: &MySqlPool, post: &NewsPost) -> Result<NewsPost> {
    sqlx::query(
        "UPDATE news_posts SET title = ?, content = ?, content_html = ?, category = ?, published = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&post.title)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.category)
    .bind(post.published)
    .bind(Utc::now())
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update news post")?;

    get_by_id_mysql(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("News post not found after update"))
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> NewsPost {
    NewsPost {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        category: row.get("category"),
        published: row.get("published"),
        author_id: row.get("author_id"),
        author_name: row.get("author_name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
