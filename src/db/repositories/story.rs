//! Story repository

use crate::config::DatabaseDriver;
use crate::db::pool::{mysql, sqlite};
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Story};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const COLUMNS: &str =
    "id, category, title, excerpt, content, author_name, image_url, user_id, created_at";

#[async_trait]
pub trait StoryRepository: Send + Sync {
    async fn create(&self, story: &Story) -> Result<Story>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Story>>;

    /// Newest first, optionally restricted to a category
    async fn list(&self, category: Option<&str>, params: &ListParams) -> Result<(Vec<Story>, i64)>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxStoryRepository {
    pool: DynDatabasePool,
}

impl SqlxStoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn StoryRepository> {
        Arc::new(Self::new(pool))
    }
}

fn category_clause(category: Option<&str>) -> &'static str {
    if category.is_some() {
        " WHERE category = ?"
    } else {
        ""
    }
}

#[async_trait]
impl StoryRepository for SqlxStoryRepository {
    async fn create(&self, story: &Story) -> Result<Story> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(sqlite(&self.pool)?, story).await,
            DatabaseDriver::Mysql => create_mysql(mysql(&self.pool)?, story).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Story>> {
        let sql = format!("SELECT {} FROM stories WHERE id = ?", COLUMNS);
        let story = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(sqlite(&self.pool)?)
                .await
                .context("Failed to get story")?
                .as_ref()
                .map(row_to_story_sqlite),
            DatabaseDriver::Mysql => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(mysql(&self.pool)?)
                .await
                .context("Failed to get story")?
                .as_ref()
                .map(row_to_story_mysql),
        };
        Ok(story)
    }

    async fn list(&self, category: Option<&str>, params: &ListParams) -> Result<(Vec<Story>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(sqlite(&self.pool)?, category, params).await,
            DatabaseDriver::Mysql => list_mysql(mysql(&self.pool)?, category, params).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM stories WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(sqlite(&self.pool)?)
                .await
                .context("Failed to delete story")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(mysql(&self.pool)?)
                .await
                .context("Failed to delete story")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

const INSERT_SQL: &str = r#"
    INSERT INTO stories (category, title, excerpt, content, author_name, image_url, user_id, created_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

// SQLite implementations
async fn create_sqlite(pool: &SqlitePool, story: &Story) -> Result<Story> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_SQL)
        .bind(&story.category)
        .bind(&story.title)
        .bind(&story.excerpt)
        .bind(&story.content)
        .bind(&story.author_name)
        .bind(&story.image_url)
        .bind(story.user_id)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create story")?;

    Ok(Story {
        id: result.last_insert_rowid(),
        created_at: now,
        ..story.clone()
    })
}

async fn list_sqlite(
    pool: &SqlitePool,
    category: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Story>, i64)> {
    let filter = category_clause(category);
    let sql = format!(
        "SELECT {} FROM stories{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS, filter
    );
    let rows = sqlx::query(&sql);
    let rows = match category {
        Some(c) => rows.bind(c),
        None => rows,
    }
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list stories")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM stories{}", filter);
    let count = sqlx::query(&count_sql);
    let count = match category {
        Some(c) => count.bind(c),
        None => count,
    };
    let total: i64 = count.fetch_one(pool).await?.get("count");

    Ok((rows.iter().map(row_to_story_sqlite).collect(), total))
}

fn row_to_story_sqlite(row: &sqlx::sqlite::SqliteRow) -> Story {
    Story {
        id: row.get("id"),
        category: row.get("category"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        image_url: row.get("image_url"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

// MySQL implementations
async fn create_mysql(pool: &MySqlPool, story: &Story) -> Result<Story> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_SQL)
        .bind(&story.category)
        .bind(&story.title)
        .bind(&story.excerpt)
        .bind(&story.content)
        .bind(&story.author_name)
        .bind(&story.image_url)
        .bind(story.user_id)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create story")?;

    Ok(Story {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..story.clone()
    })
}

async fn list_mysql(
    pool: &MySqlPool,
    category: Option<&str>,
    params: &ListParams,
) -> Result<(Vec<Story>, i64)> {
    let filter = category_clause(category);
    let sql = format!(
        "SELECT {} FROM stories{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        COLUMNS, filter
    );
    let rows = sqlx::query(&sql);
    let rows = match category {
        Some(c) => rows.bind(c),
        None => rows,
    }
    .bind(params.limit())
    .bind(params.offset())
    .fetch_all(pool)
    .await
    .context("Failed to list stories")?;

    let count_sql = format!("SELECT COUNT(*) as count FROM stories{}", filter);
    let count = sqlx::query(&count_sql);
    let count = match category {
        Some(c) => count.bind(c),
        None => count,
    };
    let total: i64 = count.fetch_one(pool).await?.get("count");

    Ok((rows.iter().map(row_to_story_mysql).collect(), total))
}

fn row_to_story_mysql(row: &sqlx::mysql::MySqlRow) -> Story {
    Story {
        id: row.get("id"),
        category: row.get("category"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        image_url: row.get("image_url"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}
