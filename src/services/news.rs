//! News post service
//!
//! Admin-authored announcements. Content is markdown, rendered to HTML on
//! every write. Published listings are cached; any write drops the whole
//! `news:` namespace.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{NewsFilter, NewsPostRepository};
use crate::models::{
    CreateNewsPostInput, ListParams, NewsPost, PagedResult, UpdateNewsPostInput, User,
    DEFAULT_NEWS_CATEGORY,
};
use crate::services::markdown::MarkdownRenderer;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Published listings refresh faster than the default TTL
const NEWS_LIST_CACHE_TTL_SECS: u64 = 600;

const CACHE_KEY_PUBLISHED: &str = "news:published:";
const CACHE_PATTERN_ALL: &str = "news:*";

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum NewsServiceError {
    #[error("News post not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct NewsService {
    repo: Arc<dyn NewsPostRepository>,
    cache: Arc<Cache>,
    renderer: MarkdownRenderer,
}

impl NewsService {
    pub fn new(repo: Arc<dyn NewsPostRepository>, cache: Arc<Cache>) -> Self {
        Self {
            repo,
            cache,
            renderer: MarkdownRenderer::new(),
        }
    }

    pub async fn create(
        &self,
        author: &User,
        input: CreateNewsPostInput,
    ) -> Result<NewsPost, NewsServiceError> {
        let title = validate_title(&input.title)?;
        let content = validate_content(&input.content)?;
        let now = Utc::now();

        let post = NewsPost {
            id: 0,
            title,
            content_html: self.renderer.render(&content),
            content,
            category: normalize_category(input.category.as_deref()),
            published: input.published,
            author_id: Some(author.id),
            author_name: author.display_name.clone(),
            created_at: now,
            updated_at: now,
        };

        let created = self.repo.create(&post).await.context("Failed to create news post")?;
        self.invalidate().await;

        tracing::info!(id = created.id, published = created.published, "News post created");
        Ok(created)
    }

    pub async fn update(
        &self,
        id: i64,
        input: UpdateNewsPostInput,
    ) -> Result<NewsPost, NewsServiceError> {
        let mut post = self.get_any(id).await?;

        if let Some(title) = input.title.as_deref() {
            post.title = validate_title(title)?;
        }
        if let Some(content) = input.content.as_deref() {
            post.content = validate_content(content)?;
            post.content_html = self.renderer.render(&post.content);
        }
        if let Some(category) = input.category.as_deref() {
            post.category = normalize_category(Some(category));
        }
        if let Some(published) = input.published {
            post.published = published;
        }
        post.updated_at = Utc::now();

        let updated = self.repo.update(&post).await.context("Failed to update news post")?;
        self.invalidate().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), NewsServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete news post")? {
            return Err(NewsServiceError::NotFound(id));
        }
        self.invalidate().await;
        tracing::info!(id, "News post deleted");
        Ok(())
    }

    /// Any post, drafts included (admin)
    pub async fn get_any(&self, id: i64) -> Result<NewsPost, NewsServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get news post")?
            .ok_or(NewsServiceError::NotFound(id))
    }

    /// A published post; drafts read as missing
    pub async fn get_published(&self, id: i64) -> Result<NewsPost, NewsServiceError> {
        match self.get_any(id).await {
            Ok(post) if post.published => Ok(post),
            Ok(_) => Err(NewsServiceError::NotFound(id)),
            Err(e) => Err(e),
        }
    }

    /// Published posts, newest first, cached per category and page
    pub async fn list_published(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<NewsPost>, NewsServiceError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        let cache_key = format!(
            "{}{}:{}:{}",
            CACHE_KEY_PUBLISHED,
            category.unwrap_or("all"),
            params.page,
            params.per_page
        );

        if let Ok(Some(cached)) = self.cache.get::<PagedResult<NewsPost>>(&cache_key).await {
            return Ok(cached);
        }

        let filter = NewsFilter {
            published_only: true,
            category: category.map(str::to_string),
        };
        let (items, total) = self
            .repo
            .list(&filter, params)
            .await
            .context("Failed to list news posts")?;
        let result = PagedResult::new(items, total, params);

        if let Err(e) = self
            .cache
            .set(&cache_key, &result, Duration::from_secs(NEWS_LIST_CACHE_TTL_SECS))
            .await
        {
            tracing::warn!("Failed to cache news listing: {}", e);
        }

        Ok(result)
    }

    /// Every post including drafts (admin)
    pub async fn list_all(&self, params: &ListParams) -> Result<PagedResult<NewsPost>, NewsServiceError> {
        let (items, total) = self
            .repo
            .list(&NewsFilter::default(), params)
            .await
            .context("Failed to list news posts")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// (total, published)
    pub async fn counts(&self) -> Result<(i64, i64), NewsServiceError> {
        let total = self
            .repo
            .count(&NewsFilter::default())
            .await
            .context("Failed to count news posts")?;
        let published = self
            .repo
            .count(&NewsFilter {
                published_only: true,
                category: None,
            })
            .await
            .context("Failed to count news posts")?;
        Ok((total, published))
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.delete_pattern(CACHE_PATTERN_ALL).await {
            tracing::warn!("Failed to invalidate news cache: {}", e);
        }
    }
}

fn validate_title(title: &str) -> Result<String, NewsServiceError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(NewsServiceError::ValidationError("title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(NewsServiceError::ValidationError(format!(
            "title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(title.to_string())
}

fn validate_content(content: &str) -> Result<String, NewsServiceError> {
    if content.trim().is_empty() {
        return Err(NewsServiceError::ValidationError("content is required".to_string()));
    }
    Ok(content.to_string())
}

fn normalize_category(category: Option<&str>) -> String {
    category
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_NEWS_CATEGORY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::session::tests::insert_user;
    use crate::db::repositories::SqlxNewsPostRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    async fn setup() -> (NewsService, Arc<Cache>) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        // Posts reference their author
        insert_user(&pool, 1).await;
        let cache = Arc::new(Cache::new());
        (NewsService::new(SqlxNewsPostRepository::boxed(pool), cache.clone()), cache)
    }

    fn admin() -> User {
        let mut user = User::new(
            "admin@example.com".to_string(),
            "Admin".to_string(),
            "hash".to_string(),
            UserRole::Admin,
        );
        user.id = 1;
        user
    }

    fn input(title: &str, published: bool) -> CreateNewsPostInput {
        CreateNewsPostInput {
            title: title.to_string(),
            content: "**Free** counselling this week".to_string(),
            category: None,
            published,
        }
    }

    #[tokio::test]
    async fn test_create_renders_markdown() {
        let (service, _) = setup().await;
        let post = service.create(&admin(), input("Clinic", true)).await.unwrap();

        assert!(post.content_html.contains("<strong>Free</strong>"));
        assert_eq!(post.category, DEFAULT_NEWS_CATEGORY);
        assert_eq!(post.author_name, "Admin");
    }

    #[tokio::test]
    async fn test_drafts_hidden_from_public() {
        let (service, _) = setup().await;
        let draft = service.create(&admin(), input("Draft", false)).await.unwrap();
        service.create(&admin(), input("Live", true)).await.unwrap();

        let listed = service.list_published(None, &ListParams::default()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].title, "Live");

        assert!(matches!(
            service.get_published(draft.id).await.unwrap_err(),
            NewsServiceError::NotFound(_)
        ));
        assert!(service.get_any(draft.id).await.is_ok());
        assert_eq!(service.counts().await.unwrap(), (2, 1));
    }

    #[tokio::test]
    async fn test_publish_invalidates_cached_listing() {
        let (service, cache) = setup().await;
        let draft = service.create(&admin(), input("Soon", false)).await.unwrap();

        let before = service.list_published(None, &ListParams::default()).await.unwrap();
        assert_eq!(before.total, 0);
        let cached: Option<PagedResult<NewsPost>> =
            cache.get("news:published:all:1:10").await.unwrap();
        assert!(cached.is_some());

        service
            .update(
                draft.id,
                UpdateNewsPostInput {
                    published: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let after = service.list_published(None, &ListParams::default()).await.unwrap();
        assert_eq!(after.total, 1);
    }

    #[tokio::test]
    async fn test_category_filter() {
        let (service, _) = setup().await;
        let mut events = input("Walk", true);
        events.category = Some(" Events ".to_string());
        service.create(&admin(), events).await.unwrap();
        service.create(&admin(), input("Other", true)).await.unwrap();

        let listed = service
            .list_published(Some("events"), &ListParams::default())
            .await
            .unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.items[0].category, "events");
    }

    #[tokio::test]
    async fn test_validation_and_delete() {
        let (service, _) = setup().await;
        assert!(matches!(
            service.create(&admin(), input("  ", true)).await.unwrap_err(),
            NewsServiceError::ValidationError(_)
        ));

        let post = service.create(&admin(), input("Gone", true)).await.unwrap();
        service.delete(post.id).await.unwrap();
        assert!(matches!(
            service.delete(post.id).await.unwrap_err(),
            NewsServiceError::NotFound(_)
        ));
    }
}
