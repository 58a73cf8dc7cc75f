//! Community story service

use crate::db::repositories::StoryRepository;
use crate::models::{derive_excerpt, CreateStoryInput, ListParams, PagedResult, Story, User};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const MAX_TITLE_LENGTH: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum StoryServiceError {
    #[error("Story not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not allowed to modify this story")]
    Forbidden,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct StoryService {
    repo: Arc<dyn StoryRepository>,
}

impl StoryService {
    pub fn new(repo: Arc<dyn StoryRepository>) -> Self {
        Self { repo }
    }

    /// Share a story. Excerpt and author name are derived when omitted.
    pub async fn create(&self, author: &User, input: CreateStoryInput) -> Result<Story, StoryServiceError> {
        let category = non_empty("category", &input.category)?.to_lowercase();
        let title = non_empty("title", &input.title)?;
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(StoryServiceError::ValidationError(format!(
                "title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
        let content = non_empty("content", &input.content)?;

        let excerpt = input
            .excerpt
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derive_excerpt(&content));
        let author_name = input
            .author_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| author.display_name.clone());
        let image_url = input
            .image_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(validate_image_url)
            .transpose()?;

        let story = Story {
            id: 0,
            category,
            title,
            excerpt,
            content,
            author_name,
            image_url,
            user_id: Some(author.id),
            created_at: Utc::now(),
        };

        let created = self.repo.create(&story).await.context("Failed to create story")?;
        tracing::info!(id = created.id, user_id = author.id, "Story shared");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<Story, StoryServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get story")?
            .ok_or(StoryServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        category: Option<&str>,
        params: &ListParams,
    ) -> Result<PagedResult<Story>, StoryServiceError> {
        let category = category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());
        let (items, total) = self
            .repo
            .list(category.as_deref(), params)
            .await
            .context("Failed to list stories")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Delete a story; only its author or an admin may
    pub async fn delete(&self, user: &User, id: i64) -> Result<(), StoryServiceError> {
        let story = self.get(id).await?;
        if !user.can_modify(story.user_id) {
            return Err(StoryServiceError::Forbidden);
        }
        self.repo.delete(id).await.context("Failed to delete story")?;
        tracing::info!(id, user_id = user.id, "Story deleted");
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, StoryServiceError> {
        let (_, total) = self
            .repo
            .list(None, &ListParams::new(1, 1))
            .await
            .context("Failed to count stories")?;
        Ok(total)
    }
}

fn non_empty(field: &str, value: &str) -> Result<String, StoryServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(StoryServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn validate_image_url(url: &str) -> Result<String, StoryServiceError> {
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/') {
        Ok(url.to_string())
    } else {
        Err(StoryServiceError::ValidationError(
            "image_url must be an http(s) URL or a site path".to_string(),
        ))
    }
}
