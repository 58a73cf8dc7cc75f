//! Support ticket service
//!
//! Public visitors open tickets; admins triage them (status, response) from
//! the dashboard.

use crate::db::repositories::SupportMessageRepository;
use crate::models::{
    CreateSupportMessageInput, ListParams, PagedResult, SupportMessage, SupportStatus,
    UpdateSupportMessageInput,
};
use anyhow::Context;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_SUBJECT_LENGTH: usize = 200;
const MAX_MESSAGE_LENGTH: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum SupportServiceError {
    #[error("Support message not found: {0}")]
    NotFound(i64),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct SupportService {
    repo: Arc<dyn SupportMessageRepository>,
}

impl SupportService {
    pub fn new(repo: Arc<dyn SupportMessageRepository>) -> Self {
        Self { repo }
    }

    /// Open a ticket with status `new`
    pub async fn create(
        &self,
        input: CreateSupportMessageInput,
    ) -> Result<SupportMessage, SupportServiceError> {
        let name = required("name", &input.name)?;
        let email = required("email", &input.email)?;
        if !email.contains('@') {
            return Err(SupportServiceError::ValidationError(
                "email must be a valid address".to_string(),
            ));
        }
        let subject = required("subject", &input.subject)?;
        if subject.chars().count() > MAX_SUBJECT_LENGTH {
            return Err(SupportServiceError::ValidationError(format!(
                "subject must be at most {} characters",
                MAX_SUBJECT_LENGTH
            )));
        }
        let message = required("message", &input.message)?;
        if message.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(SupportServiceError::ValidationError(format!(
                "message must be at most {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let created = self
            .repo
            .create(&SupportMessage::new(name, email, subject, message))
            .await
            .context("Failed to create support message")?;

        tracing::info!(id = created.id, "Support message received");
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> Result<SupportMessage, SupportServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to get support message")?
            .ok_or(SupportServiceError::NotFound(id))
    }

    pub async fn list(
        &self,
        status: Option<SupportStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<SupportMessage>, SupportServiceError> {
        let (items, total) = self
            .repo
            .list(status, params)
            .await
            .context("Failed to list support messages")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Change status and/or admin response.
    ///
    /// A blank response clears it.
    pub async fn update(
        &self,
        id: i64,
        input: UpdateSupportMessageInput,
    ) -> Result<SupportMessage, SupportServiceError> {
        let mut message = self.get(id).await?;

        if let Some(status) = input.status {
            message.status = status;
        }
        if let Some(response) = input.admin_response {
            let response = response.trim();
            message.admin_response = (!response.is_empty()).then(|| response.to_string());
        }
        message.updated_at = Utc::now();

        let updated = self
            .repo
            .update(&message)
            .await
            .context("Failed to update support message")?;
        tracing::info!(id, status = %updated.status, "Support message updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), SupportServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete support message")? {
            return Err(SupportServiceError::NotFound(id));
        }
        tracing::info!(id, "Support message deleted");
        Ok(())
    }

    /// Ticket count for every status, keyed by the status name
    pub async fn counts(&self) -> Result<BTreeMap<String, i64>, SupportServiceError> {
        let mut counts = BTreeMap::new();
        for status in SupportStatus::ALL {
            let count = self
                .repo
                .count_by_status(status)
                .await
                .context("Failed to count support messages")?;
            counts.insert(status.to_string(), count);
        }
        Ok(counts)
    }
}

fn required(field: &str, value: &str) -> Result<String, SupportServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SupportServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(value.to_string())
}
