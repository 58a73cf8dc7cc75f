//! Contact form handling
//!
//! Submissions are free-form JSON objects. `city`, `phone` and `message`
//! are required; every other field is kept and forwarded as-is.

use crate::services::email::{ContactNotice, EmailService};
use serde_json::{Map, Value};
use std::sync::Arc;

const REQUIRED_FIELDS: [&str; 3] = ["city", "phone", "message"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Expected a JSON object")]
    NotAnObject,
}

/// A validated contact submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub city: String,
    pub phone: String,
    pub message: String,
    /// Remaining fields, sorted by name, values rendered as text
    pub extra: Vec<(String, String)>,
}

impl ContactSubmission {
    pub fn from_json(value: Value) -> Result<Self, ContactError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Err(ContactError::NotAnObject),
        }
    }

    fn from_map(mut map: Map<String, Value>) -> Result<Self, ContactError> {
        let mut take = |field: &'static str| -> Result<String, ContactError> {
            match map.remove(field) {
                Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                _ => Err(ContactError::MissingField(field)),
            }
        };
        let city = take(REQUIRED_FIELDS[0])?;
        let phone = take(REQUIRED_FIELDS[1])?;
        let message = take(REQUIRED_FIELDS[2])?;

        let mut extra: Vec<(String, String)> = map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let text = match v {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, text)
            })
            .collect();
        extra.sort();

        Ok(Self {
            city,
            phone,
            message,
            extra,
        })
    }

    pub fn notice(&self) -> ContactNotice<'_> {
        ContactNotice {
            city: &self.city,
            phone: &self.phone,
            message: &self.message,
            extra: self.extra.clone(),
        }
    }
}

pub struct ContactService {
    email: Arc<EmailService>,
    notify_email: Option<String>,
}

impl ContactService {
    pub fn new(email: Arc<EmailService>, notify_email: Option<String>) -> Self {
        let notify_email = notify_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        Self { email, notify_email }
    }

    /// Record a submission and, when configured, send the notification email.
    ///
    /// Delivery happens in the background; failures are logged only.
    pub fn submit(&self, submission: ContactSubmission) {
        tracing::info!(
            city = %submission.city,
            extra_fields = submission.extra.len(),
            "Contact form submitted"
        );

        let Some(to) = self.notify_email.clone() else {
            return;
        };
        let email = self.email.clone();
        tokio::spawn(async move {
            if let Err(e) = email.send_contact_notification(&to, &submission.notice()).await {
                tracing::error!("Failed to send contact notification: {:#}", e);
            }
        });
    }
}
