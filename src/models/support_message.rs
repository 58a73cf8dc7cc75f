//! Support ticket model
//!
//! Messages sent through the "get support" form. Admins move them through
//! new → in_progress → resolved and may attach a response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SupportStatus {
    #[default]
    New,
    InProgress,
    Resolved,
}

impl SupportStatus {
    pub const ALL: [SupportStatus; 3] = [Self::New, Self::InProgress, Self::Resolved];
}

impl fmt::Display for SupportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for SupportStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "new" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            _ => Err(anyhow::anyhow!("Invalid support status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportMessage {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub status: SupportStatus,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupportMessage {
    pub fn new(name: String, email: String, subject: String, message: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name,
            email,
            subject,
            message,
            status: SupportStatus::New,
            admin_response: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSupportMessageInput {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

/// Admin update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSupportMessageInput {
    pub status: Option<SupportStatus>,
    pub admin_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_strings() {
        for status in SupportStatus::ALL {
            assert_eq!(status.to_string().parse::<SupportStatus>().unwrap(), status);
        }
        assert_eq!("in-progress".parse::<SupportStatus>().unwrap(), SupportStatus::InProgress);
        assert!("closed".parse::<SupportStatus>().is_err());
    }

    #[test]
    fn test_status_serde_snake_case() {
        let json = serde_json::to_string(&SupportStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_new_message_starts_new() {
        let msg = SupportMessage::new(
            "Fatmata".into(),
            "f@example.com".into(),
            "Help".into(),
            "I need someone to talk to".into(),
        );
        assert_eq!(msg.status, SupportStatus::New);
        assert!(msg.admin_response.is_none());
    }
}
