//! Settings service
//!
//! Site settings and SMTP credentials stored in the `settings` table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::db::repositories::SettingsRepository;

/// Known setting keys
pub mod keys {
    pub const SITE_NAME: &str = "site_name";
    pub const SITE_DESCRIPTION: &str = "site_description";
    pub const CONTACT_EMAIL: &str = "contact_email";
    pub const SMTP_HOST: &str = "smtp_host";
    pub const SMTP_PORT: &str = "smtp_port";
    pub const SMTP_USERNAME: &str = "smtp_username";
    pub const SMTP_PASSWORD: &str = "smtp_password";
    pub const SMTP_FROM: &str = "smtp_from";
    pub const SMTP_FROM_NAME: &str = "smtp_from_name";

    /// Keys admins may write
    pub const EDITABLE: &[&str] = &[
        SITE_NAME,
        SITE_DESCRIPTION,
        CONTACT_EMAIL,
        SMTP_HOST,
        SMTP_PORT,
        SMTP_USERNAME,
        SMTP_PASSWORD,
        SMTP_FROM,
        SMTP_FROM_NAME,
    ];
}

/// Placeholder returned instead of stored secrets
pub const SECRET_MASK: &str = "********";

/// Public site settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_description: String,
    pub contact_email: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            site_name: "HopeLine AI".to_string(),
            site_description: "Mental health and crisis support for Sierra Leone".to_string(),
            contact_email: String::new(),
        }
    }
}

/// Outgoing mail server settings
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
}

#[derive(Debug, Error)]
pub enum SettingsServiceError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid setting value: {0}")]
    InvalidValue(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsService {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_site_settings(&self) -> Result<SiteSettings, SettingsServiceError> {
        let stored = self.repo.get_all().await?;
        let defaults = SiteSettings::default();
        let pick = |key: &str, fallback: String| stored.get(key).cloned().unwrap_or(fallback);

        Ok(SiteSettings {
            site_name: pick(keys::SITE_NAME, defaults.site_name),
            site_description: pick(keys::SITE_DESCRIPTION, defaults.site_description),
            contact_email: pick(keys::CONTACT_EMAIL, defaults.contact_email),
        })
    }

    /// Every stored setting with the SMTP password masked
    pub async fn get_admin_settings(&self) -> Result<HashMap<String, String>, SettingsServiceError> {
        let mut all = self.repo.get_all().await?;
        if let Some(password) = all.get_mut(keys::SMTP_PASSWORD) {
            if !password.is_empty() {
                *password = SECRET_MASK.to_string();
            }
        }
        Ok(all)
    }

    /// Validate and store admin edits.
    ///
    /// The masked password placeholder is ignored so round-tripping the
    /// admin form does not overwrite the real secret.
    pub async fn update_settings(
        &self,
        updates: HashMap<String, String>,
    ) -> Result<(), SettingsServiceError> {
        let mut accepted = HashMap::new();
        for (key, value) in updates {
            if !keys::EDITABLE.contains(&key.as_str()) {
                return Err(SettingsServiceError::UnknownKey(key));
            }
            if key == keys::SMTP_PASSWORD && value == SECRET_MASK {
                continue;
            }
            if key == keys::SMTP_PORT && !value.is_empty() && value.parse::<u16>().is_err() {
                return Err(SettingsServiceError::InvalidValue(format!(
                    "smtp_port must be a port number, got '{}'",
                    value
                )));
            }
            if key == keys::SITE_NAME && value.trim().is_empty() {
                return Err(SettingsServiceError::InvalidValue(
                    "site_name cannot be empty".to_string(),
                ));
            }
            accepted.insert(key, value.trim().to_string());
        }
        self.repo.set_many(&accepted).await?;
        Ok(())
    }

    /// SMTP settings, or `None` when no host is configured
    pub async fn get_smtp_settings(&self) -> Result<Option<SmtpSettings>, SettingsServiceError> {
        let stored = self.repo.get_all().await?;
        let get = |key: &str| stored.get(key).cloned().unwrap_or_default();

        let host = get(keys::SMTP_HOST);
        if host.is_empty() {
            return Ok(None);
        }
        let from = get(keys::SMTP_FROM);
        if from.is_empty() {
            return Err(SettingsServiceError::InvalidValue(
                "smtp_from must be set when smtp_host is configured".to_string(),
            ));
        }
        let site_name = stored
            .get(keys::SITE_NAME)
            .cloned()
            .unwrap_or_else(|| SiteSettings::default().site_name);

        Ok(Some(SmtpSettings {
            host,
            port: get(keys::SMTP_PORT).parse().unwrap_or(587),
            username: get(keys::SMTP_USERNAME),
            password: get(keys::SMTP_PASSWORD),
            from,
            from_name: stored.get(keys::SMTP_FROM_NAME).cloned().unwrap_or(site_name),
        }))
    }
}
