//! Outgoing email
//!
//! Bodies are rendered from tera templates; delivery goes through a
//! `Mailer`, which in production is SMTP via lettre with credentials read
//! from site settings on each send.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::Arc;
use tera::Tera;

use super::settings::SettingsService;

const PASSWORD_RESET_TEMPLATE: &str = "password_reset.txt";
const CONTACT_NOTIFICATION_TEMPLATE: &str = "contact_notification.txt";
const TEST_TEMPLATE: &str = "test.txt";

const TEMPLATES: &[(&str, &str)] = &[
    (
        PASSWORD_RESET_TEMPLATE,
        r#"Hello {{ display_name }},

We received a request to reset the password for your {{ site_name }} account.
Use the link below within the next hour to choose a new password:

{{ reset_url }}

If you did not ask for this, you can ignore this email. Your password will not change.

{{ site_name }}
"#,
    ),
    (
        CONTACT_NOTIFICATION_TEMPLATE,
        r#"A new message arrived through the {{ site_name }} contact form.

City: {{ city }}
Phone: {{ phone }}
{% for field in extra %}{{ field.0 }}: {{ field.1 }}
{% endfor %}
Message:
{{ message }}
"#,
    ),
    (
        TEST_TEMPLATE,
        r#"This is a test email from {{ site_name }}.

If you are reading this, outgoing mail is configured correctly.
"#,
    ),
];

/// A rendered message ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery backend
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// SMTP delivery using the credentials stored in settings
pub struct SmtpMailer {
    settings: Arc<SettingsService>,
}

impl SmtpMailer {
    pub fn new(settings: Arc<SettingsService>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let smtp = self
            .settings
            .get_smtp_settings()
            .await?
            .ok_or_else(|| anyhow!("SMTP host not configured. Please configure SMTP settings first."))?;

        let from = format!("{} <{}>", smtp.from_name, smtp.from);
        let message = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(email.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("Failed to build email")?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
            .context("Failed to create SMTP transport")?
            .port(smtp.port);
        if !smtp.username.is_empty() {
            builder = builder.credentials(Credentials::new(smtp.username, smtp.password));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Fields of a contact form submission used in the notification
#[derive(Debug, Clone, Serialize)]
pub struct ContactNotice<'a> {
    pub city: &'a str,
    pub phone: &'a str,
    pub message: &'a str,
    /// Additional submitted fields as `(name, value)`
    pub extra: Vec<(String, String)>,
}

pub struct EmailService {
    mailer: Arc<dyn Mailer>,
    settings: Arc<SettingsService>,
    templates: Tera,
}

impl EmailService {
    pub fn new(mailer: Arc<dyn Mailer>, settings: Arc<SettingsService>) -> Result<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(TEMPLATES.iter().copied())
            .context("Failed to load email templates")?;
        Ok(Self {
            mailer,
            settings,
            templates,
        })
    }

    async fn site_name(&self) -> String {
        match self.settings.get_site_settings().await {
            Ok(site) => site.site_name,
            Err(e) => {
                tracing::warn!("Falling back to default site name: {}", e);
                super::settings::SiteSettings::default().site_name
            }
        }
    }

    fn render(&self, template: &str, context: &tera::Context) -> Result<String> {
        self.templates
            .render(template, context)
            .with_context(|| format!("Failed to render email template {}", template))
    }

    pub async fn send_password_reset(
        &self,
        to: &str,
        display_name: &str,
        reset_url: &str,
    ) -> Result<()> {
        let site_name = self.site_name().await;
        let mut context = tera::Context::new();
        context.insert("site_name", &site_name);
        context.insert("display_name", display_name);
        context.insert("reset_url", reset_url);

        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject: format!("[{}] Reset your password", site_name),
                body: self.render(PASSWORD_RESET_TEMPLATE, &context)?,
            })
            .await
    }

    pub async fn send_contact_notification(&self, to: &str, notice: &ContactNotice<'_>) -> Result<()> {
        let site_name = self.site_name().await;
        let mut context = tera::Context::from_serialize(notice).context("Failed to build email context")?;
        context.insert("site_name", &site_name);

        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject: format!("[{}] New contact from {}", site_name, notice.city),
                body: self.render(CONTACT_NOTIFICATION_TEMPLATE, &context)?,
            })
            .await
    }

    pub async fn send_test_email(&self, to: &str) -> Result<()> {
        let site_name = self.site_name().await;
        let mut context = tera::Context::new();
        context.insert("site_name", &site_name);

        self.mailer
            .send(OutgoingEmail {
                to: to.to_string(),
                subject: format!("[{}] Test email", site_name),
                body: self.render(TEST_TEMPLATE, &context)?,
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Captures messages instead of sending them
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<()> {
            self.sent.lock().await.push(email);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use crate::db::repositories::SqlxSettingsRepository;
    use crate::db::{create_test_pool, migrations};

    async fn setup() -> (Arc<RecordingMailer>, EmailService) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let settings = Arc::new(SettingsService::new(SqlxSettingsRepository::boxed(pool)));
        let mailer = Arc::new(RecordingMailer::default());
        let service = EmailService::new(mailer.clone(), settings).unwrap();
        (mailer, service)
    }

    #[tokio::test]
    async fn test_password_reset_email() {
        let (mailer, service) = setup().await;
        service
            .send_password_reset("user@example.com", "Sia", "http://localhost/reset?token=abc")
            .await
            .unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "user@example.com");
        assert_eq!(sent[0].subject, "[HopeLine AI] Reset your password");
        assert!(sent[0].body.contains("Hello Sia"));
        assert!(sent[0].body.contains("http://localhost/reset?token=abc"));
    }

    #[tokio::test]
    async fn test_contact_notification_lists_extra_fields() {
        let (mailer, service) = setup().await;
        let notice = ContactNotice {
            city: "Freetown",
            phone: "+23276000000",
            message: "Please call me",
            extra: vec![("name".to_string(), "Abu".to_string())],
        };
        service.send_contact_notification("team@example.com", &notice).await.unwrap();

        let sent = mailer.sent.lock().await;
        assert!(sent[0].subject.contains("Freetown"));
        assert!(sent[0].body.contains("Phone: +23276000000"));
        assert!(sent[0].body.contains("name: Abu"));
        assert!(sent[0].body.contains("Please call me"));
    }

    #[tokio::test]
    async fn test_smtp_mailer_requires_host() {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let settings = Arc::new(SettingsService::new(SqlxSettingsRepository::boxed(pool)));
        let mailer = SmtpMailer::new(settings);

        let err = mailer
            .send(OutgoingEmail {
                to: "a@example.com".into(),
                subject: "s".into(),
                body: "b".into(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SMTP host not configured"));
    }
}
