//! Configuration management
//!
//! This module handles loading and parsing configuration for HopeLine.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
    /// LLM chat proxy configuration
    #[serde(default)]
    pub chat: ChatConfig,
    /// Contact form configuration
    #[serde(default)]
    pub contact: ContactConfig,
    /// Crisis resources shown on the help page
    #[serde(default)]
    pub resources: ResourcesConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin for the /api/v1 routes (cookie auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Public site URL, used to build links in emails
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Honour `X-Forwarded-For`/`X-Real-IP`. Enable only behind a reverse proxy
    /// that overwrites them.
    #[serde(default)]
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            public_url: default_public_url(),
            trust_proxy: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/hopeline.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of cached entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Chat proxy configuration (Gemini `streamGenerateContent`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Provider base URL
    #[serde(default = "default_chat_base_url")]
    pub base_url: String,
    /// Provider API key. Chat is disabled when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// System instruction sent with every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Maximum number of conversation turns forwarded to the provider
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Request timeout in seconds
    #[serde(default = "default_chat_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_chat_base_url(),
            api_key: None,
            model: default_chat_model(),
            system_prompt: default_system_prompt(),
            max_history: default_max_history(),
            timeout_seconds: default_chat_timeout(),
        }
    }
}

impl ChatConfig {
    /// Chat is usable only with an API key
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

fn default_chat_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_chat_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_system_prompt() -> String {
    "You are HopeLine, a warm and patient mental-health support companion for people in \
     Sierra Leone. Listen carefully, respond with empathy in plain language, and suggest \
     practical coping steps. You are not a doctor and must not diagnose. If someone \
     mentions suicide, self-harm or being in danger, encourage them to contact local \
     emergency services or a trusted person immediately and point them to the crisis \
     lines on the HopeLine help page."
        .to_string()
}

fn default_max_history() -> usize {
    20
}

fn default_chat_timeout() -> u64 {
    60
}

/// Contact form configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Address notified about new contact submissions
    #[serde(default)]
    pub notify_email: Option<String>,
}

/// Crisis resources configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default)]
    pub crisis_lines: Vec<CrisisLine>,
}

/// A crisis line or support service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisLine {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub hours: Option<String>,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Environment variables follow the pattern:
    /// - HOPELINE_SERVER_HOST
    /// - HOPELINE_SERVER_PORT
    /// - HOPELINE_SERVER_PUBLIC_URL
    /// - HOPELINE_DATABASE_DRIVER
    /// - HOPELINE_DATABASE_URL
    /// - HOPELINE_CACHE_TTL_SECONDS
    /// - HOPELINE_CHAT_API_KEY
    /// - HOPELINE_CHAT_MODEL
    /// - HOPELINE_CONTACT_NOTIFY_EMAIL
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("HOPELINE_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("HOPELINE_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("HOPELINE_SERVER_PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Ok(trust) = std::env::var("HOPELINE_SERVER_TRUST_PROXY") {
            if let Ok(trust) = trust.parse::<bool>() {
                self.server.trust_proxy = trust;
            }
        }

        if let Ok(driver) = std::env::var("HOPELINE_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("HOPELINE_DATABASE_URL") {
            self.database.url = url;
        }

        if let Ok(ttl) = std::env::var("HOPELINE_CACHE_TTL_SECONDS") {
            if let Ok(ttl) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = ttl;
            }
        }

        if let Ok(key) = std::env::var("HOPELINE_CHAT_API_KEY") {
            self.chat.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("HOPELINE_CHAT_MODEL") {
            self.chat.model = model;
        }

        if let Ok(email) = std::env::var("HOPELINE_CONTACT_NOTIFY_EMAIL") {
            self.contact.notify_email = Some(email);
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const ENV_KEYS: &[&str] = &[
        "HOPELINE_SERVER_HOST",
        "HOPELINE_SERVER_PORT",
        "HOPELINE_SERVER_PUBLIC_URL",
        "HOPELINE_DATABASE_DRIVER",
        "HOPELINE_DATABASE_URL",
        "HOPELINE_CACHE_TTL_SECONDS",
        "HOPELINE_CHAT_API_KEY",
        "HOPELINE_CHAT_MODEL",
        "HOPELINE_CONTACT_NOTIFY_EMAIL",
    ];

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        let guard = super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
        guard
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let path = std::path::Path::new("nonexistent_hopeline_config.yml");
        let config = Config::load(path).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);
        assert_eq!(config.database.url, "data/hopeline.db");
        assert_eq!(config.cache.ttl_seconds, 300);
        assert_eq!(config.chat.model, "gemini-1.5-flash");
        assert!(!config.chat.is_enabled());
        assert!(config.contact.notify_email.is_none());
        assert!(config.resources.crisis_lines.is_empty());
    }

    #[test]
    fn test_load_empty_file_returns_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_partial_config_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 3000\nchat:\n  api_key: \"abc\"\n").unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.chat.is_enabled());
        assert_eq!(config.chat.max_history, 20);
    }

    #[test]
    fn test_load_resources() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
resources:
  crisis_lines:
    - name: "Community Helpline"
      phone: "0000"
      hours: "24/7"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.resources.crisis_lines.len(), 1);
        let line = &config.resources.crisis_lines[0];
        assert_eq!(line.name, "Community Helpline");
        assert_eq!(line.hours.as_deref(), Some("24/7"));
        assert!(line.description.is_none());
    }

    #[test]
    fn test_blank_api_key_disables_chat() {
        let chat = ChatConfig {
            api_key: Some("   ".to_string()),
            ..ChatConfig::default()
        };
        assert!(!chat.is_enabled());
    }

    #[test]
    fn test_load_invalid_yaml_returns_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: not_a_number\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_env_override_server_and_chat() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "server:\n  port: 8080\n").unwrap();

        std::env::set_var("HOPELINE_SERVER_PORT", "4000");
        std::env::set_var("HOPELINE_CHAT_API_KEY", "secret");
        std::env::set_var("HOPELINE_CONTACT_NOTIFY_EMAIL", "team@example.org");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.chat.api_key.as_deref(), Some("secret"));
        assert_eq!(config.contact.notify_email.as_deref(), Some("team@example.org"));

        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_override_invalid_values_ignored() {
        let _guard = lock_env();

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "database:\n  driver: sqlite\n").unwrap();

        std::env::set_var("HOPELINE_SERVER_PORT", "not_a_number");
        std::env::set_var("HOPELINE_DATABASE_DRIVER", "postgres");

        let config = Config::load_with_env(file.path()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.driver, DatabaseDriver::Sqlite);

        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn driver_strategy() -> impl Strategy<Value = DatabaseDriver> {
        prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_yaml_roundtrip(
            port in 1u16..=65535,
            driver in driver_strategy(),
            ttl in 1u64..=86400,
            model in "[a-z0-9.-]{3,20}",
        ) {
            let mut config = Config::default();
            config.server.port = port;
            config.database.driver = driver;
            config.cache.ttl_seconds = ttl;
            config.chat.model = model.clone();

            let yaml = serde_yaml::to_string(&config).unwrap();
            let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

            prop_assert_eq!(parsed.server.port, port);
            prop_assert_eq!(parsed.database.driver, driver);
            prop_assert_eq!(parsed.cache.ttl_seconds, ttl);
            prop_assert_eq!(parsed.chat.model, model);
        }
    }
}
