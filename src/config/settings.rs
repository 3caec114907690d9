use super::StartupError;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

const TOKEN_ENV: &str = "TELEGRAM_TOKEN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub telegram: TelegramConfig,
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub api_base: String,
    pub poll_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub allowed_users_path: PathBuf,
    pub credentials_path: PathBuf,
    pub reply_timeout_ms: u64,
    pub channel_buffer_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Filesystem,
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub sqlite_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize)]
struct Credentials {
    telegram_token: String,
}

impl Settings {
    /// Defaults, then `config/{CONFIG_ENV}`, then `APP__*` environment variables
    pub fn new() -> Result<Self, ConfigError> {
        let config_env = env::var("CONFIG_ENV").unwrap_or_else(|_| "default".to_string());
        Self::with_env(&config_env)
    }

    pub fn with_env(config_env: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("telegram.api_base", "https://api.telegram.org")?
            .set_default("telegram.poll_timeout_secs", 30)?
            .set_default("telegram.request_timeout_secs", 10)?
            .set_default("telegram.max_retries", 3)?
            .set_default("bot.allowed_users_path", "allowed_users.json")?
            .set_default("bot.credentials_path", "private.json")?
            .set_default("bot.reply_timeout_ms", 30_000)?
            .set_default("bot.channel_buffer_size", 100)?
            .set_default("storage.backend", "filesystem")?
            .set_default("storage.data_dir", "data")?
            .set_default("storage.sqlite_path", "data/conversations.db")?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{}", config_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Bot API token from `TELEGRAM_TOKEN`, falling back to the credentials file
    pub fn bot_token(&self) -> Result<String, StartupError> {
        if let Ok(token) = env::var(TOKEN_ENV) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }

        let path = &self.bot.credentials_path;
        let json = std::fs::read_to_string(path).map_err(|e| StartupError::ConfigMissing {
            what: "bot credentials",
            path: path.clone(),
            reason: format!("{} (or set {})", e, TOKEN_ENV),
        })?;
        let credentials: Credentials =
            serde_json::from_str(&json).map_err(|e| StartupError::InvalidConfig {
                what: "bot credentials",
                reason: format!("{}: {}", path.display(), e),
            })?;

        if credentials.telegram_token.trim().is_empty() {
            return Err(StartupError::InvalidConfig {
                what: "bot credentials",
                reason: format!("{}: telegram_token is empty", path.display()),
            });
        }
        Ok(credentials.telegram_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_config_file() {
        let settings = Settings::with_env("does-not-exist").unwrap();

        assert_eq!(settings.telegram.api_base, "https://api.telegram.org");
        assert_eq!(settings.bot.reply_timeout_ms, 30_000);
        assert_eq!(settings.storage.backend, StorageBackend::Filesystem);
        assert_eq!(settings.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_token_from_credentials_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("private.json");
        std::fs::write(&path, r#"{"telegram_token": "123:abc"}"#).unwrap();

        let mut settings = Settings::with_env("does-not-exist").unwrap();
        settings.bot.credentials_path = path;

        // Environment variable takes precedence when set by the caller's shell
        if env::var(TOKEN_ENV).is_err() {
            assert_eq!(settings.bot_token().unwrap(), "123:abc");
        }
    }

    #[test]
    fn test_missing_credentials_is_fatal() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::with_env("does-not-exist").unwrap();
        settings.bot.credentials_path = dir.path().join("private.json");

        if env::var(TOKEN_ENV).is_err() {
            assert!(matches!(
                settings.bot_token().unwrap_err(),
                StartupError::ConfigMissing { .. }
            ));
        }
    }
}
