use crate::config::{Settings, StorageBackend};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vito")]
#[command(author, version, about = "Telegram relay bot with per-user conversation memory", long_about = None)]
pub struct Cli {
    /// Config file to load from ./config (overrides CONFIG_ENV)
    #[arg(long)]
    pub config_env: Option<String>,

    /// JSON file listing the user ids allowed to talk to the bot
    #[arg(long)]
    pub allowed_users: Option<PathBuf>,

    /// Directory for per-user history files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend for conversation history
    #[arg(long, value_enum)]
    pub storage: Option<StorageBackend>,
}

impl Cli {
    pub fn load_settings(&self) -> Result<Settings, config::ConfigError> {
        let mut settings = match &self.config_env {
            Some(config_env) => Settings::with_env(config_env)?,
            None => Settings::new()?,
        };
        self.apply(&mut settings);
        Ok(settings)
    }

    /// Command-line flags win over files and environment
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(path) = &self.allowed_users {
            settings.bot.allowed_users_path = path.clone();
        }
        if let Some(dir) = &self.data_dir {
            settings.storage.data_dir = dir.clone();
        }
        if let Some(backend) = self.storage {
            settings.storage.backend = backend;
        }
    }
}
