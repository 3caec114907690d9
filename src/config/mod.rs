mod settings;

pub use settings::{BotConfig, LoggingConfig, Settings, StorageBackend, StorageConfig, TelegramConfig};

use std::path::PathBuf;

/// Configuration problems that stop the process before it starts serving
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("{what} not found at {path:?}: {reason}")]
    ConfigMissing {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("invalid {what}: {reason}")]
    InvalidConfig { what: &'static str, reason: String },
}
