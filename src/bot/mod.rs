//! Bot wiring
//!
//! Builds the allow list, record store, reply source and transport from
//! `Settings`, then pumps Telegram updates into the dispatcher until told to stop.

pub mod dispatcher;
pub mod handler;

pub use dispatcher::{DispatchMessage, DispatcherHandle};
pub use handler::{MessageHandler, Outcome};

use crate::config::{Settings, StorageBackend, StorageConfig};
use crate::core::{AllowList, ConversationStore, EchoReply};
use crate::storage::{FileSystemStorage, InMemoryStorage, RecordStorage, SqliteStorage, StorageError};
use crate::transport::TelegramClient;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const POLL_ERROR_DELAY: Duration = Duration::from_secs(5);

/// Open the record backend selected in the settings
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn RecordStorage>, StorageError> {
    let storage: Arc<dyn RecordStorage> = match config.backend {
        StorageBackend::Filesystem => {
            Arc::new(FileSystemStorage::new(config.data_dir.clone()).await?)
        }
        StorageBackend::Sqlite => Arc::new(SqliteStorage::open(&config.sqlite_path)?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, history will be lost on exit");
            Arc::new(InMemoryStorage::new())
        }
    };
    Ok(storage)
}

pub struct Bot {
    telegram: Arc<TelegramClient>,
    handler: Arc<MessageHandler>,
    channel_buffer_size: usize,
}

impl Bot {
    /// Everything that can fail at startup fails here
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let allow_list = AllowList::load(&settings.bot.allowed_users_path)?;
        if allow_list.is_empty() {
            tracing::warn!("Allow list is empty, every message will be rejected");
        }

        let token = settings.bot_token()?;
        let telegram = Arc::new(
            TelegramClient::new(&token, &settings.telegram)
                .context("Failed to build Telegram client")?,
        );

        let storage = open_storage(&settings.storage)
            .await
            .context("Failed to open conversation storage")?;

        let handler = Arc::new(MessageHandler::new(
            Arc::new(allow_list),
            ConversationStore::new(storage),
            Arc::new(EchoReply),
            telegram.clone(),
            Duration::from_millis(settings.bot.reply_timeout_ms),
        ));

        Ok(Self {
            telegram,
            handler,
            channel_buffer_size: settings.bot.channel_buffer_size,
        })
    }

    /// Poll for updates until `shutdown` flips to true, then drain in-flight work
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let dispatcher = DispatcherHandle::new(self.handler, self.channel_buffer_size);
        let mut offset = None;

        tracing::info!("Bot started, polling for updates");

        while !*shutdown.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                polled = self.telegram.next_events(&mut offset) => match polled {
                    Ok(events) => {
                        for event in events {
                            dispatcher.dispatch(event).await?;
                        }
                    }
                    Err(e) => {
                        tracing::error!("Polling for updates failed: {}", e);
                        tokio::select! {
                            _ = shutdown.changed() => break,
                            _ = tokio::time::sleep(POLL_ERROR_DELAY) => {}
                        }
                    }
                },
            }
        }

        tracing::info!("Shutting down, waiting for in-flight messages");
        dispatcher.shutdown().await?;
        tracing::info!("Bot stopped");
        Ok(())
    }
}
