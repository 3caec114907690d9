//! Conversation Record Storage Abstraction
//!
//! Information Hiding:
//! - Storage backend implementation details hidden behind trait
//! - Allows swapping between memory, filesystem and SQLite without touching the handlers
//! - Each storage implementation encapsulates its own encoding and layout

use crate::core::conversation::{ConversationRecord, UserId};
use async_trait::async_trait;

pub mod filesystem;
pub mod memory;
pub mod sqlite;

pub use filesystem::FileSystemStorage;
pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("record for user {user_id} is corrupt: {reason}")]
    Corrupt { user_id: UserId, reason: String },

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Key-value interface from user identity to conversation record.
///
/// Callers are expected to hold the per-user lock from
/// [`crate::core::store::ConversationStore`]; backends do no locking of their own
/// beyond what they need for memory safety.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Load the record for a user, `None` if nothing is stored
    async fn load(&self, user_id: UserId) -> Result<Option<ConversationRecord>, StorageError>;

    /// Persist the full record, replacing whatever was stored for `record.user_id`
    async fn save(&self, record: &ConversationRecord) -> Result<(), StorageError>;

    /// Remove the record, returning whether one existed
    async fn delete(&self, user_id: UserId) -> Result<bool, StorageError>;

    /// List every user with a stored record
    async fn list_users(&self) -> Result<Vec<UserId>, StorageError>;

    async fn exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        Ok(self.load(user_id).await?.is_some())
    }
}
