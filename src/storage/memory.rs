//! In-Memory Record Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral runs

use super::{RecordStorage, StorageError};
use crate::core::conversation::{ConversationRecord, UserId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage using HashMap
/// Data is lost when process terminates
pub struct InMemoryStorage {
    records: Arc<RwLock<HashMap<UserId, ConversationRecord>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStorage for InMemoryStorage {
    async fn load(&self, user_id: UserId) -> Result<Option<ConversationRecord>, StorageError> {
        let records = self.records.read().await;
        let record = records.get(&user_id).cloned();
        tracing::debug!(
            "[InMemoryStorage] Loaded record for user {} (found: {})",
            user_id,
            record.is_some()
        );
        Ok(record)
    }

    async fn save(&self, record: &ConversationRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.insert(record.user_id, record.clone());
        tracing::debug!(
            "[InMemoryStorage] Saved {} messages for user {}",
            record.history.len(),
            record.user_id
        );
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        let removed = records.remove(&user_id).is_some();
        tracing::debug!("[InMemoryStorage] Delete for user {} (removed: {})", user_id, removed);
        Ok(removed)
    }

    async fn list_users(&self) -> Result<Vec<UserId>, StorageError> {
        let records = self.records.read().await;
        Ok(records.keys().copied().collect())
    }

    async fn exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        let records = self.records.read().await;
        Ok(records.contains_key(&user_id))
    }
}
