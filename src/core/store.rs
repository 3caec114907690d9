//! Conversation Store
//!
//! Information Hiding:
//! - Backend chosen at startup, hidden behind `RecordStorage`
//! - Per-user lock table internalized; storage is only reachable through a held lock
//! - Corrupt records are recreated here so handlers never see them

use crate::core::conversation::{ConversationRecord, UserId};
use crate::storage::{RecordStorage, StorageError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>>;

/// Owns every conversation record and serializes access per user.
///
/// Units of work for different users proceed in parallel; two units of work
/// for the same user queue on that user's lock.
#[derive(Clone)]
pub struct ConversationStore {
    storage: Arc<dyn RecordStorage>,
    locks: LockTable,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self {
            storage,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wait for exclusive access to one user's record
    pub async fn lock(&self, user_id: UserId) -> UserConversation {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(user_id).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;

        UserConversation {
            user_id,
            storage: Arc::clone(&self.storage),
            locks: Arc::clone(&self.locks),
            slot,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_users(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Exclusive handle on one user's record, released on drop
pub struct UserConversation {
    user_id: UserId,
    storage: Arc<dyn RecordStorage>,
    locks: LockTable,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserConversation {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Return the stored record, or create, persist and return an empty one.
    ///
    /// An existing record keeps its original display name. A record that
    /// cannot be read is treated as missing and replaced.
    pub async fn load_or_create(
        &self,
        display_name_hint: &str,
    ) -> Result<ConversationRecord, StorageError> {
        match self.storage.load(self.user_id).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Unreadable conversation record for user {}, starting fresh: {}",
                    self.user_id,
                    e
                );
            }
        }

        let record = ConversationRecord::new(self.user_id, display_name_hint);
        self.storage.save(&record).await?;
        tracing::info!(
            "Created conversation record for user {} ({})",
            self.user_id,
            display_name_hint
        );
        Ok(record)
    }

    /// Overwrite the stored record with `record`
    pub async fn save(&self, record: &ConversationRecord) -> Result<(), StorageError> {
        debug_assert_eq!(record.user_id, self.user_id);
        self.storage.save(record).await
    }

    /// Delete the stored record, returning whether one existed
    pub async fn delete(&self) -> Result<bool, StorageError> {
        self.storage.delete(self.user_id).await
    }
}

impl Drop for UserConversation {
    fn drop(&mut self) {
        self.guard.take();

        // Only the table and this handle reference the slot: nobody is waiting
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&self.slot) == 2 {
            locks.remove(&self.user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conversation::{append_bounded, MessageEntry};
    use crate::storage::InMemoryStorage;
    use std::time::Duration;

    fn store() -> (ConversationStore, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        (ConversationStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_load_or_create_persists_new_record() {
        let (store, storage) = store();

        let conversation = store.lock(UserId(1)).await;
        let record = conversation.load_or_create("alice").await.unwrap();

        assert_eq!(record, ConversationRecord::new(UserId(1), "alice"));
        assert_eq!(storage.load(UserId(1)).await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_load_or_create_is_idempotent() {
        let (store, _) = store();
        let conversation = store.lock(UserId(1)).await;

        let first = conversation.load_or_create("alice").await.unwrap();
        let second = conversation.load_or_create("alice").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_existing_display_name_kept() {
        let (store, _) = store();
        let conversation = store.lock(UserId(1)).await;

        let record = conversation.load_or_create("alice").await.unwrap();
        let record = append_bounded(record, MessageEntry::user("hi"));
        conversation.save(&record).await.unwrap();

        let reloaded = conversation.load_or_create("renamed").await.unwrap();
        assert_eq!(reloaded.display_name, "alice");
        assert_eq!(reloaded.history, vec![MessageEntry::user("hi")]);
    }

    #[tokio::test]
    async fn test_corrupt_record_recreated() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = crate::storage::FileSystemStorage::new(temp_dir.path().to_path_buf())
            .await
            .unwrap();
        std::fs::write(temp_dir.path().join("3.json"), "garbage").unwrap();
        let store = ConversationStore::new(Arc::new(storage));

        let conversation = store.lock(UserId(3)).await;
        let record = conversation.load_or_create("eve").await.unwrap();

        assert!(record.history.is_empty());
        let on_disk = std::fs::read_to_string(temp_dir.path().join("3.json")).unwrap();
        assert!(on_disk.contains("\"displayName\": \"eve\""));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _) = store();
        let conversation = store.lock(UserId(1)).await;

        assert!(!conversation.delete().await.unwrap());
        conversation.load_or_create("alice").await.unwrap();
        assert!(conversation.delete().await.unwrap());
        assert!(!conversation.delete().await.unwrap());
    }

    #[tokio::test]
    async fn test_same_user_waits_for_lock() {
        let (store, _) = store();
        let held = store.lock(UserId(1)).await;

        let contender = {
            let store = store.clone();
            tokio::spawn(async move { store.lock(UserId(1)).await.user_id() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        assert_eq!(contender.await.unwrap(), UserId(1));
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let (store, _) = store();
        let _held = store.lock(UserId(1)).await;

        let other = tokio::time::timeout(Duration::from_millis(200), store.lock(UserId(2))).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_lock_table_pruned_after_release() {
        let (store, _) = store();
        {
            let _a = store.lock(UserId(1)).await;
            let _b = store.lock(UserId(2)).await;
            assert_eq!(store.tracked_users(), 2);
        }
        assert_eq!(store.tracked_users(), 0);
    }
}
