//! SQLite Record Storage
//!
//! Information Hiding:
//! - Schema and upsert statements hidden from users
//! - Blocking rusqlite calls moved off the async runtime via spawn_blocking
//! - Message history stored as a JSON column, one row per user

use super::{RecordStorage, StorageError};
use crate::core::conversation::{ConversationRecord, MessageEntry, UserId};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS conversations (
    user_id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL,
    messages TEXT NOT NULL
)";

pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&conn)
        })
        .await?
    }
}

#[async_trait]
impl RecordStorage for SqliteStorage {
    async fn load(&self, user_id: UserId) -> Result<Option<ConversationRecord>, StorageError> {
        let row = self
            .with_conn(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT display_name, messages FROM conversations WHERE user_id = ?1",
                        params![user_id.0],
                        |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;

        let Some((display_name, messages)) = row else {
            tracing::debug!("[SqliteStorage] No record for user {}", user_id);
            return Ok(None);
        };

        let history: Vec<MessageEntry> =
            serde_json::from_str(&messages).map_err(|e| StorageError::Corrupt {
                user_id,
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "[SqliteStorage] Loaded {} messages for user {}",
            history.len(),
            user_id
        );
        Ok(Some(ConversationRecord {
            user_id,
            display_name,
            history,
        }))
    }

    async fn save(&self, record: &ConversationRecord) -> Result<(), StorageError> {
        let messages = serde_json::to_string(&record.history)?;
        let user_id = record.user_id;
        let display_name = record.display_name.clone();
        let count = record.history.len();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO conversations (user_id, display_name, messages) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     display_name = excluded.display_name,
                     messages = excluded.messages",
                params![user_id.0, display_name, messages],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!("[SqliteStorage] Saved {} messages for user {}", count, user_id);
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StorageError> {
        let removed = self
            .with_conn(move |conn| {
                let rows = conn.execute(
                    "DELETE FROM conversations WHERE user_id = ?1",
                    params![user_id.0],
                )?;
                Ok(rows > 0)
            })
            .await?;

        tracing::debug!("[SqliteStorage] Delete for user {} (removed: {})", user_id, removed);
        Ok(removed)
    }

    async fn list_users(&self) -> Result<Vec<UserId>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT user_id FROM conversations ORDER BY user_id")?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

            let mut users = Vec::new();
            for row in rows {
                users.push(UserId(row?));
            }
            Ok(users)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(id: i64) -> ConversationRecord {
        let mut record = ConversationRecord::new(UserId(id), "alice");
        record.history.push(MessageEntry::user("Hello"));
        record.history.push(MessageEntry::bot("Hello"));
        record
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.save(&sample_record(1)).await.unwrap();

        let loaded = storage.load(UserId(1)).await.unwrap().unwrap();
        assert_eq!(loaded, sample_record(1));
    }

    #[tokio::test]
    async fn test_save_overwrites_existing_row() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.save(&sample_record(1)).await.unwrap();

        let mut updated = sample_record(1);
        updated.history.push(MessageEntry::user("again"));
        storage.save(&updated).await.unwrap();

        let loaded = storage.load(UserId(1)).await.unwrap().unwrap();
        assert_eq!(loaded.history.len(), 3);
        assert_eq!(storage.list_users().await.unwrap(), vec![UserId(1)]);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.save(&sample_record(2)).await.unwrap();
        storage.save(&sample_record(1)).await.unwrap();

        assert_eq!(storage.list_users().await.unwrap(), vec![UserId(1), UserId(2)]);
        assert!(storage.delete(UserId(1)).await.unwrap());
        assert!(!storage.delete(UserId(1)).await.unwrap());
        assert!(!storage.exists(UserId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_persists_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("conversations.db");

        {
            let storage = SqliteStorage::open(&path).unwrap();
            storage.save(&sample_record(8)).await.unwrap();
        }

        let storage = SqliteStorage::open(&path).unwrap();
        let loaded = storage.load(UserId(8)).await.unwrap().unwrap();
        assert_eq!(loaded.display_name, "alice");
    }
}
