//! File System Record Storage
//!
//! Information Hiding:
//! - File paths and JSON serialization format hidden from users
//! - Directory structure management hidden behind interface
//! - Write-then-rename keeps each record file whole across crashes

use super::{RecordStorage, StorageError};
use crate::core::conversation::{ConversationRecord, UserId};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File system storage - each user is a JSON file
/// Files are stored as {base_path}/{user_id}.json
pub struct FileSystemStorage {
    base_path: PathBuf,
}

impl FileSystemStorage {
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }

    fn record_path(&self, user_id: UserId) -> PathBuf {
        self.base_path.join(format!("{}.json", user_id))
    }

    fn staging_path(&self, user_id: UserId) -> PathBuf {
        self.base_path.join(format!("{}.json.tmp", user_id))
    }
}

#[async_trait]
impl RecordStorage for FileSystemStorage {
    async fn load(&self, user_id: UserId) -> Result<Option<ConversationRecord>, StorageError> {
        let path = self.record_path(user_id);

        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("[FileSystemStorage] No record for user {} at {:?}", user_id, path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let record: ConversationRecord =
            serde_json::from_str(&json).map_err(|e| StorageError::Corrupt {
                user_id,
                reason: e.to_string(),
            })?;

        tracing::debug!(
            "[FileSystemStorage] Loaded {} messages for user {} from {:?}",
            record.history.len(),
            user_id,
            path
        );
        Ok(Some(record.with_user_id(user_id)))
    }

    async fn save(&self, record: &ConversationRecord) -> Result<(), StorageError> {
        let path = self.record_path(record.user_id);
        let staging = self.staging_path(record.user_id);
        let json = serde_json::to_string_pretty(record)?;

        let mut file = fs::File::create(&staging).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&staging, &path).await?;

        tracing::debug!(
            "[FileSystemStorage] Saved {} messages for user {} to {:?}",
            record.history.len(),
            record.user_id,
            path
        );
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> Result<bool, StorageError> {
        let path = self.record_path(user_id);

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("[FileSystemStorage] Deleted record for user {} at {:?}", user_id, path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    "[FileSystemStorage] No record for user {}, nothing to delete",
                    user_id
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserId>, StorageError> {
        let mut users = Vec::new();
        let mut entries = fs::read_dir(&self.base_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<i64>().ok())
            {
                users.push(UserId(id));
            }
        }

        tracing::debug!("[FileSystemStorage] Listed {} users", users.len());
        Ok(users)
    }

    async fn exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.record_path(user_id)).await?)
    }
}
