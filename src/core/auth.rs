//! Authorization gate
//!
//! Static set of permitted senders, read once at startup.

use crate::config::StartupError;
use crate::core::conversation::UserId;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct AllowList {
    users: HashSet<UserId>,
}

impl AllowList {
    pub fn new(users: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    /// Read a JSON array of user ids, e.g. `[123456, 987654]`
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let json = std::fs::read_to_string(path).map_err(|e| StartupError::ConfigMissing {
            what: "allowed users list",
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let users: Vec<UserId> =
            serde_json::from_str(&json).map_err(|e| StartupError::InvalidConfig {
                what: "allowed users list",
                reason: format!("{}: {}", path.display(), e),
            })?;

        let allow_list = Self::new(users);
        tracing::info!("Loaded {} allowed users from {:?}", allow_list.len(), path);
        Ok(allow_list)
    }

    pub fn is_allowed(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
