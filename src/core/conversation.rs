//! Conversation Record Model
//!
//! Information Hiding:
//! - On-disk field names (`displayName`, `messages`, `from`) hidden behind serde attributes
//! - History bound enforced in one place so every caller gets the same eviction policy

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of entries retained in a conversation history
pub const MAX_HISTORY: usize = 20;

/// Transport-assigned sender identity, key for all per-user state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    #[serde(rename = "from")]
    pub role: Role,
    pub text: String,
}

impl MessageEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            role: Role::Bot,
            text: text.into(),
        }
    }
}

/// Persisted per-user conversation state
///
/// The display name is captured when the record is first created and is
/// only used in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(skip)]
    pub user_id: UserId,
    // Older records were written with a `username` key
    #[serde(rename = "displayName", alias = "username")]
    pub display_name: String,
    #[serde(rename = "messages", default)]
    pub history: Vec<MessageEntry>,
}

impl ConversationRecord {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            history: Vec::new(),
        }
    }

    pub(crate) fn with_user_id(mut self, user_id: UserId) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Append an entry and evict from the front until the bound holds.
///
/// Pure in-memory transform; persisting is the caller's job.
pub fn append_bounded(mut record: ConversationRecord, entry: MessageEntry) -> ConversationRecord {
    record.history.push(entry);
    if record.history.len() > MAX_HISTORY {
        let overflow = record.history.len() - MAX_HISTORY;
        record.history.drain(..overflow);
    }
    record
}
