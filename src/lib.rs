//! Vito - Telegram relay bot with bounded per-user conversation memory
//!
//! Authorized senders get a reply through the chat transport while the last
//! twenty messages of each conversation are persisted per user.

pub mod bot;
pub mod cli;
pub mod config;
pub mod core;
pub mod storage;
pub mod transport;
pub mod utils;

pub use bot::{Bot, DispatcherHandle, MessageHandler, Outcome};
pub use crate::config::{Settings, StartupError};
pub use crate::core::{
    append_bounded, AllowList, ConversationRecord, ConversationStore, EchoReply, MessageEntry,
    ReplySource, Role, UserId, MAX_HISTORY,
};
pub use storage::{RecordStorage, StorageError};
pub use transport::{ChatId, Command, InboundEvent, Transport, TransportError};
