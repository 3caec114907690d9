//! Per-event unit of work
//!
//! Information Hiding:
//! - Authorization, history bookkeeping and reply delivery ordered in one place
//! - Failures are reported as an `Outcome` and logged; nothing escapes to other users
//!
//! A text message goes through: authorize, lock the user, load or create the
//! record, append and save the user entry, obtain the reply (time-bounded),
//! send it, then append and save the bot entry.

use crate::core::conversation::{append_bounded, MessageEntry};
use crate::core::{AllowList, ConversationStore, ReplySource};
use crate::transport::{Command, InboundEvent, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const CLEARED_TEXT: &str = "Your chat history has been cleared.";
pub const NOTHING_TO_CLEAR_TEXT: &str = "No chat history found.";
pub const HELP_TEXT: &str = "Send me a message and I will answer.\n\
                             /clear - delete your chat history\n\
                             /help - show this message";

/// How a unit of work ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Sender not on the allow list; nothing touched
    Rejected,
    /// Empty text or an unknown command
    Ignored,
    Replied,
    /// Reply source did not answer in time; no reply, no bot entry
    ReplyTimedOut,
    ReplyFailed,
    /// Record could not be read or written before a reply was sent
    StorageFailed,
    SendFailed,
    /// Reply was delivered but the bot entry was not persisted
    HistoryNotSaved,
    Cleared,
    NothingToClear,
    Help,
}

pub struct MessageHandler {
    allow_list: Arc<AllowList>,
    store: ConversationStore,
    replies: Arc<dyn ReplySource>,
    transport: Arc<dyn Transport>,
    reply_timeout: Duration,
}

impl MessageHandler {
    pub fn new(
        allow_list: Arc<AllowList>,
        store: ConversationStore,
        replies: Arc<dyn ReplySource>,
        transport: Arc<dyn Transport>,
        reply_timeout: Duration,
    ) -> Self {
        Self {
            allow_list,
            store,
            replies,
            transport,
            reply_timeout,
        }
    }

    pub async fn handle(&self, event: InboundEvent) -> Outcome {
        if !self.allow_list.is_allowed(event.sender) {
            match event.command {
                Some(Command::Clear) => {
                    tracing::warn!("Unauthorized clear attempt from user ID: {}", event.sender)
                }
                _ => tracing::warn!("Unauthorized message attempt from user ID: {}", event.sender),
            }
            return Outcome::Rejected;
        }

        match &event.command {
            Some(Command::Clear) => self.clear_history(&event).await,
            Some(Command::Help) => self.help(&event).await,
            Some(Command::Other(name)) => {
                tracing::debug!("Ignoring unknown command /{} from user {}", name, event.sender);
                Outcome::Ignored
            }
            None => self.on_message(&event).await,
        }
    }

    async fn on_message(&self, event: &InboundEvent) -> Outcome {
        if event.text.trim().is_empty() {
            return Outcome::Ignored;
        }
        tracing::debug!("Received message from user ID: {}", event.sender);

        let conversation = self.store.lock(event.sender).await;

        let record = match conversation.load_or_create(&event.display_name).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Failed to load history for user {}: {}", event.sender, e);
                return Outcome::StorageFailed;
            }
        };

        let record = append_bounded(record, MessageEntry::user(event.text.as_str()));
        if let Err(e) = conversation.save(&record).await {
            tracing::error!("Failed to save message from user {}: {}", event.sender, e);
            return Outcome::StorageFailed;
        }

        let reply = match timeout(
            self.reply_timeout,
            self.replies.reply(event.sender, &record.history),
        )
        .await
        {
            Ok(Ok(reply)) if !reply.trim().is_empty() => reply,
            Ok(Ok(_)) => {
                tracing::warn!("Reply source returned an empty reply for user {}", event.sender);
                return Outcome::ReplyFailed;
            }
            Ok(Err(e)) => {
                tracing::warn!("Reply source failed for user {}: {:#}", event.sender, e);
                return Outcome::ReplyFailed;
            }
            Err(_) => {
                tracing::warn!(
                    "Reply source timed out after {:?} for user {}",
                    self.reply_timeout,
                    event.sender
                );
                return Outcome::ReplyTimedOut;
            }
        };

        if let Err(e) = self
            .transport
            .send_text(event.chat, event.message_id, &reply)
            .await
        {
            tracing::error!("Failed to send reply to user {}: {}", event.sender, e);
            return Outcome::SendFailed;
        }

        let record = append_bounded(record, MessageEntry::bot(reply));
        if let Err(e) = conversation.save(&record).await {
            tracing::error!(
                "Reply delivered to user {} but history was not saved: {}",
                event.sender,
                e
            );
            return Outcome::HistoryNotSaved;
        }

        tracing::debug!(
            "Replied to user {} ({} messages in history)",
            event.sender,
            record.history.len()
        );
        Outcome::Replied
    }

    async fn clear_history(&self, event: &InboundEvent) -> Outcome {
        let deleted = {
            let conversation = self.store.lock(event.sender).await;
            conversation.delete().await
        };

        let (outcome, text) = match deleted {
            Ok(true) => {
                tracing::info!("Deleted chat history for user ID: {}", event.sender);
                (Outcome::Cleared, CLEARED_TEXT)
            }
            Ok(false) => (Outcome::NothingToClear, NOTHING_TO_CLEAR_TEXT),
            Err(e) => {
                tracing::error!("Failed to delete history for user {}: {}", event.sender, e);
                return Outcome::StorageFailed;
            }
        };

        if let Err(e) = self
            .transport
            .send_text(event.chat, event.message_id, text)
            .await
        {
            tracing::warn!("Failed to confirm clear to user {}: {}", event.sender, e);
        }
        outcome
    }

    async fn help(&self, event: &InboundEvent) -> Outcome {
        match self
            .transport
            .send_text(event.chat, event.message_id, HELP_TEXT)
            .await
        {
            Ok(()) => Outcome::Help,
            Err(e) => {
                tracing::warn!("Failed to send help to user {}: {}", event.sender, e);
                Outcome::SendFailed
            }
        }
    }
}
