//! Reply generation seam
//!
//! The message handler only knows this trait; swapping the echo placeholder
//! for a real generator does not touch the handler's ordering.

use crate::core::conversation::{MessageEntry, Role, UserId};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ReplySource: Send + Sync {
    /// Produce the bot's reply given the conversation so far (latest user entry last)
    async fn reply(&self, user_id: UserId, conversation: &[MessageEntry]) -> Result<String>;
}

/// Echoes the most recent user message back verbatim
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoReply;

#[async_trait]
impl ReplySource for EchoReply {
    async fn reply(&self, user_id: UserId, conversation: &[MessageEntry]) -> Result<String> {
        conversation
            .iter()
            .rev()
            .find(|entry| entry.role == Role::User)
            .map(|entry| entry.text.clone())
            .ok_or_else(|| anyhow::anyhow!("No user message to reply to for user {}", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_latest_user_text() {
        let conversation = vec![
            MessageEntry::user("first"),
            MessageEntry::bot("first"),
            MessageEntry::user("second"),
        ];

        let reply = EchoReply.reply(UserId(1), &conversation).await.unwrap();
        assert_eq!(reply, "second");
    }

    #[tokio::test]
    async fn test_echo_without_user_message_fails() {
        let conversation = vec![MessageEntry::bot("orphan")];
        assert!(EchoReply.reply(UserId(1), &conversation).await.is_err());
    }
}
