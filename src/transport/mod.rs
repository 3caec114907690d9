//! Chat Transport Abstraction
//!
//! Information Hiding:
//! - Wire protocol of the chat service hidden behind `Transport`
//! - Inbound updates normalized into `InboundEvent` before reaching handlers
//! - Command syntax (`/name`, `/name@botname`) parsed here, not in the handlers

use crate::core::conversation::UserId;
use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

pub mod telegram;

pub use telegram::TelegramClient;

/// Conversation the reply goes to (equal to the user id in private chats)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clear,
    Help,
    Other(String),
}

impl Command {
    /// Parse a leading bot command, ignoring any `@botname` suffix and arguments
    pub fn parse(text: &str) -> Option<Self> {
        static COMMAND: OnceLock<Regex> = OnceLock::new();
        let re = COMMAND.get_or_init(|| {
            Regex::new(r"^/([A-Za-z0-9_]+)(?:@[A-Za-z0-9_]+)?(?:\s|$)").expect("valid command regex")
        });

        let name = re.captures(text.trim_start())?.get(1)?.as_str().to_lowercase();
        Some(match name.as_str() {
            "clear" => Command::Clear,
            "start" | "help" => Command::Help,
            _ => Command::Other(name),
        })
    }
}

/// One inbound text message, already stripped of transport specifics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub sender: UserId,
    pub display_name: String,
    pub chat: ChatId,
    pub message_id: Option<i64>,
    pub text: String,
    pub command: Option<Command>,
}

impl InboundEvent {
    /// Build an event from raw text, detecting commands
    pub fn new(
        sender: UserId,
        display_name: impl Into<String>,
        chat: ChatId,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            sender,
            display_name: display_name.into(),
            chat,
            message_id: None,
            command: Command::parse(&text),
            text,
        }
    }

    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Outbound half of the chat transport
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatId,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), TransportError>;
}
