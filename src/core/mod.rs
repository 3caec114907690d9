pub mod auth;
pub mod conversation;
pub mod reply;
pub mod store;

pub use auth::AllowList;
pub use conversation::{append_bounded, ConversationRecord, MessageEntry, Role, UserId, MAX_HISTORY};
pub use reply::{EchoReply, ReplySource};
pub use store::{ConversationStore, UserConversation};
