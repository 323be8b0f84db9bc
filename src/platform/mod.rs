pub mod telegram;

use std::fmt;

use async_trait::async_trait;

use crate::error::BotError;

/// Non-text message payloads the bot acknowledges but does not echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Document => write!(f, "document"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Voice => write!(f, "voice"),
            MediaKind::Sticker => write!(f, "sticker"),
        }
    }
}

/// What an update carries, decided once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Text starting with `/`
    Command(String),
    Text(String),
    Media(MediaKind),
    /// Anything else (edited messages, callback queries, locations, ...)
    Unsupported,
}

/// One inbound event from the messaging platform
#[derive(Debug, Clone)]
pub struct IncomingUpdate {
    pub update_id: i64,
    pub sender_id: Option<u64>,
    pub sender_name: Option<String>,
    /// Chat and message the reply is addressed to. `None` when the update
    /// carries no message.
    pub origin: Option<MessageRef>,
    pub content: Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Outbound side of the platform API
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send `text` into the chat of `origin`, as a reply to that message.
    async fn reply(&self, origin: MessageRef, text: &str) -> Result<(), BotError>;

    /// Username of the bot account, used as an identity check.
    async fn bot_username(&self) -> Result<String, BotError>;
}
