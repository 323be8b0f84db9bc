use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use teloxide::payloads::{SendMessageSetters, SetWebhookSetters};
use teloxide::prelude::*;
use teloxide::types::{BotCommand, MessageId, ReplyParameters};
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::error::BotError;
use crate::platform::{Content, IncomingUpdate, MediaKind, MessageRef, Messenger};

/// Header Telegram sets on every webhook call when a secret was registered
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

// ── Wire format (subset of the Bot API `Update` object) ──

#[derive(Deserialize)]
struct WireUpdate {
    update_id: i64,
    message: Option<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    message_id: i32,
    from: Option<WireUser>,
    chat: WireChat,
    text: Option<String>,
    photo: Option<IgnoredAny>,
    video: Option<IgnoredAny>,
    document: Option<IgnoredAny>,
    audio: Option<IgnoredAny>,
    voice: Option<IgnoredAny>,
    sticker: Option<IgnoredAny>,
}

#[derive(Deserialize)]
struct WireUser {
    id: u64,
    first_name: String,
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct WireChat {
    id: i64,
}

impl WireMessage {
    fn content(&self) -> Content {
        if let Some(text) = &self.text {
            return if text.starts_with('/') {
                Content::Command(text.clone())
            } else {
                Content::Text(text.clone())
            };
        }

        let media = [
            (self.photo.is_some(), MediaKind::Photo),
            (self.video.is_some(), MediaKind::Video),
            (self.document.is_some(), MediaKind::Document),
            (self.audio.is_some(), MediaKind::Audio),
            (self.voice.is_some(), MediaKind::Voice),
            (self.sticker.is_some(), MediaKind::Sticker),
        ];
        media
            .into_iter()
            .find_map(|(present, kind)| present.then_some(Content::Media(kind)))
            .unwrap_or(Content::Unsupported)
    }
}

impl WireUser {
    fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

/// Deserialize a webhook request body into an [`IncomingUpdate`].
pub fn parse_update(body: &[u8]) -> Result<IncomingUpdate, BotError> {
    let wire: WireUpdate = serde_json::from_slice(body)?;

    let Some(message) = wire.message else {
        debug!("Update {} carries no message", wire.update_id);
        return Ok(IncomingUpdate {
            update_id: wire.update_id,
            sender_id: None,
            sender_name: None,
            origin: None,
            content: Content::Unsupported,
        });
    };

    Ok(IncomingUpdate {
        update_id: wire.update_id,
        sender_id: message.from.as_ref().map(|u| u.id),
        sender_name: message.from.as_ref().map(WireUser::display_name),
        origin: Some(MessageRef {
            chat_id: message.chat.id,
            message_id: message.message_id,
        }),
        content: message.content(),
    })
}

/// [`Messenger`] backed by the Telegram Bot API through teloxide
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot_token: &str) -> Self {
        Self::from_bot(Bot::new(bot_token))
    }

    pub fn from_bot(bot: Bot) -> Self {
        Self { bot }
    }

    /// Replace any existing webhook with the configured callback URL.
    ///
    /// A failed `deleteWebhook` is only logged; `setWebhook` overwrites the
    /// old registration anyway, and its result is what gets returned.
    pub async fn register_webhook(&self, config: &TelegramConfig) -> Result<(), BotError> {
        if let Err(e) = self.bot.delete_webhook().await {
            warn!("Failed to delete previous webhook: {}", e);
        }
        self.bot
            .set_webhook(config.callback_url.clone())
            .secret_token(config.secret_token.clone())
            .max_connections(config.max_connections)
            .await?;
        Ok(())
    }

    /// Publish the command menu shown by Telegram clients.
    pub async fn register_commands(&self, commands: Vec<BotCommand>) -> Result<(), BotError> {
        self.bot.set_my_commands(commands).await?;
        Ok(())
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn reply(&self, origin: MessageRef, text: &str) -> Result<(), BotError> {
        self.bot
            .send_message(ChatId(origin.chat_id), text)
            .reply_parameters(ReplyParameters::new(MessageId(origin.message_id)))
            .await?;
        Ok(())
    }

    async fn bot_username(&self) -> Result<String, BotError> {
        let me = self.bot.get_me().await?;
        me.user.username.clone().ok_or(BotError::MissingUsername)
    }
}
