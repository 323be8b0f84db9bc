use std::sync::Arc;

use teloxide::utils::command::BotCommands;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::platform::{Content, IncomingUpdate, MediaKind, MessageRef, Messenger};

/// Longest user-provided text written to the log, in characters
pub const LOG_PREVIEW_CHARS: usize = 200;

pub const APOLOGY_TEXT: &str = "Sorry, something went wrong!";

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "show this help")]
    Help,
}

/// Shared application state, built once at startup
pub struct AppState {
    pub config: Config,
    pub messenger: Arc<dyn Messenger>,
    /// Username of this bot, used to accept `/start@username`. Empty if the
    /// startup identity lookup failed.
    pub bot_username: String,
}

impl AppState {
    pub fn new(config: Config, messenger: Arc<dyn Messenger>, bot_username: String) -> Self {
        Self {
            config,
            messenger,
            bot_username,
        }
    }
}

pub fn welcome_text() -> String {
    format!(
        "🤖 Hello! Send me any text and I'll echo it back!\n\n{}",
        Command::descriptions()
    )
}

pub fn echo_text(text: &str) -> String {
    format!("You said: {}", text)
}

pub fn media_text(kind: MediaKind) -> String {
    format!("I received your {}! But I only echo text messages.", kind)
}

/// Cut `text` to at most `max_chars` characters without splitting a UTF-8 sequence.
pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Recognize `/start` and `/help`, optionally addressed as `/start@bot_username`.
/// Anything after the first whitespace is ignored.
fn parse_command(text: &str, bot_username: &str) -> Option<Command> {
    let head = text.split_whitespace().next()?;
    Command::parse(head, bot_username).ok()
}

/// Route one update to its handler. Failures are logged here and never
/// propagate to the caller.
pub async fn dispatch(state: &AppState, update: &IncomingUpdate) {
    let origin = match update.origin {
        Some(origin) => origin,
        None => {
            debug!(
                "Update {} has no message to answer, ignoring",
                update.update_id
            );
            return;
        }
    };

    match &update.content {
        Content::Command(text) => match parse_command(text, &state.bot_username) {
            Some(command) => handle_command(state, origin, command).await,
            // Unknown commands are echoed like any other text
            None => handle_text(state, origin, update, text).await,
        },
        Content::Text(text) => handle_text(state, origin, update, text).await,
        Content::Media(kind) => handle_media(state, origin, *kind).await,
        Content::Unsupported => {
            debug!(
                "Update {} has unsupported content, no reply",
                update.update_id
            );
        }
    }
}

async fn handle_command(state: &AppState, origin: MessageRef, command: Command) {
    debug!("Command {:?} in chat {}", command, origin.chat_id);
    if let Err(e) = state.messenger.reply(origin, &welcome_text()).await {
        error!("Failed to send welcome message: {}", e);
    }
}

async fn handle_text(state: &AppState, origin: MessageRef, update: &IncomingUpdate, text: &str) {
    info!(
        "Text from {}: {}",
        update
            .sender_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        truncate(text, LOG_PREVIEW_CHARS)
    );

    if let Err(e) = state.messenger.reply(origin, &echo_text(text)).await {
        error!("Failed to echo message: {}", e);
        if let Err(e) = state.messenger.reply(origin, APOLOGY_TEXT).await {
            warn!("Failed to send apology: {}", e);
        }
    }
}

async fn handle_media(state: &AppState, origin: MessageRef, kind: MediaKind) {
    debug!("Received {} in chat {}", kind, origin.chat_id);
    if let Err(e) = state.messenger.reply(origin, &media_text(kind)).await {
        error!("Failed to acknowledge {}: {}", kind, e);
    }
}
