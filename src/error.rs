use thiserror::Error;

/// Errors raised while handling a single webhook request.
#[derive(Debug, Error)]
pub enum BotError {
    /// The request body is not a valid update
    #[error("malformed update: {0}")]
    Parse(#[from] serde_json::Error),
    /// A Bot API call failed
    #[error("Bot API error: {0}")]
    Api(#[from] teloxide::RequestError),
    #[error("bot account has no username")]
    MissingUsername,
}
