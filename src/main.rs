mod bot;
mod config;
mod error;
mod platform;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::{AppState, Command};
use crate::config::{Config, TelegramConfig};
use crate::platform::telegram::TelegramMessenger;
use crate::platform::Messenger;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; real environment variables still apply
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,echobot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Callback URL: {}", config.telegram.callback_url);
    info!("  Max connections: {}", config.telegram.max_connections);
    info!("  Listen address: {}", config.bind_address());
    if config.uses_default_secret() {
        warn!("SECRET_TOKEN is not set, using the built-in default; set a private value");
    }

    let messenger = Arc::new(TelegramMessenger::new(&config.telegram.bot_token));

    let bot_username = register_with_platform(&messenger, &config.telegram).await;

    let address = config.bind_address();
    let state = Arc::new(AppState::new(config, messenger, bot_username));
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    info!("Bot is listening on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Bot stopped");
    Ok(())
}

/// Startup calls against the Bot API. None of these failures are fatal; the
/// returned username is empty when the identity lookup fails.
async fn register_with_platform(messenger: &TelegramMessenger, config: &TelegramConfig) -> String {
    match messenger.register_webhook(config).await {
        Ok(()) => info!("Webhook registered at {}", config.callback_url),
        Err(e) => error!("Failed to register webhook: {}", e),
    }
    if let Err(e) = messenger.register_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    match messenger.bot_username().await {
        Ok(username) => {
            info!("Running as @{}", username);
            username
        }
        Err(e) => {
            warn!("Could not look up bot username: {}", e);
            String::new()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
