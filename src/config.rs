use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Placeholder used when no shared secret is configured. Anyone who knows it
/// can push forged updates, so startup warns loudly when it is in effect.
pub const DEFAULT_SECRET_TOKEN: &str = "default-secret-token";

const WEBHOOK_PATH: &str = "webhook/";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Full callback URL registered with Telegram (base URL + `webhook/`)
    pub callback_url: Url,
    pub secret_token: String,
    pub max_connections: u8,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("callback_url", &self.callback_url.as_str())
            .field("secret_token", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

// ── Raw file structs (every field optional; env may fill the gaps) ──

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    telegram: RawTelegram,
    #[serde(default)]
    server: RawServer,
}

#[derive(Deserialize, Default)]
struct RawTelegram {
    bot_token: Option<String>,
    webhook_url: Option<String>,
    secret_token: Option<String>,
    max_connections: Option<u8>,
}

#[derive(Deserialize, Default)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
}

fn default_max_connections() -> u8 {
    5
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from an optional TOML file, then apply environment
    /// overrides. Without an explicit path, `config.toml` is read only if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let raw = match path {
            Some(path) => read_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                read_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => RawConfig::default(),
        };

        Self::resolve(raw, |key| std::env::var(key).ok())
    }

    /// Build from environment lookups only, without reading any file.
    #[cfg(test)]
    pub(crate) fn from_env_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(RawConfig::default(), env)
    }

    fn resolve<F>(raw: RawConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, file: Option<String>| non_empty(env(key)).or(non_empty(file));

        let Some(bot_token) = string("BOT_TOKEN", raw.telegram.bot_token) else {
            bail!("BOT_TOKEN is not set (env BOT_TOKEN or [telegram] bot_token)");
        };
        let Some(webhook_url) = string("WEBHOOK_URL", raw.telegram.webhook_url) else {
            bail!("WEBHOOK_URL is not set (env WEBHOOK_URL or [telegram] webhook_url)");
        };
        let callback_url = callback_url(&webhook_url)?;

        let secret_token = string("SECRET_TOKEN", raw.telegram.secret_token)
            .unwrap_or_else(|| DEFAULT_SECRET_TOKEN.to_string());

        let max_connections = parse_env::<u8, _>(&env, "MAX_CONNECTIONS")?
            .or(raw.telegram.max_connections)
            .unwrap_or_else(default_max_connections);
        if max_connections == 0 {
            bail!("MAX_CONNECTIONS must be at least 1");
        }

        let host = string("HOST", raw.server.host).unwrap_or_else(default_host);
        let port = parse_env::<u16, _>(&env, "PORT")?
            .or(raw.server.port)
            .unwrap_or_else(default_port);

        Ok(Config {
            telegram: TelegramConfig {
                bot_token,
                callback_url,
                secret_token,
                max_connections,
            },
            server: ServerConfig { host, port },
        })
    }

    /// Whether the shared secret fell back to the built-in placeholder.
    pub fn uses_default_secret(&self) -> bool {
        self.telegram.secret_token == DEFAULT_SECRET_TOKEN
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn read_file(path: &Path) -> Result<RawConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(env(key)) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {value:?}")),
        None => Ok(None),
    }
}

/// Build the webhook callback from the externally reachable base URL.
fn callback_url(base: &str) -> Result<Url> {
    let mut base = Url::parse(base.trim())
        .with_context(|| format!("Invalid WEBHOOK_URL: {base}"))?;
    if base.cannot_be_a_base() {
        bail!("WEBHOOK_URL must be a hierarchical URL such as https://example.com");
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(WEBHOOK_PATH)
        .with_context(|| format!("Failed to build callback URL from {base}"))
}
