//! Application settings.
//!
//! Tunables live in an optional `config.toml` under a `[tickets]` table; every
//! field has a default so the bot runs without the file. Secrets and
//! deployment details (bot token, OAuth client, database URL) come from the
//! environment, usually via `.env`.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shortest and longest per-call Discord timeout we accept.
const MIN_UPSTREAM_TIMEOUT_MS: u64 = 1_500;
const MAX_UPSTREAM_TIMEOUT_MS: u64 = 2_500;

/// Discord caps select menus at 25 options.
const MAX_SELECT_OPTIONS: usize = 25;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite://ticket_relay.sqlite?mode=rwc";

/// Tunables for the ticket lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TicketSettings {
    /// Minutes a user must wait between two ticket creations
    pub create_cooldown_minutes: i64,
    /// Per-call timeout for Discord REST requests, in milliseconds
    pub upstream_timeout_ms: u64,
    /// Auto-archive duration for ticket threads, in minutes
    pub thread_auto_archive_minutes: u16,
    /// Name of the webhook used to relay user messages into threads
    pub webhook_name: String,
    /// Mention used in the creation notice when no role is configured
    pub fallback_mention: String,
    /// Maximum number of servers offered in the `/create` select menu
    pub max_guild_choices: usize,
    /// How long a claimed ticket slot without a ticket record blocks new claims
    pub claim_grace_seconds: i64,
}

impl Default for TicketSettings {
    fn default() -> Self {
        Self {
            create_cooldown_minutes: 30,
            upstream_timeout_ms: 2_000,
            thread_auto_archive_minutes: 10_080,
            webhook_name: "TicketSystem".to_string(),
            fallback_mention: "@here".to_string(),
            max_guild_choices: MAX_SELECT_OPTIONS,
            claim_grace_seconds: 120,
        }
    }
}

impl TicketSettings {
    /// Cooldown between two creations by the same user.
    #[must_use]
    pub fn create_cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.create_cooldown_minutes.max(0))
    }

    /// Per-call Discord timeout, clamped to the range the interaction deadline allows.
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(
            self.upstream_timeout_ms
                .clamp(MIN_UPSTREAM_TIMEOUT_MS, MAX_UPSTREAM_TIMEOUT_MS),
        )
    }

    /// Grace period for an in-flight slot claim.
    #[must_use]
    pub fn claim_grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_grace_seconds.max(0))
    }

    /// Number of servers to offer, never more than Discord accepts.
    #[must_use]
    pub fn guild_choice_limit(&self) -> usize {
        self.max_guild_choices.clamp(1, MAX_SELECT_OPTIONS)
    }

    fn validate(&self) -> Result<()> {
        if self.webhook_name.trim().is_empty() {
            return Err(Error::Config {
                message: "tickets.webhook_name cannot be empty".to_string(),
            });
        }
        if self.fallback_mention.trim().is_empty() {
            return Err(Error::Config {
                message: "tickets.fallback_mention cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Structure of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// `[tickets]` table
    #[serde(default)]
    pub tickets: TicketSettings,
}

/// OAuth2 client details used to build the authorization link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthSettings {
    /// Discord application (client) id
    pub application_id: String,
    /// Redirect URI registered for the application
    pub redirect_uri: String,
}

/// Fully resolved configuration shared by the bot.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ticket lifecycle tunables
    pub tickets: TicketSettings,
    /// OAuth client, absent when `DISCORD_APPLICATION_ID` or `DISCORD_REDIRECT_URI` is unset
    pub oauth: Option<OAuthSettings>,
    /// SeaORM connection string
    pub database_url: String,
    /// Register commands in this guild only (faster updates during development)
    pub dev_guild_id: Option<u64>,
}

/// Parses the contents of a `config.toml` file.
pub fn parse_config(contents: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.tickets.validate()?;
    Ok(config)
}

/// Loads `config.toml` from `path`, falling back to defaults when the file does not exist.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        info!("No config file at {:?}, using default ticket settings", path_ref);
        return Ok(FileConfig::default());
    }
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    parse_config(&contents)
}

/// Builds the application configuration from `config.toml` and the environment.
///
/// Reads `TICKET_RELAY_CONFIG` (file path), `DATABASE_URL`,
/// `DISCORD_APPLICATION_ID`, `DISCORD_REDIRECT_URI` and `DEV_GUILD_ID`.
/// The bot token is read separately, right before use.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path =
        std::env::var("TICKET_RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let file = load_config(&path)?;

    let oauth = match (
        non_empty_env("DISCORD_APPLICATION_ID"),
        non_empty_env("DISCORD_REDIRECT_URI"),
    ) {
        (Some(application_id), Some(redirect_uri)) => Some(OAuthSettings {
            application_id,
            redirect_uri,
        }),
        _ => {
            warn!("DISCORD_APPLICATION_ID or DISCORD_REDIRECT_URI not set; authorization links are disabled");
            None
        }
    };

    let dev_guild_id = non_empty_env("DEV_GUILD_ID")
        .map(|raw| {
            raw.parse::<u64>().map_err(|e| Error::Config {
                message: format!("DEV_GUILD_ID is not a valid guild id: {e}"),
            })
        })
        .transpose()?;

    let config = AppConfig {
        tickets: file.tickets,
        oauth,
        database_url: non_empty_env("DATABASE_URL")
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        dev_guild_id,
    };
    info!(
        cooldown_minutes = config.tickets.create_cooldown_minutes,
        timeout_ms = config.tickets.upstream_timeout_ms,
        "Application configuration loaded"
    );
    Ok(config)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_ticket_settings() {
        let toml_str = r#"
            [tickets]
            create_cooldown_minutes = 10
            upstream_timeout_ms = 1800
            webhook_name = "Relay"
            max_guild_choices = 5
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.tickets.create_cooldown_minutes, 10);
        assert_eq!(config.tickets.upstream_timeout(), Duration::from_millis(1800));
        assert_eq!(config.tickets.webhook_name, "Relay");
        assert_eq!(config.tickets.guild_choice_limit(), 5);
        // Unspecified fields keep their defaults
        assert_eq!(config.tickets.fallback_mention, "@here");
        assert_eq!(config.tickets.thread_auto_archive_minutes, 10_080);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.tickets, TicketSettings::default());
        assert_eq!(config.tickets.create_cooldown(), chrono::Duration::minutes(30));
    }

    #[test]
    fn test_timeout_and_choices_are_clamped() {
        let settings = TicketSettings {
            upstream_timeout_ms: 30_000,
            max_guild_choices: 100,
            ..TicketSettings::default()
        };
        assert_eq!(settings.upstream_timeout(), Duration::from_millis(2_500));
        assert_eq!(settings.guild_choice_limit(), 25);

        let settings = TicketSettings {
            upstream_timeout_ms: 10,
            max_guild_choices: 0,
            ..TicketSettings::default()
        };
        assert_eq!(settings.upstream_timeout(), Duration::from_millis(1_500));
        assert_eq!(settings.guild_choice_limit(), 1);
    }

    #[test]
    fn test_blank_webhook_name_is_rejected() {
        let result = parse_config("[tickets]\nwebhook_name = \"  \"\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config("definitely/not/here/config.toml").unwrap();
        assert_eq!(config.tickets, TicketSettings::default());
    }
}
