//! Discord REST boundary.
//!
//! The ticket lifecycle only talks to Discord through [`DiscordGateway`].
//! Ids cross this boundary as snowflake strings, the same form they take in
//! the store. Every call is fallible and time-boxed by the implementation.

mod serenity_gateway;

pub use serenity_gateway::SerenityGateway;

use crate::errors::UpstreamError;
use async_trait::async_trait;

/// Result of a single Discord REST call.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// A guild as it appears in a guild listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildSummary {
    /// Guild id
    pub id: String,
    /// Guild name
    pub name: String,
}

/// The guild fields ticket creation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildDetails {
    /// Guild id
    pub id: String,
    /// Guild name
    pub name: String,
    /// Icon URL, when the guild has an icon
    pub icon_url: Option<String>,
    /// Channel that receives system messages; ticket threads are created under it
    pub system_channel_id: Option<String>,
}

/// A message posted through a webhook into a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookMessage {
    /// Full webhook URL (`https://discord.com/api/webhooks/<id>/<token>`)
    pub webhook_url: String,
    /// Thread the message goes into
    pub thread_id: String,
    /// Display name shown as the author
    pub username: String,
    /// Avatar shown next to the message
    pub avatar_url: Option<String>,
    /// Message text
    pub content: String,
}

/// Discord REST operations used by the ticket lifecycle.
#[async_trait]
pub trait DiscordGateway: Send + Sync {
    /// Guilds the bot is a member of.
    async fn bot_guilds(&self) -> UpstreamResult<Vec<GuildSummary>>;

    /// Guilds the user behind `access_token` is a member of (OAuth bearer call).
    async fn user_guilds(&self, access_token: &str) -> UpstreamResult<Vec<GuildSummary>>;

    /// Details of one guild, as seen by the bot.
    async fn guild(&self, guild_id: &str) -> UpstreamResult<GuildDetails>;

    /// Creates a private thread under `channel_id` and returns the thread id.
    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
        auto_archive_minutes: u16,
    ) -> UpstreamResult<String>;

    /// Archives and locks a thread.
    async fn archive_thread(&self, thread_id: &str) -> UpstreamResult<()>;

    /// Posts a bot-authored message.
    async fn post_message(&self, channel_id: &str, content: &str) -> UpstreamResult<()>;

    /// Returns the URL of the webhook called `name` on `channel_id`, creating it when missing.
    async fn find_or_create_webhook(&self, channel_id: &str, name: &str) -> UpstreamResult<String>;

    /// Posts through a webhook into a thread.
    async fn execute_webhook(&self, message: &WebhookMessage) -> UpstreamResult<()>;

    /// Opens (or reuses) the DM channel with a user and returns its id.
    async fn open_dm_channel(&self, user_id: &str) -> UpstreamResult<String>;
}
