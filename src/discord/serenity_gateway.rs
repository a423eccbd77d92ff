use super::{DiscordGateway, GuildDetails, GuildSummary, UpstreamResult, WebhookMessage};
use crate::errors::UpstreamError;
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

/// Largest page Discord returns for guild listings.
const GUILD_PAGE_LIMIT: u64 = 200;

/// [`DiscordGateway`] over serenity's REST client.
///
/// Each call is wrapped in a timeout; a call that exceeds it fails with
/// [`UpstreamError::Timeout`] and is not retried.
pub struct SerenityGateway {
    http: Arc<serenity::Http>,
    timeout: Duration,
}

impl SerenityGateway {
    /// Creates a gateway using the bot's HTTP client.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    async fn timed<T, F>(&self, call: &'static str, request: F) -> UpstreamResult<T>
    where
        F: Future<Output = serenity::Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let err = UpstreamError::from(e);
                debug!(call, error = %err, "Discord call failed");
                Err(err)
            }
            Err(_) => {
                warn!(call, timeout_ms = self.timeout.as_millis() as u64, "Discord call timed out");
                Err(UpstreamError::Timeout)
            }
        }
    }
}

impl From<serenity::Error> for UpstreamError {
    fn from(value: serenity::Error) -> Self {
        match value {
            serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) => {
                Self::Status {
                    status: response.status_code.as_u16(),
                    code: i64::try_from(response.error.code).ok(),
                }
            }
            other => Self::Transport(other.to_string()),
        }
    }
}

fn snowflake(id: &str) -> UpstreamResult<u64> {
    id.parse::<u64>()
        .ok()
        .filter(|value| *value != 0)
        .ok_or_else(|| UpstreamError::InvalidId(id.to_string()))
}

fn archive_duration(minutes: u16) -> serenity::AutoArchiveDuration {
    match minutes {
        0..=60 => serenity::AutoArchiveDuration::OneHour,
        61..=1440 => serenity::AutoArchiveDuration::OneDay,
        1441..=4320 => serenity::AutoArchiveDuration::ThreeDays,
        _ => serenity::AutoArchiveDuration::OneWeek,
    }
}

fn summaries(guilds: Vec<serenity::GuildInfo>) -> Vec<GuildSummary> {
    guilds
        .into_iter()
        .map(|guild| GuildSummary {
            id: guild.id.to_string(),
            name: guild.name,
        })
        .collect()
}

#[async_trait]
impl DiscordGateway for SerenityGateway {
    #[instrument(skip(self))]
    async fn bot_guilds(&self) -> UpstreamResult<Vec<GuildSummary>> {
        let guilds = self
            .timed(
                "bot_guilds",
                self.http.get_guilds(None, Some(GUILD_PAGE_LIMIT)),
            )
            .await?;
        Ok(summaries(guilds))
    }

    #[instrument(skip_all)]
    async fn user_guilds(&self, access_token: &str) -> UpstreamResult<Vec<GuildSummary>> {
        // A bearer-token client sees the guilds of the user who authorized the app
        let user_http = serenity::Http::new(&format!("Bearer {access_token}"));
        let guilds = self
            .timed(
                "user_guilds",
                user_http.get_guilds(None, Some(GUILD_PAGE_LIMIT)),
            )
            .await?;
        Ok(summaries(guilds))
    }

    #[instrument(skip(self))]
    async fn guild(&self, guild_id: &str) -> UpstreamResult<GuildDetails> {
        let id = serenity::GuildId::new(snowflake(guild_id)?);
        let guild = self.timed("guild", self.http.get_guild(id)).await?;
        Ok(GuildDetails {
            id: guild.id.to_string(),
            icon_url: guild.icon_url(),
            system_channel_id: guild.system_channel_id.map(|c| c.to_string()),
            name: guild.name,
        })
    }

    #[instrument(skip(self))]
    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
        auto_archive_minutes: u16,
    ) -> UpstreamResult<String> {
        let channel = serenity::ChannelId::new(snowflake(channel_id)?);
        let builder = serenity::CreateThread::new(name)
            .kind(serenity::ChannelType::PrivateThread)
            .auto_archive_duration(archive_duration(auto_archive_minutes));
        let thread = self
            .timed(
                "create_thread",
                channel.create_thread(self.http.as_ref(), builder),
            )
            .await?;
        Ok(thread.id.to_string())
    }

    #[instrument(skip(self))]
    async fn archive_thread(&self, thread_id: &str) -> UpstreamResult<()> {
        let thread = serenity::ChannelId::new(snowflake(thread_id)?);
        let builder = serenity::EditThread::new().archived(true).locked(true);
        self.timed("archive_thread", thread.edit_thread(self.http.as_ref(), builder))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, content))]
    async fn post_message(&self, channel_id: &str, content: &str) -> UpstreamResult<()> {
        let channel = serenity::ChannelId::new(snowflake(channel_id)?);
        let builder = serenity::CreateMessage::new().content(content);
        self.timed(
            "post_message",
            channel.send_message(self.http.as_ref(), builder),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_or_create_webhook(&self, channel_id: &str, name: &str) -> UpstreamResult<String> {
        let channel = serenity::ChannelId::new(snowflake(channel_id)?);
        let existing = self
            .timed("list_webhooks", channel.webhooks(self.http.as_ref()))
            .await?
            .into_iter()
            .find(|hook| hook.name.as_deref() == Some(name));

        let webhook = match existing {
            Some(hook) => hook,
            None => {
                debug!("No relay webhook yet, creating one");
                self.timed(
                    "create_webhook",
                    channel.create_webhook(self.http.as_ref(), serenity::CreateWebhook::new(name)),
                )
                .await?
            }
        };
        webhook.url().map_err(UpstreamError::from)
    }

    #[instrument(skip_all, fields(thread_id = %message.thread_id))]
    async fn execute_webhook(&self, message: &WebhookMessage) -> UpstreamResult<()> {
        let thread = serenity::ChannelId::new(snowflake(&message.thread_id)?);
        let webhook = self
            .timed(
                "resolve_webhook",
                serenity::Webhook::from_url(self.http.as_ref(), &message.webhook_url),
            )
            .await?;

        let mut builder = serenity::ExecuteWebhook::new()
            .content(&message.content)
            .username(&message.username)
            .in_thread(thread);
        if let Some(avatar) = &message.avatar_url {
            builder = builder.avatar_url(avatar);
        }
        self.timed(
            "execute_webhook",
            webhook.execute(self.http.as_ref(), false, builder),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn open_dm_channel(&self, user_id: &str) -> UpstreamResult<String> {
        let user = serenity::UserId::new(snowflake(user_id)?);
        let channel = self
            .timed("open_dm", user.create_dm_channel(self.http.as_ref()))
            .await?;
        Ok(channel.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snowflake_parsing() {
        assert_eq!(snowflake("1453302198086664248"), Ok(1_453_302_198_086_664_248));
        assert_eq!(
            snowflake("0"),
            Err(UpstreamError::InvalidId("0".to_string()))
        );
        assert!(snowflake("not-a-number").is_err());
    }

    #[test]
    fn test_archive_duration_rounds_up_to_supported_values() {
        assert_eq!(archive_duration(60), serenity::AutoArchiveDuration::OneHour);
        assert_eq!(archive_duration(1_000), serenity::AutoArchiveDuration::OneDay);
        assert_eq!(archive_duration(4_320), serenity::AutoArchiveDuration::ThreeDays);
        assert_eq!(archive_duration(10_080), serenity::AutoArchiveDuration::OneWeek);
    }

    #[tokio::test]
    async fn test_invalid_ids_fail_before_any_request() {
        let gateway = SerenityGateway::new(
            Arc::new(serenity::Http::new("unused")),
            Duration::from_millis(1_500),
        );
        let result = gateway.archive_thread("thread-name").await;
        assert_eq!(
            result,
            Err(UpstreamError::InvalidId("thread-name".to_string()))
        );
    }
}
