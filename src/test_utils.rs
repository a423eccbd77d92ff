//! Shared test utilities.
//!
//! Provides an in-memory store, a scripted Discord gateway that records
//! every call, a store wrapper that injects failures, and fixtures.
#![allow(clippy::unwrap_used)]

use crate::{
    config::{
        TicketSettings,
        database::{create_connection, create_tables},
    },
    core::{Requester, create::{OpenedTicket, open_ticket}},
    discord::{DiscordGateway, GuildDetails, GuildSummary, UpstreamResult, WebhookMessage},
    entities::{Record, RecordColumn},
    errors::{Error, Result, UpstreamError},
    store::{KeyValueStore, SeaOrmStore},
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Guild used by [`create_test_ticket`].
pub const TEST_GUILD_ID: &str = "1100000000000000042";
/// System channel of [`TEST_GUILD_ID`].
pub const TEST_CHANNEL_ID: &str = "1200000000000000042";

/// Routes tracing output to the test harness; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` store with the `records` table.
pub async fn setup_test_store() -> Result<SeaOrmStore> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(SeaOrmStore::new(db))
}

/// Creates a store backed by an `SQLite` file in a fresh temporary directory.
///
/// Unlike the in-memory store, every pooled connection sees the same
/// database, so concurrent operations contend for real. Keep the returned
/// [`TempDir`] alive for as long as the store is used.
pub async fn setup_file_store() -> Result<(TempDir, SeaOrmStore)> {
    let dir = TempDir::new()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("records.sqlite").display());
    let db = create_connection(&url).await?;
    create_tables(&db).await?;
    Ok((dir, SeaOrmStore::new(db)))
}

/// Keys currently stored under `prefix`, sorted.
pub async fn stored_keys(store: &SeaOrmStore, prefix: &str) -> Result<Vec<String>> {
    let mut keys: Vec<String> = Record::find()
        .filter(RecordColumn::Key.starts_with(prefix))
        .all(store.connection())
        .await?
        .into_iter()
        .map(|row| row.key)
        .collect();
    keys.sort();
    Ok(keys)
}

/// A requester with a derived display name and avatar.
pub fn requester(user_id: &str, username: &str) -> Requester {
    Requester {
        user_id: user_id.to_string(),
        username: username.to_string(),
        display_name: format!("{username} (display)"),
        avatar_url: Some(format!("https://cdn.discordapp.com/avatars/{user_id}/avatar.png")),
    }
}

/// Guild list entry.
pub fn summary(id: &str, name: &str) -> GuildSummary {
    GuildSummary {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Guild details without an icon.
pub fn guild_details(id: &str, name: &str, system_channel_id: Option<&str>) -> GuildDetails {
    GuildDetails {
        id: id.to_string(),
        name: name.to_string(),
        icon_url: None,
        system_channel_id: system_channel_id.map(str::to_string),
    }
}

/// Opens a ticket for `user_id` in [`TEST_GUILD_ID`] with default settings.
pub async fn create_test_ticket(
    store: &dyn KeyValueStore,
    gateway: &RecordingGateway,
    user_id: &str,
    username: &str,
) -> Result<OpenedTicket> {
    gateway.add_guild(guild_details(TEST_GUILD_ID, "Test Guild", Some(TEST_CHANNEL_ID)));
    let opened = open_ticket(
        store,
        gateway,
        &TicketSettings::default(),
        Some(&requester(user_id, username)),
        TEST_GUILD_ID,
        Utc::now(),
    )
    .await?;
    Ok(opened)
}

/// One call made against [`RecordingGateway`].
///
/// Variants and fields mirror the [`DiscordGateway`] methods and their arguments.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    BotGuilds,
    UserGuilds {
        access_token: String,
    },
    Guild {
        guild_id: String,
    },
    CreateThread {
        channel_id: String,
        name: String,
        auto_archive_minutes: u16,
    },
    ArchiveThread {
        thread_id: String,
    },
    PostMessage {
        channel_id: String,
        content: String,
    },
    FindOrCreateWebhook {
        channel_id: String,
        name: String,
    },
    ExecuteWebhook(WebhookMessage),
    OpenDm {
        user_id: String,
    },
}

#[derive(Debug, Default)]
struct Script {
    bot_guilds: Vec<GuildSummary>,
    user_guilds: Vec<GuildSummary>,
    guilds: HashMap<String, GuildDetails>,
    failures: HashMap<&'static str, UpstreamError>,
}

/// Scripted [`DiscordGateway`] that records every call.
///
/// Failures are keyed by operation name (`"create_thread"`, `"post_message"`,
/// `"open_dm"`, ...) and apply to every call of that operation until cleared.
/// A failing call is still recorded.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    script: Mutex<Script>,
    calls: Mutex<Vec<GatewayCall>>,
    threads_created: AtomicU64,
}

impl RecordingGateway {
    /// A gateway that knows no guilds and fails nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Guilds returned for the bot's own guild list.
    pub fn with_bot_guilds(self, guilds: Vec<GuildSummary>) -> Self {
        self.script.lock().unwrap().bot_guilds = guilds;
        self
    }

    /// Guilds returned for any user access token.
    pub fn with_user_guilds(self, guilds: Vec<GuildSummary>) -> Self {
        self.script.lock().unwrap().user_guilds = guilds;
        self
    }

    /// Builder form of [`Self::add_guild`].
    pub fn with_guild(self, guild: GuildDetails) -> Self {
        self.add_guild(guild);
        self
    }

    /// Builder form of [`Self::fail`].
    pub fn failing(self, operation: &'static str, error: UpstreamError) -> Self {
        self.fail(operation, error);
        self
    }

    /// Makes `guild` resolvable by id; unknown guilds answer 404.
    pub fn add_guild(&self, guild: GuildDetails) {
        self.script
            .lock()
            .unwrap()
            .guilds
            .insert(guild.id.clone(), guild);
    }

    /// Makes every later call of `operation` return `error`.
    pub fn fail(&self, operation: &'static str, error: UpstreamError) {
        self.script.lock().unwrap().failures.insert(operation, error);
    }

    /// Removes every scripted failure.
    pub fn clear_failures(&self) {
        self.script.lock().unwrap().failures.clear();
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    /// Contents of every bot message posted to `channel_id`, in order.
    pub fn messages_to(&self, channel_id: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::PostMessage {
                    channel_id: target,
                    content,
                } if target == channel_id => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    /// Id of the DM channel the fake opens for `user_id`.
    pub fn dm_channel_id(user_id: &str) -> String {
        format!("dm-{user_id}")
    }

    fn record(&self, operation: &'static str, call: GatewayCall) -> UpstreamResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.script.lock().unwrap().failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DiscordGateway for RecordingGateway {
    async fn bot_guilds(&self) -> UpstreamResult<Vec<GuildSummary>> {
        self.record("bot_guilds", GatewayCall::BotGuilds)?;
        Ok(self.script.lock().unwrap().bot_guilds.clone())
    }

    async fn user_guilds(&self, access_token: &str) -> UpstreamResult<Vec<GuildSummary>> {
        self.record(
            "user_guilds",
            GatewayCall::UserGuilds {
                access_token: access_token.to_string(),
            },
        )?;
        Ok(self.script.lock().unwrap().user_guilds.clone())
    }

    async fn guild(&self, guild_id: &str) -> UpstreamResult<GuildDetails> {
        self.record(
            "guild",
            GatewayCall::Guild {
                guild_id: guild_id.to_string(),
            },
        )?;
        self.script
            .lock()
            .unwrap()
            .guilds
            .get(guild_id)
            .cloned()
            .ok_or(UpstreamError::Status {
                status: 404,
                code: Some(10004),
            })
    }

    async fn create_private_thread(
        &self,
        channel_id: &str,
        name: &str,
        auto_archive_minutes: u16,
    ) -> UpstreamResult<String> {
        self.record(
            "create_thread",
            GatewayCall::CreateThread {
                channel_id: channel_id.to_string(),
                name: name.to_string(),
                auto_archive_minutes,
            },
        )?;
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok((1_500_000_000_000_000_000_u64 + n).to_string())
    }

    async fn archive_thread(&self, thread_id: &str) -> UpstreamResult<()> {
        self.record(
            "archive_thread",
            GatewayCall::ArchiveThread {
                thread_id: thread_id.to_string(),
            },
        )
    }

    async fn post_message(&self, channel_id: &str, content: &str) -> UpstreamResult<()> {
        self.record(
            "post_message",
            GatewayCall::PostMessage {
                channel_id: channel_id.to_string(),
                content: content.to_string(),
            },
        )
    }

    async fn find_or_create_webhook(&self, channel_id: &str, name: &str) -> UpstreamResult<String> {
        self.record(
            "find_or_create_webhook",
            GatewayCall::FindOrCreateWebhook {
                channel_id: channel_id.to_string(),
                name: name.to_string(),
            },
        )?;
        Ok(format!(
            "https://discord.com/api/webhooks/{channel_id}/test-token"
        ))
    }

    async fn execute_webhook(&self, message: &WebhookMessage) -> UpstreamResult<()> {
        self.record("execute_webhook", GatewayCall::ExecuteWebhook(message.clone()))
    }

    async fn open_dm_channel(&self, user_id: &str) -> UpstreamResult<String> {
        self.record(
            "open_dm",
            GatewayCall::OpenDm {
                user_id: user_id.to_string(),
            },
        )?;
        Ok(Self::dm_channel_id(user_id))
    }
}

/// Store wrapper that fails operations on chosen key prefixes.
#[derive(Debug)]
pub struct FailingStore {
    inner: SeaOrmStore,
    failing_all: Vec<String>,
    failing_writes: Vec<String>,
}

impl FailingStore {
    /// Wraps `inner` with no failures configured.
    pub const fn new(inner: SeaOrmStore) -> Self {
        Self {
            inner,
            failing_all: Vec::new(),
            failing_writes: Vec::new(),
        }
    }

    /// Fails reads and writes of keys starting with `prefix`.
    pub fn failing(mut self, prefix: &str) -> Self {
        self.failing_all.push(prefix.to_string());
        self
    }

    /// Fails writes of keys starting with `prefix`; reads still succeed.
    pub fn failing_writes(mut self, prefix: &str) -> Self {
        self.failing_writes.push(prefix.to_string());
        self
    }

    fn check_read(&self, key: &str) -> Result<()> {
        if self.failing_all.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(Error::Database(DbErr::Custom(format!(
                "injected read failure for {key}"
            ))));
        }
        Ok(())
    }

    fn check_write(&self, key: &str) -> Result<()> {
        self.check_read(key)?;
        if self.failing_writes.iter().any(|p| key.starts_with(p.as_str())) {
            return Err(Error::Database(DbErr::Custom(format!(
                "injected write failure for {key}"
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.check_read(key)?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.check_write(key)?;
        self.inner.set(key, value).await
    }

    async fn update(&self, key: &str, patch: Value) -> Result<Value> {
        self.check_write(key)?;
        self.inner.update(key, patch).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check_write(key)?;
        self.inner.delete(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&Value>,
        new: Value,
    ) -> Result<bool> {
        self.check_write(key)?;
        self.inner.compare_and_swap(key, expected, new).await
    }

    async fn increment(&self, key: &str, field: &str) -> Result<i64> {
        self.check_write(key)?;
        self.inner.increment(key, field).await
    }
}
