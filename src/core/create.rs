//! Ticket creation.
//!
//! Creation is split in two phases that mirror the interaction: the user
//! first gets the list of servers they share with the bot, then opens a
//! ticket in the one they picked. Both phases apply the same guards; the
//! per-user slot is claimed atomically in the second one, so a guard that
//! passed in the first phase can still reject in the second.

use super::{
    Requester, accounts,
    guild_settings::creation_mention,
    records::{CooldownRecord, GuildRecord, ThreadIndex, TicketRecord, TicketStatus, load_user},
    require_user, slot,
};
use crate::{
    config::TicketSettings,
    discord::{DiscordGateway, GuildSummary},
    errors::{Error, StepOutcome, TicketError, TicketResult, UpstreamError},
    store::{self, KeyValueStore, keys},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, error, info, instrument, warn};

/// How many consecutive millisecond ids are probed when allocating a ticket id.
const MAX_TICKET_ID_PROBES: i64 = 16;

/// A freshly created ticket.
///
/// The ticket record and thread index are stored by the time this is
/// returned; `notice` and `webhook` report the best-effort steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedTicket {
    /// The stored ticket
    pub ticket: TicketRecord,
    /// Name of the guild hosting the thread
    pub guild_name: String,
    /// Guild icon, shown alongside the creation confirmation
    pub guild_icon_url: Option<String>,
    /// Whether the staff notice reached the thread
    pub notice: StepOutcome,
    /// Whether the relay webhook was found or created
    pub webhook: StepOutcome,
}

/// Body of the notice posted into a new ticket thread.
#[must_use]
pub fn notice_text(mention: &str, case_number: i64, username: &str) -> String {
    format!(
        "{mention}\n\n## New Ticket #{case_number}\n\n**User:** {username}\n**Status:** Open\n\nPlease assist this user with their inquiry."
    )
}

/// Name of a ticket thread: case number and username.
#[must_use]
pub fn thread_name(case_number: i64, username: &str) -> String {
    format!("#{case_number} - {username}")
}

async fn check_cooldown(
    store: &dyn KeyValueStore,
    settings: &TicketSettings,
    user_id: &str,
    now: DateTime<Utc>,
) -> TicketResult<()> {
    let last = match store::read::<CooldownRecord>(store, &keys::create_cooldown(user_id)).await {
        Ok(record) => record,
        Err(e) => {
            warn!(user_id, error = %e, "Could not read creation cooldown, allowing request");
            None
        }
    };
    if let Some(record) = last {
        let retry_at = record.last_created_at + settings.create_cooldown();
        if now < retry_at {
            debug!(user_id, %retry_at, "Creation on cooldown");
            return Err(TicketError::RateLimited { retry_at });
        }
    }
    Ok(())
}

async fn ensure_no_open_ticket(
    store: &dyn KeyValueStore,
    settings: &TicketSettings,
    user_id: &str,
    now: DateTime<Utc>,
) -> TicketResult<()> {
    let user = load_user(store, user_id).await?;
    match slot::blocking_ticket(store, &user, now, settings.claim_grace()).await? {
        Some(ticket_id) => Err(TicketError::DuplicateTicket { ticket_id }),
        None => Ok(()),
    }
}

/// Guards shared by both phases: user, cooldown, no open ticket.
async fn admission_guards<'a>(
    store: &dyn KeyValueStore,
    settings: &TicketSettings,
    requester: Option<&'a Requester>,
    now: DateTime<Utc>,
) -> TicketResult<&'a Requester> {
    let requester = require_user(requester)?;
    check_cooldown(store, settings, &requester.user_id, now).await?;
    ensure_no_open_ticket(store, settings, &requester.user_id, now).await?;
    Ok(requester)
}

/// Lists the servers the user can open a ticket in.
///
/// Runs every creation guard up to and including the first live call with
/// the user's OAuth token. The result holds at least one server and at most
/// `settings.guild_choice_limit()`.
#[instrument(skip_all, fields(user_id = requester.map(|r| r.user_id.as_str())))]
pub async fn list_mutual_guilds(
    store: &dyn KeyValueStore,
    gateway: &dyn DiscordGateway,
    settings: &TicketSettings,
    requester: Option<&Requester>,
    now: DateTime<Utc>,
) -> TicketResult<Vec<GuildSummary>> {
    let requester = admission_guards(store, settings, requester, now).await?;
    let token = accounts::access_token(store, &requester.user_id)
        .await?
        .ok_or(TicketError::AuthorizationRequired)?;

    let user_guilds = gateway.user_guilds(&token).await.map_err(|e| {
        if e.is_auth_rejection() {
            info!(error = %e, "Stored access token was rejected");
            TicketError::AuthorizationExpired
        } else {
            TicketError::UpstreamUnavailable(e)
        }
    })?;
    let bot_guilds = gateway
        .bot_guilds()
        .await
        .map_err(TicketError::UpstreamUnavailable)?;

    let shared: HashSet<&str> = bot_guilds.iter().map(|g| g.id.as_str()).collect();
    let mutual: Vec<GuildSummary> = user_guilds
        .into_iter()
        .filter(|g| shared.contains(g.id.as_str()))
        .take(settings.guild_choice_limit())
        .collect();

    if mutual.is_empty() {
        return Err(TicketError::NoMutualServers);
    }
    debug!(count = mutual.len(), "Found mutual servers");
    Ok(mutual)
}

/// Picks an unused time-based ticket id.
async fn allocate_ticket_id(store: &dyn KeyValueStore, now: DateTime<Utc>) -> TicketResult<String> {
    let base = now.timestamp_millis();
    for offset in 0..MAX_TICKET_ID_PROBES {
        let candidate = (base + offset).to_string();
        if store.get(&keys::ticket(&candidate)).await?.is_none() {
            return Ok(candidate);
        }
    }
    Err(TicketError::StoreUnavailable(
        "no free ticket id available".to_string(),
    ))
}

async fn next_case_number(store: &dyn KeyValueStore, guild_id: &str) -> i64 {
    match store
        .increment(&keys::case_counter(guild_id), "lastCaseNumber")
        .await
    {
        Ok(case_number) => case_number,
        Err(e) => {
            warn!(guild_id, error = %e, "Case counter unavailable, numbering this ticket #1");
            1
        }
    }
}

async fn abandon_claim(store: &dyn KeyValueStore, user_id: &str, ticket_id: &str) {
    if let Err(e) = slot::release(store, user_id, ticket_id).await {
        warn!(user_id, ticket_id, error = %e, "Could not release ticket slot after failed creation");
    }
}

async fn persist_ticket(store: &dyn KeyValueStore, ticket: &TicketRecord) -> TicketResult<()> {
    let value = serde_json::to_value(ticket).map_err(Error::from)?;
    if !store
        .compare_and_swap(&keys::ticket(&ticket.ticket_id), None, value)
        .await?
    {
        return Err(TicketError::StoreUnavailable(format!(
            "ticket id {} was taken concurrently",
            ticket.ticket_id
        )));
    }
    let index = ThreadIndex {
        ticket_id: ticket.ticket_id.clone(),
    };
    if let Err(e) = store::write(store, &keys::thread(&ticket.thread_id), &index).await {
        // A ticket without its index could never be closed from the thread
        if let Err(cleanup) = store.delete(&keys::ticket(&ticket.ticket_id)).await {
            warn!(ticket_id = %ticket.ticket_id, error = %cleanup, "Could not remove partial ticket record");
        }
        return Err(TicketError::StoreUnavailable(format!(
            "thread index not written: {e}"
        )));
    }
    Ok(())
}

/// Records the guild as active and returns the merged guild record.
async fn touch_guild(
    store: &dyn KeyValueStore,
    guild_id: &str,
    guild_name: &str,
    system_channel_id: &str,
    webhook_url: Option<&str>,
) -> Option<GuildRecord> {
    let mut patch = json!({
        "guildId": guild_id,
        "guildName": guild_name,
        "systemChannelId": system_channel_id,
        "status": "active",
    });
    if let Some(url) = webhook_url {
        patch["webhookUrl"] = json!(url);
    }
    match store.update(&keys::guild(guild_id), patch).await {
        Ok(merged) => serde_json::from_value(merged)
            .map_err(|e| warn!(guild_id, error = %e, "Guild record is malformed"))
            .ok(),
        Err(e) => {
            warn!(guild_id, error = %e, "Could not update guild record");
            None
        }
    }
}

/// Opens a ticket for the requester in `guild_id`.
///
/// The ticket record and thread index are both stored before this returns
/// `Ok`. The staff notice, webhook bootstrap, guild record and cooldown are
/// best effort.
#[instrument(skip(store, gateway, settings, requester), fields(user_id = requester.map(|r| r.user_id.as_str())))]
pub async fn open_ticket(
    store: &dyn KeyValueStore,
    gateway: &dyn DiscordGateway,
    settings: &TicketSettings,
    requester: Option<&Requester>,
    guild_id: &str,
    now: DateTime<Utc>,
) -> TicketResult<OpenedTicket> {
    let requester = admission_guards(store, settings, requester, now).await?;
    let user_id = requester.user_id.as_str();

    let guild = gateway.guild(guild_id).await.map_err(|e| match e {
        UpstreamError::Status {
            status: 403 | 404, ..
        }
        | UpstreamError::InvalidId(_) => TicketError::NoMutualServers,
        other => TicketError::UpstreamUnavailable(other),
    })?;
    let channel_id = guild
        .system_channel_id
        .clone()
        .ok_or_else(|| TicketError::NoSystemChannel {
            guild_id: guild_id.to_string(),
        })?;

    let ticket_id = allocate_ticket_id(store, now).await?;
    slot::claim(
        store,
        user_id,
        &ticket_id,
        guild_id,
        now,
        settings.claim_grace(),
    )
    .await?;

    let case_number = next_case_number(store, guild_id).await;
    let thread_id = match gateway
        .create_private_thread(
            &channel_id,
            &thread_name(case_number, &requester.username),
            settings.thread_auto_archive_minutes,
        )
        .await
    {
        Ok(thread_id) => thread_id,
        Err(e) => {
            error!(guild_id, %channel_id, error = %e, "Failed to create ticket thread");
            abandon_claim(store, user_id, &ticket_id).await;
            return Err(TicketError::UpstreamUnavailable(e));
        }
    };

    let ticket = TicketRecord {
        ticket_id: ticket_id.clone(),
        case_number,
        guild_id: guild_id.to_string(),
        user_id: user_id.to_string(),
        username: requester.username.clone(),
        thread_id: thread_id.clone(),
        status: TicketStatus::Open,
        created_at: now,
    };
    if let Err(e) = persist_ticket(store, &ticket).await {
        error!(%ticket_id, %thread_id, error = %e, "Ticket thread created but ticket could not be stored");
        abandon_claim(store, user_id, &ticket_id).await;
        return Err(e);
    }

    let webhook_url = match gateway
        .find_or_create_webhook(&channel_id, &settings.webhook_name)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(guild_id, error = %e, "Relay webhook unavailable, messages will be posted by the bot");
            None
        }
    };
    let webhook = if webhook_url.is_some() {
        StepOutcome::Done
    } else {
        StepOutcome::Failed
    };
    let guild_record = touch_guild(
        store,
        guild_id,
        &guild.name,
        &channel_id,
        webhook_url.as_deref(),
    )
    .await;

    let mention = creation_mention(guild_record.as_ref(), &settings.fallback_mention);
    let notice = match gateway
        .post_message(
            &thread_id,
            &notice_text(&mention, case_number, &requester.username),
        )
        .await
    {
        Ok(()) => StepOutcome::Done,
        Err(e) => {
            warn!(%thread_id, error = %e, "Could not post staff notice");
            StepOutcome::Failed
        }
    };

    if let Err(e) = slot::finalize(store, &ticket).await {
        warn!(user_id, error = %e, "Could not finalize user record");
    }
    if let Err(e) = store::write(
        store,
        &keys::create_cooldown(user_id),
        &CooldownRecord {
            last_created_at: now,
        },
    )
    .await
    {
        warn!(user_id, error = %e, "Could not record creation cooldown");
    }

    info!(
        %ticket_id,
        case_number,
        guild_id,
        %thread_id,
        %notice,
        %webhook,
        "Ticket opened"
    );
    Ok(OpenedTicket {
        ticket,
        guild_name: guild.name,
        guild_icon_url: guild.icon_url,
        notice,
        webhook,
    })
}
