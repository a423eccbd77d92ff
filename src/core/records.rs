//! Typed views of the store records.
//!
//! Field names follow the stored JSON (`camelCase`). Reads tolerate missing
//! fields; writes to shared records go through partial JSON patches so
//! fields owned by other flows are never clobbered.

use crate::{
    errors::Result,
    store::{self, KeyValueStore, keys},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `user:<userId>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    /// The user's open ticket, or an in-flight claim for one
    pub active_ticket_id: Option<String>,
    /// When the slot was claimed; cleared once the ticket is fully persisted
    pub active_claimed_at: Option<DateTime<Utc>>,
    /// Guild of the most recent ticket
    pub guild_id: Option<String>,
    /// OAuth access token used to list the user's guilds
    pub access_token: Option<String>,
    /// Guild selected for a creation that has not finished yet
    pub pending_guild_id: Option<String>,
}

/// Lifecycle state of a ticket record.
///
/// Closed tickets are deleted rather than kept, so `Closed` only appears
/// when reading records written by other tools. Any status string this
/// build does not recognise reads as `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    /// Thread is live and the user's slot points at it
    Open,
    /// No longer accepting relayed messages
    #[serde(other)]
    Closed,
}

/// `ticket:<ticketId>`
///
/// Written once, when creation succeeds, and deleted on closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    /// Millisecond timestamp of creation, also the record key suffix
    pub ticket_id: String,
    /// Per-guild sequence number shown to users and staff
    pub case_number: i64,
    /// Guild whose system channel hosts the thread
    pub guild_id: String,
    /// User who opened the ticket
    pub user_id: String,
    /// Username at creation time
    pub username: String,
    /// Private staff thread bound to this ticket
    pub thread_id: String,
    /// Lifecycle state
    pub status: TicketStatus,
    /// When the ticket was created
    pub created_at: DateTime<Utc>,
}

impl TicketRecord {
    /// True while the ticket still accepts relayed messages.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == TicketStatus::Open
    }
}

/// `thread:<threadId>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadIndex {
    /// Ticket bound to the thread
    pub ticket_id: String,
}

/// Whether a guild has seen its first ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuildStatus {
    /// Known to the bot but no ticket created yet
    Setup,
    /// At least one ticket has been created
    Active,
}

/// `guild:<guildId>`
///
/// Shared by ticket creation and the staff settings commands. Each flow
/// merges only the fields it owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuildRecord {
    /// Guild id, repeated inside the document
    pub guild_id: Option<String>,
    /// Name as of the most recent ticket
    pub guild_name: Option<String>,
    /// Channel that hosts ticket threads
    pub system_channel_id: Option<String>,
    /// Webhook used to post user messages into ticket threads
    pub webhook_url: Option<String>,
    /// `Setup` until the first ticket, then `Active`
    pub status: Option<GuildStatus>,
    /// Role mentioned on new tickets
    pub ping_role_id: Option<String>,
    /// Role mentioned when no ping role is set
    pub staff_role_id: Option<String>,
}

/// `cooldown:create:<userId>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownRecord {
    /// When the user last created a ticket
    pub last_created_at: DateTime<Utc>,
}

/// True for a Discord snowflake: 17 to 20 ASCII digits.
#[must_use]
pub fn is_snowflake(value: &str) -> bool {
    (17..=20).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

/// Loads a user record, treating a missing one as empty.
pub async fn load_user(store: &dyn KeyValueStore, user_id: &str) -> Result<UserRecord> {
    Ok(store::read(store, &keys::user(user_id))
        .await?
        .unwrap_or_default())
}

/// Loads a ticket record by id.
pub async fn load_ticket(store: &dyn KeyValueStore, ticket_id: &str) -> Result<Option<TicketRecord>> {
    store::read(store, &keys::ticket(ticket_id)).await
}

/// Loads a guild record by id.
pub async fn load_guild(store: &dyn KeyValueStore, guild_id: &str) -> Result<Option<GuildRecord>> {
    store::read(store, &keys::guild(guild_id)).await
}

/// Follows the thread index to the ticket it points at.
pub async fn ticket_for_thread(
    store: &dyn KeyValueStore,
    thread_id: &str,
) -> Result<Option<TicketRecord>> {
    let Some(index) = store::read::<ThreadIndex>(store, &keys::thread(thread_id)).await? else {
        return Ok(None);
    };
    load_ticket(store, &index.ticket_id).await
}
