//! Per-guild staff configuration: the role pinged on new tickets.
//!
//! Configuring a role on a guild the bot has not opened a ticket in yet
//! creates its guild record in the `setup` state; the first ticket moves it
//! to `active`.

use super::records::{GuildRecord, GuildStatus, is_snowflake, load_guild};
use crate::{
    errors::{Error, TicketError, TicketResult},
    store::{KeyValueStore, keys},
};
use serde_json::{Value, json};
use tracing::{info, instrument};

fn validate_role(role_id: &str) -> TicketResult<()> {
    if is_snowflake(role_id) {
        Ok(())
    } else {
        Err(TicketError::InvalidSnowflake {
            value: role_id.to_string(),
        })
    }
}

/// Merges a role field into the guild record, marking a guild with no
/// status yet as `setup`.
async fn write_role(
    store: &dyn KeyValueStore,
    guild_id: &str,
    field: &str,
    role_id: &str,
) -> TicketResult<()> {
    let mut patch = json!({ "guildId": guild_id });
    patch[field] = Value::from(role_id);
    let has_status = load_guild(store, guild_id)
        .await?
        .is_some_and(|guild| guild.status.is_some());
    if !has_status {
        patch["status"] = serde_json::to_value(GuildStatus::Setup).map_err(Error::from)?;
    }
    store.update(&keys::guild(guild_id), patch).await?;
    Ok(())
}

/// Sets the role mentioned in new-ticket notices.
///
/// # Arguments
/// * `guild_id` - Guild being configured
/// * `role_id` - Role snowflake; anything else is rejected with `InvalidSnowflake`
#[instrument(skip(store))]
pub async fn set_ping_role(
    store: &dyn KeyValueStore,
    guild_id: &str,
    role_id: &str,
) -> TicketResult<()> {
    validate_role(role_id)?;
    write_role(store, guild_id, "pingRoleId", role_id).await?;
    info!("Ping role set");
    Ok(())
}

/// Clears the ping role and returns the one that was configured.
#[instrument(skip(store))]
pub async fn clear_ping_role(
    store: &dyn KeyValueStore,
    guild_id: &str,
) -> TicketResult<Option<String>> {
    let previous = ping_role(store, guild_id).await?;
    store
        .update(
            &keys::guild(guild_id),
            json!({ "guildId": guild_id, "pingRoleId": null }),
        )
        .await?;
    info!(previous = ?previous, "Ping role cleared");
    Ok(previous)
}

/// Returns the configured ping role, if any.
pub async fn ping_role(store: &dyn KeyValueStore, guild_id: &str) -> TicketResult<Option<String>> {
    Ok(load_guild(store, guild_id)
        .await?
        .and_then(|guild| guild.ping_role_id))
}

/// Sets the staff role, mentioned on new tickets when no ping role is configured.
#[instrument(skip(store))]
pub async fn set_staff_role(
    store: &dyn KeyValueStore,
    guild_id: &str,
    role_id: &str,
) -> TicketResult<()> {
    validate_role(role_id)?;
    write_role(store, guild_id, "staffRoleId", role_id).await?;
    info!("Staff role set");
    Ok(())
}

fn valid_role(role: Option<&str>) -> Option<&str> {
    role.filter(|r| is_snowflake(r))
}

/// Mention for a new-ticket notice: ping role, then staff role, then `fallback`.
///
/// A stored role that is not a valid snowflake is skipped, not mentioned.
#[must_use]
pub fn creation_mention(guild: Option<&GuildRecord>, fallback: &str) -> String {
    guild
        .and_then(|g| {
            valid_role(g.ping_role_id.as_deref())
                .or_else(|| valid_role(g.staff_role_id.as_deref()))
        })
        .map_or_else(|| fallback.to_string(), |role| format!("<@&{role}>"))
}
