//! The per-user active ticket slot (`user:<id>.activeTicketId`).
//!
//! Every transition of the slot is a compare-and-swap against the user
//! record as it was read, retried a bounded number of times. Two creations
//! racing for the same user can therefore never both hold the slot.

use super::records::{TicketRecord, UserRecord, load_ticket};
use crate::{
    errors::{Error, Result, TicketError, TicketResult},
    store::{KeyValueStore, keys, merge_into},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

const MAX_SLOT_ATTEMPTS: usize = 3;

fn parse_user(value: Option<&Value>) -> Result<UserRecord> {
    value
        .map(|v| serde_json::from_value(v.clone()))
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(Error::from)
}

fn patched(current: Option<&Value>, patch: Value) -> Value {
    let mut next = current
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));
    merge_into(&mut next, patch);
    next
}

/// Returns the ticket id that currently blocks `user` from opening another ticket.
///
/// An id whose ticket record is open blocks. An id without a ticket record
/// blocks only while its claim is younger than `grace` (a creation still in
/// flight); older claims are leftovers of a failed creation.
pub(crate) async fn blocking_ticket(
    store: &dyn KeyValueStore,
    user: &UserRecord,
    now: DateTime<Utc>,
    grace: Duration,
) -> Result<Option<String>> {
    let Some(active) = user.active_ticket_id.as_deref() else {
        return Ok(None);
    };
    match load_ticket(store, active).await? {
        Some(ticket) if ticket.is_open() => Ok(Some(active.to_string())),
        Some(_) => Ok(None),
        None => {
            let in_flight = user
                .active_claimed_at
                .is_some_and(|claimed| now - claimed < grace);
            if !in_flight {
                debug!(ticket_id = active, "ignoring stale ticket slot");
            }
            Ok(in_flight.then(|| active.to_string()))
        }
    }
}

/// Claims the slot of `user_id` for `ticket_id`.
///
/// Fails with `DuplicateTicket` when another ticket holds it.
pub(crate) async fn claim(
    store: &dyn KeyValueStore,
    user_id: &str,
    ticket_id: &str,
    guild_id: &str,
    now: DateTime<Utc>,
    grace: Duration,
) -> TicketResult<()> {
    let key = keys::user(user_id);
    for attempt in 1..=MAX_SLOT_ATTEMPTS {
        let current = store.get(&key).await?;
        let user = parse_user(current.as_ref())?;
        if let Some(held) = blocking_ticket(store, &user, now, grace).await? {
            return Err(TicketError::DuplicateTicket { ticket_id: held });
        }

        let next = patched(
            current.as_ref(),
            json!({
                "activeTicketId": ticket_id,
                "activeClaimedAt": now,
                "pendingGuildId": guild_id,
            }),
        );
        if store.compare_and_swap(&key, current.as_ref(), next).await? {
            debug!(user_id, ticket_id, attempt, "ticket slot claimed");
            return Ok(());
        }
        debug!(user_id, attempt, "ticket slot changed while claiming, retrying");
    }
    warn!(user_id, "gave up claiming ticket slot after repeated conflicts");
    Err(TicketError::StoreUnavailable(
        "ticket slot kept changing during claim".to_string(),
    ))
}

/// Marks the claim as complete once the ticket record exists.
pub(crate) async fn finalize(
    store: &dyn KeyValueStore,
    ticket: &TicketRecord,
) -> Result<()> {
    store
        .update(
            &keys::user(&ticket.user_id),
            json!({
                "guildId": ticket.guild_id,
                "pendingGuildId": null,
                "activeClaimedAt": null,
            }),
        )
        .await?;
    Ok(())
}

/// Frees the slot of `user_id` if it still holds `ticket_id`.
///
/// Returns `false` when the slot held something else and was left alone.
pub(crate) async fn release(
    store: &dyn KeyValueStore,
    user_id: &str,
    ticket_id: &str,
) -> Result<bool> {
    let key = keys::user(user_id);
    for _ in 0..MAX_SLOT_ATTEMPTS {
        let current = store.get(&key).await?;
        let user = parse_user(current.as_ref())?;
        if user.active_ticket_id.as_deref() != Some(ticket_id) {
            return Ok(false);
        }
        let next = patched(
            current.as_ref(),
            json!({
                "activeTicketId": null,
                "activeClaimedAt": null,
                "pendingGuildId": null,
            }),
        );
        if store.compare_and_swap(&key, current.as_ref(), next).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Puts `ticket_id` back into an empty slot. Used when closure aborts.
pub(crate) async fn restore(
    store: &dyn KeyValueStore,
    user_id: &str,
    ticket_id: &str,
) -> Result<bool> {
    let key = keys::user(user_id);
    for _ in 0..MAX_SLOT_ATTEMPTS {
        let current = store.get(&key).await?;
        let user = parse_user(current.as_ref())?;
        if user.active_ticket_id.is_some() {
            return Ok(false);
        }
        let next = patched(current.as_ref(), json!({ "activeTicketId": ticket_id }));
        if store.compare_and_swap(&key, current.as_ref(), next).await? {
            return Ok(true);
        }
    }
    Ok(false)
}
