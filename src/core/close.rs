//! Ticket closure.
//!
//! Closure runs as a fixed sequence of steps with no rollback, except that
//! a failed archive puts the user's slot back so the close can be retried.
//! Every step logs its own outcome.

use super::{
    records::{ThreadIndex, TicketRecord, load_ticket},
    slot,
};
use crate::{
    discord::{DiscordGateway, UpstreamResult},
    errors::{StepOutcome, TicketError, TicketResult},
    store::{self, KeyValueStore, keys},
};
use tracing::{error, info, instrument, warn};

/// DM sent to the user once their ticket is closed.
pub const CLOSURE_NOTICE: &str = "## Your ticket has been closed!\n\nStaff have resolved your issue. If you need further assistance, you can create a new ticket anytime using `/create`.";

/// What happened during a closure that reached the archive step.
///
/// Only the archive step can fail a closure, so a report always means the
/// thread is archived and locked. The remaining fields record how the
/// best-effort steps around it went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureReport {
    /// Id of the closed ticket
    pub ticket_id: String,
    /// Per-guild case number of the closed ticket
    pub case_number: i64,
    /// User who opened the ticket
    pub user_id: String,
    /// `Skipped` when the user's slot already pointed elsewhere
    pub slot_cleared: StepOutcome,
    /// Outcome of the closure DM to the user
    pub user_notified: StepOutcome,
    /// Outcome of deleting the ticket record and its thread index
    pub records_deleted: StepOutcome,
}

/// Resolves the open ticket bound to `channel_id`.
pub async fn resolve_ticket_thread(
    store: &dyn KeyValueStore,
    channel_id: &str,
) -> TicketResult<TicketRecord> {
    let Some(index) = store::read::<ThreadIndex>(store, &keys::thread(channel_id)).await? else {
        return Err(TicketError::NotATicketThread {
            channel_id: channel_id.to_string(),
        });
    };
    match load_ticket(store, &index.ticket_id).await? {
        Some(ticket) if ticket.is_open() => Ok(ticket),
        _ => Err(TicketError::TicketNotFound {
            ticket_id: index.ticket_id,
        }),
    }
}

async fn notify_user(gateway: &dyn DiscordGateway, user_id: &str) -> UpstreamResult<()> {
    let channel = gateway.open_dm_channel(user_id).await?;
    gateway.post_message(&channel, CLOSURE_NOTICE).await
}

/// Closes `ticket`: frees the user's slot, archives and locks the thread,
/// tells the user, then deletes the ticket and its thread index.
///
/// Only the archive step is fatal.
#[instrument(skip_all, fields(ticket_id = %ticket.ticket_id, thread_id = %ticket.thread_id))]
pub async fn close_ticket(
    store: &dyn KeyValueStore,
    gateway: &dyn DiscordGateway,
    ticket: &TicketRecord,
) -> TicketResult<ClosureReport> {
    let slot_cleared = match slot::release(store, &ticket.user_id, &ticket.ticket_id).await {
        Ok(true) => {
            info!(user_id = %ticket.user_id, "Cleared active ticket");
            StepOutcome::Done
        }
        Ok(false) => {
            info!(user_id = %ticket.user_id, "Active ticket already pointed elsewhere");
            StepOutcome::Skipped
        }
        Err(e) => {
            warn!(user_id = %ticket.user_id, error = %e, "Could not clear active ticket");
            StepOutcome::Failed
        }
    };

    if let Err(e) = gateway.archive_thread(&ticket.thread_id).await {
        error!(error = %e, "Failed to archive ticket thread, closure aborted");
        if slot_cleared == StepOutcome::Done {
            if let Err(restore) = slot::restore(store, &ticket.user_id, &ticket.ticket_id).await {
                warn!(user_id = %ticket.user_id, error = %restore, "Could not restore active ticket");
            }
        }
        return Err(TicketError::UpstreamUnavailable(e));
    }
    info!("Archived and locked ticket thread");

    let user_notified = match notify_user(gateway, &ticket.user_id).await {
        Ok(()) => {
            info!(user_id = %ticket.user_id, "Sent closure notice");
            StepOutcome::Done
        }
        Err(e) => {
            warn!(user_id = %ticket.user_id, error = %e, "Could not send closure notice");
            StepOutcome::Failed
        }
    };

    let mut records_deleted = StepOutcome::Done;
    for key in [keys::ticket(&ticket.ticket_id), keys::thread(&ticket.thread_id)] {
        if let Err(e) = store.delete(&key).await {
            warn!(%key, error = %e, "Could not delete ticket record");
            records_deleted = StepOutcome::Failed;
        }
    }
    if records_deleted == StepOutcome::Done {
        info!("Deleted ticket records");
    }

    Ok(ClosureReport {
        ticket_id: ticket.ticket_id.clone(),
        case_number: ticket.case_number,
        user_id: ticket.user_id.clone(),
        slot_cleared,
        user_notified,
        records_deleted,
    })
}
