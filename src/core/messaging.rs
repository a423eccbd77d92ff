//! Relaying messages between a ticket's user and staff.
//!
//! Nothing here writes to the store; message content is never persisted.

use super::{
    Requester,
    records::{TicketRecord, load_guild, load_ticket, load_user, ticket_for_thread},
    require_user,
};
use crate::{
    discord::{DiscordGateway, WebhookMessage},
    errors::{TicketError, TicketResult, UpstreamError},
    store::KeyValueStore,
};
use tracing::{debug, instrument, warn};

/// Where `/send` was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conversation {
    /// The user's DM with the bot: the message goes to staff.
    DirectMessage,
    /// A guild channel: the message goes to the user of the ticket bound to it.
    GuildChannel {
        /// Channel `/send` was invoked in
        channel_id: String,
    },
}

/// How a relayed message was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted into the ticket thread through the guild webhook, under the user's name
    Webhook,
    /// Posted into the ticket thread by the bot, with the author inlined
    BotMessage,
    /// Sent to the user's DM channel
    DirectMessage,
}

/// Confirmation of a relayed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReceipt {
    /// Ticket the message was relayed on
    pub ticket_id: String,
    /// Case number of that ticket
    pub case_number: i64,
    /// How the message reached the other side
    pub delivery: Delivery,
}

/// DM body for a staff reply, prefixed with the staff member's name.
#[must_use]
pub fn staff_dm_text(staff_name: &str, content: &str) -> String {
    format!("**Staff ({staff_name}):** {content}")
}

/// Thread message body used when the webhook is unavailable.
#[must_use]
pub fn attributed_text(author: &str, content: &str) -> String {
    format!("**{author}:** {content}")
}

/// Relays `content` in the direction implied by `conversation`.
#[instrument(skip(store, gateway, requester, content), fields(user_id = requester.map(|r| r.user_id.as_str())))]
pub async fn relay_message(
    store: &dyn KeyValueStore,
    gateway: &dyn DiscordGateway,
    requester: Option<&Requester>,
    conversation: &Conversation,
    content: &str,
) -> TicketResult<RelayReceipt> {
    let requester = require_user(requester)?;
    match conversation {
        Conversation::DirectMessage => relay_to_staff(store, gateway, requester, content).await,
        Conversation::GuildChannel { channel_id } => {
            relay_to_user(store, gateway, requester, channel_id, content).await
        }
    }
}

async fn active_ticket(store: &dyn KeyValueStore, user_id: &str) -> TicketResult<TicketRecord> {
    let user = load_user(store, user_id).await?;
    let Some(ticket_id) = user.active_ticket_id else {
        return Err(TicketError::NoActiveTicket);
    };
    match load_ticket(store, &ticket_id).await? {
        Some(ticket) if ticket.is_open() => Ok(ticket),
        _ => Err(TicketError::NoActiveTicket),
    }
}

/// User to staff: webhook into the ticket thread, bot message as fallback.
pub async fn relay_to_staff(
    store: &dyn KeyValueStore,
    gateway: &dyn DiscordGateway,
    requester: &Requester,
    content: &str,
) -> TicketResult<RelayReceipt> {
    let ticket = active_ticket(store, &requester.user_id).await?;

    let webhook_url = match load_guild(store, &ticket.guild_id).await {
        Ok(guild) => guild.and_then(|g| g.webhook_url),
        Err(e) => {
            warn!(guild_id = %ticket.guild_id, error = %e, "Could not read guild record, posting as bot");
            None
        }
    };

    if let Some(webhook_url) = webhook_url {
        let message = WebhookMessage {
            webhook_url,
            thread_id: ticket.thread_id.clone(),
            username: requester.display_name.clone(),
            avatar_url: requester.avatar_url.clone(),
            content: content.to_string(),
        };
        match gateway.execute_webhook(&message).await {
            Ok(()) => return Ok(receipt(&ticket, Delivery::Webhook)),
            Err(e) => {
                warn!(thread_id = %ticket.thread_id, error = %e, "Webhook delivery failed, posting as bot");
            }
        }
    }

    gateway
        .post_message(
            &ticket.thread_id,
            &attributed_text(&requester.display_name, content),
        )
        .await
        .map_err(TicketError::UpstreamUnavailable)?;
    Ok(receipt(&ticket, Delivery::BotMessage))
}

fn dm_failure(user_id: &str, error: UpstreamError) -> TicketError {
    if error.is_dm_blocked() {
        debug!(user_id, "User does not accept direct messages");
        TicketError::DeliveryBlocked {
            user_id: user_id.to_string(),
        }
    } else {
        TicketError::UpstreamUnavailable(error)
    }
}

/// Staff to user: direct message attributed to the staff member.
pub async fn relay_to_user(
    store: &dyn KeyValueStore,
    gateway: &dyn DiscordGateway,
    staff: &Requester,
    channel_id: &str,
    content: &str,
) -> TicketResult<RelayReceipt> {
    let ticket = match ticket_for_thread(store, channel_id).await? {
        Some(ticket) if ticket.is_open() => ticket,
        _ => {
            return Err(TicketError::InvalidThread {
                channel_id: channel_id.to_string(),
            });
        }
    };

    let dm_channel = gateway
        .open_dm_channel(&ticket.user_id)
        .await
        .map_err(|e| dm_failure(&ticket.user_id, e))?;
    gateway
        .post_message(&dm_channel, &staff_dm_text(&staff.display_name, content))
        .await
        .map_err(|e| dm_failure(&ticket.user_id, e))?;
    Ok(receipt(&ticket, Delivery::DirectMessage))
}

fn receipt(ticket: &TicketRecord, delivery: Delivery) -> RelayReceipt {
    RelayReceipt {
        ticket_id: ticket.ticket_id.clone(),
        case_number: ticket.case_number,
        delivery,
    }
}
