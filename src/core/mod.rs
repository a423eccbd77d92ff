//! Ticket lifecycle.
//!
//! Framework-agnostic operations over a [`KeyValueStore`] and a
//! [`DiscordGateway`]. Nothing in here knows about poise or interactions;
//! the bot layer extracts a [`Requester`] and maps the returned
//! [`TicketError`]s to replies.
//!
//! [`KeyValueStore`]: crate::store::KeyValueStore
//! [`DiscordGateway`]: crate::discord::DiscordGateway
//! [`TicketError`]: crate::errors::TicketError

/// OAuth account linking
pub mod accounts;
/// Ticket closure saga
pub mod close;
/// Two-phase ticket creation
pub mod create;
/// Per-guild ping and staff roles
pub mod guild_settings;
/// Message relay between users and staff
pub mod messaging;
/// Typed store records
pub mod records;
mod slot;

use crate::errors::{TicketError, TicketResult};

/// The Discord user an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    /// Discord user id
    pub user_id: String,
    /// Unique username
    pub username: String,
    /// Global display name, falling back to the username
    pub display_name: String,
    /// Avatar shown on webhook-relayed messages
    pub avatar_url: Option<String>,
}

/// Rejects a missing or blank requester with `UserUnresolved`.
pub fn require_user(requester: Option<&Requester>) -> TicketResult<&Requester> {
    requester
        .filter(|r| !r.user_id.trim().is_empty())
        .ok_or(TicketError::UserUnresolved)
}
