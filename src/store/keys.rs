//! Key layout of the store.

/// `user:<userId>` - per-user record holding the active ticket slot and OAuth token.
#[must_use]
pub fn user(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// `ticket:<ticketId>` - one open ticket.
#[must_use]
pub fn ticket(ticket_id: &str) -> String {
    format!("ticket:{ticket_id}")
}

/// `thread:<threadId>` - reverse index from a Discord thread to its ticket.
#[must_use]
pub fn thread(thread_id: &str) -> String {
    format!("thread:{thread_id}")
}

/// `guild:<guildId>` - per-guild configuration.
#[must_use]
pub fn guild(guild_id: &str) -> String {
    format!("guild:{guild_id}")
}

/// `counter:<guildId>` - per-guild case number counter.
#[must_use]
pub fn case_counter(guild_id: &str) -> String {
    format!("counter:{guild_id}")
}

/// `cooldown:create:<userId>` - when the user last created a ticket.
#[must_use]
pub fn create_cooldown(user_id: &str) -> String {
    format!("cooldown:create:{user_id}")
}
