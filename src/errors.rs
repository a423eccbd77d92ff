//! Error types for the bot.
//!
//! [`Error`] covers infrastructure failures (configuration, database, the
//! Discord framework). [`TicketError`] is the closed set of outcomes the
//! ticket lifecycle can reject a request with; every variant maps to a
//! user-facing reply. [`UpstreamError`] describes a failed Discord REST call.

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Discord JSON error code returned when a user does not accept DMs from the bot.
pub const CANNOT_MESSAGE_USER: i64 = 50007;

/// Infrastructure errors surfaced by startup, storage, and command handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// The SeaORM connection or a query failed.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A stored document did not match its expected shape.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable is missing or not unicode.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Error raised by serenity while talking to Discord.
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),

    /// A ticket operation rejected the request.
    #[error(transparent)]
    Ticket(#[from] TicketError),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// Result of a ticket lifecycle operation.
pub type TicketResult<T> = std::result::Result<T, TicketError>;

/// A failed call to the Discord REST API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// Discord answered with a non-2xx status.
    #[error("Discord returned HTTP {status} (code {code:?})")]
    Status {
        /// HTTP status code
        status: u16,
        /// Discord JSON error code, when the body carried one
        code: Option<i64>,
    },

    /// The call did not finish within the configured timeout.
    #[error("Discord request timed out")]
    Timeout,

    /// An identifier could not be turned into a snowflake.
    #[error("invalid Discord id: {0:?}")]
    InvalidId(String),

    /// Connection, decoding, or any other client-side failure.
    #[error("Discord request failed: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// Returns the HTTP status when Discord answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for 401/403 - the credential used for the call was rejected.
    #[must_use]
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// True when Discord refused to deliver a direct message.
    #[must_use]
    pub fn is_dm_blocked(&self) -> bool {
        match self {
            Self::Status { code: Some(code), .. } => *code == CANNOT_MESSAGE_USER,
            Self::Status { status, .. } => *status == 403,
            _ => false,
        }
    }
}

/// Every way a ticket operation can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
    /// The invocation carried no usable user id.
    #[error("could not resolve the requesting user")]
    UserUnresolved,

    /// The user created a ticket within the cooldown window.
    #[error("ticket creation is on cooldown until {retry_at}")]
    RateLimited {
        /// Earliest time another ticket may be created
        retry_at: DateTime<Utc>,
    },

    /// The user's slot already holds an open ticket or an in-flight claim.
    #[error("user already has open ticket {ticket_id}")]
    DuplicateTicket {
        /// Ticket occupying the slot
        ticket_id: String,
    },

    /// The user never linked their account.
    #[error("no OAuth access token stored for the user")]
    AuthorizationRequired,

    /// Discord rejected the stored access token.
    #[error("the stored OAuth access token was rejected")]
    AuthorizationExpired,

    /// The user and the bot share no server, or the chosen one is not shared.
    #[error("no mutual servers between the user and the bot")]
    NoMutualServers,

    /// The chosen guild has no system channel to host ticket threads.
    #[error("guild {guild_id} has no system channel")]
    NoSystemChannel {
        /// Guild that was chosen
        guild_id: String,
    },

    /// `/close` ran in a channel with no thread index.
    #[error("channel {channel_id} is not a ticket thread")]
    NotATicketThread {
        /// Channel the command ran in
        channel_id: String,
    },

    /// The thread index points at a missing or closed ticket.
    #[error("ticket {ticket_id} not found or not open")]
    TicketNotFound {
        /// Ticket the index pointed at
        ticket_id: String,
    },

    /// A staff `/send` ran outside an open ticket thread.
    #[error("channel {channel_id} is not bound to an open ticket")]
    InvalidThread {
        /// Channel the command ran in
        channel_id: String,
    },

    /// A user `/send` ran without an open ticket.
    #[error("user has no open ticket")]
    NoActiveTicket,

    /// Discord refused to deliver a DM to the user.
    #[error("user {user_id} does not accept direct messages")]
    DeliveryBlocked {
        /// Recipient of the DM
        user_id: String,
    },

    /// A role or channel id is not a Discord snowflake.
    #[error("{value:?} is not a valid Discord id")]
    InvalidSnowflake {
        /// The rejected value
        value: String,
    },

    /// A critical Discord call failed.
    #[error("upstream API unavailable: {0}")]
    UpstreamUnavailable(UpstreamError),

    /// A critical store read or write failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl TicketError {
    /// The reply shown to whoever invoked the command.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::UserUnresolved => "❌ Could not resolve user.".to_string(),
            Self::RateLimited { retry_at } => format!(
                "⏳ You opened a ticket recently. You can create another one <t:{}:R>.",
                retry_at.timestamp()
            ),
            Self::DuplicateTicket { .. } => {
                "❌ You already have an open ticket. Use `/send` in DMs to communicate with staff."
                    .to_string()
            }
            Self::AuthorizationRequired => {
                "⚠️ You need to authorize the app first to see your mutual servers.".to_string()
            }
            Self::AuthorizationExpired => {
                "❌ Your Discord authorization has expired. Please re-authorize the app."
                    .to_string()
            }
            Self::NoMutualServers => "❌ No mutual servers found. Make sure the bot is invited to the servers you are in.".to_string(),
            Self::NoSystemChannel { .. } => "❌ This server does not have a system channel configured. Please tell the server owner to configure one.\n\n-# You may want to forward this message to the server owner.".to_string(),
            Self::NotATicketThread { .. } => {
                "❌ This command can only be used in ticket threads.".to_string()
            }
            Self::TicketNotFound { .. } => "❌ Ticket data not found.".to_string(),
            Self::InvalidThread { .. } => {
                "❌ This thread is not linked to an open ticket.".to_string()
            }
            Self::NoActiveTicket => {
                "❌ You don't have an open ticket. Use `/create` to open one.".to_string()
            }
            Self::DeliveryBlocked { .. } => "⚠️ The user has direct messages disabled, so the message could not be delivered.".to_string(),
            Self::InvalidSnowflake { .. } => "❌ That is not a valid role.".to_string(),
            Self::UpstreamUnavailable(UpstreamError::Status { status: 429, .. }) => {
                "❌ Too many requests. Please wait a moment and try again.".to_string()
            }
            Self::UpstreamUnavailable(UpstreamError::Timeout) => "❌ Discord is taking too long to respond. Please try again in a moment.".to_string(),
            Self::UpstreamUnavailable(_) => "❌ The Discord request failed. Check bot permissions in the selected server and try again.".to_string(),
            Self::StoreUnavailable(_) => {
                "❌ Database is responding slowly. Please try again.".to_string()
            }
        }
    }

    /// Whether the reply should carry the OAuth authorization link.
    #[must_use]
    pub const fn needs_authorization(&self) -> bool {
        matches!(self, Self::AuthorizationRequired | Self::AuthorizationExpired)
    }

    /// Whether retrying the same command unchanged can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::UpstreamUnavailable(_) | Self::StoreUnavailable(_)
        )
    }
}

/// Store and serialization failures surface as `StoreUnavailable`.
impl From<Error> for TicketError {
    fn from(value: Error) -> Self {
        match value {
            Error::Ticket(inner) => inner,
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Outcome of one step of a best-effort sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran and succeeded.
    Done,
    /// Nothing to do for this step.
    Skipped,
    /// The step failed; the failure was logged and swallowed.
    Failed,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}
