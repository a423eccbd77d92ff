/// Database configuration and connection management
pub mod database;

/// Ticket settings from config.toml plus secrets from the environment
pub mod settings;

pub use settings::{AppConfig, OAuthSettings, TicketSettings, load_app_configuration};
