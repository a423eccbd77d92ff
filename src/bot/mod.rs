//! Bot layer - Discord-specific interface and command handlers
//!
//! Commands are thin: they turn an interaction into a [`Requester`] and a
//! call into [`crate::core`], then render the outcome as a reply.
//!
//! [`Requester`]: crate::core::Requester

/// Slash command implementations (tickets, messaging, settings, account, general)
pub mod commands;
/// Interaction follow-ups and reply helpers
pub mod handlers;

use crate::{
    config::AppConfig,
    discord::{DiscordGateway, SerenityGateway},
    errors::{Error, Result},
    store::{KeyValueStore, SeaOrmStore},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
pub struct BotData {
    /// Ticket state
    pub store: Arc<dyn KeyValueStore>,
    /// Discord REST calls made by the ticket lifecycle
    pub gateway: Arc<dyn DiscordGateway>,
    /// Ticket tunables and OAuth settings loaded at startup
    pub config: Arc<AppConfig>,
}

impl BotData {
    /// Bundles the store, gateway, and configuration shared by every command.
    ///
    /// # Arguments
    /// * `store` - Backend holding ticket, user, and guild records
    /// * `gateway` - Discord REST boundary, usually a `SerenityGateway` over the client's HTTP
    /// * `config` - Loaded application configuration
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        gateway: Arc<dyn DiscordGateway>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }
}

/// Every command the bot registers.
#[must_use]
pub fn commands() -> Vec<poise::Command<BotData, Error>> {
    vec![
        commands::create(),
        commands::close(),
        commands::send(),
        commands::set_ping_role(),
        commands::view_ping_role(),
        commands::set_staff_role(),
        commands::authorize_account(),
        commands::help(),
        commands::ping(),
    ]
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            let reply = poise::CreateReply::default()
                .content("❌ Something went wrong while handling this command. Please try again.")
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Connects to Discord and serves commands until the client stops.
#[instrument(skip_all)]
pub async fn run_bot(token: String, config: Arc<AppConfig>, db: DatabaseConnection) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(SeaOrmStore::new(db));

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands(),
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                if let Some(guild) = config.dev_guild_id {
                    let guild_id = serenity::GuildId::new(guild);
                    poise::builtins::register_in_guild(ctx, &framework.options().commands, guild_id)
                        .await?;
                    info!("Registered commands in guild {}", guild_id);
                } else {
                    info!("Registering commands globally...");
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                }

                let gateway: Arc<dyn DiscordGateway> = Arc::new(SerenityGateway::new(
                    Arc::clone(&ctx.http),
                    config.tickets.upstream_timeout(),
                ));
                Ok(BotData::new(store, gateway, config))
            })
        })
        .build();

    // Slash commands and DMs with the bot need no privileged intents
    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))
        .map_err(Error::from)
}
