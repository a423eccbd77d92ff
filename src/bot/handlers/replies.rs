use crate::{
    bot::BotData,
    config::AppConfig,
    core::{Requester, accounts},
    errors::{Error, Result, TicketError},
};
use poise::{CreateReply, serenity_prelude as serenity};
use tracing::{debug, warn};

/// The invoking user as the ticket lifecycle sees them.
pub fn requester(ctx: poise::Context<'_, BotData, Error>) -> Requester {
    let author = ctx.author();
    Requester {
        user_id: author.id.to_string(),
        username: author.name.clone(),
        display_name: author
            .global_name
            .clone()
            .unwrap_or_else(|| author.name.clone()),
        avatar_url: author.avatar_url(),
    }
}

/// A link button to the OAuth authorization page, when OAuth is configured.
pub fn authorize_button(config: &AppConfig, include_commands_scope: bool) -> Option<serenity::CreateButton> {
    let oauth = config.oauth.as_ref()?;
    match accounts::authorization_url(oauth, include_commands_scope) {
        Ok(url) => Some(serenity::CreateButton::new_link(url.as_str()).label("Authorize")),
        Err(e) => {
            warn!(error = %e, "Could not build authorization link");
            None
        }
    }
}

/// Ephemeral reply for a rejected ticket operation.
pub fn ticket_error_reply(config: &AppConfig, err: &TicketError) -> CreateReply {
    let mut reply = CreateReply::default()
        .content(err.user_message())
        .ephemeral(true);
    if err.needs_authorization() {
        if let Some(button) = authorize_button(config, false) {
            reply = reply.components(vec![serenity::CreateActionRow::Buttons(vec![button])]);
        }
    }
    reply
}

/// Logs `err` and replies with its user-facing message.
pub async fn send_ticket_error(
    ctx: poise::Context<'_, BotData, Error>,
    err: &TicketError,
) -> Result<()> {
    if err.is_retryable() {
        warn!(command = %ctx.command().name, error = %err, "Ticket command failed");
    } else {
        debug!(command = %ctx.command().name, error = %err, "Ticket command rejected");
    }
    ctx.send(ticket_error_reply(&ctx.data().config, err)).await?;
    Ok(())
}
