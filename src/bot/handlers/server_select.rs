//! Server picker for `/create`.
//!
//! The picker is an ephemeral string select listing the mutual servers. The
//! selection is collected on the same message, bound to the invoking user,
//! and drives the second phase of ticket creation.

use super::replies::ticket_error_reply;
use crate::{
    bot::BotData,
    core::{
        Requester,
        create::{self, OpenedTicket},
    },
    discord::GuildSummary,
    errors::{Error, Result},
};
use chrono::Utc;
use poise::{CreateReply, serenity_prelude as serenity};
use std::time::Duration;
use tracing::{debug, info};

/// Custom id of the server select menu.
pub const SERVER_SELECT_ID: &str = "create:select_server";

const SELECTION_TIMEOUT: Duration = Duration::from_secs(120);

fn select_menu(guilds: &[GuildSummary]) -> serenity::CreateSelectMenu {
    let options = guilds
        .iter()
        .map(|guild| serenity::CreateSelectMenuOption::new(&guild.name, &guild.id))
        .collect();
    serenity::CreateSelectMenu::new(
        SERVER_SELECT_ID,
        serenity::CreateSelectMenuKind::String { options },
    )
    .placeholder("Select a server")
}

fn created_embed(opened: &OpenedTicket) -> serenity::CreateEmbed {
    let embed = serenity::CreateEmbed::default()
        .title(format!("Ticket #{}", opened.ticket.case_number))
        .description(format!(
            "Your ticket is open in **{}**. Staff will reply here; use `/send` to message them.",
            opened.guild_name
        ))
        .color(0x0058_65F2); // Discord blurple
    match &opened.guild_icon_url {
        Some(icon) => embed.thumbnail(icon),
        None => embed,
    }
}

/// Shows the picker and opens a ticket in the server the user selects.
pub async fn prompt_and_open(
    ctx: poise::Context<'_, BotData, Error>,
    requester: &Requester,
    guilds: Vec<GuildSummary>,
) -> Result<()> {
    let reply = CreateReply::default()
        .content("📋 **Select a server to create a ticket in:**")
        .components(vec![serenity::CreateActionRow::SelectMenu(select_menu(&guilds))])
        .ephemeral(true);
    let handle = ctx.send(reply).await?;
    let message = handle.message().await?;

    let Some(interaction) = serenity::ComponentInteractionCollector::new(ctx.serenity_context())
        .author_id(ctx.author().id)
        .message_id(message.id)
        .custom_ids(vec![SERVER_SELECT_ID.to_string()])
        .timeout(SELECTION_TIMEOUT)
        .await
    else {
        debug!(user_id = %requester.user_id, "Server selection timed out");
        handle
            .edit(
                ctx,
                CreateReply::default()
                    .content("⌛ Server selection timed out. Run `/create` again.")
                    .components(vec![]),
            )
            .await?;
        return Ok(());
    };

    // Acknowledge now; creation can take longer than the interaction deadline
    interaction
        .create_response(
            ctx.serenity_context(),
            serenity::CreateInteractionResponse::Acknowledge,
        )
        .await?;

    let selected = match &interaction.data.kind {
        serenity::ComponentInteractionDataKind::StringSelect { values } => values.first().cloned(),
        _ => None,
    };
    let Some(guild_id) = selected else {
        handle
            .edit(
                ctx,
                CreateReply::default()
                    .content("❌ No server was selected.")
                    .components(vec![]),
            )
            .await?;
        return Ok(());
    };

    let data = ctx.data();
    let outcome = create::open_ticket(
        data.store.as_ref(),
        data.gateway.as_ref(),
        &data.config.tickets,
        Some(requester),
        &guild_id,
        Utc::now(),
    )
    .await;

    let edit = match outcome {
        Ok(opened) => {
            info!(
                ticket_id = %opened.ticket.ticket_id,
                guild_id = %opened.ticket.guild_id,
                "Ticket created from server picker"
            );
            CreateReply::default()
                .content("✅ **Ticket created!**")
                .embed(created_embed(&opened))
                .components(vec![])
        }
        Err(e) => {
            debug!(error = %e, "Ticket creation rejected");
            let reply = ticket_error_reply(&data.config, &e);
            if e.needs_authorization() {
                reply
            } else {
                reply.components(vec![])
            }
        }
    };
    handle.edit(ctx, edit).await?;
    Ok(())
}
