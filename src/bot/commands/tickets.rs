//! Ticket commands - `/create` and `/close`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::{
                replies::{requester, send_ticket_error},
                server_select,
            },
        },
        core::{
            close::{close_ticket, resolve_ticket_thread},
            create::list_mutual_guilds,
        },
        errors::{Error, Result},
    };
    use chrono::Utc;
    use tracing::info;

    /// Opens a support ticket in one of the servers you share with the bot.
    #[poise::command(slash_command)]
    pub async fn create(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.defer_ephemeral().await?;
        let data = ctx.data();
        let requester = requester(ctx);

        let guilds = match list_mutual_guilds(
            data.store.as_ref(),
            data.gateway.as_ref(),
            &data.config.tickets,
            Some(&requester),
            Utc::now(),
        )
        .await
        {
            Ok(guilds) => guilds,
            Err(e) => return send_ticket_error(ctx, &e).await,
        };

        server_select::prompt_and_open(ctx, &requester, guilds).await
    }

    /// Closes the ticket bound to this thread.
    #[poise::command(
        slash_command,
        guild_only,
        default_member_permissions = "MANAGE_THREADS",
        required_permissions = "MANAGE_THREADS"
    )]
    pub async fn close(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let data = ctx.data();
        let channel_id = ctx.channel_id().to_string();

        let ticket = match resolve_ticket_thread(data.store.as_ref(), &channel_id).await {
            Ok(ticket) => ticket,
            Err(e) => return send_ticket_error(ctx, &e).await,
        };

        // Reply before archiving; an archived thread no longer accepts messages
        ctx.say("🗄️ **Archived the ticket.**").await?;

        match close_ticket(data.store.as_ref(), data.gateway.as_ref(), &ticket).await {
            Ok(report) => {
                info!(
                    ticket_id = %report.ticket_id,
                    case_number = report.case_number,
                    closed_by = %ctx.author().id,
                    slot = %report.slot_cleared,
                    dm = %report.user_notified,
                    records = %report.records_deleted,
                    "Ticket closed"
                );
                Ok(())
            }
            Err(e) => send_ticket_error(ctx, &e).await,
        }
    }
}

pub use inner::*;
