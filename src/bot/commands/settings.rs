//! Staff role configuration - which role new-ticket notices mention.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::replies::send_ticket_error},
        core::guild_settings,
        errors::{Error, Result},
    };
    use poise::{CreateReply, serenity_prelude as serenity};

    /// What `/view-ping-role` should do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
    pub enum PingRoleAction {
        #[name = "view"]
        View,
        #[name = "clear"]
        Clear,
    }

    /// Ephemeral reply that never pings the roles it names.
    fn quiet(content: String) -> CreateReply {
        CreateReply::default()
            .content(content)
            .ephemeral(true)
            .allowed_mentions(serenity::CreateAllowedMentions::new())
    }

    fn guild_id(ctx: poise::Context<'_, BotData, Error>) -> Result<String> {
        ctx.guild_id()
            .map(|id| id.to_string())
            .ok_or_else(|| Error::Config {
                message: "guild-only command invoked outside a guild".to_string(),
            })
    }

    /// Sets the role mentioned when a new ticket is opened.
    #[poise::command(
        slash_command,
        rename = "set-ping-role",
        guild_only,
        default_member_permissions = "MANAGE_GUILD",
        required_permissions = "MANAGE_GUILD"
    )]
    pub async fn set_ping_role(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Role to mention on new tickets"] role: serenity::Role,
    ) -> Result<()> {
        let guild_id = guild_id(ctx)?;
        let role_id = role.id.to_string();
        match guild_settings::set_ping_role(ctx.data().store.as_ref(), &guild_id, &role_id).await {
            Ok(()) => {
                ctx.send(quiet(format!(
                    "✅ New tickets will now mention <@&{role_id}>."
                )))
                .await?;
                Ok(())
            }
            Err(e) => send_ticket_error(ctx, &e).await,
        }
    }

    /// Shows or clears the role mentioned when a new ticket is opened.
    #[poise::command(
        slash_command,
        rename = "view-ping-role",
        guild_only,
        default_member_permissions = "MANAGE_GUILD",
        required_permissions = "MANAGE_GUILD"
    )]
    pub async fn view_ping_role(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "View or clear the ping role"] action: PingRoleAction,
    ) -> Result<()> {
        let guild_id = guild_id(ctx)?;
        let store = ctx.data().store.as_ref();
        let outcome = match action {
            PingRoleAction::View => guild_settings::ping_role(store, &guild_id)
                .await
                .map(|role| match role {
                    Some(role) => format!("🔔 New tickets mention <@&{role}>."),
                    None => format!(
                        "🔕 No ping role is set. New tickets mention the staff role, or `{}`.",
                        ctx.data().config.tickets.fallback_mention
                    ),
                }),
            PingRoleAction::Clear => guild_settings::clear_ping_role(store, &guild_id)
                .await
                .map(|previous| match previous {
                    Some(role) => format!("✅ Cleared the ping role (was <@&{role}>)."),
                    None => "ℹ️ No ping role was set.".to_string(),
                }),
        };
        match outcome {
            Ok(message) => {
                ctx.send(quiet(message)).await?;
                Ok(())
            }
            Err(e) => send_ticket_error(ctx, &e).await,
        }
    }

    /// Sets the staff role, mentioned on new tickets when no ping role is set.
    #[poise::command(
        slash_command,
        rename = "set-staff-role",
        guild_only,
        default_member_permissions = "MANAGE_GUILD",
        required_permissions = "MANAGE_GUILD"
    )]
    pub async fn set_staff_role(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Role that handles tickets"] role: serenity::Role,
    ) -> Result<()> {
        let guild_id = guild_id(ctx)?;
        let role_id = role.id.to_string();
        match guild_settings::set_staff_role(ctx.data().store.as_ref(), &guild_id, &role_id).await
        {
            Ok(()) => {
                ctx.send(quiet(format!("✅ Staff role set to <@&{role_id}>.")))
                    .await?;
                Ok(())
            }
            Err(e) => send_ticket_error(ctx, &e).await,
        }
    }
}

pub use inner::*;
