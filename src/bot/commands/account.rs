//! `/authorize-account` - links the user's Discord account over OAuth.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::replies::authorize_button},
        errors::{Error, Result},
    };
    use poise::{CreateReply, serenity_prelude as serenity};

    /// Authorizes the bot to see which servers you are in.
    #[poise::command(slash_command, rename = "authorize-account")]
    pub async fn authorize_account(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let reply = match authorize_button(&ctx.data().config, true) {
            Some(button) => CreateReply::default()
                .content(
                    "🔐 **Authorize your account**\n\nThe bot needs to see your servers to open tickets in them. Click the button below, then run `/create` again.",
                )
                .components(vec![serenity::CreateActionRow::Buttons(vec![button])]),
            None => CreateReply::default()
                .content("⚠️ Account authorization is not configured for this bot."),
        };
        ctx.send(reply.ephemeral(true)).await?;
        Ok(())
    }
}

pub use inner::*;
