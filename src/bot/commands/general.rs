//! General Discord commands - ping and help.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Ticket Help**\n\
        Open a private support ticket with the staff of a server you share with the bot.\n\n\
        **For Users**\n\
        • `/authorize-account` - Lets the bot see your servers. Needed once before `/create`.\n\
        • `/create` - Opens a ticket in one of your servers.\n\
        • `/send <message>` - In DMs, sends a message to staff on your open ticket.\n\n\
        **For Staff**\n\
        • `/send <message>` - In a ticket thread, replies to the user by DM.\n\
        • `/close` - Archives the ticket thread and notifies the user.\n\
        • `/set-ping-role <role>` - Role mentioned when a ticket is opened.\n\
        • `/view-ping-role <view|clear>` - Shows or clears that role.\n\
        • `/set-staff-role <role>` - Mentioned when no ping role is set.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.send(poise::CreateReply::default().content(help_text).ephemeral(true))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
