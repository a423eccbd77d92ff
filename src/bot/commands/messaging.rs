//! `/send` - relays a message between a ticket's user and staff.
//!
//! In a DM the message goes to the staff thread; in a ticket thread it goes
//! to the user by DM.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{
            BotData,
            handlers::replies::{requester, send_ticket_error},
        },
        core::messaging::{self, Conversation, Delivery},
        errors::{Error, Result},
    };
    use poise::{CreateReply, serenity_prelude as serenity};
    use tracing::debug;

    /// Sends a message to staff (from DMs) or to the ticket's user (from a ticket thread).
    #[poise::command(slash_command)]
    pub async fn send(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Message to send"]
        #[max_length = 1900]
        content: String,
    ) -> Result<()> {
        let data = ctx.data();
        let requester = requester(ctx);
        let conversation = match ctx.guild_id() {
            Some(_) => Conversation::GuildChannel {
                channel_id: ctx.channel_id().to_string(),
            },
            None => Conversation::DirectMessage,
        };

        let receipt = match messaging::relay_message(
            data.store.as_ref(),
            data.gateway.as_ref(),
            Some(&requester),
            &conversation,
            &content,
        )
        .await
        {
            Ok(receipt) => receipt,
            Err(e) => return send_ticket_error(ctx, &e).await,
        };
        debug!(ticket_id = %receipt.ticket_id, delivery = ?receipt.delivery, "Message relayed");

        let reply = match receipt.delivery {
            Delivery::Webhook | Delivery::BotMessage => CreateReply::default()
                .content(format!("✅ **Message sent to staff** (ticket #{}).", receipt.case_number))
                .ephemeral(true),
            // Staff replies stay visible in the thread so other staff can follow along
            Delivery::DirectMessage => CreateReply::default()
                .content(format!(
                    "📨 **Sent to user by {}:** {content}",
                    requester.display_name
                ))
                .allowed_mentions(serenity::CreateAllowedMentions::new()),
        };
        ctx.send(reply).await?;
        Ok(())
    }
}

pub use inner::*;
