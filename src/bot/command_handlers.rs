//! Command Handlers module for processing bot commands

use anyhow::Result;
use teloxide::prelude::*;
use tracing::debug;

// Import localization
use crate::localization::{t_args_lang, t_lang};

// Import UI builder functions
use super::ui_builder::{create_library_keyboard, display_name, render_reply};

use super::HandlerContext;
use crate::wizard::WizardService;

/// Handle the /start and /arise commands
pub async fn handle_start_command(ctx: &HandlerContext<'_>, msg: &Message) -> Result<()> {
    let name = msg
        .from
        .as_ref()
        .map(display_name)
        .unwrap_or_default();

    let welcome_message = t_args_lang(
        ctx.localization,
        "welcome",
        &[("name", name.as_str())],
        ctx.language_code,
    );
    ctx.bot.send_message(msg.chat.id, welcome_message).await?;
    Ok(())
}

/// Handle the /help command
pub async fn handle_help_command(ctx: &HandlerContext<'_>, msg: &Message) -> Result<()> {
    let help_message = t_lang(ctx.localization, "help-text", ctx.language_code);
    ctx.bot.send_message(msg.chat.id, help_message).await?;
    Ok(())
}

/// Handle the /sessiongen command
///
/// Wizard messages go to the user's private chat, wherever the command was sent.
pub async fn handle_sessiongen_command(
    ctx: &HandlerContext<'_>,
    wizard: &WizardService,
    user: &teloxide::types::User,
) -> Result<()> {
    let reply = wizard.start(user.id).await;
    debug!(user_id = %user.id, "Sending library choice");

    ctx.bot
        .send_message(
            ChatId::from(user.id),
            render_reply(&reply, ctx.localization, ctx.language_code),
        )
        .reply_markup(create_library_keyboard(ctx.localization, ctx.language_code))
        .await?;
    Ok(())
}

/// Handle the /cancel command
pub async fn handle_cancel_command(
    ctx: &HandlerContext<'_>,
    wizard: &WizardService,
    user: &teloxide::types::User,
) -> Result<()> {
    let reply = wizard.cancel(user.id).await;
    ctx.bot
        .send_message(
            ChatId::from(user.id),
            render_reply(&reply, ctx.localization, ctx.language_code),
        )
        .await?;
    Ok(())
}
