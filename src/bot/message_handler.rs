//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, Instrument};

use crate::commands::{parse_command, BotCommand};
use crate::errors::error_logging;
use crate::localization::LocalizationManager;
use crate::observability;
use crate::wizard::{LoginCall, TextStep, WizardService};

use super::command_handlers::{
    handle_cancel_command, handle_help_command, handle_sessiongen_command, handle_start_command,
};
use super::ui_builder::render_reply;
use super::HandlerContext;

/// Entry point for every incoming message
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    wizard: Arc<WizardService>,
    localization: Arc<LocalizationManager>,
) -> Result<()> {
    let span = observability::telegram_span("message_handler", msg.from.as_ref().map(|u| u.id.0));

    async move {
        let start_time = std::time::Instant::now();
        let message_type = if msg.text().is_some() {
            "text"
        } else {
            "unsupported"
        };
        observability::record_telegram_message(message_type);

        let result = match (msg.text(), msg.from.as_ref()) {
            (Some(text), Some(user)) => {
                let ctx = HandlerContext {
                    bot: &bot,
                    localization: &localization,
                    language_code: user.language_code.as_deref(),
                };
                handle_text_message(&ctx, &wizard, &msg, user, text).await
            }
            _ => Ok(()),
        };

        if result.is_err() {
            observability::record_error_metrics("telegram", "message_handler");
        }
        observability::record_request_metrics(
            "telegram_message",
            if result.is_ok() { 200 } else { 500 },
            start_time.elapsed(),
        );
        result
    }
    .instrument(span)
    .await
}

/// Route a text message to a command or to the user's wizard
async fn handle_text_message(
    ctx: &HandlerContext<'_>,
    wizard: &Arc<WizardService>,
    msg: &Message,
    user: &teloxide::types::User,
    text: &str,
) -> Result<()> {
    if let Some(command) = parse_command(text) {
        debug!(user_id = %user.id, command = command.as_str(), "Received command");
        observability::record_telegram_message(command.as_str());

        return match command {
            BotCommand::Start => handle_start_command(ctx, msg).await,
            BotCommand::Help => handle_help_command(ctx, msg).await,
            BotCommand::SessionGen => handle_sessiongen_command(ctx, wizard, user).await,
            BotCommand::Cancel => handle_cancel_command(ctx, wizard, user).await,
        };
    }

    let reply = match wizard.begin_text(user.id, text) {
        TextStep::Ignored => return Ok(()),
        TextStep::Reply(reply) => reply,
        TextStep::Login(call) => {
            spawn_login_call(ctx, Arc::clone(wizard), call);
            return Ok(());
        }
    };

    ctx.bot
        .send_message(
            ChatId::from(user.id),
            render_reply(&reply, ctx.localization, ctx.language_code),
        )
        .await?;
    Ok(())
}

/// Run a login backend call on its own task and answer when it returns
///
/// Updates from one chat are handled in order, so awaiting the call here
/// would hold back the user's `/cancel` until Telegram answered.
fn spawn_login_call(ctx: &HandlerContext<'_>, wizard: Arc<WizardService>, call: LoginCall) {
    let bot = ctx.bot.clone();
    let localization = Arc::clone(ctx.localization);
    let language_code = ctx.language_code.map(str::to_owned);
    let user_id = call.user_id();
    let span = observability::telegram_span("login_call", Some(user_id.0));

    tokio::spawn(
        async move {
            let Some(reply) = wizard.run_login(call).await else {
                debug!(user_id = %user_id, "Login call finished after the wizard ended");
                return;
            };

            let text = render_reply(&reply, &localization, language_code.as_deref());
            if let Err(e) = bot.send_message(ChatId::from(user_id), text).await {
                observability::record_error_metrics("telegram", "login_call");
                error_logging::log_network_error(&e, "send_message", Some("sendMessage"), None);
            }
        }
        .instrument(span),
    );
}
