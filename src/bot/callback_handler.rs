//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::MaybeInaccessibleMessage;
use tracing::{debug, Instrument};

use crate::dialogue::CALLBACK_PREFIX;
use crate::errors::error_logging;
use crate::localization::{t_lang, LocalizationManager};
use crate::observability;
use crate::wizard::{WizardReply, WizardService};

use super::ui_builder::render_reply;
use super::HandlerContext;

/// Whether a callback query belongs to the session wizard
pub fn is_wizard_callback(q: &CallbackQuery) -> bool {
    q.data
        .as_deref()
        .is_some_and(|data| data.starts_with(CALLBACK_PREFIX))
}

/// Handle callback queries from the library choice keyboard
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    wizard: Arc<WizardService>,
    localization: Arc<LocalizationManager>,
) -> Result<()> {
    let span = observability::telegram_span("callback_handler", Some(q.from.id.0));

    async move {
        let start_time = std::time::Instant::now();
        observability::record_telegram_message("callback_query");

        let ctx = HandlerContext {
            bot: &bot,
            localization: &localization,
            language_code: q.from.language_code.as_deref(),
        };
        let result = handle_wizard_callback(&ctx, &wizard, &q).await;

        if result.is_err() {
            observability::record_error_metrics("telegram", "callback_handler");
        }
        observability::record_request_metrics(
            "telegram_callback",
            if result.is_ok() { 200 } else { 500 },
            start_time.elapsed(),
        );
        result
    }
    .instrument(span)
    .await
}

async fn handle_wizard_callback(
    ctx: &HandlerContext<'_>,
    wizard: &WizardService,
    q: &CallbackQuery,
) -> Result<()> {
    let data = q.data.as_deref().unwrap_or("");
    let user_id = q.from.id;
    debug!(user_id = %user_id, data = data, "Wizard callback received");

    match wizard.handle_callback(user_id, data).await {
        Some(WizardReply::Cancelled) => {
            delete_keyboard_message(ctx.bot, q.message.as_ref()).await;
            ctx.bot
                .answer_callback_query(q.id.clone())
                .text(render_reply(
                    &WizardReply::Cancelled,
                    ctx.localization,
                    ctx.language_code,
                ))
                .show_alert(true)
                .await?;
        }
        Some(reply) => {
            ctx.bot.answer_callback_query(q.id.clone()).await?;
            delete_keyboard_message(ctx.bot, q.message.as_ref()).await;
            ctx.bot
                .send_message(
                    ChatId::from(user_id),
                    render_reply(&reply, ctx.localization, ctx.language_code),
                )
                .await?;
        }
        None => {
            // Keyboard from a wizard that was cancelled, replaced or already advanced
            ctx.bot
                .answer_callback_query(q.id.clone())
                .text(t_lang(ctx.localization, "session-expired", ctx.language_code))
                .await?;
        }
    }

    Ok(())
}

/// Remove the library choice message once it has been used
async fn delete_keyboard_message(bot: &Bot, message: Option<&MaybeInaccessibleMessage>) {
    let Some(message) = message else {
        return;
    };

    if let Err(e) = bot.delete_message(message.chat().id, message.id()).await {
        error_logging::log_network_error(&e, "delete_message", Some("deleteMessage"), None);
    }
}
