use anyhow::Result;
use sessiongen_bot::auth::GrammersAuthService;
use sessiongen_bot::bot;
use sessiongen_bot::config::AppConfig;
use sessiongen_bot::errors::error_logging;
use sessiongen_bot::localization;
use sessiongen_bot::observability;
use sessiongen_bot::wizard::WizardService;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    config.validate()?;

    let metrics_handle = observability::init_observability(&config.observability)?;
    info!("{}", config.summary());

    let localization_manager = localization::create_localization_manager()?;

    let wizard = Arc::new(
        WizardService::new(Arc::new(GrammersAuthService::default()))
            .with_login_timeout(Duration::from_secs(config.bot.login_timeout_secs)),
    );

    let server_addr = observability::start_keep_alive_server(
        &config.server,
        metrics_handle,
        Arc::clone(&wizard),
    )
    .await
    .inspect_err(|e| error_logging::log_config_error(e, "PORT", "start_keep_alive_server"))?;
    info!(addr = %server_addr, "Keep-alive server started");

    let _health_metrics_handle = observability::start_health_metrics_recorder(
        Some(config.bot.token.clone()),
        Arc::clone(&wizard),
    );

    // Initialize the bot with custom client configuration for better reliability
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.bot.http_timeout_secs))
        .build()?;

    let bot = Bot::with_client(config.bot.token.clone(), client);

    info!(
        http_timeout_secs = config.bot.http_timeout_secs,
        "Bot initialized, starting dispatcher"
    );

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let wizard = Arc::clone(&wizard);
            let localization = Arc::clone(&localization_manager);
            move |bot: Bot, msg: Message| {
                let wizard = Arc::clone(&wizard);
                let localization = Arc::clone(&localization);
                async move { bot::message_handler(bot, msg, wizard, localization).await }
            }
        }))
        .branch(
            Update::filter_callback_query()
                .filter(|q: CallbackQuery| bot::is_wizard_callback(&q))
                .endpoint({
                    let wizard = Arc::clone(&wizard);
                    let localization = Arc::clone(&localization_manager);
                    move |bot: Bot, q: CallbackQuery| {
                        let wizard = Arc::clone(&wizard);
                        let localization = Arc::clone(&localization);
                        async move { bot::callback_handler(bot, q, wizard, localization).await }
                    }
                }),
        );

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Dispatcher stopped, releasing active wizards");
    wizard.shutdown().await;

    Ok(())
}
