use anyhow::Result;
use backon::{ExponentialBuilder, Retryable};
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::time::sleep;

use refmarket::cli::{Cli, Commands};
use refmarket::core::rate_limiter::RateLimiter;
use refmarket::core::{config, init_logger, log_startup_configuration, metrics, web_server};
use refmarket::services::{stats, SettingsService};
use refmarket::storage::{create_pool, db, get_connection};
use refmarket::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, SessionStore};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics in handler tasks instead of losing them
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => {
            log::info!("Running bot (webhook: {})", webhook);
            run_bot(webhook).await
        }
        Some(Commands::Migrate) => run_migrate(),
        Some(Commands::Stats) => run_stats(),
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await
        }
    }
}

/// Applies migrations without starting the bot.
fn run_migrate() -> Result<()> {
    db::open_connection(&config::DATABASE_PATH)?;
    log::info!("Database at {} is up to date", *config::DATABASE_PATH);
    Ok(())
}

/// Prints platform statistics to stdout as JSON.
fn run_stats() -> Result<()> {
    let conn = db::open_connection(&config::DATABASE_PATH)?;
    let stats = stats::platform_stats(&conn)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// The webhook URL to listen on, or `None` for long polling.
fn webhook_target(use_webhook: bool, url: Option<String>) -> Result<Option<String>> {
    match (use_webhook, url) {
        (false, _) => Ok(None),
        (true, Some(url)) => Ok(Some(url)),
        (true, None) => anyhow::bail!("--webhook requires WEBHOOK_URL to be set"),
    }
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    let webhook_url = webhook_target(use_webhook, config::WEBHOOK_URL.clone())?;
    log::info!("Starting bot...");
    log_startup_configuration();

    metrics::init_metrics();

    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    let settings = Arc::new(SettingsService::new());
    {
        let conn = get_connection(&db_pool)?;
        let current = settings.ensure_defaults(&conn)?;
        log::info!(
            "Fees: platform {}%, referral {}%, buyer {}%",
            current.fees.platform_fee_percent,
            current.fees.referral_commission_percent,
            current.fees.buyer_discount_percent
        );
    }

    let rate_limiter = Arc::new(RateLimiter::new());
    Arc::clone(&rate_limiter).spawn_cleanup_task();

    let sessions = Arc::new(SessionStore::default());
    Arc::clone(&sessions).spawn_sweep_task();

    // Health and metrics endpoints
    if *config::metrics::ENABLED {
        let port = *config::metrics::PORT;
        let pool = Arc::clone(&db_pool);
        log::info!("Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = web_server::start_web_server(port, pool).await {
                log::error!("Metrics server error: {}", e);
            }
        });
    } else {
        log::info!("Metrics collection disabled (METRICS_ENABLED=false)");
    }

    let bot = create_bot()?;

    // The Bot API may still be starting next to us
    let me = (|| async { bot.get_me().await })
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(30))
                .with_max_times(10),
        )
        .notify(|err: &teloxide::RequestError, delay| {
            log::warn!("Bot API not ready ({}), retrying in {:?}", err, delay);
        })
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Bot API: {}", e))?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let handler_deps = HandlerDeps::new(Arc::clone(&db_pool), sessions, rate_limiter, settings);
    let handler = schema(handler_deps);

    if let Some(url) = webhook_url {
        log::info!("Starting bot in webhook mode at {}", url);
        let address = ([0, 0, 0, 0], *config::WEBHOOK_PORT).into();
        let options = webhooks::Options::new(address, url::Url::parse(&url)?);
        let listener = webhooks::axum(bot.clone(), options).await?;

        log::info!("Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
        return Ok(());
    }

    log::info!("Starting bot in long polling mode");
    log::info!("Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());

    // Run the dispatcher with retry logic
    let mut retry_count = 0;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // A separate task isolates dispatcher panics
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= config::retry::MAX_DISPATCHER_RETRIES {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    config::retry::MAX_DISPATCHER_RETRIES
                );
                sleep(config::retry::dispatcher_delay() * retry_count).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    Ok(())
}
