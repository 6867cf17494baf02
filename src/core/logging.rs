//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A one-shot dump of the effective configuration at startup

use anyhow::Result;
use simplelog::*;
use std::fs::OpenOptions;

use crate::core::config;
use crate::core::money::format_amount;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file (appended to, created if missing)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to open the file or a logger is already set
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", log_file_path, e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup.
///
/// Fee values printed here are only the env defaults; the settings row wins
/// once it exists.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("environment: {}", config::APP_ENV.as_str());
    log::info!("database: {}", config::DATABASE_PATH.as_str());

    if config::BOT_TOKEN.is_some() {
        log::info!("bot token: set");
    } else {
        log::error!("bot token: NOT SET (BOT_TOKEN / TELOXIDE_TOKEN)");
    }

    match config::bot_api::get_url() {
        Some(url) => log::info!("bot api: {} (local: {})", url, config::bot_api::is_local()),
        None => log::info!("bot api: api.telegram.org"),
    }

    match config::WEBHOOK_URL.as_deref() {
        Some(url) => log::info!("webhook: {} (port {})", url, *config::WEBHOOK_PORT),
        None => log::info!("webhook: not configured, long polling"),
    }

    if config::admin::ADMIN_IDS.is_empty() {
        log::warn!("admins: none configured, admin commands are unreachable");
    } else {
        log::info!("admins: {}", config::admin::ADMIN_IDS.len());
    }

    log::info!(
        "fee defaults: platform {}%, referral {}%, buyer {}%",
        *config::fees::PLATFORM_FEE_PERCENT,
        *config::fees::REFERRAL_COMMISSION_PERCENT,
        *config::fees::BUYER_DISCOUNT_PERCENT
    );
    log::info!(
        "minimum defaults: withdrawal {}, payout {}",
        format_amount(*config::fees::MIN_WITHDRAWAL_CENTS),
        format_amount(*config::fees::MIN_PAYOUT_CENTS)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn init_logger_reports_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("bot.log");

        let result = init_logger(path.to_str().unwrap());

        assert!(result.is_err());
    }
}
