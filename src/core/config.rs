use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

/// Configuration constants for the bot

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: refmarket.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "refmarket.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: refmarket.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "refmarket.log".to_string()));

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<Option<SecretString>> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .ok()
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from)
});

/// Webhook URL for Telegram updates, e.g. `https://bot.example.com/webhook`
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| {
    env::var("WEBHOOK_URL")
        .ok()
        .and_then(|s| if s.trim().is_empty() { None } else { Some(s) })
});

/// Local port the webhook listener binds to
/// Read from WEBHOOK_PORT environment variable
/// Default: 8443
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8443)
});

/// Deployment environment: "production" or "development"
/// Read from APP_ENV, falling back to NODE_ENV for older deployments
pub static APP_ENV: Lazy<String> = Lazy::new(|| {
    env::var("APP_ENV")
        .or_else(|_| env::var("NODE_ENV"))
        .map(|v| v.trim().to_lowercase())
        .unwrap_or_else(|_| "development".to_string())
});

/// Returns true when running with APP_ENV=production
pub fn is_production() -> bool {
    APP_ENV.as_str() == "production"
}

fn parse_percent(raw: Option<String>, default: f64) -> f64 {
    raw.and_then(|v| v.trim().trim_end_matches('%').parse::<f64>().ok())
        .filter(|v| v.is_finite() && (0.0..=100.0).contains(v))
        .unwrap_or(default)
}

fn parse_major_amount(raw: Option<String>, default_cents: i64) -> i64 {
    raw.and_then(|v| crate::core::money::parse_amount(&v))
        .unwrap_or(default_cents)
}

/// Marketplace fee defaults
///
/// These only seed the `settings` row on first start. Once the row exists it
/// is authoritative and admins change it from the bot.
pub mod fees {
    use super::{parse_major_amount, parse_percent};
    use once_cell::sync::Lazy;
    use std::env;

    /// Platform fee percent
    /// Read from PLATFORM_FEE_PERCENTAGE environment variable
    /// Default: 1.5
    pub static PLATFORM_FEE_PERCENT: Lazy<f64> =
        Lazy::new(|| parse_percent(env::var("PLATFORM_FEE_PERCENTAGE").ok(), 1.5));

    /// Referrer commission percent
    /// Read from REFERRAL_COMMISSION_PERCENTAGE environment variable
    /// Default: 2.5
    pub static REFERRAL_COMMISSION_PERCENT: Lazy<f64> =
        Lazy::new(|| parse_percent(env::var("REFERRAL_COMMISSION_PERCENTAGE").ok(), 2.5));

    /// Buyer bonus percent
    /// Read from BUYER_DISCOUNT_PERCENTAGE environment variable
    /// Default: 1.0
    pub static BUYER_DISCOUNT_PERCENT: Lazy<f64> =
        Lazy::new(|| parse_percent(env::var("BUYER_DISCOUNT_PERCENTAGE").ok(), 1.0));

    /// Minimum referral withdrawal in cents
    /// Read from MIN_WITHDRAWAL_AMOUNT environment variable (major units, e.g. "10.00")
    /// Default: 10.00
    pub static MIN_WITHDRAWAL_CENTS: Lazy<i64> =
        Lazy::new(|| parse_major_amount(env::var("MIN_WITHDRAWAL_AMOUNT").ok(), 1_000));

    /// Minimum company payout in cents
    /// Read from MIN_PAYOUT_AMOUNT environment variable (major units)
    /// Default: 50.00
    pub static MIN_PAYOUT_CENTS: Lazy<i64> = Lazy::new(|| parse_major_amount(env::var("MIN_PAYOUT_AMOUNT").ok(), 5_000));
}

/// Rate limiting configuration
pub mod rate_limit {
    use super::Duration;

    /// Cooldown between referral code generations per user (in seconds)
    pub const GENERATE_CODE_COOLDOWN_SECS: u64 = 10;

    /// Cooldown between withdrawal requests per user (in seconds)
    pub const WITHDRAW_COOLDOWN_SECS: u64 = 30;

    /// Cooldown between recorded sales per seller (in seconds)
    pub const RECORD_SALE_COOLDOWN_SECS: u64 = 2;

    /// Interval between sweeps of expired limiter entries
    pub fn cleanup_interval() -> Duration {
        Duration::from_secs(300)
    }
}

/// Conversation session configuration
pub mod session {
    use super::Duration;

    /// Sessions idle for longer than this are dropped
    pub const TTL_SECS: u64 = 30 * 60;

    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }

    /// Interval between session sweeps
    pub fn sweep_interval() -> Duration {
        Duration::from_secs(60)
    }
}

/// Settings cache configuration
pub mod settings_cache {
    use super::Duration;

    /// How long a cached settings row is trusted
    pub const TTL_SECS: u64 = 60;

    pub fn ttl() -> Duration {
        Duration::from_secs(TTL_SECS)
    }
}

/// Listing configuration
pub mod listing {
    /// Number of companies/products shown per page
    pub const PAGE_SIZE: i64 = 5;

    /// Number of history rows shown in profile/dashboard screens
    pub const HISTORY_LIMIT: i64 = 10;
}

/// Retry configuration
pub mod retry {
    use super::Duration;

    /// Maximum attempts for a notification send
    pub const NOTIFY_MAX_ATTEMPTS: usize = 3;

    /// First backoff delay for notification sends
    pub fn notify_min_delay() -> Duration {
        Duration::from_millis(500)
    }

    /// Maximum number of retries for dispatcher reconnection
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Delay between dispatcher retry attempts (in seconds)
    pub const DISPATCHER_RETRY_DELAY_SECS: u64 = 5;

    /// Dispatcher retry delay duration
    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_RETRY_DELAY_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API requests (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    pub fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    /// Check if user is admin
    pub fn is_admin(user_id: i64) -> bool {
        ADMIN_IDS.contains(&user_id)
    }
}

/// Metrics and monitoring configuration
pub mod metrics {
    use once_cell::sync::Lazy;
    use std::env;

    /// Enable metrics collection and HTTP server
    /// Read from METRICS_ENABLED environment variable
    /// Default: true
    pub static ENABLED: Lazy<bool> = Lazy::new(|| {
        env::var("METRICS_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true)
    });

    /// Port for metrics HTTP server
    /// Read from METRICS_PORT environment variable
    /// Default: 9090
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        env::var("METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090)
    });
}

/// Bot API server configuration utilities
pub mod bot_api {
    /// Returns the BOT_API_URL environment variable if set.
    pub fn get_url() -> Option<String> {
        std::env::var("BOT_API_URL").ok().filter(|url| !url.trim().is_empty())
    }

    /// Returns true if using a local Bot API server (not api.telegram.org).
    pub fn is_local() -> bool {
        get_url().map(|url| !url.contains("api.telegram.org")).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_admin_ids_with_mixed_separators() {
        assert_eq!(admin::parse_admin_ids("1, 2 3\n4,,x"), vec![1, 2, 3, 4]);
        assert!(admin::parse_admin_ids("").is_empty());
    }

    #[test]
    fn percent_parsing_falls_back_on_garbage() {
        assert_eq!(parse_percent(Some("2.5".into()), 1.0), 2.5);
        assert_eq!(parse_percent(Some("3%".into()), 1.0), 3.0);
        assert_eq!(parse_percent(Some("abc".into()), 1.0), 1.0);
        assert_eq!(parse_percent(Some("150".into()), 1.0), 1.0);
        assert_eq!(parse_percent(None, 1.5), 1.5);
    }

    #[test]
    fn major_amount_parsing_uses_cents() {
        assert_eq!(parse_major_amount(Some("10".into()), 1), 1_000);
        assert_eq!(parse_major_amount(Some("12.34".into()), 1), 1_234);
        assert_eq!(parse_major_amount(Some("-5".into()), 7), 7);
    }
}
