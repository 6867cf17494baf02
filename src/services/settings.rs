use moka::sync::Cache;
use rusqlite::Connection;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::money::MAX_AMOUNT;
use crate::core::settlement::FeeSchedule;
use crate::storage::settings::{self as store, MarketSettings};

/// Which percentage an admin is changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    Platform,
    Referral,
    Discount,
}

/// Env-configured defaults used to seed the settings row.
pub fn default_settings() -> MarketSettings {
    MarketSettings {
        fees: FeeSchedule {
            platform_fee_percent: *config::fees::PLATFORM_FEE_PERCENT,
            referral_commission_percent: *config::fees::REFERRAL_COMMISSION_PERCENT,
            buyer_discount_percent: *config::fees::BUYER_DISCOUNT_PERCENT,
        },
        min_withdrawal: *config::fees::MIN_WITHDRAWAL_CENTS,
        min_payout: *config::fees::MIN_PAYOUT_CENTS,
        platform_balance: 0,
    }
}

/// Reads the settings row, seeding it from the defaults if missing.
///
/// Money-moving services call this inside their transaction instead of going
/// through the cache.
pub fn load(conn: &Connection) -> AppResult<MarketSettings> {
    if let Some(settings) = store::get_settings(conn)? {
        return Ok(settings);
    }
    store::insert_if_missing(conn, &default_settings())?;
    store::get_settings(conn)?.ok_or(AppError::NotFound("settings"))
}

fn check_schedule(fees: &FeeSchedule) -> AppResult<()> {
    let parts = [
        fees.platform_fee_percent,
        fees.referral_commission_percent,
        fees.buyer_discount_percent,
    ];
    if parts.iter().any(|p| !p.is_finite() || !(0.0..=100.0).contains(p)) {
        return Err(AppError::Validation("percent must be between 0 and 100".into()));
    }
    if fees.total_percent() > 100.0 {
        return Err(AppError::Validation("percentages add up to more than 100".into()));
    }
    Ok(())
}

/// Settings with a short-lived cache for display paths.
pub struct SettingsService {
    cache: Cache<(), MarketSettings>,
}

impl Default for SettingsService {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsService {
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(1)
                .time_to_live(config::settings_cache::ttl())
                .build(),
        }
    }

    /// Seeds the row from env defaults on first start.
    pub fn ensure_defaults(&self, conn: &Connection) -> AppResult<MarketSettings> {
        if store::insert_if_missing(conn, &default_settings())? {
            log::info!("Seeded marketplace settings from environment defaults");
        }
        let settings = load(conn)?;
        self.cache.insert((), settings);
        Ok(settings)
    }

    pub fn current(&self, conn: &Connection) -> AppResult<MarketSettings> {
        if let Some(settings) = self.cache.get(&()) {
            return Ok(settings);
        }
        let settings = load(conn)?;
        self.cache.insert((), settings);
        Ok(settings)
    }

    pub fn invalidate(&self) {
        self.cache.invalidate(&());
    }

    /// Changes one percentage, keeping the combined schedule within 100%.
    pub fn set_fee_percent(&self, conn: &Connection, kind: FeeKind, percent: f64) -> AppResult<MarketSettings> {
        let mut fees = load(conn)?.fees;
        match kind {
            FeeKind::Platform => fees.platform_fee_percent = percent,
            FeeKind::Referral => fees.referral_commission_percent = percent,
            FeeKind::Discount => fees.buyer_discount_percent = percent,
        }
        check_schedule(&fees)?;
        store::update_fees(conn, &fees)?;
        self.invalidate();
        log::info!("Fee {:?} set to {}%", kind, percent);
        self.current(conn)
    }

    pub fn set_platform_fee(&self, conn: &Connection, percent: f64) -> AppResult<MarketSettings> {
        self.set_fee_percent(conn, FeeKind::Platform, percent)
    }

    pub fn set_referral_commission(&self, conn: &Connection, percent: f64) -> AppResult<MarketSettings> {
        self.set_fee_percent(conn, FeeKind::Referral, percent)
    }

    pub fn set_buyer_discount(&self, conn: &Connection, percent: f64) -> AppResult<MarketSettings> {
        self.set_fee_percent(conn, FeeKind::Discount, percent)
    }

    pub fn set_min_withdrawal(&self, conn: &Connection, cents: i64) -> AppResult<MarketSettings> {
        let current = load(conn)?;
        self.set_minimums(conn, cents, current.min_payout)
    }

    pub fn set_min_payout(&self, conn: &Connection, cents: i64) -> AppResult<MarketSettings> {
        let current = load(conn)?;
        self.set_minimums(conn, current.min_withdrawal, cents)
    }

    fn set_minimums(&self, conn: &Connection, min_withdrawal: i64, min_payout: i64) -> AppResult<MarketSettings> {
        for value in [min_withdrawal, min_payout] {
            if !(1..=MAX_AMOUNT).contains(&value) {
                return Err(AppError::Validation("minimum must be between 0.01 and 1000000.00".into()));
            }
        }
        store::update_minimums(conn, min_withdrawal, min_payout)?;
        self.invalidate();
        self.current(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn seeds_once_and_caches() {
        let conn = open_in_memory().unwrap();
        let service = SettingsService::new();

        let seeded = service.ensure_defaults(&conn).unwrap();
        assert_eq!(seeded.platform_balance, 0);

        // direct write bypassing the service is not visible until invalidated
        conn.execute("UPDATE settings SET min_payout = 1", []).unwrap();
        assert_eq!(service.current(&conn).unwrap().min_payout, seeded.min_payout);
        service.invalidate();
        assert_eq!(service.current(&conn).unwrap().min_payout, 1);
    }

    #[test]
    fn writes_invalidate_cache() {
        let conn = open_in_memory().unwrap();
        let service = SettingsService::new();
        service.ensure_defaults(&conn).unwrap();

        let updated = service.set_platform_fee(&conn, 3.0).unwrap();
        assert_eq!(updated.fees.platform_fee_percent, 3.0);
        assert_eq!(service.current(&conn).unwrap().fees.platform_fee_percent, 3.0);
    }

    #[test]
    fn rejects_schedules_over_one_hundred_percent() {
        let conn = open_in_memory().unwrap();
        let service = SettingsService::new();
        service.ensure_defaults(&conn).unwrap();

        assert!(service.set_referral_commission(&conn, 99.0).is_err());
        assert!(service.set_buyer_discount(&conn, -1.0).is_err());
        assert!(service.set_min_withdrawal(&conn, 0).is_err());
        assert_eq!(service.set_min_withdrawal(&conn, 2_000).unwrap().min_withdrawal, 2_000);
    }
}
