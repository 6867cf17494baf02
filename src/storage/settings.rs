use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::core::settlement::FeeSchedule;

/// The single `settings` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSettings {
    pub fees: FeeSchedule,
    /// Minimum referral withdrawal, cents
    pub min_withdrawal: i64,
    /// Minimum company payout, cents
    pub min_payout: i64,
    /// Accumulated platform fees, cents
    pub platform_balance: i64,
}

pub fn get_settings(conn: &Connection) -> Result<Option<MarketSettings>> {
    conn.query_row(
        "SELECT platform_fee_percent, referral_commission_percent, buyer_discount_percent,
                min_withdrawal, min_payout, platform_balance
         FROM settings WHERE id = 1",
        [],
        |row| {
            Ok(MarketSettings {
                fees: FeeSchedule {
                    platform_fee_percent: row.get(0)?,
                    referral_commission_percent: row.get(1)?,
                    buyer_discount_percent: row.get(2)?,
                },
                min_withdrawal: row.get(3)?,
                min_payout: row.get(4)?,
                platform_balance: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Writes the row unless it already exists. Returns whether it was written.
pub fn insert_if_missing(conn: &Connection, settings: &MarketSettings) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO settings
            (id, platform_fee_percent, referral_commission_percent, buyer_discount_percent, min_withdrawal, min_payout)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)",
        params![
            settings.fees.platform_fee_percent,
            settings.fees.referral_commission_percent,
            settings.fees.buyer_discount_percent,
            settings.min_withdrawal,
            settings.min_payout,
        ],
    )?;
    Ok(inserted == 1)
}

pub fn update_fees(conn: &Connection, fees: &FeeSchedule) -> Result<usize> {
    conn.execute(
        "UPDATE settings SET platform_fee_percent = ?1, referral_commission_percent = ?2,
                buyer_discount_percent = ?3, updated_at = CURRENT_TIMESTAMP
         WHERE id = 1",
        params![
            fees.platform_fee_percent,
            fees.referral_commission_percent,
            fees.buyer_discount_percent
        ],
    )
}

pub fn update_minimums(conn: &Connection, min_withdrawal: i64, min_payout: i64) -> Result<usize> {
    conn.execute(
        "UPDATE settings SET min_withdrawal = ?1, min_payout = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = 1",
        params![min_withdrawal, min_payout],
    )
}

pub fn credit_platform(conn: &Connection, amount: i64) -> Result<usize> {
    conn.execute(
        "UPDATE settings SET platform_balance = platform_balance + ?1 WHERE id = 1",
        [amount],
    )
}
