//! History of redeemed referral codes.

use rusqlite::{params, Connection, Result};

#[derive(Debug, Clone)]
pub struct NewReferral<'a> {
    pub code: &'a str,
    pub referrer_id: i64,
    pub company_id: i64,
    pub sale_id: i64,
    pub buyer_id: Option<i64>,
    pub amount: i64,
    pub commission: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralEntry {
    pub id: i64,
    pub code: String,
    pub company_id: i64,
    pub company_name: String,
    pub sale_id: i64,
    pub amount: i64,
    pub commission: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferralTotals {
    pub uses: i64,
    pub referred_volume: i64,
    pub commission: i64,
}

pub fn insert_referral(conn: &Connection, referral: &NewReferral<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO referrals (code, referrer_id, company_id, sale_id, buyer_id, amount, commission)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            referral.code,
            referral.referrer_id,
            referral.company_id,
            referral.sale_id,
            referral.buyer_id,
            referral.amount,
            referral.commission,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn history_for_referrer(conn: &Connection, referrer_id: i64, limit: i64) -> Result<Vec<ReferralEntry>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.code, r.company_id, c.name, r.sale_id, r.amount, r.commission, r.created_at
         FROM referrals r JOIN companies c ON c.id = r.company_id
         WHERE r.referrer_id = ?1
         ORDER BY r.id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![referrer_id, limit], |row| {
        Ok(ReferralEntry {
            id: row.get(0)?,
            code: row.get(1)?,
            company_id: row.get(2)?,
            company_name: row.get(3)?,
            sale_id: row.get(4)?,
            amount: row.get(5)?,
            commission: row.get(6)?,
            created_at: row.get(7)?,
        })
    })?;
    rows.collect()
}

pub fn totals_for_referrer(conn: &Connection, referrer_id: i64) -> Result<ReferralTotals> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0), COALESCE(SUM(commission), 0)
         FROM referrals WHERE referrer_id = ?1",
        [referrer_id],
        |row| {
            Ok(ReferralTotals {
                uses: row.get(0)?,
                referred_volume: row.get(1)?,
                commission: row.get(2)?,
            })
        },
    )
}
