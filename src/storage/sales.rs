use rusqlite::{params, Connection, Result, Row};

use crate::core::settlement::Settlement;

/// A settled sale about to be written.
#[derive(Debug, Clone)]
pub struct NewSale<'a> {
    pub sale_key: &'a str,
    pub company_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub buyer_id: Option<i64>,
    pub referral_code: Option<&'a str>,
    pub referrer_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: i64,
    pub settlement: Settlement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRecord {
    pub id: i64,
    pub sale_key: String,
    pub company_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub seller_id: i64,
    pub buyer_id: Option<i64>,
    pub referral_code: Option<String>,
    pub referrer_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: i64,
    pub settlement: Settlement,
    pub created_at: String,
}

/// Aggregates over a company's sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SalesSummary {
    pub count: i64,
    pub volume: i64,
    pub seller_earnings: i64,
    pub referred_count: i64,
}

fn map_sale(row: &Row<'_>) -> Result<SaleRecord> {
    Ok(SaleRecord {
        id: row.get(0)?,
        sale_key: row.get(1)?,
        company_id: row.get(2)?,
        product_id: row.get(3)?,
        product_name: row.get(4)?,
        seller_id: row.get(5)?,
        buyer_id: row.get(6)?,
        referral_code: row.get(7)?,
        referrer_id: row.get(8)?,
        quantity: row.get(9)?,
        unit_price: row.get(10)?,
        settlement: Settlement {
            amount: row.get(11)?,
            platform_fee: row.get(12)?,
            referrer_bonus: row.get(13)?,
            buyer_bonus: row.get(14)?,
            seller_earnings: row.get(15)?,
        },
        created_at: row.get(16)?,
    })
}

pub fn sale_key_exists(conn: &Connection, sale_key: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sales WHERE sale_key = ?1)",
        [sale_key],
        |row| row.get(0),
    )
}

pub fn insert_sale(conn: &Connection, sale: &NewSale<'_>) -> Result<i64> {
    let s = &sale.settlement;
    conn.execute(
        "INSERT INTO sales (
            sale_key, company_id, product_id, seller_id, buyer_id, referral_code, referrer_id,
            quantity, unit_price, amount, platform_fee, referrer_bonus, buyer_bonus, seller_earnings
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            sale.sale_key,
            sale.company_id,
            sale.product_id,
            sale.seller_id,
            sale.buyer_id,
            sale.referral_code,
            sale.referrer_id,
            sale.quantity,
            sale.unit_price,
            s.amount,
            s.platform_fee,
            s.referrer_bonus,
            s.buyer_bonus,
            s.seller_earnings,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent sales of a company, newest first.
pub fn list_for_company(conn: &Connection, company_id: i64, limit: i64) -> Result<Vec<SaleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.sale_key, s.company_id, s.product_id, p.name, s.seller_id, s.buyer_id,
                s.referral_code, s.referrer_id, s.quantity, s.unit_price, s.amount, s.platform_fee,
                s.referrer_bonus, s.buyer_bonus, s.seller_earnings, s.created_at
         FROM sales s JOIN products p ON p.id = s.product_id
         WHERE s.company_id = ?1
         ORDER BY s.id DESC LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![company_id, limit], map_sale)?;
    rows.collect()
}

pub fn summary_for_company(conn: &Connection, company_id: i64) -> Result<SalesSummary> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0), COALESCE(SUM(seller_earnings), 0),
                COALESCE(SUM(CASE WHEN referral_code IS NOT NULL THEN 1 ELSE 0 END), 0)
         FROM sales WHERE company_id = ?1",
        [company_id],
        |row| {
            Ok(SalesSummary {
                count: row.get(0)?,
                volume: row.get(1)?,
                seller_earnings: row.get(2)?,
                referred_count: row.get(3)?,
            })
        },
    )
}

/// `(count, volume)` over every sale on the platform.
pub fn totals(conn: &Connection) -> Result<(i64, i64)> {
    conn.query_row("SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM sales", [], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })
}
