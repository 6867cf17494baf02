use rusqlite::Connection;
use serde::Serialize;

use crate::core::error::AppResult;
use crate::core::types::CompanyStatus;
use crate::services::settings;
use crate::storage::{companies, products, sales, users, withdrawals};

/// Platform-wide numbers for the admin panel and the `stats` CLI command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PlatformStats {
    pub users: i64,
    pub banned_users: i64,
    pub active_companies: i64,
    pub pending_companies: i64,
    pub products: i64,
    pub sales: i64,
    pub sales_volume: i64,
    pub platform_balance: i64,
    pub pending_withdrawals: i64,
    pub pending_withdrawal_amount: i64,
}

pub fn platform_stats(conn: &Connection) -> AppResult<PlatformStats> {
    let (sales, sales_volume) = sales::totals(conn)?;
    let (pending_withdrawals, pending_withdrawal_amount) = withdrawals::pending_totals(conn)?;

    Ok(PlatformStats {
        users: users::count_users(conn)?,
        banned_users: users::count_banned(conn)?,
        active_companies: companies::count_by_status(conn, CompanyStatus::Active)?,
        pending_companies: companies::count_by_status(conn, CompanyStatus::Pending)?,
        products: products::count_products(conn)?,
        sales,
        sales_volume,
        platform_balance: settings::load(conn)?.platform_balance,
        pending_withdrawals,
        pending_withdrawal_amount,
    })
}
