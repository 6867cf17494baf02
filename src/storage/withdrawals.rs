use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::core::types::{WithdrawalKind, WithdrawalStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub id: i64,
    pub kind: WithdrawalKind,
    pub requester_id: i64,
    /// Set for company payouts
    pub company_id: Option<i64>,
    pub amount: i64,
    pub status: WithdrawalStatus,
    pub created_at: String,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<i64>,
}

const WITHDRAWAL_COLUMNS: &str =
    "id, kind, requester_id, company_id, amount, status, created_at, reviewed_at, reviewed_by";

fn map_withdrawal(row: &Row<'_>) -> Result<Withdrawal> {
    Ok(Withdrawal {
        id: row.get(0)?,
        kind: row.get(1)?,
        requester_id: row.get(2)?,
        company_id: row.get(3)?,
        amount: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
        reviewed_at: row.get(7)?,
        reviewed_by: row.get(8)?,
    })
}

pub fn insert_withdrawal(
    conn: &Connection,
    kind: WithdrawalKind,
    requester_id: i64,
    company_id: Option<i64>,
    amount: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO withdrawals (kind, requester_id, company_id, amount, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![kind, requester_id, company_id, amount, kind.pending_status()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_withdrawal(conn: &Connection, id: i64) -> Result<Option<Withdrawal>> {
    conn.query_row(
        &format!("SELECT {} FROM withdrawals WHERE id = ?1", WITHDRAWAL_COLUMNS),
        [id],
        map_withdrawal,
    )
    .optional()
}

/// Records a decision. Returns false if the row was no longer in `from`.
pub fn update_status(
    conn: &Connection,
    id: i64,
    from: WithdrawalStatus,
    to: WithdrawalStatus,
    reviewed_by: i64,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE withdrawals SET status = ?3, reviewed_by = ?4, reviewed_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND status = ?2",
        params![id, from, to, reviewed_by],
    )?;
    Ok(changed == 1)
}

/// Pending requests of both kinds, oldest first.
pub fn list_pending(conn: &Connection, limit: i64) -> Result<Vec<Withdrawal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM withdrawals WHERE status IN (?1, ?2) ORDER BY id LIMIT ?3",
        WITHDRAWAL_COLUMNS
    ))?;
    let rows = stmt.query_map(
        params![WithdrawalStatus::UserPending, WithdrawalStatus::CompanyPending, limit],
        map_withdrawal,
    )?;
    rows.collect()
}

pub fn list_for_requester(conn: &Connection, requester_id: i64, limit: i64) -> Result<Vec<Withdrawal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM withdrawals WHERE requester_id = ?1 ORDER BY id DESC LIMIT ?2",
        WITHDRAWAL_COLUMNS
    ))?;
    let rows = stmt.query_map(params![requester_id, limit], map_withdrawal)?;
    rows.collect()
}

/// `(count, amount)` of requests waiting for review.
pub fn pending_totals(conn: &Connection) -> Result<(i64, i64)> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount), 0) FROM withdrawals WHERE status IN (?1, ?2)",
        params![WithdrawalStatus::UserPending, WithdrawalStatus::CompanyPending],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
}
