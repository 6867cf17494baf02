use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::core::types::CompanyStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub description: String,
    pub status: CompanyStatus,
    /// Owner-withdrawable funds in cents
    pub billing_balance: i64,
    pub created_at: String,
}

const COMPANY_COLUMNS: &str = "c.id, c.owner_id, c.name, c.description, c.status, c.billing_balance, c.created_at";

fn map_company(row: &Row<'_>) -> Result<Company> {
    Ok(Company {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: row.get(4)?,
        billing_balance: row.get(5)?,
        created_at: row.get(6)?,
    })
}

pub fn insert_company(conn: &Connection, owner_id: i64, name: &str, description: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO companies (owner_id, name, description, status) VALUES (?1, ?2, ?3, ?4)",
        params![owner_id, name, description, CompanyStatus::Pending],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_company(conn: &Connection, company_id: i64) -> Result<Option<Company>> {
    conn.query_row(
        &format!("SELECT {} FROM companies c WHERE c.id = ?1", COMPANY_COLUMNS),
        [company_id],
        map_company,
    )
    .optional()
}

/// Moves a company from `from` to `to`. Returns false if it was no longer in `from`.
pub fn update_status(conn: &Connection, company_id: i64, from: CompanyStatus, to: CompanyStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE companies SET status = ?3, reviewed_at = CURRENT_TIMESTAMP WHERE id = ?1 AND status = ?2",
        params![company_id, from, to],
    )?;
    Ok(changed == 1)
}

pub fn list_by_status(conn: &Connection, status: CompanyStatus, limit: i64, offset: i64) -> Result<Vec<Company>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM companies c WHERE c.status = ?1 ORDER BY c.name COLLATE NOCASE LIMIT ?2 OFFSET ?3",
        COMPANY_COLUMNS
    ))?;
    let rows = stmt.query_map(params![status, limit, offset], map_company)?;
    rows.collect()
}

/// Companies waiting for review, oldest first.
pub fn list_pending(conn: &Connection, limit: i64) -> Result<Vec<Company>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM companies c WHERE c.status = ?1 ORDER BY c.id LIMIT ?2",
        COMPANY_COLUMNS
    ))?;
    let rows = stmt.query_map(params![CompanyStatus::Pending, limit], map_company)?;
    rows.collect()
}

pub fn count_by_status(conn: &Connection, status: CompanyStatus) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM companies WHERE status = ?1", [status], |row| {
        row.get(0)
    })
}

pub fn list_owned(conn: &Connection, owner_id: i64) -> Result<Vec<Company>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM companies c WHERE c.owner_id = ?1 ORDER BY c.id",
        COMPANY_COLUMNS
    ))?;
    let rows = stmt.query_map([owner_id], map_company)?;
    rows.collect()
}

pub fn credit_billing(conn: &Connection, company_id: i64, amount: i64) -> Result<usize> {
    conn.execute(
        "UPDATE companies SET billing_balance = billing_balance + ?2 WHERE id = ?1",
        params![company_id, amount],
    )
}

/// Debits the billing balance only if it covers `amount`.
pub fn debit_billing(conn: &Connection, company_id: i64, amount: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE companies SET billing_balance = billing_balance - ?2 WHERE id = ?1 AND billing_balance >= ?2",
        params![company_id, amount],
    )?;
    Ok(changed == 1)
}

// ==================== Membership ====================

/// Returns true if the user was not a member before.
pub fn add_member(conn: &Connection, user_id: i64, company_id: i64) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO company_members (user_id, company_id) VALUES (?1, ?2)",
        params![user_id, company_id],
    )?;
    Ok(inserted == 1)
}

pub fn remove_member(conn: &Connection, user_id: i64, company_id: i64) -> Result<bool> {
    let removed = conn.execute(
        "DELETE FROM company_members WHERE user_id = ?1 AND company_id = ?2",
        params![user_id, company_id],
    )?;
    Ok(removed == 1)
}

pub fn is_member(conn: &Connection, user_id: i64, company_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM company_members WHERE user_id = ?1 AND company_id = ?2)",
        params![user_id, company_id],
        |row| row.get(0),
    )
}

pub fn list_joined(conn: &Connection, user_id: i64) -> Result<Vec<Company>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM companies c
         JOIN company_members m ON m.company_id = c.id
         WHERE m.user_id = ?1 ORDER BY m.joined_at",
        COMPANY_COLUMNS
    ))?;
    let rows = stmt.query_map([user_id], map_company)?;
    rows.collect()
}

pub fn member_count(conn: &Connection, company_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM company_members WHERE company_id = ?1",
        [company_id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;
    use crate::storage::users::upsert_user;

    #[test]
    fn status_update_is_conditional() {
        let conn = open_in_memory().unwrap();
        upsert_user(&conn, 1, None, None, "en").unwrap();
        let id = insert_company(&conn, 1, "Bakery", "").unwrap();

        assert!(update_status(&conn, id, CompanyStatus::Pending, CompanyStatus::Active).unwrap());
        assert!(!update_status(&conn, id, CompanyStatus::Pending, CompanyStatus::Rejected).unwrap());
        assert_eq!(get_company(&conn, id).unwrap().unwrap().status, CompanyStatus::Active);
    }

    #[test]
    fn names_are_unique_ignoring_case() {
        let conn = open_in_memory().unwrap();
        upsert_user(&conn, 1, None, None, "en").unwrap();
        insert_company(&conn, 1, "Bakery", "").unwrap();

        assert!(insert_company(&conn, 1, "bakery", "").is_err());
    }

    #[test]
    fn membership_is_idempotent() {
        let conn = open_in_memory().unwrap();
        upsert_user(&conn, 1, None, None, "en").unwrap();
        upsert_user(&conn, 2, None, None, "en").unwrap();
        let id = insert_company(&conn, 1, "Bakery", "").unwrap();

        assert!(add_member(&conn, 2, id).unwrap());
        assert!(!add_member(&conn, 2, id).unwrap());
        assert_eq!(member_count(&conn, id).unwrap(), 1);
        assert_eq!(list_joined(&conn, 2).unwrap()[0].name, "Bakery");
    }
}
