use rusqlite::{params, Connection, OptionalExtension, Result, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferralCode {
    pub code: String,
    pub owner_id: i64,
    pub company_id: i64,
    pub active: bool,
    pub created_at: String,
    pub used_by: Option<i64>,
    pub used_at: Option<String>,
    pub sale_id: Option<i64>,
}

/// An active code together with the company it promotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCode {
    pub code: String,
    pub company_id: i64,
    pub company_name: String,
}

fn map_code(row: &Row<'_>) -> Result<ReferralCode> {
    Ok(ReferralCode {
        code: row.get(0)?,
        owner_id: row.get(1)?,
        company_id: row.get(2)?,
        active: row.get(3)?,
        created_at: row.get(4)?,
        used_by: row.get(5)?,
        used_at: row.get(6)?,
        sale_id: row.get(7)?,
    })
}

const CODE_COLUMNS: &str = "code, owner_id, company_id, active, created_at, used_by, used_at, sale_id";

pub fn insert_code(conn: &Connection, code: &str, owner_id: i64, company_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO referral_codes (code, owner_id, company_id) VALUES (?1, ?2, ?3)",
        params![code, owner_id, company_id],
    )?;
    Ok(())
}

pub fn code_exists(conn: &Connection, code: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM referral_codes WHERE code = ?1)",
        [code],
        |row| row.get(0),
    )
}

pub fn get_code(conn: &Connection, code: &str) -> Result<Option<ReferralCode>> {
    conn.query_row(
        &format!("SELECT {} FROM referral_codes WHERE code = ?1", CODE_COLUMNS),
        [code],
        map_code,
    )
    .optional()
}

pub fn find_active(conn: &Connection, owner_id: i64, company_id: i64) -> Result<Option<ReferralCode>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM referral_codes WHERE owner_id = ?1 AND company_id = ?2 AND active = 1 LIMIT 1",
            CODE_COLUMNS
        ),
        params![owner_id, company_id],
        map_code,
    )
    .optional()
}

pub fn list_active_for_owner(conn: &Connection, owner_id: i64) -> Result<Vec<ActiveCode>> {
    let mut stmt = conn.prepare(
        "SELECT r.code, r.company_id, c.name FROM referral_codes r
         JOIN companies c ON c.id = r.company_id
         WHERE r.owner_id = ?1 AND r.active = 1
         ORDER BY r.created_at, r.code",
    )?;
    let rows = stmt.query_map([owner_id], |row| {
        Ok(ActiveCode {
            code: row.get(0)?,
            company_id: row.get(1)?,
            company_name: row.get(2)?,
        })
    })?;
    rows.collect()
}

/// Marks an active code as used. Returns false if someone else used it first.
pub fn redeem(conn: &Connection, code: &str, used_by: Option<i64>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE referral_codes SET active = 0, used_by = ?2, used_at = CURRENT_TIMESTAMP
         WHERE code = ?1 AND active = 1",
        params![code, used_by],
    )?;
    Ok(changed == 1)
}

pub fn attach_sale(conn: &Connection, code: &str, sale_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE referral_codes SET sale_id = ?2 WHERE code = ?1",
        params![code, sale_id],
    )
}

pub fn count_active_for_owner(conn: &Connection, owner_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM referral_codes WHERE owner_id = ?1 AND active = 1",
        [owner_id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::companies::insert_company;
    use crate::storage::db::open_in_memory;
    use crate::storage::users::upsert_user;

    #[test]
    fn code_redeems_once() {
        let conn = open_in_memory().unwrap();
        upsert_user(&conn, 1, None, None, "en").unwrap();
        let company = insert_company(&conn, 1, "Bakery", "").unwrap();
        insert_code(&conn, "AB12-CD34", 1, company).unwrap();

        assert!(redeem(&conn, "AB12-CD34", Some(9)).unwrap());
        assert!(!redeem(&conn, "AB12-CD34", Some(10)).unwrap());

        let code = get_code(&conn, "AB12-CD34").unwrap().unwrap();
        assert!(!code.active);
        assert_eq!(code.used_by, Some(9));
        assert!(find_active(&conn, 1, company).unwrap().is_none());
    }
}
