use rusqlite::{params, Connection, OptionalExtension, Result, Row};

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    /// Interface language code ("en", "ru")
    pub language: String,
    pub is_banned: bool,
    /// Buyer bonuses, informational
    pub coin_balance: i64,
    /// Withdrawable referral commissions
    pub referral_balance: i64,
    pub created_at: String,
}

impl UserRecord {
    /// `@username` if known, first name otherwise, the numeric id as a last resort.
    pub fn display_name(&self) -> String {
        match (&self.username, &self.first_name) {
            (Some(username), _) => format!("@{}", username),
            (None, Some(first)) => first.clone(),
            (None, None) => self.telegram_id.to_string(),
        }
    }
}

const USER_COLUMNS: &str =
    "telegram_id, username, first_name, language, is_banned, coin_balance, referral_balance, created_at";

fn map_user(row: &Row<'_>) -> Result<UserRecord> {
    Ok(UserRecord {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        language: row.get(3)?,
        is_banned: row.get(4)?,
        coin_balance: row.get(5)?,
        referral_balance: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Inserts the user or refreshes their Telegram names. The language is only
/// written on first insert.
pub fn upsert_user(
    conn: &Connection,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    language: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (telegram_id, username, first_name, language) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(telegram_id) DO UPDATE SET
            username = excluded.username,
            first_name = excluded.first_name,
            last_active_at = CURRENT_TIMESTAMP",
        params![telegram_id, username, first_name, language],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, telegram_id: i64) -> Result<Option<UserRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
        [telegram_id],
        map_user,
    )
    .optional()
}

pub fn set_language(conn: &Connection, telegram_id: i64, language: &str) -> Result<usize> {
    conn.execute(
        "UPDATE users SET language = ?2 WHERE telegram_id = ?1",
        params![telegram_id, language],
    )
}

pub fn set_banned(conn: &Connection, telegram_id: i64, banned: bool) -> Result<usize> {
    conn.execute(
        "UPDATE users SET is_banned = ?2 WHERE telegram_id = ?1",
        params![telegram_id, banned],
    )
}

pub fn credit_coins(conn: &Connection, telegram_id: i64, amount: i64) -> Result<usize> {
    conn.execute(
        "UPDATE users SET coin_balance = coin_balance + ?2 WHERE telegram_id = ?1",
        params![telegram_id, amount],
    )
}

pub fn credit_referral_balance(conn: &Connection, telegram_id: i64, amount: i64) -> Result<usize> {
    conn.execute(
        "UPDATE users SET referral_balance = referral_balance + ?2 WHERE telegram_id = ?1",
        params![telegram_id, amount],
    )
}

/// Debits the referral balance only if it covers `amount`. Returns whether it did.
pub fn debit_referral_balance(conn: &Connection, telegram_id: i64, amount: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET referral_balance = referral_balance - ?2
         WHERE telegram_id = ?1 AND referral_balance >= ?2",
        params![telegram_id, amount],
    )?;
    Ok(changed == 1)
}

pub fn count_users(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

pub fn count_banned(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users WHERE is_banned = 1", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::open_in_memory;

    #[test]
    fn upsert_keeps_language_and_refreshes_names() {
        let conn = open_in_memory().unwrap();
        upsert_user(&conn, 1, Some("old"), None, "ru").unwrap();
        upsert_user(&conn, 1, Some("new"), Some("Ann"), "en").unwrap();

        let user = get_user(&conn, 1).unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("new"));
        assert_eq!(user.language, "ru");
        assert_eq!(user.display_name(), "@new");
    }

    #[test]
    fn debit_never_goes_negative() {
        let conn = open_in_memory().unwrap();
        upsert_user(&conn, 2, None, None, "en").unwrap();
        credit_referral_balance(&conn, 2, 500).unwrap();

        assert!(!debit_referral_balance(&conn, 2, 501).unwrap());
        assert!(debit_referral_balance(&conn, 2, 500).unwrap());
        assert_eq!(get_user(&conn, 2).unwrap().unwrap().referral_balance, 0);
    }
}
