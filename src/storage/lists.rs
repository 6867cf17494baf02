//! Per-user product lists: favorites and cart.

use rusqlite::{params, Connection, Result};

use crate::storage::products::{map_product, product_columns, Product};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Favorites,
    Cart,
}

impl ListKind {
    fn table(&self) -> &'static str {
        match self {
            ListKind::Favorites => "favorites",
            ListKind::Cart => "cart_items",
        }
    }
}

/// Adds the product if absent, removes it if present. Returns whether it is
/// in the list afterwards.
pub fn toggle(conn: &Connection, kind: ListKind, user_id: i64, product_id: i64) -> Result<bool> {
    let removed = conn.execute(
        &format!("DELETE FROM {} WHERE user_id = ?1 AND product_id = ?2", kind.table()),
        params![user_id, product_id],
    )?;
    if removed > 0 {
        return Ok(false);
    }
    conn.execute(
        &format!("INSERT INTO {} (user_id, product_id) VALUES (?1, ?2)", kind.table()),
        params![user_id, product_id],
    )?;
    Ok(true)
}

pub fn contains(conn: &Connection, kind: ListKind, user_id: i64, product_id: i64) -> Result<bool> {
    conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE user_id = ?1 AND product_id = ?2)",
            kind.table()
        ),
        params![user_id, product_id],
        |row| row.get(0),
    )
}

pub fn list_products(conn: &Connection, kind: ListKind, user_id: i64) -> Result<Vec<Product>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products p JOIN {} l ON l.product_id = p.id WHERE l.user_id = ?1 ORDER BY l.created_at, p.id",
        product_columns(),
        kind.table()
    ))?;
    let rows = stmt.query_map([user_id], map_product)?;
    rows.collect()
}

pub fn clear(conn: &Connection, kind: ListKind, user_id: i64) -> Result<usize> {
    conn.execute(&format!("DELETE FROM {} WHERE user_id = ?1", kind.table()), [user_id])
}

pub fn count(conn: &Connection, kind: ListKind, user_id: i64) -> Result<i64> {
    conn.query_row(
        &format!("SELECT COUNT(*) FROM {} WHERE user_id = ?1", kind.table()),
        [user_id],
        |row| row.get(0),
    )
}
