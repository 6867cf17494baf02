use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::core::types::ProductStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub description: String,
    /// Unit price in cents
    pub price: i64,
    pub quantity: i64,
    pub status: ProductStatus,
}

const PRODUCT_COLUMNS: &str = "p.id, p.company_id, p.name, p.description, p.price, p.quantity, p.status";

pub(crate) fn map_product(row: &Row<'_>) -> Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        company_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        quantity: row.get(5)?,
        status: row.get(6)?,
    })
}

pub(crate) fn product_columns() -> &'static str {
    PRODUCT_COLUMNS
}

pub fn insert_product(
    conn: &Connection,
    company_id: i64,
    name: &str,
    description: &str,
    price: i64,
    quantity: i64,
) -> Result<i64> {
    let status = if quantity > 0 {
        ProductStatus::Active
    } else {
        ProductStatus::OutOfStock
    };
    conn.execute(
        "INSERT INTO products (company_id, name, description, price, quantity, status) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![company_id, name, description, price, quantity, status],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_product(conn: &Connection, product_id: i64) -> Result<Option<Product>> {
    conn.query_row(
        &format!("SELECT {} FROM products p WHERE p.id = ?1", PRODUCT_COLUMNS),
        [product_id],
        map_product,
    )
    .optional()
}

/// Products of a company; `only_active` hides inactive and sold-out ones.
pub fn list_for_company(conn: &Connection, company_id: i64, only_active: bool) -> Result<Vec<Product>> {
    let filter = if only_active { "AND p.status = 'active'" } else { "" };
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM products p WHERE p.company_id = ?1 {} ORDER BY p.name COLLATE NOCASE",
        PRODUCT_COLUMNS, filter
    ))?;
    let rows = stmt.query_map([company_id], map_product)?;
    rows.collect()
}

pub fn update_price(conn: &Connection, product_id: i64, price: i64) -> Result<usize> {
    conn.execute(
        "UPDATE products SET price = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![product_id, price],
    )
}

pub fn update_stock(conn: &Connection, product_id: i64, quantity: i64, status: ProductStatus) -> Result<usize> {
    conn.execute(
        "UPDATE products SET quantity = ?2, status = ?3, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![product_id, quantity, status],
    )
}

pub fn set_status(conn: &Connection, product_id: i64, status: ProductStatus) -> Result<usize> {
    conn.execute(
        "UPDATE products SET status = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![product_id, status],
    )
}

/// Takes `quantity` units off the shelf if that many are in stock. A product
/// that reaches zero is marked out of stock.
pub fn decrement_stock(conn: &Connection, product_id: i64, quantity: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE products SET
            quantity = quantity - ?2,
            status = CASE WHEN quantity - ?2 = 0 THEN ?3 ELSE status END,
            updated_at = CURRENT_TIMESTAMP
         WHERE id = ?1 AND quantity >= ?2",
        params![product_id, quantity, ProductStatus::OutOfStock],
    )?;
    Ok(changed == 1)
}

pub fn count_products(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
}

pub fn count_for_company(conn: &Connection, company_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM products WHERE company_id = ?1",
        [company_id],
        |row| row.get(0),
    )
}
