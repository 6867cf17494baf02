use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::core::money::MAX_AMOUNT;
use crate::core::types::{CompanyStatus, ProductStatus};
use crate::core::validation::{validate_description, validate_name, MAX_QUANTITY};
use crate::services::companies::{get_company, require_owner};
use crate::storage::products::{self, Product};

fn check_price(price: i64) -> AppResult<()> {
    if !(1..=MAX_AMOUNT).contains(&price) {
        return Err(AppError::Validation("price must be between 0.01 and 1000000.00".into()));
    }
    Ok(())
}

fn check_quantity(quantity: i64) -> AppResult<()> {
    if !(0..=MAX_QUANTITY).contains(&quantity) {
        return Err(AppError::Validation(format!("quantity must be between 0 and {}", MAX_QUANTITY)));
    }
    Ok(())
}

pub fn get_product(conn: &Connection, product_id: i64) -> AppResult<Product> {
    products::get_product(conn, product_id)?.ok_or(AppError::NotFound("product"))
}

/// Loads a product the user may edit.
fn owned_product(conn: &Connection, owner_id: i64, product_id: i64) -> AppResult<Product> {
    let product = get_product(conn, product_id)?;
    require_owner(conn, product.company_id, owner_id)?;
    Ok(product)
}

pub fn add_product(
    conn: &Connection,
    owner_id: i64,
    company_id: i64,
    name: &str,
    description: &str,
    price: i64,
    quantity: i64,
) -> AppResult<Product> {
    let company = require_owner(conn, company_id, owner_id)?;
    if !company.status.accepts_products() {
        return Err(AppError::Forbidden("company cannot list products"));
    }
    let name = validate_name(name)?;
    let description = validate_description(description)?;
    check_price(price)?;
    check_quantity(quantity)?;

    let id = products::insert_product(conn, company_id, &name, &description, price, quantity)?;
    log::info!("Product {} '{}' added to company {}", id, name, company_id);
    get_product(conn, id)
}

pub fn update_price(conn: &Connection, owner_id: i64, product_id: i64, price: i64) -> AppResult<Product> {
    owned_product(conn, owner_id, product_id)?;
    check_price(price)?;
    products::update_price(conn, product_id, price)?;
    get_product(conn, product_id)
}

/// Sets the stock level. Restocking a sold-out product puts it back on sale;
/// zero stock takes an active product off sale. Inactive products stay inactive.
pub fn update_quantity(conn: &Connection, owner_id: i64, product_id: i64, quantity: i64) -> AppResult<Product> {
    let product = owned_product(conn, owner_id, product_id)?;
    check_quantity(quantity)?;

    let status = match (product.status, quantity) {
        (ProductStatus::Inactive, _) => ProductStatus::Inactive,
        (_, 0) => ProductStatus::OutOfStock,
        _ => ProductStatus::Active,
    };
    products::update_stock(conn, product_id, quantity, status)?;
    get_product(conn, product_id)
}

/// Flips a product between on sale and hidden. Returns the new status.
pub fn toggle_status(conn: &Connection, owner_id: i64, product_id: i64) -> AppResult<ProductStatus> {
    let product = owned_product(conn, owner_id, product_id)?;
    let next = match product.status {
        ProductStatus::Active | ProductStatus::OutOfStock => ProductStatus::Inactive,
        ProductStatus::Inactive if product.quantity > 0 => ProductStatus::Active,
        ProductStatus::Inactive => ProductStatus::OutOfStock,
    };
    products::set_status(conn, product_id, next)?;
    Ok(next)
}

/// The owner sees every product; everyone else sees what is on sale at an active company.
pub fn list_for_company(conn: &Connection, company_id: i64, viewer_id: i64) -> AppResult<Vec<Product>> {
    let company = get_company(conn, company_id)?;
    if company.owner_id == viewer_id {
        return Ok(products::list_for_company(conn, company_id, false)?);
    }
    if company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }
    Ok(products::list_for_company(conn, company_id, true)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::companies::{approve, register_company, suspend};
    use crate::services::users::register_user;
    use crate::storage::db::open_in_memory;

    fn setup() -> (Connection, i64) {
        let mut conn = open_in_memory().unwrap();
        register_user(&conn, 1, None, None, None).unwrap();
        register_user(&conn, 2, None, None, None).unwrap();
        let company = register_company(&conn, 1, "Tea House", "-").unwrap();
        approve(&mut conn, company.id).unwrap();
        (conn, company.id)
    }

    #[test]
    fn only_owner_manages_products() {
        let (conn, company) = setup();

        assert!(matches!(
            add_product(&conn, 2, company, "Green", "-", 500, 3),
            Err(AppError::Forbidden(_))
        ));
        let product = add_product(&conn, 1, company, "Green", "-", 500, 3).unwrap();
        assert!(update_price(&conn, 2, product.id, 100).is_err());
        assert_eq!(update_price(&conn, 1, product.id, 650).unwrap().price, 650);
        assert!(update_price(&conn, 1, product.id, 0).is_err());
    }

    #[test]
    fn restock_reactivates_sold_out_product() {
        let (conn, company) = setup();
        let product = add_product(&conn, 1, company, "Black", "-", 400, 0).unwrap();
        assert_eq!(product.status, ProductStatus::OutOfStock);

        let restocked = update_quantity(&conn, 1, product.id, 10).unwrap();
        assert_eq!(restocked.status, ProductStatus::Active);

        assert_eq!(toggle_status(&conn, 1, product.id).unwrap(), ProductStatus::Inactive);
        assert_eq!(update_quantity(&conn, 1, product.id, 5).unwrap().status, ProductStatus::Inactive);
        assert_eq!(toggle_status(&conn, 1, product.id).unwrap(), ProductStatus::Active);
    }

    #[test]
    fn public_listing_hides_hidden_products() {
        let (mut conn, company) = setup();
        let shown = add_product(&conn, 1, company, "Oolong", "-", 900, 2).unwrap();
        let hidden = add_product(&conn, 1, company, "Puerh", "-", 900, 2).unwrap();
        toggle_status(&conn, 1, hidden.id).unwrap();

        let public = list_for_company(&conn, company, 2).unwrap();
        assert_eq!(public.iter().map(|p| p.id).collect::<Vec<_>>(), vec![shown.id]);
        assert_eq!(list_for_company(&conn, company, 1).unwrap().len(), 2);

        suspend(&mut conn, company).unwrap();
        assert!(list_for_company(&conn, company, 2).is_err());
        assert!(add_product(&conn, 1, company, "Mate", "-", 100, 1).is_err());
    }
}
