//! Recording an in-person sale and settling it.

use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::core::settlement::{settle, Settlement};
use crate::core::types::{CompanyStatus, ProductStatus};
use crate::core::validation::{normalize_referral_code, MAX_QUANTITY};
use crate::services::{begin_immediate, is_unique_violation};
use crate::services::companies::require_owner;
use crate::services::settings;
use crate::storage::referrals::{self, NewReferral};
use crate::storage::sales::{self as store, NewSale, SaleRecord, SalesSummary};
use crate::storage::{companies, products, referral_codes, settings as settings_store, users};

/// What the seller entered in the sale wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleRequest {
    /// Idempotency key, one per wizard run
    pub sale_key: String,
    pub company_id: i64,
    pub product_id: i64,
    pub seller_id: i64,
    pub quantity: i64,
    pub referral_code: Option<String>,
    pub buyer_id: Option<i64>,
}

/// Outcome of a committed sale, used for notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleReceipt {
    pub sale_id: i64,
    pub company_id: i64,
    pub company_name: String,
    pub product_id: i64,
    pub product_name: String,
    pub seller_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
    pub settlement: Settlement,
    pub referral_code: Option<String>,
    pub referrer_id: Option<i64>,
    pub buyer_id: Option<i64>,
    pub remaining_stock: i64,
}

/// Records and settles a sale in one transaction.
///
/// Either every balance, the stock level, the referral code and the sale row
/// change together, or nothing does.
pub fn process_sale(conn: &mut Connection, req: &SaleRequest) -> AppResult<SaleReceipt> {
    if !(1..=MAX_QUANTITY).contains(&req.quantity) {
        return Err(AppError::Validation("quantity must be positive".into()));
    }
    let code = req
        .referral_code
        .as_deref()
        .map(normalize_referral_code)
        .transpose()?;

    let tx = begin_immediate(conn)?;

    if store::sale_key_exists(&tx, &req.sale_key)? {
        return Err(AppError::DuplicateSale);
    }

    let company = require_owner(&tx, req.company_id, req.seller_id)?;
    if company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }

    let product = products::get_product(&tx, req.product_id)?.ok_or(AppError::NotFound("product"))?;
    if product.company_id != company.id {
        return Err(AppError::NotFound("product"));
    }
    if product.status == ProductStatus::Inactive {
        return Err(AppError::Forbidden("product is not on sale"));
    }
    if product.quantity < req.quantity {
        return Err(AppError::OutOfStock {
            available: product.quantity,
        });
    }

    let market = settings::load(&tx)?;

    let referrer_id = match code.as_deref() {
        Some(code) => {
            let record = referral_codes::get_code(&tx, code)?.ok_or(AppError::ReferralCodeUnavailable)?;
            if !record.active || record.company_id != company.id {
                return Err(AppError::ReferralCodeUnavailable);
            }
            if record.owner_id == req.seller_id || Some(record.owner_id) == req.buyer_id {
                return Err(AppError::SelfReferral);
            }
            let referrer = users::get_user(&tx, record.owner_id)?.ok_or(AppError::ReferralCodeUnavailable)?;
            if referrer.is_banned {
                return Err(AppError::ReferralCodeUnavailable);
            }
            if !referral_codes::redeem(&tx, code, req.buyer_id)? {
                return Err(AppError::ReferralCodeUnavailable);
            }
            Some(record.owner_id)
        }
        None => None,
    };

    if let Some(buyer_id) = req.buyer_id {
        if buyer_id == req.seller_id {
            return Err(AppError::Forbidden("seller cannot be the buyer"));
        }
        let buyer = users::get_user(&tx, buyer_id)?.ok_or(AppError::NotFound("buyer"))?;
        if buyer.is_banned {
            return Err(AppError::Banned);
        }
    }

    let amount = product
        .price
        .checked_mul(req.quantity)
        .ok_or_else(|| AppError::Validation("sale amount is too large".into()))?;
    let settlement = settle(amount, &market.fees, referrer_id.is_some(), req.buyer_id.is_some());

    if !products::decrement_stock(&tx, product.id, req.quantity)? {
        return Err(AppError::OutOfStock {
            available: product.quantity,
        });
    }
    if let (Some(buyer_id), true) = (req.buyer_id, settlement.buyer_bonus > 0) {
        users::credit_coins(&tx, buyer_id, settlement.buyer_bonus)?;
    }
    if let Some(referrer_id) = referrer_id {
        users::credit_referral_balance(&tx, referrer_id, settlement.referrer_bonus)?;
    }
    companies::credit_billing(&tx, company.id, settlement.seller_earnings)?;
    settings_store::credit_platform(&tx, settlement.platform_fee)?;

    let sale_id = store::insert_sale(
        &tx,
        &NewSale {
            sale_key: &req.sale_key,
            company_id: company.id,
            product_id: product.id,
            seller_id: req.seller_id,
            buyer_id: req.buyer_id,
            referral_code: code.as_deref(),
            referrer_id,
            quantity: req.quantity,
            unit_price: product.price,
            settlement,
        },
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::DuplicateSale
        } else {
            AppError::Database(e)
        }
    })?;

    if let (Some(code), Some(referrer_id)) = (code.as_deref(), referrer_id) {
        referral_codes::attach_sale(&tx, code, sale_id)?;
        referrals::insert_referral(
            &tx,
            &NewReferral {
                code,
                referrer_id,
                company_id: company.id,
                sale_id,
                buyer_id: req.buyer_id,
                amount,
                commission: settlement.referrer_bonus,
            },
        )?;
    }

    tx.commit()?;

    log::info!(
        "Sale {} at company {}: {} x{} = {} (fee {}, referrer {}, buyer {}, seller {})",
        sale_id,
        company.id,
        product.name,
        req.quantity,
        settlement.amount,
        settlement.platform_fee,
        settlement.referrer_bonus,
        settlement.buyer_bonus,
        settlement.seller_earnings
    );

    Ok(SaleReceipt {
        sale_id,
        company_id: company.id,
        company_name: company.name,
        product_id: product.id,
        product_name: product.name,
        seller_id: req.seller_id,
        quantity: req.quantity,
        unit_price: product.price,
        settlement,
        referral_code: code,
        referrer_id,
        buyer_id: req.buyer_id,
        remaining_stock: product.quantity - req.quantity,
    })
}

pub fn list_company_sales(conn: &Connection, owner_id: i64, company_id: i64, limit: i64) -> AppResult<Vec<SaleRecord>> {
    require_owner(conn, company_id, owner_id)?;
    Ok(store::list_for_company(conn, company_id, limit)?)
}

pub fn company_sales_summary(conn: &Connection, company_id: i64) -> AppResult<SalesSummary> {
    Ok(store::summary_for_company(conn, company_id)?)
}
