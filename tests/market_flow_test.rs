//! End-to-end marketplace scenarios against a file-backed database
//!
//! Run with: cargo test --test market_flow_test

mod common;

use common::{balance_of, TestEnvironment, ADMIN, BUYER, MEMBER, OWNER};
use pretty_assertions::assert_eq;
use refmarket::core::types::{CompanyStatus, WithdrawalStatus};
use refmarket::services::sales::{process_sale, SaleRequest};
use refmarket::services::{companies, referrals, stats, withdrawals};
use refmarket::AppError;

fn sale(company_id: i64, product_id: i64, quantity: i64, code: Option<&str>, buyer: Option<i64>) -> SaleRequest {
    SaleRequest {
        sale_key: uuid::Uuid::new_v4().to_string(),
        company_id,
        product_id,
        seller_id: OWNER,
        quantity,
        referral_code: code.map(str::to_string),
        buyer_id: buyer,
    }
}

#[test]
fn referral_sale_pays_everyone_and_funds_can_be_withdrawn() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 2_000, 5);
    let mut conn = env.conn();

    assert!(companies::join_company(&conn, MEMBER, company.id).unwrap());
    let code = referrals::generate_code(&mut conn, MEMBER, company.id).unwrap();
    assert!(code.created);

    let receipt = process_sale(&mut conn, &sale(company.id, latte.id, 2, Some(&code.code.to_lowercase()), Some(BUYER))).unwrap();
    assert_eq!(receipt.settlement.amount, 4_000);
    assert_eq!(receipt.settlement.platform_fee, 200);
    assert_eq!(receipt.settlement.referrer_bonus, 400);
    assert_eq!(receipt.settlement.buyer_bonus, 200);
    assert_eq!(receipt.settlement.seller_earnings, 3_200);
    assert_eq!(receipt.referrer_id, Some(MEMBER));
    assert_eq!(receipt.remaining_stock, 3);

    assert_eq!(balance_of(&conn, MEMBER), (400, 0));
    assert_eq!(balance_of(&conn, BUYER), (0, 200));
    assert_eq!(companies::get_company(&conn, company.id).unwrap().billing_balance, 3_200);

    // The code is spent; the member gets a fresh one next time
    let err = process_sale(&mut conn, &sale(company.id, latte.id, 1, Some(&code.code), None)).unwrap_err();
    assert!(matches!(err, AppError::ReferralCodeUnavailable));
    let next = referrals::generate_code(&mut conn, MEMBER, company.id).unwrap();
    assert!(next.created);
    assert_ne!(next.code, code.code);

    let history = referrals::referral_history(&conn, MEMBER, 10).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].commission, 400);

    // Declined requests give the money back
    let first = withdrawals::request_referral_withdrawal(&mut conn, MEMBER, 300).unwrap();
    assert_eq!(balance_of(&conn, MEMBER).0, 100);
    let declined = withdrawals::decline(&mut conn, first.id, ADMIN).unwrap();
    assert_eq!(declined.status, WithdrawalStatus::Declined);
    assert_eq!(balance_of(&conn, MEMBER).0, 400);

    let second = withdrawals::request_referral_withdrawal(&mut conn, MEMBER, 400).unwrap();
    withdrawals::approve(&mut conn, second.id, ADMIN).unwrap();
    assert_eq!(balance_of(&conn, MEMBER).0, 0);
    assert!(matches!(
        withdrawals::decline(&mut conn, second.id, ADMIN),
        Err(AppError::InvalidTransition { .. })
    ));

    let payout = withdrawals::request_company_payout(&mut conn, OWNER, company.id, 3_200).unwrap();
    assert_eq!(payout.company_id, Some(company.id));
    assert_eq!(companies::get_company(&conn, company.id).unwrap().billing_balance, 0);

    let totals = stats::platform_stats(&conn).unwrap();
    assert_eq!(totals.sales, 1);
    assert_eq!(totals.sales_volume, 4_000);
    assert_eq!(totals.platform_balance, 200);
    assert_eq!(totals.pending_withdrawals, 1);
    assert_eq!(totals.pending_withdrawal_amount, 3_200);
}

#[test]
fn sale_without_code_keeps_referral_shares_with_seller() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 1_000, 1);
    let mut conn = env.conn();

    let receipt = process_sale(&mut conn, &sale(company.id, latte.id, 1, None, Some(BUYER))).unwrap();
    assert_eq!(receipt.settlement.platform_fee, 50);
    assert_eq!(receipt.settlement.buyer_bonus, 0);
    assert_eq!(receipt.settlement.seller_earnings, 950);
    assert_eq!(balance_of(&conn, BUYER), (0, 0));

    let err = process_sale(&mut conn, &sale(company.id, latte.id, 1, None, None)).unwrap_err();
    assert!(matches!(err, AppError::OutOfStock { available: 0 }));
}

#[test]
fn failed_sale_leaves_no_trace() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 1_000, 3);
    let mut conn = env.conn();

    companies::join_company(&conn, MEMBER, company.id).unwrap();
    let code = referrals::generate_code(&mut conn, MEMBER, company.id).unwrap();

    // The member cannot be their own buyer
    let err = process_sale(&mut conn, &sale(company.id, latte.id, 1, Some(&code.code), Some(MEMBER))).unwrap_err();
    assert!(matches!(err, AppError::SelfReferral));

    let stats = stats::platform_stats(&conn).unwrap();
    assert_eq!(stats.sales, 0);
    assert_eq!(stats.platform_balance, 0);
    assert_eq!(balance_of(&conn, MEMBER), (0, 0));

    // Code still usable afterwards
    let receipt = process_sale(&mut conn, &sale(company.id, latte.id, 1, Some(&code.code), Some(BUYER))).unwrap();
    assert_eq!(receipt.referrer_id, Some(MEMBER));
}

#[test]
fn replayed_sale_key_is_rejected() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 1_000, 3);
    let mut conn = env.conn();

    let req = sale(company.id, latte.id, 1, None, None);
    process_sale(&mut conn, &req).unwrap();
    assert!(matches!(process_sale(&mut conn, &req), Err(AppError::DuplicateSale)));
    assert_eq!(stats::platform_stats(&conn).unwrap().sales, 1);
}

#[test]
fn company_lifecycle_gates_sales_and_codes() {
    let env = TestEnvironment::new();
    env.user(OWNER, "owner");
    env.user(MEMBER, "member");
    let mut conn = env.conn();

    let company = companies::register_company(&conn, OWNER, "Late Bloom", "Flowers").unwrap();
    assert_eq!(company.status, CompanyStatus::Pending);
    assert!(matches!(
        companies::register_company(&conn, MEMBER, "Late Bloom", "Copycat"),
        Err(AppError::AlreadyExists(_))
    ));

    let tulip = env.product(company.id, "Tulip", 300, 10);
    let err = process_sale(&mut conn, &sale(company.id, tulip.id, 1, None, None)).unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    companies::approve(&mut conn, company.id).unwrap();
    companies::join_company(&conn, MEMBER, company.id).unwrap();
    referrals::generate_code(&mut conn, MEMBER, company.id).unwrap();

    let suspended = companies::suspend(&mut conn, company.id).unwrap();
    assert_eq!(suspended.status, CompanyStatus::Suspended);
    assert!(matches!(
        referrals::generate_code(&mut conn, MEMBER, company.id),
        Err(AppError::Forbidden(_))
    ));
    assert!(companies::list_active(&conn, 0).unwrap().items.is_empty());

    let back = companies::reactivate(&mut conn, company.id).unwrap();
    assert_eq!(back.status, CompanyStatus::Active);
    assert!(matches!(
        companies::approve(&mut conn, company.id),
        Err(AppError::InvalidTransition { .. })
    ));
}

#[test]
fn withdrawal_limits_are_enforced() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let mut conn = env.conn();

    assert!(matches!(
        withdrawals::request_referral_withdrawal(&mut conn, MEMBER, 50),
        Err(AppError::BelowMinimum { minimum: 100 })
    ));
    assert!(matches!(
        withdrawals::request_referral_withdrawal(&mut conn, MEMBER, 500),
        Err(AppError::InsufficientFunds { available: 0, requested: 500 })
    ));
    assert!(matches!(
        withdrawals::request_company_payout(&mut conn, MEMBER, company.id, 500),
        Err(AppError::Forbidden(_))
    ));
    assert!(withdrawals::list_pending(&conn, 10).unwrap().is_empty());
}
