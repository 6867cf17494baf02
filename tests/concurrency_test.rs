//! Concurrent writers against one SQLite file
//!
//! Run with: cargo test --test concurrency_test

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{balance_of, TestEnvironment, MEMBER, OWNER};
use refmarket::services::sales::{process_sale, SaleRequest};
use refmarket::services::{companies, referrals, stats, withdrawals};
use refmarket::AppError;
use serial_test::serial;

#[test]
#[serial]
fn referral_code_is_redeemed_once() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 1_000, 10);
    let code = {
        let mut conn = env.conn();
        companies::join_company(&conn, MEMBER, company.id).unwrap();
        referrals::generate_code(&mut conn, MEMBER, company.id).unwrap().code
    };

    let (company_id, product_id) = (company.id, latte.id);
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let pool = env.pool.clone();
            let barrier = Arc::clone(&barrier);
            let code = code.clone();
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                let req = SaleRequest {
                    sale_key: format!("race-{}", i),
                    company_id,
                    product_id,
                    seller_id: OWNER,
                    quantity: 1,
                    referral_code: Some(code),
                    buyer_id: None,
                };
                barrier.wait();
                process_sale(&mut conn, &req)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1, "{:?}", results);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::ReferralCodeUnavailable))));

    let conn = env.conn();
    assert_eq!(balance_of(&conn, MEMBER).0, 100);
    assert_eq!(stats::platform_stats(&conn).unwrap().sales, 1);
}

#[test]
#[serial]
fn balance_cannot_be_withdrawn_twice() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 5_000, 1);
    {
        let mut conn = env.conn();
        companies::join_company(&conn, MEMBER, company.id).unwrap();
        let code = referrals::generate_code(&mut conn, MEMBER, company.id).unwrap().code;
        let req = SaleRequest {
            sale_key: "seed".into(),
            company_id: company.id,
            product_id: latte.id,
            seller_id: OWNER,
            quantity: 1,
            referral_code: Some(code),
            buyer_id: None,
        };
        process_sale(&mut conn, &req).unwrap();
        assert_eq!(balance_of(&conn, MEMBER).0, 500);
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let pool = env.pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut conn = pool.get().unwrap();
                barrier.wait();
                withdrawals::request_referral_withdrawal(&mut conn, MEMBER, 400)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{:?}", results);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientFunds { .. }))));

    let conn = env.conn();
    assert_eq!(balance_of(&conn, MEMBER).0, 100);
}
