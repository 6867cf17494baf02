//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use rusqlite::Connection;
use tempfile::TempDir;

use refmarket::core::settlement::FeeSchedule;
use refmarket::services::settings::FeeKind;
use refmarket::services::{companies, products, users, SettingsService};
use refmarket::storage::companies::Company;
use refmarket::storage::db::{self, DbConnection, DbPool};
use refmarket::storage::products::Product;

pub const ADMIN: i64 = 900;
pub const OWNER: i64 = 100;
pub const MEMBER: i64 = 200;
pub const BUYER: i64 = 300;

/// Fees used by every integration test: 5% platform, 10% referrer, 5% buyer.
pub const FEES: FeeSchedule = FeeSchedule {
    platform_fee_percent: 5.0,
    referral_commission_percent: 10.0,
    buyer_discount_percent: 5.0,
};

/// A file-backed database in a temp dir, removed on drop.
pub struct TestEnvironment {
    pub dir: TempDir,
    pub pool: DbPool,
    pub settings: SettingsService,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("market.sqlite");
        let pool = db::create_pool(path.to_str().expect("utf-8 path")).expect("pool");
        let settings = SettingsService::new();

        let conn = pool.get().expect("connection");
        settings.ensure_defaults(&conn).expect("defaults");
        settings.set_fee_percent(&conn, FeeKind::Platform, FEES.platform_fee_percent).unwrap();
        settings.set_fee_percent(&conn, FeeKind::Referral, FEES.referral_commission_percent).unwrap();
        settings.set_fee_percent(&conn, FeeKind::Discount, FEES.buyer_discount_percent).unwrap();
        settings.set_min_withdrawal(&conn, 100).unwrap();
        settings.set_min_payout(&conn, 100).unwrap();

        Self { dir, pool, settings }
    }

    pub fn conn(&self) -> DbConnection {
        self.pool.get().expect("connection")
    }

    pub fn user(&self, telegram_id: i64, name: &str) {
        users::register_user(&self.conn(), telegram_id, Some(name), Some(name), Some("en")).unwrap();
    }

    /// Owner, member and buyer accounts plus an approved company.
    pub fn active_company(&self, name: &str) -> Company {
        self.user(OWNER, "owner");
        self.user(MEMBER, "member");
        self.user(BUYER, "buyer");
        let mut conn = self.conn();
        let company = companies::register_company(&conn, OWNER, name, "Coffee and pastries").unwrap();
        companies::approve(&mut conn, company.id).unwrap()
    }

    pub fn product(&self, company_id: i64, name: &str, price: i64, quantity: i64) -> Product {
        products::add_product(&self.conn(), OWNER, company_id, name, "", price, quantity).unwrap()
    }
}

pub fn balance_of(conn: &Connection, telegram_id: i64) -> (i64, i64) {
    let user = users::get_user(conn, telegram_id).unwrap();
    (user.referral_balance, user.coin_balance)
}
