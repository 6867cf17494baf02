//! SQLite persistence: connection pool, migrations and one module per table group

pub mod companies;
pub mod db;
pub mod lists;
pub mod migrations;
pub mod products;
pub mod referral_codes;
pub mod referrals;
pub mod sales;
pub mod settings;
pub mod users;
pub mod withdrawals;

// Re-exports for convenience
pub use db::{create_pool, get_connection, DbConnection, DbPool};
