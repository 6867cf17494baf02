//! Refmarket - Telegram marketplace bot with single-use referral codes
//!
//! Companies list products and record in-person sales. Members share
//! referral codes; each redeemed code pays the referrer a commission and the
//! buyer a bonus, and the platform takes a fee.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, money, settlement and other shared pieces
//! - `storage`: SQLite pool, migrations and per-table queries
//! - `services`: transactional business operations
//! - `telegram`: bot commands, menus, flows and notifications

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod i18n;
pub mod services;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{handle_callback, schema, HandlerDeps};
