//! Business rules on top of `storage`.
//!
//! Every function takes a connection so the caller decides where it comes
//! from: a pooled connection in the bot, an in-memory database in tests.
//! Operations that move money take `&mut Connection` and run inside a single
//! `IMMEDIATE` transaction.

pub mod companies;
pub mod products;
pub mod referrals;
pub mod sales;
pub mod settings;
pub mod stats;
pub mod users;
pub mod withdrawals;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};

use crate::core::error::AppResult;

pub use settings::SettingsService;

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Zero-based
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.page > 0
    }

    pub fn has_next(&self) -> bool {
        self.page + 1 < self.total_pages
    }
}

pub(crate) fn total_pages(total: i64, page_size: i64) -> i64 {
    ((total + page_size - 1) / page_size).max(1)
}

/// Starts a write transaction that takes the database lock up front, so two
/// writers never both read a balance and then race to update it.
pub(crate) fn begin_immediate(conn: &mut Connection) -> AppResult<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

/// Whether an insert lost to a UNIQUE index.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
