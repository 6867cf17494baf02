use thiserror::Error;

use crate::core::money::format_amount;

/// Centralized error types for the application
///
/// Infrastructure failures (database, Telegram, IO) are converted into this enum
/// with `?`. Domain failures are raised by the services and are permanent: the
/// same request would fail again, so handlers render them to the chat instead of
/// logging them as faults.
///
/// # Example
///
/// ```no_run
/// use refmarket::core::error::AppError;
///
/// fn describe(err: &AppError) -> &'static str {
///     if err.is_user_error() { "tell the user" } else { "log it" }
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("{0} already exists")]
    AlreadyExists(&'static str),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User is banned")]
    Banned,

    #[error("Insufficient funds: available {}, requested {}", money(.available), money(.requested))]
    InsufficientFunds { available: i64, requested: i64 },

    #[error("Amount below minimum of {}", money(.minimum))]
    BelowMinimum { minimum: i64 },

    #[error("Out of stock: {available} available")]
    OutOfStock { available: i64 },

    #[error("Referral code is not available")]
    ReferralCodeUnavailable,

    #[error("Referral code cannot be used by its owner")]
    SelfReferral,

    #[error("Sale was already recorded")]
    DuplicateSale,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl AppError {
    /// Domain errors caused by the request itself rather than by infrastructure.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            AppError::Database(_)
                | AppError::DatabasePool(_)
                | AppError::Migration(_)
                | AppError::Telegram(_)
                | AppError::Io(_)
        )
    }

    /// Short label used for the handler error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database",
            AppError::DatabasePool(_) => "database_pool",
            AppError::Migration(_) => "migration",
            AppError::Telegram(_) => "telegram",
            AppError::Io(_) => "io",
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Validation(_) => "validation",
            AppError::Banned => "banned",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::BelowMinimum { .. } => "below_minimum",
            AppError::OutOfStock { .. } => "out_of_stock",
            AppError::ReferralCodeUnavailable => "code_unavailable",
            AppError::SelfReferral => "self_referral",
            AppError::DuplicateSale => "duplicate_sale",
            AppError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    pub fn transition(from: impl ToString, to: impl ToString) -> Self {
        AppError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

fn money(cents: &i64) -> String {
    format_amount(*cents)
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_user_errors() {
        assert!(AppError::SelfReferral.is_user_error());
        assert!(AppError::BelowMinimum { minimum: 1000 }.is_user_error());
        assert!(!AppError::Io(std::io::Error::other("disk")).is_user_error());
    }

    #[test]
    fn money_is_formatted_in_messages() {
        let err = AppError::InsufficientFunds {
            available: 950,
            requested: 1_000,
        };
        assert_eq!(err.to_string(), "Insufficient funds: available 9.50, requested 10.00");
        assert_eq!(
            AppError::BelowMinimum { minimum: 5_000 }.to_string(),
            "Amount below minimum of 50.00"
        );
    }
}
