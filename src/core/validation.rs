//! Input validation for chat-entered values
//!
//! Everything the wizards accept from free text passes through here before it
//! reaches a service:
//! - Company and product names, descriptions
//! - Prices and stock quantities
//! - Referral codes (normalized to upper case)

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::core::error::AppError;
use crate::core::money::{parse_amount, MAX_AMOUNT};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 64;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const MAX_QUANTITY: i64 = 1_000_000;

static REFERRAL_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{4}-[A-Z0-9]{4}$").unwrap_or_else(|_| unreachable!()));

/// Validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must be {min}..={max} characters")]
    NameLength { min: usize, max: usize },

    #[error("description must be at most {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("invalid price '{0}'")]
    InvalidPrice(String),

    #[error("invalid amount '{0}'")]
    InvalidAmount(String),

    #[error("invalid telegram id '{0}'")]
    InvalidTelegramId(String),

    #[error("invalid quantity '{0}'")]
    InvalidQuantity(String),

    #[error("invalid referral code '{0}'")]
    InvalidReferralCode(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Trims and checks a company or product name.
pub fn validate_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim();
    let len = name.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(ValidationError::NameLength {
            min: NAME_MIN_CHARS,
            max: NAME_MAX_CHARS,
        });
    }
    Ok(name.to_string())
}

/// Trims a description. `-` on its own means "no description".
pub fn validate_description(input: &str) -> Result<String, ValidationError> {
    let text = input.trim();
    if text == "-" {
        return Ok(String::new());
    }
    if text.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ValidationError::DescriptionTooLong {
            max: DESCRIPTION_MAX_CHARS,
        });
    }
    Ok(text.to_string())
}

/// Parses a price in major units into cents (0.01..=1,000,000.00).
pub fn validate_price(input: &str) -> Result<i64, ValidationError> {
    match parse_amount(input) {
        Some(cents) if (1..=MAX_AMOUNT).contains(&cents) => Ok(cents),
        _ => Err(ValidationError::InvalidPrice(input.trim().to_string())),
    }
}

/// Parses a withdrawal amount. Minimums are enforced by the services.
pub fn validate_amount(input: &str) -> Result<i64, ValidationError> {
    parse_amount(input)
        .filter(|cents| *cents > 0)
        .ok_or_else(|| ValidationError::InvalidAmount(input.trim().to_string()))
}

pub fn validate_quantity(input: &str) -> Result<i64, ValidationError> {
    input
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|q| (0..=MAX_QUANTITY).contains(q))
        .ok_or_else(|| ValidationError::InvalidQuantity(input.trim().to_string()))
}

/// Parses a numeric Telegram user id, as typed by sellers and admins.
pub fn validate_telegram_id(input: &str) -> Result<i64, ValidationError> {
    input
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ValidationError::InvalidTelegramId(input.trim().to_string()))
}

/// Upper-cases and trims a referral code, then checks the `XXXX-XXXX` shape.
pub fn normalize_referral_code(input: &str) -> Result<String, ValidationError> {
    let code = input.trim().to_uppercase();
    if REFERRAL_CODE_RE.is_match(&code) {
        Ok(code)
    } else {
        Err(ValidationError::InvalidReferralCode(input.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_bounded() {
        assert_eq!(validate_name("  Coffee Hub ").unwrap(), "Coffee Hub");
        assert!(validate_name("A").is_err());
        assert!(validate_name(&"x".repeat(65)).is_err());
        // counted in characters, not bytes
        assert!(validate_name(&"ж".repeat(64)).is_ok());
    }

    #[test]
    fn dash_clears_description() {
        assert_eq!(validate_description("-").unwrap(), "");
        assert!(validate_description(&"a".repeat(501)).is_err());
    }

    #[test]
    fn amounts_and_ids() {
        assert_eq!(validate_amount("12,5").unwrap(), 1250);
        assert!(validate_amount("0").is_err());
        assert_eq!(validate_telegram_id(" 42 ").unwrap(), 42);
        assert!(validate_telegram_id("@bob").is_err());
        assert!(validate_telegram_id("-5").is_err());
    }

    #[test]
    fn price_bounds() {
        assert_eq!(validate_price("0.01").unwrap(), 1);
        assert_eq!(validate_price("1000000").unwrap(), 100_000_000);
        assert!(validate_price("0").is_err());
        assert!(validate_price("1000000.01").is_err());
    }

    #[test]
    fn quantity_bounds() {
        assert_eq!(validate_quantity(" 0 ").unwrap(), 0);
        assert!(validate_quantity("-1").is_err());
        assert!(validate_quantity("1000001").is_err());
        assert!(validate_quantity("1.5").is_err());
    }

    #[test]
    fn referral_codes_are_normalized() {
        assert_eq!(normalize_referral_code(" ab12-cd34 ").unwrap(), "AB12-CD34");
        assert!(normalize_referral_code("AB12CD34").is_err());
        assert!(normalize_referral_code("AB1-CD345").is_err());
        assert!(normalize_referral_code("AB12-CD3!").is_err());
    }
}
