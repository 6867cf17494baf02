//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.
//! The handlers are organized in a testable way, allowing integration tests
//! to use the same handler tree as production code.

mod commands;
pub mod flows;
mod messages;
mod schema;
mod types;

pub use commands::{parse_fee_args, parse_min_args, MinimumKind};
pub use schema::schema;
pub use types::{ensure_user, error_text, is_banned_sender, HandlerDeps, HandlerError, UserCtx, UserInfo};
