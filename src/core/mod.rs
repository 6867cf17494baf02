//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod money;
pub mod rate_limiter;
pub mod settlement;
pub mod types;
pub mod validation;
pub mod web_server;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
pub use money::{format_amount, parse_amount};
