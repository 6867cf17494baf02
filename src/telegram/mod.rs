//! Telegram bot integration and handlers

pub mod bot;
pub mod callback_data;
pub mod handlers;
pub mod markup;
pub mod menu;
pub mod notifications;
pub mod session;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use callback_data::CallbackData;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use menu::handle_callback;
pub use session::SessionStore;
