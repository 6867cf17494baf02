pub mod admin;
pub mod browse;
mod callback_router;
pub mod helpers;
pub mod main_menu;
pub mod owner;
pub mod profile;
pub mod sale;

pub use callback_router::handle_callback;
pub use helpers::{show, Screen, Target};
