//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: commands and wizard text input
//! - `callback_handler`: library choice and cancel buttons
//! - `command_handlers`: start, help, sessiongen and cancel
//! - `ui_builder`: keyboards and reply rendering

pub mod callback_handler;
pub mod command_handlers;
pub mod message_handler;
pub mod ui_builder;

// Common context structures for handler functions
use crate::localization::LocalizationManager;
use teloxide::Bot;

/// Common context for bot handlers containing shared dependencies
pub struct HandlerContext<'a> {
    pub bot: &'a Bot,
    pub localization: &'a std::sync::Arc<LocalizationManager>,
    pub language_code: Option<&'a str>,
}

// Re-export main handler functions for use in main.rs
pub use callback_handler::{callback_handler, is_wizard_callback};
pub use message_handler::message_handler;
pub use ui_builder::{create_library_keyboard, render_reply};
