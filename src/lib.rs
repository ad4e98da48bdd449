//! # Session Generator Telegram Bot
//!
//! A Telegram bot that walks a user through an MTProto login and hands back a
//! Pyrogram or Telethon session string.

pub mod auth;
pub mod bot;
pub mod commands;
pub mod config;
pub mod dialogue;
pub mod errors;
pub mod localization;
pub mod observability;
pub mod observability_config;
pub mod session_store;
pub mod session_string;
pub mod validation;
pub mod wizard;

// Re-export types for easier access
pub use dialogue::{SessionLibrary, WizardStep};
pub use wizard::{WizardReply, WizardService};
