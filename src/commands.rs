//! Command parsing
//!
//! Commands may start with any single ASCII punctuation character, so
//! `/sessiongen`, `.sessiongen` and `!sessiongen` are the same command.
//! Matching is case-insensitive and an `@botname` suffix is ignored.

use regex::Regex;
use std::sync::LazyLock;

static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[[:punct:]]([A-Za-z]+)(?:@[A-Za-z0-9_]+)?(?:\s|$)")
        .expect("Invalid command regex pattern")
});

/// Commands understood by the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// `start` or `arise`
    Start,
    Help,
    SessionGen,
    Cancel,
}

impl BotCommand {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "start" | "arise" => Some(BotCommand::Start),
            "help" => Some(BotCommand::Help),
            "sessiongen" => Some(BotCommand::SessionGen),
            "cancel" => Some(BotCommand::Cancel),
            _ => None,
        }
    }

    /// Name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            BotCommand::Start => "start",
            BotCommand::Help => "help",
            BotCommand::SessionGen => "sessiongen",
            BotCommand::Cancel => "cancel",
        }
    }
}

/// Parse a known command from the start of a message
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let captures = COMMAND_PATTERN.captures(text.trim_start())?;
    BotCommand::from_name(captures.get(1)?.as_str())
}
