//! UI Builder module for creating keyboards and formatting messages

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, User};

// Import localization
use crate::localization::{t_args_lang, t_lang, LocalizationManager};

use crate::dialogue::{SessionLibrary, CALLBACK_CANCEL};
use crate::wizard::WizardReply;

/// Create the library choice keyboard: one row of libraries, one cancel row
pub fn create_library_keyboard(
    localization: &LocalizationManager,
    language_code: Option<&str>,
) -> InlineKeyboardMarkup {
    let libraries = SessionLibrary::ALL
        .iter()
        .map(|library| InlineKeyboardButton::callback(library.display_name(), library.callback_data()))
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(vec![
        libraries,
        vec![InlineKeyboardButton::callback(
            t_lang(localization, "button-cancel", language_code),
            CALLBACK_CANCEL,
        )],
    ])
}

/// How the welcome message addresses a user
pub fn display_name(user: &User) -> String {
    match &user.username {
        Some(username) => format!("@{}", username),
        None => user.first_name.clone(),
    }
}

/// Render a wizard reply as message text
pub fn render_reply(
    reply: &WizardReply,
    localization: &LocalizationManager,
    language_code: Option<&str>,
) -> String {
    let t = |key: &str| t_lang(localization, key, language_code);
    let t_args = |key: &str, args: &[(&str, &str)]| t_args_lang(localization, key, args, language_code);

    match reply {
        WizardReply::ChooseLibrary => t("choose-library"),
        WizardReply::AskApiId { .. } => t("ask-api-id"),
        WizardReply::InvalidApiId => t("invalid-api-id"),
        WizardReply::AskApiHash => t("ask-api-hash"),
        WizardReply::AskPhone => t("ask-phone"),
        WizardReply::CodeSent => t("code-sent"),
        WizardReply::AskPassword { hint: Some(hint) } if !hint.is_empty() => {
            t_args("ask-password-hint", &[("hint", hint)])
        }
        WizardReply::AskPassword { .. } => t("ask-password"),
        WizardReply::SessionReady {
            library,
            session_string,
            two_factor,
        } => {
            let key = if *two_factor {
                "session-ready-2fa"
            } else {
                "session-ready"
            };
            t_args(
                key,
                &[
                    ("library", library.display_name()),
                    ("session", session_string.expose()),
                ],
            )
        }
        WizardReply::CodeRequestFailed { reason } => {
            t_args("code-request-failed", &[("reason", reason)])
        }
        WizardReply::SignInFailed { reason } => t_args("sign-in-failed", &[("reason", reason)]),
        WizardReply::WrongPassword => t("wrong-password"),
        WizardReply::PasswordFailed { reason } => {
            t_args("password-failed", &[("reason", reason)])
        }
        WizardReply::Cancelled => t("cancelled"),
        WizardReply::Busy => t("busy"),
    }
}
