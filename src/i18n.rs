use std::borrow::Cow;
use std::collections::HashMap;

use fluent_templates::{fluent_bundle::FluentValue, static_loader, Loader};
use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

use crate::storage::db::{get_connection, DbPool};
use crate::storage::users;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "en",
        // Telegram renders the bidi isolation marks as garbage
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Supported languages (code, human-readable name).
pub static SUPPORTED_LANGS: &[(&str, &str)] = &[("en", "English"), ("ru", "Русский")];

pub const DEFAULT_LANG_CODE: &str = "en";

/// Default language identifier used as a fallback.
static DEFAULT_LANG: Lazy<LanguageIdentifier> = Lazy::new(|| LanguageIdentifier::from_bytes(b"en").unwrap_or_default());

/// Normalizes a language code into a LanguageIdentifier (falls back to default).
pub fn lang_from_code(code: &str) -> LanguageIdentifier {
    match is_language_supported(code) {
        Some(supported) => supported.parse().unwrap_or_else(|_| DEFAULT_LANG.clone()),
        None => DEFAULT_LANG.clone(),
    }
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: &LanguageIdentifier, key: &str) -> String {
    let text = LOCALES
        .try_lookup(lang, key)
        .or_else(|| LOCALES.try_lookup(&DEFAULT_LANG, key))
        .unwrap_or_else(|| key.to_string());
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
///
/// Amounts are passed preformatted as strings so both locales show `95.00`.
pub fn t_args(lang: &LanguageIdentifier, key: &str, args: &[(&'static str, FluentValue<'static>)]) -> String {
    let args_map: HashMap<Cow<'static, str>, FluentValue<'static>> =
        args.iter().map(|(k, v)| (Cow::Borrowed(*k), v.clone())).collect();

    let text = LOCALES
        .try_lookup_with_args(lang, key, &args_map)
        .or_else(|| LOCALES.try_lookup_with_args(&DEFAULT_LANG, key, &args_map))
        .unwrap_or_else(|| key.to_string());
    text.replace("\\n", "\n")
}

/// Language stored for a user, or the default for unknown users and DB errors.
pub fn user_lang_from_pool(pool: &DbPool, telegram_id: i64) -> LanguageIdentifier {
    let stored = get_connection(pool)
        .ok()
        .and_then(|conn| users::get_user(&conn, telegram_id).ok().flatten())
        .map(|user| user.language);
    match stored {
        Some(code) => lang_from_code(&code),
        None => DEFAULT_LANG.clone(),
    }
}

/// Finds a human-friendly name for a language code.
pub fn language_name(code: &str) -> &'static str {
    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Checks if a language code is supported by the bot.
/// Returns the normalized language code if supported, None otherwise.
pub fn is_language_supported(code: &str) -> Option<&'static str> {
    // "en-US" -> "en", "ru_RU" -> "ru"
    let normalized = code.split(['-', '_']).next().unwrap_or(code).trim().to_lowercase();

    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(&normalized))
        .map(|(c, _)| *c)
}
