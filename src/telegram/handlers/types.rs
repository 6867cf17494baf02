//! Handler types, dependencies, and user management helpers

use std::sync::Arc;

use teloxide::types::User;
use unic_langid::LanguageIdentifier;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::money::format_amount;
use crate::core::rate_limiter::RateLimiter;
use crate::i18n;
use crate::services::users;
use crate::services::SettingsService;
use crate::storage::db::{self, DbConnection, DbPool};
use crate::storage::users::UserRecord;
use crate::telegram::markup::escape;
use crate::telegram::session::SessionStore;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub settings: Arc<SettingsService>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(
        db_pool: Arc<DbPool>,
        sessions: Arc<SessionStore>,
        rate_limiter: Arc<RateLimiter>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            db_pool,
            sessions,
            rate_limiter,
            settings,
        }
    }

    pub fn conn(&self) -> AppResult<DbConnection> {
        Ok(db::get_connection(&self.db_pool)?)
    }
}

/// Telegram profile fields we store.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub language_code: Option<String>,
}

impl UserInfo {
    pub fn from_user(user: &User) -> Self {
        Self {
            telegram_id: i64::try_from(user.id.0).unwrap_or(0),
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            language_code: user.language_code.clone(),
        }
    }
}

/// The registered user behind an update.
#[derive(Debug, Clone)]
pub struct UserCtx {
    pub user: UserRecord,
    pub lang: LanguageIdentifier,
    pub is_admin: bool,
}

impl UserCtx {
    pub fn id(&self) -> i64 {
        self.user.telegram_id
    }

    pub fn t(&self, key: &str) -> String {
        i18n::t(&self.lang, key)
    }
}

/// Registers the user on first contact (refreshing their names otherwise)
/// and resolves their language.
pub fn ensure_user(deps: &HandlerDeps, info: &UserInfo) -> AppResult<UserCtx> {
    let conn = deps.conn()?;
    let user = users::register_user(
        &conn,
        info.telegram_id,
        info.username.as_deref(),
        info.first_name.as_deref(),
        info.language_code.as_deref(),
    )?;
    Ok(UserCtx {
        lang: i18n::lang_from_code(&user.language),
        is_admin: config::admin::is_admin(user.telegram_id),
        user,
    })
}

/// Whether the sender is banned. Unknown users count as not banned.
///
/// A DB failure also lets the update through: every handler behind the gate
/// opens a connection first and reports the same failure to the user.
pub fn is_banned_sender(deps: &HandlerDeps, user: Option<&User>) -> bool {
    let Some(user) = user else {
        return false;
    };
    let telegram_id = i64::try_from(user.id.0).unwrap_or(0);
    match deps.conn().and_then(|conn| users::is_banned(&conn, telegram_id)) {
        Ok(banned) => banned,
        Err(e) => {
            log::error!("Ban check failed for {}: {}", telegram_id, e);
            false
        }
    }
}

/// Localized chat text for an error. Infrastructure errors are logged and
/// shown as the generic message.
pub fn error_text(lang: &LanguageIdentifier, err: &AppError) -> String {
    metrics::record_handler_error(err.kind());

    if !err.is_user_error() {
        log::error!("Handler failed: {}", err);
        return i18n::t(lang, "error-generic");
    }
    log::debug!("Rejected request: {}", err);

    match err {
        AppError::NotFound(_) => i18n::t(lang, "error-not-found"),
        AppError::Forbidden(_) => i18n::t(lang, "error-forbidden"),
        AppError::AlreadyExists(_) => i18n::t(lang, "error-already-exists"),
        AppError::Validation(details) => i18n::t_args(lang, "error-validation", &[("details", escape(details).into())]),
        AppError::Banned => i18n::t(lang, "error-banned"),
        AppError::InsufficientFunds { available, requested } => i18n::t_args(
            lang,
            "error-insufficient-funds",
            &[
                ("available", format_amount(*available).into()),
                ("requested", format_amount(*requested).into()),
            ],
        ),
        AppError::BelowMinimum { minimum } => {
            i18n::t_args(lang, "error-below-minimum", &[("minimum", format_amount(*minimum).into())])
        }
        AppError::OutOfStock { available } => {
            i18n::t_args(lang, "error-out-of-stock", &[("available", (*available).into())])
        }
        AppError::ReferralCodeUnavailable => i18n::t(lang, "error-code-unavailable"),
        AppError::SelfReferral => i18n::t(lang, "error-self-referral"),
        AppError::DuplicateSale => i18n::t(lang, "error-duplicate-sale"),
        AppError::InvalidTransition { .. } => i18n::t(lang, "error-invalid-transition"),
        _ => i18n::t(lang, "error-generic"),
    }
}
