use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::i18n;
use crate::storage::companies::{self, Company};
use crate::storage::lists::{self, ListKind};
use crate::storage::products::{self, Product};
use crate::storage::referral_codes::{self, ActiveCode};
use crate::storage::referrals::{self, ReferralTotals};
use crate::storage::users::{self, UserRecord};

/// Everything the profile screen shows.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: UserRecord,
    pub joined: Vec<Company>,
    pub owned: Vec<Company>,
    pub active_codes: Vec<ActiveCode>,
    pub favorites: i64,
    pub cart: i64,
    pub referrals: ReferralTotals,
}

/// Registers the user on first contact and refreshes their names afterwards.
///
/// `language_code` is Telegram's locale; it only decides the initial language.
pub fn register_user(
    conn: &Connection,
    telegram_id: i64,
    username: Option<&str>,
    first_name: Option<&str>,
    language_code: Option<&str>,
) -> AppResult<UserRecord> {
    let language = language_code
        .and_then(i18n::is_language_supported)
        .unwrap_or(i18n::DEFAULT_LANG_CODE);
    users::upsert_user(conn, telegram_id, username, first_name, language)?;
    get_user(conn, telegram_id)
}

pub fn get_user(conn: &Connection, telegram_id: i64) -> AppResult<UserRecord> {
    users::get_user(conn, telegram_id)?.ok_or(AppError::NotFound("user"))
}

pub fn get_profile(conn: &Connection, telegram_id: i64) -> AppResult<Profile> {
    let user = get_user(conn, telegram_id)?;
    Ok(Profile {
        joined: companies::list_joined(conn, telegram_id)?,
        owned: companies::list_owned(conn, telegram_id)?,
        active_codes: referral_codes::list_active_for_owner(conn, telegram_id)?,
        favorites: lists::count(conn, ListKind::Favorites, telegram_id)?,
        cart: lists::count(conn, ListKind::Cart, telegram_id)?,
        referrals: referrals::totals_for_referrer(conn, telegram_id)?,
        user,
    })
}

pub fn set_banned(conn: &Connection, telegram_id: i64, banned: bool) -> AppResult<()> {
    if users::set_banned(conn, telegram_id, banned)? == 0 {
        return Err(AppError::NotFound("user"));
    }
    log::info!("User {} banned={}", telegram_id, banned);
    Ok(())
}

/// Unknown users are not banned.
pub fn is_banned(conn: &Connection, telegram_id: i64) -> AppResult<bool> {
    Ok(users::get_user(conn, telegram_id)?.is_some_and(|u| u.is_banned))
}

pub fn set_language(conn: &Connection, telegram_id: i64, code: &str) -> AppResult<&'static str> {
    let language = i18n::is_language_supported(code)
        .ok_or_else(|| AppError::Validation(format!("unsupported language '{}'", code)))?;
    if users::set_language(conn, telegram_id, language)? == 0 {
        return Err(AppError::NotFound("user"));
    }
    Ok(language)
}

fn toggle(conn: &Connection, kind: ListKind, telegram_id: i64, product_id: i64) -> AppResult<bool> {
    products::get_product(conn, product_id)?.ok_or(AppError::NotFound("product"))?;
    Ok(lists::toggle(conn, kind, telegram_id, product_id)?)
}

/// Returns whether the product is a favorite afterwards.
pub fn toggle_favorite(conn: &Connection, telegram_id: i64, product_id: i64) -> AppResult<bool> {
    toggle(conn, ListKind::Favorites, telegram_id, product_id)
}

/// Returns whether the product is in the cart afterwards.
pub fn toggle_cart(conn: &Connection, telegram_id: i64, product_id: i64) -> AppResult<bool> {
    toggle(conn, ListKind::Cart, telegram_id, product_id)
}

pub fn is_favorite(conn: &Connection, telegram_id: i64, product_id: i64) -> AppResult<bool> {
    Ok(lists::contains(conn, ListKind::Favorites, telegram_id, product_id)?)
}

pub fn in_cart(conn: &Connection, telegram_id: i64, product_id: i64) -> AppResult<bool> {
    Ok(lists::contains(conn, ListKind::Cart, telegram_id, product_id)?)
}

pub fn list_favorites(conn: &Connection, telegram_id: i64) -> AppResult<Vec<Product>> {
    Ok(lists::list_products(conn, ListKind::Favorites, telegram_id)?)
}

pub fn list_cart(conn: &Connection, telegram_id: i64) -> AppResult<Vec<Product>> {
    Ok(lists::list_products(conn, ListKind::Cart, telegram_id)?)
}

pub fn clear_cart(conn: &Connection, telegram_id: i64) -> AppResult<usize> {
    Ok(lists::clear(conn, ListKind::Cart, telegram_id)?)
}
