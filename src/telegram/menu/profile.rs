use rusqlite::Connection;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::money::format_amount;
use crate::i18n;
use crate::services::{referrals, users, withdrawals};
use crate::storage::products::Product;
use crate::telegram::callback_data::{CallbackData, WithdrawSource};
use crate::telegram::handlers::UserCtx;
use crate::telegram::markup::{self, escape};

use super::helpers::{back_row, button, Screen};

pub fn profile(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let profile = users::get_profile(conn, ctx.id())?;
    let user = &profile.user;

    let mut text = i18n::t_args(
        &ctx.lang,
        "profile-text",
        &[
            ("name", escape(&user.display_name()).into()),
            ("id", user.telegram_id.into()),
            ("referral_balance", format_amount(user.referral_balance).into()),
            ("coin_balance", format_amount(user.coin_balance).into()),
            ("uses", profile.referrals.uses.into()),
            ("commission", format_amount(profile.referrals.commission).into()),
            ("favorites", profile.favorites.into()),
            ("cart", profile.cart.into()),
        ],
    );

    if !profile.joined.is_empty() {
        text.push_str("\n\n");
        text.push_str(&ctx.t("profile-joined"));
        for company in &profile.joined {
            text.push_str(&format!("\n• {}", escape(&company.name)));
        }
    }
    if !profile.active_codes.is_empty() {
        text.push_str("\n\n");
        text.push_str(&ctx.t("profile-codes"));
        for code in &profile.active_codes {
            text.push_str(&format!("\n• <code>{}</code> · {}", code.code, escape(&code.company_name)));
        }
    }

    let rows = vec![
        vec![
            button(ctx.t("btn-referral-history"), CallbackData::ReferralHistory),
            button(
                ctx.t("btn-withdraw"),
                CallbackData::Withdraw {
                    source: WithdrawSource::Referral,
                },
            ),
        ],
        vec![
            button(ctx.t("btn-favorites"), CallbackData::Favorites),
            button(ctx.t("btn-cart"), CallbackData::Cart),
        ],
        back_row(&ctx.lang, CallbackData::MainMenu),
    ];

    Ok(Screen::new(text, rows))
}

fn product_rows(items: &[Product]) -> Vec<Vec<teloxide::types::InlineKeyboardButton>> {
    items
        .iter()
        .map(|product| {
            vec![button(
                format!("{} · {}", product.name, format_amount(product.price)),
                CallbackData::Product { id: product.id },
            )]
        })
        .collect()
}

pub fn favorites(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let items = users::list_favorites(conn, ctx.id())?;
    let text = if items.is_empty() {
        ctx.t("favorites-empty")
    } else {
        ctx.t("favorites-title")
    };

    let mut rows = product_rows(&items);
    rows.push(back_row(&ctx.lang, CallbackData::Profile));
    Ok(Screen::new(text, rows))
}

pub fn cart(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let items = users::list_cart(conn, ctx.id())?;
    if items.is_empty() {
        return Ok(Screen::new(
            ctx.t("cart-empty"),
            vec![back_row(&ctx.lang, CallbackData::Profile)],
        ));
    }

    // Prices are shown for reference; sales happen in person.
    let total = items.iter().map(|p| p.price).sum::<i64>();
    let text = i18n::t_args(&ctx.lang, "cart-title", &[("total", format_amount(total).into())]);

    let mut rows = product_rows(&items);
    rows.push(vec![button(ctx.t("btn-clear-cart"), CallbackData::ClearCart)]);
    rows.push(back_row(&ctx.lang, CallbackData::Profile));
    Ok(Screen::new(text, rows))
}

pub fn referral_history(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let stats = referrals::referral_stats(conn, ctx.id())?;
    let entries = referrals::referral_history(conn, ctx.id(), config::listing::HISTORY_LIMIT)?;
    let requests = withdrawals::list_for_user(conn, ctx.id(), config::listing::HISTORY_LIMIT)?;

    let mut text = i18n::t_args(
        &ctx.lang,
        "referrals-text",
        &[
            ("uses", stats.totals.uses.into()),
            ("volume", format_amount(stats.totals.referred_volume).into()),
            ("commission", format_amount(stats.totals.commission).into()),
            ("balance", format_amount(stats.balance).into()),
            ("active", stats.active_codes.into()),
        ],
    );

    if entries.is_empty() {
        text.push_str("\n\n");
        text.push_str(&ctx.t("referrals-empty"));
    } else {
        for entry in &entries {
            text.push_str(&format!(
                "\n• <code>{}</code> · {} · {} → +{}",
                entry.code,
                escape(&entry.company_name),
                format_amount(entry.amount),
                format_amount(entry.commission)
            ));
        }
    }

    if !requests.is_empty() {
        text.push_str("\n\n");
        text.push_str(&ctx.t("withdrawals-title"));
        for request in &requests {
            text.push_str(&format!(
                "\n#{} · {} · {} · {}",
                request.id,
                markup::withdrawal_kind(&ctx.lang, request.kind),
                format_amount(request.amount),
                markup::withdrawal_status(&ctx.lang, request.status)
            ));
        }
    }

    Ok(Screen::new(text, vec![back_row(&ctx.lang, CallbackData::Profile)]))
}
