//! Admin panel screens: moderation queues and platform statistics.

use rusqlite::Connection;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::money::format_amount;
use crate::core::types::CompanyStatus;
use crate::i18n;
use crate::services::{companies, stats, withdrawals};
use crate::storage::companies as company_store;
use crate::telegram::callback_data::{CallbackData, CompanyDecision};
use crate::telegram::handlers::UserCtx;
use crate::telegram::markup::{self, escape};

use super::helpers::{back_row, button, Screen};

pub fn panel(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let stats = stats::platform_stats(conn)?;
    let text = i18n::t_args(
        &ctx.lang,
        "admin-title",
        &[
            ("companies", stats.pending_companies.into()),
            ("withdrawals", stats.pending_withdrawals.into()),
        ],
    );

    let rows = vec![
        vec![button(ctx.t("btn-admin-companies"), CallbackData::AdminCompanies)],
        vec![button(ctx.t("btn-admin-withdrawals"), CallbackData::AdminWithdrawals)],
        vec![button(ctx.t("btn-admin-stats"), CallbackData::AdminStats)],
        back_row(&ctx.lang, CallbackData::MainMenu),
    ];
    Ok(Screen::new(text, rows))
}

/// Pending companies awaiting review, then suspended ones that can be reactivated.
pub fn pending_companies(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let limit = config::listing::PAGE_SIZE;
    let pending = companies::list_pending(conn, limit)?;
    let suspended = company_store::list_by_status(conn, CompanyStatus::Suspended, limit, 0)?;

    if pending.is_empty() && suspended.is_empty() {
        return Ok(Screen::new(
            ctx.t("admin-companies-empty"),
            vec![back_row(&ctx.lang, CallbackData::Admin)],
        ));
    }

    let mut text = ctx.t("admin-companies-title");
    let mut rows = Vec::new();
    for company in &pending {
        text.push_str(&format!(
            "\n\n{} <b>#{} {}</b>\n{}",
            company.status.emoji(),
            company.id,
            escape(&company.name),
            escape(&company.description)
        ));
        rows.push(vec![
            button(
                format!("✅ #{}", company.id),
                CallbackData::AdminCompanyDecision {
                    id: company.id,
                    decision: CompanyDecision::Approve,
                },
            ),
            button(
                format!("❌ #{}", company.id),
                CallbackData::AdminCompanyDecision {
                    id: company.id,
                    decision: CompanyDecision::Reject,
                },
            ),
        ]);
    }
    for company in &suspended {
        text.push_str(&format!(
            "\n\n{} <b>#{} {}</b> · {}",
            company.status.emoji(),
            company.id,
            escape(&company.name),
            markup::company_status(&ctx.lang, company.status)
        ));
        rows.push(vec![button(
            format!("{} #{}", ctx.t("btn-reactivate"), company.id),
            CallbackData::AdminCompanyDecision {
                id: company.id,
                decision: CompanyDecision::Reactivate,
            },
        )]);
    }
    rows.push(back_row(&ctx.lang, CallbackData::Admin));

    Ok(Screen::new(text, rows))
}

pub fn pending_withdrawals(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let pending = withdrawals::list_pending(conn, config::listing::PAGE_SIZE)?;
    if pending.is_empty() {
        return Ok(Screen::new(
            ctx.t("admin-withdrawals-empty"),
            vec![back_row(&ctx.lang, CallbackData::Admin)],
        ));
    }

    let mut text = ctx.t("admin-withdrawals-title");
    let mut rows = Vec::new();
    for request in &pending {
        let company = request.company_id.map(|id| format!(" · company #{}", id)).unwrap_or_default();
        text.push_str(&format!(
            "\n\n<b>#{}</b> · {} · {}\n{} <code>{}</code>{}",
            request.id,
            markup::withdrawal_kind(&ctx.lang, request.kind),
            format_amount(request.amount),
            markup::withdrawal_status(&ctx.lang, request.status),
            request.requester_id,
            company
        ));
        rows.push(vec![
            button(
                format!("✅ #{}", request.id),
                CallbackData::AdminWithdrawalDecision {
                    id: request.id,
                    approve: true,
                },
            ),
            button(
                format!("❌ #{}", request.id),
                CallbackData::AdminWithdrawalDecision {
                    id: request.id,
                    approve: false,
                },
            ),
        ]);
    }
    rows.push(back_row(&ctx.lang, CallbackData::Admin));

    Ok(Screen::new(text, rows))
}

/// Platform-wide numbers, shared by the panel button and `/stats`.
pub fn stats_text(conn: &Connection, ctx: &UserCtx) -> AppResult<String> {
    let stats = stats::platform_stats(conn)?;
    Ok(i18n::t_args(
        &ctx.lang,
        "admin-stats",
        &[
            ("users", stats.users.into()),
            ("banned", stats.banned_users.into()),
            ("active", stats.active_companies.into()),
            ("pending", stats.pending_companies.into()),
            ("products", stats.products.into()),
            ("sales", stats.sales.into()),
            ("volume", format_amount(stats.sales_volume).into()),
            ("platform_balance", format_amount(stats.platform_balance).into()),
            ("withdrawals", stats.pending_withdrawals.into()),
            ("withdrawal_amount", format_amount(stats.pending_withdrawal_amount).into()),
        ],
    ))
}

pub fn stats(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    Ok(Screen::new(stats_text(conn, ctx)?, vec![back_row(&ctx.lang, CallbackData::Admin)]))
}
