//! Screens of the sale wizard: product picker, step prompts, preview and receipt.

use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::core::money::format_amount;
use crate::core::settlement::{settle, FeeSchedule};
use crate::core::types::{CompanyStatus, ProductStatus};
use crate::i18n;
use crate::services::sales::SaleReceipt;
use crate::services::{companies, products};
use crate::telegram::callback_data::CallbackData;
use crate::telegram::handlers::UserCtx;
use crate::telegram::markup::escape;
use crate::telegram::session::{SaleDraft, SaleStep};

use super::helpers::{back_row, button, cancel_row, Screen};

/// Products the owner can sell right now: active and in stock.
pub fn sale_products(conn: &Connection, ctx: &UserCtx, company_id: i64) -> AppResult<Screen> {
    let company = companies::require_owner(conn, company_id, ctx.id())?;
    if company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }

    let sellable: Vec<_> = products::list_for_company(conn, company_id, ctx.id())?
        .into_iter()
        .filter(|p| p.status == ProductStatus::Active && p.quantity > 0)
        .collect();

    let text = if sellable.is_empty() {
        ctx.t("sale-no-products")
    } else {
        i18n::t_args(&ctx.lang, "sale-pick-product", &[("company", escape(&company.name).into())])
    };

    let mut rows: Vec<_> = sellable
        .iter()
        .map(|product| {
            vec![button(
                format!("{} · {} · {}", product.name, format_amount(product.price), product.quantity),
                CallbackData::SaleProduct { product_id: product.id },
            )]
        })
        .collect();
    rows.push(back_row(&ctx.lang, CallbackData::Dashboard { company_id }));

    Ok(Screen::new(text, rows))
}

/// Prompt for the draft's current text step. Optional steps get a skip button.
pub fn step_prompt(ctx: &UserCtx, draft: &SaleDraft) -> Screen {
    let (key, skippable) = match draft.step {
        SaleStep::Quantity => ("sale-ask-quantity", false),
        SaleStep::Code => ("sale-ask-code", true),
        SaleStep::Buyer => ("sale-ask-buyer", true),
        SaleStep::Confirm => ("sale-confirm-hint", false),
    };

    let mut rows = Vec::new();
    if skippable {
        rows.push(vec![button(ctx.t("btn-skip"), CallbackData::SkipStep)]);
    }
    rows.push(cancel_row(&ctx.lang));
    Screen::new(ctx.t(key), rows)
}

/// Preview of how the sale will settle under the current fee schedule.
pub fn sale_summary(conn: &Connection, ctx: &UserCtx, draft: &SaleDraft, fees: &FeeSchedule) -> AppResult<Screen> {
    let product = products::get_product(conn, draft.product_id)?;
    let amount = product.price.saturating_mul(draft.quantity);
    let preview = settle(amount, fees, draft.referral_code.is_some(), draft.buyer_id.is_some());

    let none = ctx.t("sale-none");
    let buyer = draft.buyer_id.map(|id| id.to_string()).unwrap_or_else(|| none.clone());
    let text = i18n::t_args(
        &ctx.lang,
        "sale-summary",
        &[
            ("product", escape(&product.name).into()),
            ("quantity", draft.quantity.into()),
            ("amount", format_amount(preview.amount).into()),
            ("code", draft.referral_code.clone().unwrap_or(none).into()),
            ("buyer", buyer.into()),
            ("platform_fee", format_amount(preview.platform_fee).into()),
            ("commission", format_amount(preview.referrer_bonus).into()),
            ("bonus", format_amount(preview.buyer_bonus).into()),
            ("earnings", format_amount(preview.seller_earnings).into()),
        ],
    );

    let rows = vec![
        vec![button(ctx.t("btn-confirm"), CallbackData::ConfirmSale)],
        cancel_row(&ctx.lang),
    ];
    Ok(Screen::new(text, rows))
}

pub fn sale_receipt(ctx: &UserCtx, receipt: &SaleReceipt) -> Screen {
    let s = &receipt.settlement;
    let text = i18n::t_args(
        &ctx.lang,
        "sale-receipt",
        &[
            ("id", receipt.sale_id.into()),
            ("product", escape(&receipt.product_name).into()),
            ("quantity", receipt.quantity.into()),
            ("amount", format_amount(s.amount).into()),
            ("platform_fee", format_amount(s.platform_fee).into()),
            ("commission", format_amount(s.referrer_bonus).into()),
            ("bonus", format_amount(s.buyer_bonus).into()),
            ("earnings", format_amount(s.seller_earnings).into()),
            ("stock", receipt.remaining_stock.into()),
        ],
    );

    let rows = vec![
        vec![button(
            ctx.t("btn-record-sale"),
            CallbackData::StartSale {
                company_id: receipt.company_id,
            },
        )],
        back_row(
            &ctx.lang,
            CallbackData::Dashboard {
                company_id: receipt.company_id,
            },
        ),
    ];
    Screen::new(text, rows)
}
