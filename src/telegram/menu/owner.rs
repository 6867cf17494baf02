//! Screens for company owners: their companies, dashboards and product management.

use rusqlite::Connection;

use crate::core::error::AppResult;
use crate::core::money::format_amount;
use crate::core::types::{CompanyStatus, ProductStatus};
use crate::i18n;
use crate::services::{companies, products};
use crate::telegram::callback_data::{CallbackData, WithdrawSource};
use crate::telegram::handlers::UserCtx;
use crate::telegram::markup::{self, escape};

use super::helpers::{back_row, button, Screen};

pub fn my_companies(conn: &Connection, ctx: &UserCtx) -> AppResult<Screen> {
    let owned = companies::list_owned(conn, ctx.id())?;
    let text = if owned.is_empty() {
        ctx.t("my-companies-empty")
    } else {
        ctx.t("my-companies-title")
    };

    let mut rows: Vec<_> = owned
        .iter()
        .map(|company| {
            vec![button(
                format!("{} {}", company.status.emoji(), company.name),
                CallbackData::Dashboard { company_id: company.id },
            )]
        })
        .collect();
    rows.push(vec![button(ctx.t("btn-register-company"), CallbackData::RegisterCompany)]);
    rows.push(back_row(&ctx.lang, CallbackData::MainMenu));

    Ok(Screen::new(text, rows))
}

pub fn dashboard(conn: &Connection, ctx: &UserCtx, company_id: i64) -> AppResult<Screen> {
    let board = companies::company_dashboard(conn, ctx.id(), company_id)?;
    let company = &board.company;

    let mut text = i18n::t_args(
        &ctx.lang,
        "dashboard-text",
        &[
            ("name", escape(&company.name).into()),
            ("status", markup::company_status(&ctx.lang, company.status).into()),
            ("balance", format_amount(company.billing_balance).into()),
            ("products", board.product_count.into()),
            ("members", board.member_count.into()),
            ("sales", board.summary.count.into()),
            ("volume", format_amount(board.summary.volume).into()),
            ("earnings", format_amount(board.summary.seller_earnings).into()),
            ("referred", board.summary.referred_count.into()),
        ],
    );
    if !board.recent_sales.is_empty() {
        text.push_str("\n\n");
        text.push_str(&ctx.t("dashboard-recent"));
        for sale in &board.recent_sales {
            let code = sale
                .referral_code
                .as_deref()
                .map(|c| format!(" · <code>{}</code>", c))
                .unwrap_or_default();
            text.push_str(&format!(
                "\n• {} × {} · {}{}",
                escape(&sale.product_name),
                sale.quantity,
                format_amount(sale.settlement.amount),
                code
            ));
        }
    }

    let mut rows = Vec::new();
    for product in products::list_for_company(conn, company_id, ctx.id())? {
        rows.push(vec![button(
            format!("📦 {} · {} · {}", product.name, format_amount(product.price), product.quantity),
            CallbackData::ManageProduct { product_id: product.id },
        )]);
    }
    if company.status.accepts_products() {
        rows.push(vec![button(ctx.t("btn-add-product"), CallbackData::AddProduct { company_id })]);
    }
    if company.status == CompanyStatus::Active {
        rows.push(vec![button(ctx.t("btn-record-sale"), CallbackData::StartSale { company_id })]);
    }
    rows.push(vec![button(
        ctx.t("btn-payout"),
        CallbackData::Withdraw {
            source: WithdrawSource::Company(company_id),
        },
    )]);
    rows.push(back_row(&ctx.lang, CallbackData::MyCompanies));

    Ok(Screen::new(text, rows))
}

pub fn manage_product(conn: &Connection, ctx: &UserCtx, product_id: i64) -> AppResult<Screen> {
    let product = products::get_product(conn, product_id)?;
    let company = companies::require_owner(conn, product.company_id, ctx.id())?;

    let text = i18n::t_args(
        &ctx.lang,
        "product-card",
        &[
            ("name", escape(&product.name).into()),
            ("company", escape(&company.name).into()),
            ("description", escape(&product.description).into()),
            ("price", format_amount(product.price).into()),
            ("quantity", product.quantity.into()),
            ("status", markup::product_status(&ctx.lang, product.status).into()),
        ],
    );

    let toggle = if product.status == ProductStatus::Inactive {
        "btn-show-product"
    } else {
        "btn-hide-product"
    };
    let rows = vec![
        vec![
            button(ctx.t("btn-edit-price"), CallbackData::EditPrice { product_id }),
            button(ctx.t("btn-edit-quantity"), CallbackData::EditQuantity { product_id }),
        ],
        vec![button(ctx.t(toggle), CallbackData::ToggleProduct { product_id })],
        back_row(&ctx.lang, CallbackData::Dashboard { company_id: company.id }),
    ];

    Ok(Screen::new(text, rows))
}
