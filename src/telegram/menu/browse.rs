//! Public catalogue: companies, their products and product cards.

use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::core::money::format_amount;
use crate::core::types::CompanyStatus;
use crate::i18n;
use crate::services::{companies, products, users};
use crate::storage::{companies as company_store, referral_codes};
use crate::telegram::callback_data::{CallbackData, CompanyDecision};
use crate::telegram::handlers::UserCtx;
use crate::telegram::markup::{self, escape};

use super::helpers::{back_row, button, pager_row, Screen};

pub fn companies_page(conn: &Connection, ctx: &UserCtx, page: i64) -> AppResult<Screen> {
    let listing = companies::list_active(conn, page)?;

    let text = if listing.items.is_empty() {
        ctx.t("browse-empty")
    } else {
        i18n::t_args(
            &ctx.lang,
            "browse-title",
            &[
                ("page", (listing.page + 1).into()),
                ("pages", listing.total_pages.into()),
            ],
        )
    };

    let mut rows: Vec<_> = listing
        .items
        .iter()
        .map(|company| vec![button(company.name.clone(), CallbackData::Company { id: company.id })])
        .collect();
    let pager = pager_row(&ctx.lang, listing.page, listing.has_prev(), listing.has_next(), |page| {
        CallbackData::Browse { page }
    });
    if !pager.is_empty() {
        rows.push(pager);
    }
    rows.push(back_row(&ctx.lang, CallbackData::MainMenu));

    Ok(Screen::new(text, rows))
}

pub fn company_card(conn: &Connection, ctx: &UserCtx, company_id: i64) -> AppResult<Screen> {
    let company = companies::get_company(conn, company_id)?;
    let is_owner = company.owner_id == ctx.id();
    if company.status != CompanyStatus::Active && !is_owner && !ctx.is_admin {
        return Err(AppError::Forbidden("company is not active"));
    }

    let is_member = companies::is_member(conn, ctx.id(), company_id)?;
    let members = company_store::member_count(conn, company_id)?;
    let active_code = referral_codes::find_active(conn, ctx.id(), company_id)?;

    let mut text = i18n::t_args(
        &ctx.lang,
        "company-card",
        &[
            ("name", escape(&company.name).into()),
            ("description", escape(&company.description).into()),
            ("status", markup::company_status(&ctx.lang, company.status).into()),
            ("members", members.into()),
        ],
    );
    if let Some(code) = &active_code {
        text.push_str("\n\n");
        text.push_str(&i18n::t_args(&ctx.lang, "company-your-code", &[("code", code.code.clone().into())]));
    }

    let mut rows = vec![vec![button(ctx.t("btn-products"), CallbackData::Products { company_id })]];
    if company.status == CompanyStatus::Active && !is_owner {
        if is_member {
            let label = if active_code.is_some() {
                "btn-show-code"
            } else {
                "btn-generate-code"
            };
            rows.push(vec![
                button(ctx.t(label), CallbackData::GenerateCode { company_id }),
                button(ctx.t("btn-leave"), CallbackData::LeaveCompany { id: company_id }),
            ]);
        } else {
            rows.push(vec![button(ctx.t("btn-join"), CallbackData::JoinCompany { id: company_id })]);
        }
    }
    if is_owner {
        rows.push(vec![button(ctx.t("btn-dashboard"), CallbackData::Dashboard { company_id })]);
    }
    if ctx.is_admin {
        let decision = match company.status {
            CompanyStatus::Active => Some((CompanyDecision::Suspend, "btn-suspend")),
            CompanyStatus::Suspended => Some((CompanyDecision::Reactivate, "btn-reactivate")),
            _ => None,
        };
        if let Some((decision, label)) = decision {
            rows.push(vec![button(
                ctx.t(label),
                CallbackData::AdminCompanyDecision { id: company_id, decision },
            )]);
        }
    }
    rows.push(back_row(&ctx.lang, CallbackData::Browse { page: 0 }));

    Ok(Screen::new(text, rows))
}

pub fn company_products(conn: &Connection, ctx: &UserCtx, company_id: i64) -> AppResult<Screen> {
    let company = companies::get_company(conn, company_id)?;
    let items = products::list_for_company(conn, company_id, ctx.id())?;

    let text = if items.is_empty() {
        ctx.t("products-empty")
    } else {
        i18n::t_args(&ctx.lang, "products-title", &[("company", escape(&company.name).into())])
    };

    let mut rows: Vec<_> = items
        .iter()
        .map(|product| {
            vec![button(
                format!("{} · {}", product.name, format_amount(product.price)),
                CallbackData::Product { id: product.id },
            )]
        })
        .collect();
    rows.push(back_row(&ctx.lang, CallbackData::Company { id: company_id }));

    Ok(Screen::new(text, rows))
}

pub fn product_card(conn: &Connection, ctx: &UserCtx, product_id: i64) -> AppResult<Screen> {
    let product = products::get_product(conn, product_id)?;
    let company = companies::get_company(conn, product.company_id)?;
    if company.owner_id != ctx.id() && company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }

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

    let favorite = users::is_favorite(conn, ctx.id(), product_id)?;
    let in_cart = users::in_cart(conn, ctx.id(), product_id)?;
    let rows = vec![
        vec![
            button(
                ctx.t(if favorite { "btn-unfavorite" } else { "btn-favorite" }),
                CallbackData::ToggleFavorite { product_id },
            ),
            button(
                ctx.t(if in_cart { "btn-remove-from-cart" } else { "btn-add-to-cart" }),
                CallbackData::ToggleCart { product_id },
            ),
        ],
        back_row(
            &ctx.lang,
            CallbackData::Products {
                company_id: product.company_id,
            },
        ),
    ];

    Ok(Screen::new(text, rows))
}
