//! Multi-step text flows: company registration, product editing, the sale
//! wizard and withdrawals.
//!
//! The synchronous `apply_*` functions hold the flow logic and touch only the
//! database and the session store, so they can be driven from tests. The async
//! wrappers render their outcome and fire notifications.

use std::sync::Arc;

use rusqlite::Connection;
use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::money::format_amount;
use crate::core::rate_limiter::Action;
use crate::core::types::{CompanyStatus, ProductStatus};
use crate::core::validation::{
    normalize_referral_code, validate_amount, validate_description, validate_name, validate_price, validate_quantity,
    validate_telegram_id,
};
use crate::i18n;
use crate::services::sales::{self, SaleReceipt, SaleRequest};
use crate::services::{companies, products, users, withdrawals};
use crate::storage::companies::Company;
use crate::storage::withdrawals::Withdrawal;
use crate::telegram::callback_data::{CallbackData, WithdrawSource};
use crate::telegram::markup::{escape, send_html};
use crate::telegram::menu::helpers::{back_row, cancel_row, show, Screen, Target};
use crate::telegram::menu::{main_menu, owner, sale};
use crate::telegram::notifications;
use crate::telegram::session::{AddProductStep, Flow, RegisterCompanyStep, SaleDraft, SaleStep};

use super::types::{error_text, HandlerDeps, UserCtx};

/// What a step of a flow produced.
#[derive(Debug)]
pub enum Outcome {
    /// The flow goes on; show the next prompt.
    Prompt(Screen),
    /// The flow is over.
    Finished(Screen, Option<Followup>),
}

/// Side effects to run after a flow finished.
#[derive(Debug, Clone)]
pub enum Followup {
    CompanyRegistered(Company),
    WithdrawalRequested(Withdrawal),
}

fn prompt(ctx: &UserCtx, key: &str) -> Screen {
    Screen::new(ctx.t(key), vec![cancel_row(&ctx.lang)])
}

// ---------------------------------------------------------------------------
// Starting flows
// ---------------------------------------------------------------------------

pub fn begin_register_company(deps: &HandlerDeps, ctx: &UserCtx) -> Screen {
    deps.sessions.start(ctx.id(), Flow::RegisterCompany(RegisterCompanyStep::Name));
    prompt(ctx, "register-ask-name")
}

pub fn begin_add_product(deps: &HandlerDeps, ctx: &UserCtx, company_id: i64) -> AppResult<Screen> {
    let conn = deps.conn()?;
    let company = companies::require_owner(&conn, company_id, ctx.id())?;
    if !company.status.accepts_products() {
        return Err(AppError::Forbidden("company cannot list products"));
    }
    deps.sessions.start(
        ctx.id(),
        Flow::AddProduct {
            company_id,
            step: AddProductStep::Name,
        },
    );
    Ok(prompt(ctx, "product-ask-name"))
}

pub fn begin_edit_price(deps: &HandlerDeps, ctx: &UserCtx, product_id: i64) -> AppResult<Screen> {
    let conn = deps.conn()?;
    let product = products::get_product(&conn, product_id)?;
    companies::require_owner(&conn, product.company_id, ctx.id())?;
    deps.sessions.start(ctx.id(), Flow::EditPrice { product_id });
    Ok(Screen::new(
        i18n::t_args(&ctx.lang, "product-ask-new-price", &[("price", format_amount(product.price).into())]),
        vec![cancel_row(&ctx.lang)],
    ))
}

pub fn begin_edit_quantity(deps: &HandlerDeps, ctx: &UserCtx, product_id: i64) -> AppResult<Screen> {
    let conn = deps.conn()?;
    let product = products::get_product(&conn, product_id)?;
    companies::require_owner(&conn, product.company_id, ctx.id())?;
    deps.sessions.start(ctx.id(), Flow::EditQuantity { product_id });
    Ok(Screen::new(
        i18n::t_args(&ctx.lang, "product-ask-new-quantity", &[("quantity", product.quantity.into())]),
        vec![cancel_row(&ctx.lang)],
    ))
}

/// Opens the sale wizard for one product of an active company.
pub fn begin_sale(deps: &HandlerDeps, ctx: &UserCtx, product_id: i64) -> AppResult<Screen> {
    let conn = deps.conn()?;
    let product = products::get_product(&conn, product_id)?;
    let company = companies::require_owner(&conn, product.company_id, ctx.id())?;
    if company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }
    if product.status != ProductStatus::Active {
        return Err(AppError::OutOfStock {
            available: product.quantity,
        });
    }

    let draft = SaleDraft::new(company.id, product.id);
    let screen = sale::step_prompt(ctx, &draft);
    deps.sessions.start(ctx.id(), Flow::RecordSale(draft));
    Ok(screen)
}

pub fn begin_withdraw(deps: &HandlerDeps, ctx: &UserCtx, source: WithdrawSource) -> AppResult<Screen> {
    let conn = deps.conn()?;
    let settings = deps.settings.current(&conn)?;

    let (balance, minimum, company_id) = match source {
        WithdrawSource::Referral => (ctx.user.referral_balance, settings.min_withdrawal, None),
        WithdrawSource::Company(company_id) => {
            let company = companies::require_owner(&conn, company_id, ctx.id())?;
            (company.billing_balance, settings.min_payout, Some(company_id))
        }
    };
    if balance < minimum {
        return Err(AppError::BelowMinimum { minimum });
    }

    deps.sessions.start(ctx.id(), Flow::Withdraw { company_id });
    Ok(Screen::new(
        i18n::t_args(
            &ctx.lang,
            "withdraw-ask-amount",
            &[
                ("balance", format_amount(balance).into()),
                ("minimum", format_amount(minimum).into()),
            ],
        ),
        vec![cancel_row(&ctx.lang)],
    ))
}

// ---------------------------------------------------------------------------
// Text input
// ---------------------------------------------------------------------------

/// Feeds one line of text into the user's flow.
///
/// On error the session is left as it was so the user can try again.
pub fn apply_input(deps: &HandlerDeps, ctx: &UserCtx, flow: Flow, text: &str) -> AppResult<Outcome> {
    let user_id = ctx.id();
    match flow {
        Flow::RegisterCompany(RegisterCompanyStep::Name) => {
            let name = validate_name(text)?;
            deps.sessions
                .advance(user_id, Flow::RegisterCompany(RegisterCompanyStep::Description { name }));
            Ok(Outcome::Prompt(prompt(ctx, "register-ask-description")))
        }
        Flow::RegisterCompany(RegisterCompanyStep::Description { name }) => {
            let description = validate_description(text)?;
            let conn = deps.conn()?;
            let company = companies::register_company(&conn, user_id, &name, &description)?;
            deps.sessions.clear(user_id);

            let screen = Screen::new(
                i18n::t_args(&ctx.lang, "register-done", &[("name", escape(&company.name).into())]),
                vec![back_row(&ctx.lang, CallbackData::MyCompanies)],
            );
            Ok(Outcome::Finished(screen, Some(Followup::CompanyRegistered(company))))
        }
        Flow::AddProduct { company_id, step } => {
            let next = match step {
                AddProductStep::Name => AddProductStep::Price {
                    name: validate_name(text)?,
                },
                AddProductStep::Price { name } => AddProductStep::Quantity {
                    name,
                    price: validate_price(text)?,
                },
                AddProductStep::Quantity { name, price } => {
                    let quantity = validate_quantity(text)?;
                    let conn = deps.conn()?;
                    let product = products::add_product(&conn, user_id, company_id, &name, "", price, quantity)?;
                    deps.sessions.clear(user_id);
                    let screen = owner::manage_product(&conn, ctx, product.id)?;
                    return Ok(Outcome::Finished(screen, None));
                }
            };
            let key = match next {
                AddProductStep::Price { .. } => "product-ask-price",
                _ => "product-ask-quantity",
            };
            deps.sessions.advance(user_id, Flow::AddProduct { company_id, step: next });
            Ok(Outcome::Prompt(prompt(ctx, key)))
        }
        Flow::EditPrice { product_id } => {
            let price = validate_price(text)?;
            let conn = deps.conn()?;
            products::update_price(&conn, user_id, product_id, price)?;
            deps.sessions.clear(user_id);
            Ok(Outcome::Finished(owner::manage_product(&conn, ctx, product_id)?, None))
        }
        Flow::EditQuantity { product_id } => {
            let quantity = validate_quantity(text)?;
            let conn = deps.conn()?;
            products::update_quantity(&conn, user_id, product_id, quantity)?;
            deps.sessions.clear(user_id);
            Ok(Outcome::Finished(owner::manage_product(&conn, ctx, product_id)?, None))
        }
        Flow::RecordSale(draft) => sale_input(deps, ctx, draft, text),
        Flow::Withdraw { company_id } => {
            let amount = validate_amount(text)?;
            let mut conn = deps.conn()?;
            let withdrawal = match company_id {
                Some(company_id) => withdrawals::request_company_payout(&mut conn, user_id, company_id, amount)?,
                None => withdrawals::request_referral_withdrawal(&mut conn, user_id, amount)?,
            };
            deps.sessions.clear(user_id);

            let back = match company_id {
                Some(company_id) => CallbackData::Dashboard { company_id },
                None => CallbackData::Profile,
            };
            let screen = Screen::new(
                i18n::t_args(
                    &ctx.lang,
                    "withdraw-requested",
                    &[
                        ("id", withdrawal.id.into()),
                        ("amount", format_amount(withdrawal.amount).into()),
                    ],
                ),
                vec![back_row(&ctx.lang, back)],
            );
            Ok(Outcome::Finished(screen, Some(Followup::WithdrawalRequested(withdrawal))))
        }
    }
}

fn sale_input(deps: &HandlerDeps, ctx: &UserCtx, mut draft: SaleDraft, text: &str) -> AppResult<Outcome> {
    let conn = deps.conn()?;
    match draft.step {
        SaleStep::Quantity => {
            let quantity = validate_quantity(text)?;
            if quantity == 0 {
                return Err(AppError::Validation("quantity must be positive".into()));
            }
            let product = products::get_product(&conn, draft.product_id)?;
            if quantity > product.quantity {
                return Err(AppError::OutOfStock {
                    available: product.quantity,
                });
            }
            draft.quantity = quantity;
            draft.step = SaleStep::Code;
        }
        SaleStep::Code => {
            draft.referral_code = Some(normalize_referral_code(text)?);
            draft.step = SaleStep::Buyer;
        }
        SaleStep::Buyer => {
            let buyer_id = validate_telegram_id(text)?;
            if buyer_id == ctx.id() {
                return Err(AppError::Forbidden("seller cannot be the buyer"));
            }
            users::get_user(&conn, buyer_id)?;
            draft.buyer_id = Some(buyer_id);
            draft.step = SaleStep::Confirm;
        }
        SaleStep::Confirm => {}
    }

    let screen = sale_screen(&conn, deps, ctx, &draft)?;
    deps.sessions.advance(ctx.id(), Flow::RecordSale(draft));
    Ok(Outcome::Prompt(screen))
}

/// The prompt for the draft's step, or the summary once it is complete.
fn sale_screen(conn: &Connection, deps: &HandlerDeps, ctx: &UserCtx, draft: &SaleDraft) -> AppResult<Screen> {
    if draft.step != SaleStep::Confirm {
        return Ok(sale::step_prompt(ctx, draft));
    }
    let settings = deps.settings.current(conn)?;
    sale::sale_summary(conn, ctx, draft, &settings.fees)
}

/// Skips the optional referral code or buyer step of the sale wizard.
pub fn apply_skip(deps: &HandlerDeps, ctx: &UserCtx) -> AppResult<Screen> {
    let Some(Flow::RecordSale(mut draft)) = deps.sessions.get(ctx.id()) else {
        return Err(AppError::NotFound("sale in progress"));
    };
    draft.step = match draft.step {
        SaleStep::Code => SaleStep::Buyer,
        SaleStep::Buyer => SaleStep::Confirm,
        _ => return Err(AppError::Validation("this step cannot be skipped".into())),
    };
    let conn = deps.conn()?;
    let screen = sale_screen(&conn, deps, ctx, &draft)?;
    deps.sessions.advance(ctx.id(), Flow::RecordSale(draft));
    Ok(screen)
}

/// Settles the confirmed draft. The session is consumed even when the sale
/// fails, so a second press cannot replay it.
pub fn apply_confirm(deps: &HandlerDeps, ctx: &UserCtx) -> AppResult<SaleReceipt> {
    let draft = match deps.sessions.take(ctx.id()) {
        Some(Flow::RecordSale(draft)) if draft.step == SaleStep::Confirm => draft,
        Some(other) => {
            deps.sessions.start(ctx.id(), other);
            return Err(AppError::NotFound("sale in progress"));
        }
        None => return Err(AppError::NotFound("sale in progress")),
    };

    let request = SaleRequest {
        sale_key: draft.sale_key,
        company_id: draft.company_id,
        product_id: draft.product_id,
        seller_id: ctx.id(),
        quantity: draft.quantity,
        referral_code: draft.referral_code,
        buyer_id: draft.buyer_id,
    };
    let mut conn = deps.conn()?;
    let receipt = sales::process_sale(&mut conn, &request)?;
    metrics::record_sale(&receipt.settlement);
    Ok(receipt)
}

// ---------------------------------------------------------------------------
// Async wrappers
// ---------------------------------------------------------------------------

/// Shows `result` at `target`, or the localized error as a new message.
pub async fn render(bot: &Bot, ctx: &UserCtx, target: Target, result: AppResult<Screen>) -> ResponseResult<()> {
    match result {
        Ok(screen) => show(bot, target, screen).await,
        Err(e) => send_html(bot, target.chat_id(), error_text(&ctx.lang, &e), None).await.map(|_| ()),
    }
}

/// Routes a text message into the active flow. Returns `false` when the user
/// has no flow running.
pub async fn handle_text(
    bot: &Bot,
    deps: &HandlerDeps,
    ctx: &UserCtx,
    chat_id: ChatId,
    text: &str,
) -> ResponseResult<bool> {
    let Some(flow) = deps.sessions.get(ctx.id()) else {
        return Ok(false);
    };

    match apply_input(deps, ctx, flow, text) {
        Ok(Outcome::Prompt(screen)) => show(bot, Target::New(chat_id), screen).await?,
        Ok(Outcome::Finished(screen, followup)) => {
            show(bot, Target::New(chat_id), screen).await?;
            if let Some(followup) = followup {
                run_followup(bot, deps, ctx, chat_id, followup).await;
            }
        }
        Err(e) => {
            send_html(bot, chat_id, error_text(&ctx.lang, &e), None).await?;
        }
    }
    Ok(true)
}

async fn run_followup(bot: &Bot, deps: &HandlerDeps, ctx: &UserCtx, chat_id: ChatId, followup: Followup) {
    match followup {
        Followup::CompanyRegistered(company) => {
            let bot = bot.clone();
            let pool = Arc::clone(&deps.db_pool);
            let owner = ctx.user.display_name();
            tokio::spawn(async move {
                notifications::notify_admins_new_company(&bot, &pool, &company, &owner).await;
            });
        }
        Followup::WithdrawalRequested(withdrawal) => {
            deps.rate_limiter.update_rate_limit(chat_id, Action::Withdraw).await;
            metrics::record_withdrawal(withdrawal.kind.as_ref(), "requested");
            let bot = bot.clone();
            let pool = Arc::clone(&deps.db_pool);
            tokio::spawn(async move {
                notifications::notify_admins_new_withdrawal(&bot, &pool, &withdrawal).await;
            });
        }
    }
}

/// Seconds left on a cooldown, as a localized message, or `None` when allowed.
pub async fn cooldown_text(deps: &HandlerDeps, ctx: &UserCtx, chat_id: ChatId, action: Action) -> Option<String> {
    if !deps.rate_limiter.is_rate_limited(chat_id, action).await {
        return None;
    }
    let seconds = deps
        .rate_limiter
        .get_remaining_time(chat_id, action)
        .await
        .map(|d| d.as_secs().max(1))
        .unwrap_or(1);
    Some(i18n::t_args(
        &ctx.lang,
        "rate-limited",
        &[("seconds", i64::try_from(seconds).unwrap_or(i64::MAX).into())],
    ))
}

pub async fn start_withdraw(
    bot: &Bot,
    deps: &HandlerDeps,
    ctx: &UserCtx,
    target: Target,
    source: WithdrawSource,
) -> ResponseResult<()> {
    if let Some(text) = cooldown_text(deps, ctx, target.chat_id(), Action::Withdraw).await {
        return send_html(bot, target.chat_id(), text, None).await.map(|_| ());
    }
    render(bot, ctx, target, begin_withdraw(deps, ctx, source)).await
}

/// Settles the sale and shows the receipt; referrer and buyer are told out of band.
pub async fn confirm_sale(bot: &Bot, deps: &HandlerDeps, ctx: &UserCtx, target: Target) -> ResponseResult<()> {
    let chat_id = target.chat_id();
    if let Some(text) = cooldown_text(deps, ctx, chat_id, Action::RecordSale).await {
        return send_html(bot, chat_id, text, None).await.map(|_| ());
    }

    match apply_confirm(deps, ctx) {
        Ok(receipt) => {
            deps.rate_limiter.update_rate_limit(chat_id, Action::RecordSale).await;
            show(bot, target, sale::sale_receipt(ctx, &receipt)).await?;

            let bot = bot.clone();
            let pool = Arc::clone(&deps.db_pool);
            tokio::spawn(async move {
                notifications::notify_sale(&bot, &pool, &receipt).await;
            });
            Ok(())
        }
        Err(e) => send_html(bot, chat_id, error_text(&ctx.lang, &e), None).await.map(|_| ()),
    }
}

pub async fn cancel(bot: &Bot, deps: &HandlerDeps, ctx: &UserCtx, target: Target) -> ResponseResult<()> {
    let key = if deps.sessions.clear(ctx.id()) {
        "flow-cancelled"
    } else {
        "flow-nothing-to-cancel"
    };
    send_html(bot, target.chat_id(), ctx.t(key), None).await?;
    show(bot, Target::New(target.chat_id()), main_menu::main_menu(ctx)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_limiter::RateLimiter;
    use crate::services::SettingsService;
    use crate::storage::db::create_pool;
    use crate::storage::users::UserRecord;
    use crate::telegram::session::SessionStore;

    fn deps() -> (tempfile::TempDir, HandlerDeps) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flows.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let deps = HandlerDeps::new(
            Arc::new(pool),
            Arc::new(SessionStore::default()),
            Arc::new(RateLimiter::new()),
            Arc::new(SettingsService::new()),
        );
        (dir, deps)
    }

    fn ctx(deps: &HandlerDeps, id: i64) -> UserCtx {
        let conn = deps.conn().unwrap();
        let user: UserRecord = users::register_user(&conn, id, None, Some("Owner"), Some("en")).unwrap();
        UserCtx {
            user,
            lang: i18n::lang_from_code("en"),
            is_admin: false,
        }
    }

    #[test]
    fn registration_walks_name_then_description() {
        let (_dir, deps) = deps();
        let owner = ctx(&deps, 1);

        begin_register_company(&deps, &owner);
        let flow = deps.sessions.get(1).unwrap();
        assert!(matches!(apply_input(&deps, &owner, flow, "Bean There").unwrap(), Outcome::Prompt(_)));

        let flow = deps.sessions.get(1).unwrap();
        let outcome = apply_input(&deps, &owner, flow, "Coffee by the river").unwrap();
        match outcome {
            Outcome::Finished(_, Some(Followup::CompanyRegistered(company))) => {
                assert_eq!(company.name, "Bean There");
                assert_eq!(company.status, CompanyStatus::Pending);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(deps.sessions.get(1).is_none());
    }

    #[test]
    fn invalid_input_keeps_the_step() {
        let (_dir, deps) = deps();
        let owner = ctx(&deps, 1);

        begin_register_company(&deps, &owner);
        let flow = deps.sessions.get(1).unwrap();
        assert!(apply_input(&deps, &owner, flow.clone(), "x").is_err());
        assert_eq!(deps.sessions.get(1), Some(flow));
    }

    #[test]
    fn skip_is_only_allowed_on_optional_steps() {
        let (_dir, deps) = deps();
        let owner = ctx(&deps, 1);

        deps.sessions.start(1, Flow::RecordSale(SaleDraft::new(1, 1)));
        assert!(apply_skip(&deps, &owner).is_err());

        let mut draft = SaleDraft::new(1, 1);
        draft.step = SaleStep::Code;
        deps.sessions.start(1, Flow::RecordSale(draft));
        apply_skip(&deps, &owner).unwrap();
        match deps.sessions.get(1) {
            Some(Flow::RecordSale(draft)) => assert_eq!(draft.step, SaleStep::Buyer),
            other => panic!("unexpected flow: {:?}", other),
        }
    }

    #[test]
    fn confirm_without_a_sale_is_rejected() {
        let (_dir, deps) = deps();
        let owner = ctx(&deps, 1);
        deps.sessions.start(1, Flow::Withdraw { company_id: None });

        assert!(matches!(apply_confirm(&deps, &owner), Err(AppError::NotFound(_))));
        // unrelated flows survive
        assert_eq!(deps.sessions.get(1), Some(Flow::Withdraw { company_id: None }));
    }

    #[test]
    fn withdraw_needs_the_minimum_balance() {
        let (_dir, deps) = deps();
        let user = ctx(&deps, 3);
        let err = begin_withdraw(&deps, &user, WithdrawSource::Referral).unwrap_err();
        assert!(matches!(err, AppError::BelowMinimum { .. }));
        assert!(deps.sessions.get(3).is_none());
    }
}
