use std::sync::Arc;

use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::rate_limiter::Action;
use crate::i18n;
use crate::services::{companies, products, referrals, users, withdrawals};
use crate::storage::referral_codes;
use crate::telegram::callback_data::{CallbackData, CompanyDecision};
use crate::telegram::handlers::flows;
use crate::telegram::handlers::{ensure_user, error_text, HandlerDeps, UserCtx, UserInfo};
use crate::telegram::markup::{escape, send_html};
use crate::telegram::notifications;

use super::helpers::{show, Screen, Target};
use super::{admin, browse, main_menu, owner, profile, sale};

/// What a button press produced: an optional toast and an optional screen to
/// put in place of the pressed message.
#[derive(Default)]
struct Response {
    toast: Option<String>,
    screen: Option<Screen>,
}

impl Response {
    fn screen(screen: Screen) -> Self {
        Self {
            toast: None,
            screen: Some(screen),
        }
    }

    fn with_toast(mut self, toast: String) -> Self {
        self.toast = Some(toast);
        self
    }

    /// The handler already replied on its own.
    fn handled() -> Self {
        Self::default()
    }
}

/// Handles callback queries from the inline keyboards.
///
/// Stale or malformed payloads get an alert instead of an error. Domain errors
/// are shown as an alert on the button; the pressed message is left alone.
pub async fn handle_callback(bot: Bot, q: CallbackQuery, deps: HandlerDeps) -> ResponseResult<()> {
    let callback_id = q.id.clone();
    let Some((chat_id, message_id)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        bot.answer_callback_query(callback_id).await?;
        return Ok(());
    };
    let target = Target::Edit(chat_id, message_id);

    let data = match q.data.as_deref().map(CallbackData::parse) {
        Some(Ok(data)) => data,
        Some(Err(e)) => {
            log::warn!("Unparseable callback from {}: {}", chat_id, e);
            let lang = i18n::user_lang_from_pool(&deps.db_pool, chat_id.0);
            bot.answer_callback_query(callback_id)
                .text(i18n::t(&lang, "button-expired"))
                .show_alert(true)
                .await?;
            return Ok(());
        }
        None => {
            bot.answer_callback_query(callback_id).await?;
            return Ok(());
        }
    };

    let ctx = match ensure_user(&deps, &UserInfo::from_user(&q.from)) {
        Ok(ctx) => ctx,
        Err(e) => {
            let lang = i18n::user_lang_from_pool(&deps.db_pool, chat_id.0);
            bot.answer_callback_query(callback_id)
                .text(error_text(&lang, &e))
                .show_alert(true)
                .await?;
            return Ok(());
        }
    };

    log::debug!("Callback {:?} from {}", data, ctx.id());

    match route(&bot, &deps, &ctx, target, data).await {
        Ok(response) => {
            let mut answer = bot.answer_callback_query(callback_id);
            if let Some(toast) = response.toast {
                answer = answer.text(toast);
            }
            answer.await?;
            if let Some(screen) = response.screen {
                show(&bot, target, screen).await?;
            }
        }
        Err(AppError::Telegram(e)) => return Err(e),
        Err(e) => {
            bot.answer_callback_query(callback_id)
                .text(strip_tags(&error_text(&ctx.lang, &e)))
                .show_alert(true)
                .await?;
        }
    }
    Ok(())
}

/// Alerts are plain text; drop the few tags used in messages.
fn strip_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

fn require_admin(ctx: &UserCtx) -> AppResult<()> {
    if ctx.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("admins only"))
    }
}

fn spawned(bot: &Bot, deps: &HandlerDeps) -> (Bot, Arc<crate::storage::db::DbPool>) {
    (bot.clone(), Arc::clone(&deps.db_pool))
}

async fn route(
    bot: &Bot,
    deps: &HandlerDeps,
    ctx: &UserCtx,
    target: Target,
    data: CallbackData,
) -> AppResult<Response> {
    use CallbackData::*;

    let response = match data {
        MainMenu => Response::screen(main_menu::main_menu(ctx)),
        Help => {
            let conn = deps.conn()?;
            let settings = deps.settings.current(&conn)?;
            Response::screen(main_menu::help(ctx, &settings))
        }
        LanguageMenu => Response::screen(main_menu::language_menu(ctx)),
        Language { code } => {
            let conn = deps.conn()?;
            let code = users::set_language(&conn, ctx.id(), &code)?;
            let mut ctx = ctx.clone();
            ctx.user.language = code.to_string();
            ctx.lang = i18n::lang_from_code(code);
            Response::screen(main_menu::main_menu(&ctx)).with_toast(i18n::t_args(
                &ctx.lang,
                "language-changed",
                &[("language", i18n::language_name(code).to_string().into())],
            ))
        }

        Browse { page } => Response::screen(browse::companies_page(&*deps.conn()?, ctx, page)?),
        Company { id } => Response::screen(browse::company_card(&*deps.conn()?, ctx, id)?),
        JoinCompany { id } => {
            let conn = deps.conn()?;
            let key = if companies::join_company(&conn, ctx.id(), id)? {
                "company-joined"
            } else {
                "company-already-member"
            };
            Response::screen(browse::company_card(&conn, ctx, id)?).with_toast(ctx.t(key))
        }
        LeaveCompany { id } => {
            let mut conn = deps.conn()?;
            let key = if companies::leave_company(&mut conn, ctx.id(), id)? {
                "company-left"
            } else {
                "company-not-member"
            };
            Response::screen(browse::company_card(&conn, ctx, id)?).with_toast(ctx.t(key))
        }
        GenerateCode { company_id } => generate_code(bot, deps, ctx, target, company_id).await?,
        Products { company_id } => Response::screen(browse::company_products(&*deps.conn()?, ctx, company_id)?),
        Product { id } => Response::screen(browse::product_card(&*deps.conn()?, ctx, id)?),
        ToggleFavorite { product_id } => {
            let conn = deps.conn()?;
            let key = if users::toggle_favorite(&conn, ctx.id(), product_id)? {
                "favorite-added"
            } else {
                "favorite-removed"
            };
            Response::screen(browse::product_card(&conn, ctx, product_id)?).with_toast(ctx.t(key))
        }
        ToggleCart { product_id } => {
            let conn = deps.conn()?;
            let key = if users::toggle_cart(&conn, ctx.id(), product_id)? {
                "cart-added"
            } else {
                "cart-removed"
            };
            Response::screen(browse::product_card(&conn, ctx, product_id)?).with_toast(ctx.t(key))
        }

        Profile => Response::screen(profile::profile(&*deps.conn()?, ctx)?),
        Favorites => Response::screen(profile::favorites(&*deps.conn()?, ctx)?),
        Cart => Response::screen(profile::cart(&*deps.conn()?, ctx)?),
        ClearCart => {
            let conn = deps.conn()?;
            users::clear_cart(&conn, ctx.id())?;
            Response::screen(profile::cart(&conn, ctx)?).with_toast(ctx.t("cart-cleared"))
        }
        ReferralHistory => Response::screen(profile::referral_history(&*deps.conn()?, ctx)?),
        Withdraw { source } => {
            flows::start_withdraw(bot, deps, ctx, target, source).await?;
            Response::handled()
        }

        MyCompanies => Response::screen(owner::my_companies(&*deps.conn()?, ctx)?),
        RegisterCompany => Response::screen(flows::begin_register_company(deps, ctx)),
        Dashboard { company_id } => Response::screen(owner::dashboard(&*deps.conn()?, ctx, company_id)?),
        AddProduct { company_id } => Response::screen(flows::begin_add_product(deps, ctx, company_id)?),
        ManageProduct { product_id } => Response::screen(owner::manage_product(&*deps.conn()?, ctx, product_id)?),
        EditPrice { product_id } => Response::screen(flows::begin_edit_price(deps, ctx, product_id)?),
        EditQuantity { product_id } => Response::screen(flows::begin_edit_quantity(deps, ctx, product_id)?),
        ToggleProduct { product_id } => {
            let conn = deps.conn()?;
            let status = products::toggle_status(&conn, ctx.id(), product_id)?;
            log::info!("Product {} is now {} ({})", product_id, status, ctx.id());
            Response::screen(owner::manage_product(&conn, ctx, product_id)?)
        }

        StartSale { company_id } => Response::screen(sale::sale_products(&*deps.conn()?, ctx, company_id)?),
        SaleProduct { product_id } => Response::screen(flows::begin_sale(deps, ctx, product_id)?),
        SkipStep => Response::screen(flows::apply_skip(deps, ctx)?),
        ConfirmSale => {
            flows::confirm_sale(bot, deps, ctx, target).await?;
            Response::handled()
        }
        CancelFlow => {
            flows::cancel(bot, deps, ctx, target).await?;
            Response::handled()
        }

        Admin => {
            require_admin(ctx)?;
            Response::screen(admin::panel(&*deps.conn()?, ctx)?)
        }
        AdminCompanies => {
            require_admin(ctx)?;
            Response::screen(admin::pending_companies(&*deps.conn()?, ctx)?)
        }
        AdminCompanyDecision { id, decision } => {
            require_admin(ctx)?;
            let mut conn = deps.conn()?;
            let company = match decision {
                CompanyDecision::Approve => companies::approve(&mut conn, id)?,
                CompanyDecision::Reject => companies::reject(&mut conn, id)?,
                CompanyDecision::Suspend => companies::suspend(&mut conn, id)?,
                CompanyDecision::Reactivate => companies::reactivate(&mut conn, id)?,
            };
            log::info!("Admin {} set company {} to {}", ctx.id(), company.id, company.status);

            let (bot, pool) = spawned(bot, deps);
            let notified = company.clone();
            tokio::spawn(async move {
                notifications::notify_company_decision(&bot, &pool, &notified).await;
            });

            let screen = match decision {
                CompanyDecision::Suspend => browse::company_card(&conn, ctx, id)?,
                _ => admin::pending_companies(&conn, ctx)?,
            };
            Response::screen(screen).with_toast(i18n::t_args(
                &ctx.lang,
                "admin-company-updated",
                &[("name", company.name.clone().into())],
            ))
        }
        AdminWithdrawals => {
            require_admin(ctx)?;
            Response::screen(admin::pending_withdrawals(&*deps.conn()?, ctx)?)
        }
        AdminWithdrawalDecision { id, approve } => {
            require_admin(ctx)?;
            let mut conn = deps.conn()?;
            let withdrawal = if approve {
                withdrawals::approve(&mut conn, id, ctx.id())?
            } else {
                withdrawals::decline(&mut conn, id, ctx.id())?
            };
            metrics::record_withdrawal(withdrawal.kind.as_ref(), withdrawal.status.as_ref());

            let (bot, pool) = spawned(bot, deps);
            let notified = withdrawal.clone();
            tokio::spawn(async move {
                notifications::notify_withdrawal_decision(&bot, &pool, &notified).await;
            });

            Response::screen(admin::pending_withdrawals(&conn, ctx)?).with_toast(i18n::t_args(
                &ctx.lang,
                "admin-withdrawal-updated",
                &[("id", withdrawal.id.into())],
            ))
        }
        AdminStats => {
            require_admin(ctx)?;
            Response::screen(admin::stats(&*deps.conn()?, ctx)?)
        }
    };
    Ok(response)
}

/// Issues (or re-shows) the user's code for a company. Only issuing a fresh
/// code counts against the cooldown.
async fn generate_code(
    bot: &Bot,
    deps: &HandlerDeps,
    ctx: &UserCtx,
    target: Target,
    company_id: i64,
) -> AppResult<Response> {
    let chat_id = target.chat_id();
    let has_code = referral_codes::find_active(&*deps.conn()?, ctx.id(), company_id)?.is_some();
    if !has_code {
        if let Some(text) = flows::cooldown_text(deps, ctx, chat_id, Action::GenerateCode).await {
            return Ok(Response::handled().with_toast(text));
        }
    }

    let generated = {
        let mut conn = deps.conn()?;
        referrals::generate_code(&mut conn, ctx.id(), company_id)?
    };
    if generated.created {
        deps.rate_limiter.update_rate_limit(chat_id, Action::GenerateCode).await;
    }

    let company = companies::get_company(&*deps.conn()?, company_id)?;
    let text = i18n::t_args(
        &ctx.lang,
        "code-generated",
        &[
            ("code", generated.code.clone().into()),
            ("company", escape(&company.name).into()),
        ],
    );
    send_html(bot, chat_id, text, None).await.map_err(AppError::from)?;

    Ok(Response::screen(browse::company_card(&*deps.conn()?, ctx, company_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alerts_lose_markup() {
        assert_eq!(strip_tags("<b>Not enough</b> &lt;funds&gt;"), "Not enough <funds>");
    }
}
