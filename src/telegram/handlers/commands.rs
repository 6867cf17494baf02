//! Command handler implementations

use teloxide::prelude::*;
use teloxide::types::Message;

use super::flows;
use super::types::{ensure_user, error_text, HandlerDeps, HandlerError, UserCtx, UserInfo};
use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::metrics;
use crate::core::money::format_amount;
use crate::core::validation::{validate_amount, validate_telegram_id};
use crate::i18n;
use crate::services::settings::FeeKind;
use crate::services::users;
use crate::storage::settings::MarketSettings;
use crate::telegram::bot::Command;
use crate::telegram::callback_data::WithdrawSource;
use crate::telegram::markup::send_html;
use crate::telegram::menu::{admin, browse, main_menu, owner, profile, show, Target};

/// Which minimum `/set_min` changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinimumKind {
    Withdrawal,
    Payout,
}

fn usage(text: &str) -> AppError {
    AppError::Validation(format!("usage: {}", text))
}

/// Parses `/set_fee <platform|referral|discount> <percent>`.
pub fn parse_fee_args(args: &str) -> AppResult<(FeeKind, f64)> {
    const USAGE: &str = "/set_fee <platform|referral|discount> <percent>";
    let mut parts = args.split_whitespace();
    let kind = match parts.next().map(str::to_lowercase).as_deref() {
        Some("platform") => FeeKind::Platform,
        Some("referral") | Some("commission") => FeeKind::Referral,
        Some("discount") | Some("buyer") => FeeKind::Discount,
        _ => return Err(usage(USAGE)),
    };
    let percent = parts
        .next()
        .and_then(|p| p.trim_end_matches('%').replace(',', ".").parse::<f64>().ok())
        .ok_or_else(|| usage(USAGE))?;
    if parts.next().is_some() {
        return Err(usage(USAGE));
    }
    Ok((kind, percent))
}

/// Parses `/set_min <withdrawal|payout> <amount>` into cents.
pub fn parse_min_args(args: &str) -> AppResult<(MinimumKind, i64)> {
    const USAGE: &str = "/set_min <withdrawal|payout> <amount>";
    let mut parts = args.split_whitespace();
    let kind = match parts.next().map(str::to_lowercase).as_deref() {
        Some("withdrawal") => MinimumKind::Withdrawal,
        Some("payout") => MinimumKind::Payout,
        _ => return Err(usage(USAGE)),
    };
    let amount = parts.next().ok_or_else(|| usage(USAGE))?;
    if parts.next().is_some() {
        return Err(usage(USAGE));
    }
    Ok((kind, validate_amount(amount)?))
}

fn fees_text(ctx: &UserCtx, settings: &MarketSettings) -> String {
    i18n::t_args(
        &ctx.lang,
        "admin-fees-updated",
        &[
            ("platform", settings.fees.platform_fee_percent.to_string().into()),
            ("commission", settings.fees.referral_commission_percent.to_string().into()),
            ("discount", settings.fees.buyer_discount_percent.to_string().into()),
        ],
    )
}

fn minimums_text(ctx: &UserCtx, settings: &MarketSettings) -> String {
    i18n::t_args(
        &ctx.lang,
        "admin-minimums-updated",
        &[
            ("min_withdrawal", format_amount(settings.min_withdrawal).into()),
            ("min_payout", format_amount(settings.min_payout).into()),
        ],
    )
}

/// Bans or unbans a user. Banning also drops their flow and cooldowns.
async fn set_ban(deps: &HandlerDeps, ctx: &UserCtx, arg: &str, banned: bool) -> AppResult<String> {
    let target = validate_telegram_id(arg)?;
    if banned && config::admin::is_admin(target) {
        return Err(AppError::Forbidden("admins cannot be banned"));
    }
    users::set_banned(&*deps.conn()?, target, banned)?;
    if banned {
        deps.sessions.clear(target);
        deps.rate_limiter.remove_rate_limit(ChatId(target)).await;
    }
    log::info!("Admin {} set banned={} for {}", ctx.id(), banned, target);

    let key = if banned { "admin-banned" } else { "admin-unbanned" };
    Ok(i18n::t_args(&ctx.lang, key, &[("id", target.into())]))
}

async fn run(bot: &Bot, deps: &HandlerDeps, ctx: &UserCtx, chat_id: ChatId, cmd: Command) -> AppResult<()> {
    if cmd.is_admin_only() && !ctx.is_admin {
        return Err(AppError::Forbidden("admins only"));
    }

    let target = Target::New(chat_id);
    let screen = match cmd {
        Command::Start => main_menu::main_menu(ctx),
        Command::Help => {
            let settings = deps.settings.current(&*deps.conn()?)?;
            main_menu::help(ctx, &settings)
        }
        Command::Browse => browse::companies_page(&*deps.conn()?, ctx, 0)?,
        Command::Profile => profile::profile(&*deps.conn()?, ctx)?,
        Command::Favorites => profile::favorites(&*deps.conn()?, ctx)?,
        Command::Cart => profile::cart(&*deps.conn()?, ctx)?,
        Command::MyCompanies => owner::my_companies(&*deps.conn()?, ctx)?,
        Command::RegisterCompany => flows::begin_register_company(deps, ctx),
        Command::Language => main_menu::language_menu(ctx),
        Command::Admin => admin::panel(&*deps.conn()?, ctx)?,
        Command::Withdraw => {
            flows::start_withdraw(bot, deps, ctx, target, WithdrawSource::Referral).await?;
            return Ok(());
        }
        Command::Cancel => {
            flows::cancel(bot, deps, ctx, target).await?;
            return Ok(());
        }
        Command::Stats => {
            let text = admin::stats_text(&*deps.conn()?, ctx)?;
            send_html(bot, chat_id, text, None).await?;
            return Ok(());
        }
        Command::Ban(arg) => {
            let text = set_ban(deps, ctx, &arg, true).await?;
            send_html(bot, chat_id, text, None).await?;
            return Ok(());
        }
        Command::Unban(arg) => {
            let text = set_ban(deps, ctx, &arg, false).await?;
            send_html(bot, chat_id, text, None).await?;
            return Ok(());
        }
        Command::SetFee(args) => {
            let (kind, percent) = parse_fee_args(&args)?;
            let settings = deps.settings.set_fee_percent(&*deps.conn()?, kind, percent)?;
            log::info!("Admin {} set {:?} fee to {}%", ctx.id(), kind, percent);
            send_html(bot, chat_id, fees_text(ctx, &settings), None).await?;
            return Ok(());
        }
        Command::SetMin(args) => {
            let (kind, cents) = parse_min_args(&args)?;
            let conn = deps.conn()?;
            let settings = match kind {
                MinimumKind::Withdrawal => deps.settings.set_min_withdrawal(&conn, cents)?,
                MinimumKind::Payout => deps.settings.set_min_payout(&conn, cents)?,
            };
            log::info!("Admin {} set {:?} minimum to {}", ctx.id(), kind, cents);
            send_html(bot, chat_id, minimums_text(ctx, &settings), None).await?;
            return Ok(());
        }
    };

    show(bot, target, screen).await?;
    Ok(())
}

/// Handles a parsed bot command.
pub(super) async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    metrics::record_command(cmd.name());
    log::info!("Command /{} from chat {}", cmd.name(), msg.chat.id);

    let ctx = match ensure_user(deps, &UserInfo::from_user(from)) {
        Ok(ctx) => ctx,
        Err(e) => {
            let lang = i18n::lang_from_code(from.language_code.as_deref().unwrap_or(i18n::DEFAULT_LANG_CODE));
            send_html(bot, msg.chat.id, error_text(&lang, &e), None).await?;
            return Ok(());
        }
    };

    match run(bot, deps, &ctx, msg.chat.id, cmd).await {
        Ok(()) => Ok(()),
        Err(AppError::Telegram(e)) => Err(Box::new(e)),
        Err(e) => {
            send_html(bot, msg.chat.id, error_text(&ctx.lang, &e), None).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fee_args() {
        assert_eq!(parse_fee_args("platform 2.5").unwrap(), (FeeKind::Platform, 2.5));
        assert_eq!(parse_fee_args("Referral 5%").unwrap(), (FeeKind::Referral, 5.0));
        assert_eq!(parse_fee_args("discount 1,5").unwrap(), (FeeKind::Discount, 1.5));
        assert!(parse_fee_args("").is_err());
        assert!(parse_fee_args("platform").is_err());
        assert!(parse_fee_args("tax 3").is_err());
        assert!(parse_fee_args("platform 3 4").is_err());
    }

    #[test]
    fn minimum_args() {
        assert_eq!(parse_min_args("withdrawal 50").unwrap(), (MinimumKind::Withdrawal, 5_000));
        assert_eq!(parse_min_args("payout 120.5").unwrap(), (MinimumKind::Payout, 12_050));
        assert!(parse_min_args("payout").is_err());
        assert!(parse_min_args("payout -3").is_err());
    }
}
