use crate::core::money::format_amount;
use crate::i18n;
use crate::storage::settings::MarketSettings;
use crate::telegram::callback_data::CallbackData;
use crate::telegram::handlers::UserCtx;
use crate::telegram::markup::escape;

use super::helpers::{back_row, button, Screen};

pub fn main_menu(ctx: &UserCtx) -> Screen {
    let text = i18n::t_args(
        &ctx.lang,
        "menu-title",
        &[("name", escape(&ctx.user.display_name()).into())],
    );

    let mut rows = vec![
        vec![button(ctx.t("btn-browse"), CallbackData::Browse { page: 0 })],
        vec![
            button(ctx.t("btn-profile"), CallbackData::Profile),
            button(ctx.t("btn-my-companies"), CallbackData::MyCompanies),
        ],
        vec![
            button(ctx.t("btn-favorites"), CallbackData::Favorites),
            button(ctx.t("btn-cart"), CallbackData::Cart),
        ],
        vec![
            button(ctx.t("btn-language"), CallbackData::LanguageMenu),
            button(ctx.t("btn-help"), CallbackData::Help),
        ],
    ];
    if ctx.is_admin {
        rows.push(vec![button(ctx.t("btn-admin"), CallbackData::Admin)]);
    }

    Screen::new(text, rows)
}

pub fn help(ctx: &UserCtx, settings: &MarketSettings) -> Screen {
    let text = i18n::t_args(
        &ctx.lang,
        "help-text",
        &[
            ("platform", settings.fees.platform_fee_percent.to_string().into()),
            ("commission", settings.fees.referral_commission_percent.to_string().into()),
            ("discount", settings.fees.buyer_discount_percent.to_string().into()),
            ("min_withdrawal", format_amount(settings.min_withdrawal).into()),
            ("min_payout", format_amount(settings.min_payout).into()),
        ],
    );
    Screen::new(text, vec![back_row(&ctx.lang, CallbackData::MainMenu)])
}

pub fn language_menu(ctx: &UserCtx) -> Screen {
    let mut rows: Vec<_> = i18n::SUPPORTED_LANGS
        .iter()
        .map(|(code, name)| {
            let marker = if ctx.user.language == *code { "✅ " } else { "" };
            vec![button(
                format!("{}{}", marker, name),
                CallbackData::Language { code: code.to_string() },
            )]
        })
        .collect();
    rows.push(back_row(&ctx.lang, CallbackData::MainMenu));
    Screen::new(ctx.t("language-title"), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::users::UserRecord;

    fn ctx(is_admin: bool) -> UserCtx {
        UserCtx {
            user: UserRecord {
                telegram_id: 1,
                username: Some("ann".into()),
                first_name: Some("Ann".into()),
                language: "en".into(),
                is_banned: false,
                coin_balance: 0,
                referral_balance: 0,
                created_at: String::new(),
            },
            lang: i18n::lang_from_code("en"),
            is_admin,
        }
    }

    #[test]
    fn admin_button_only_for_admins() {
        assert!(!main_menu(&ctx(false)).callbacks().contains(&"a".to_string()));
        assert!(main_menu(&ctx(true)).callbacks().contains(&"a".to_string()));
    }

    #[test]
    fn language_menu_marks_current() {
        let screen = language_menu(&ctx(false));
        let first = &screen.keyboard.inline_keyboard[0][0];
        assert!(first.text.starts_with("✅"));
    }
}
