//! Every rendered screen must carry parseable, size-limited callbacks and no
//! untranslated keys.
//!
//! Run with: cargo test --test menu_screens_test

mod common;

use common::{TestEnvironment, BUYER, MEMBER, OWNER};
use refmarket::i18n;
use refmarket::services::{companies, referrals};
use refmarket::storage::users;
use refmarket::telegram::handlers::UserCtx;
use refmarket::telegram::menu::{admin, browse, main_menu, owner, profile, sale, Screen};
use refmarket::telegram::CallbackData;
use rusqlite::Connection;

fn ctx(conn: &Connection, telegram_id: i64, lang: &str, is_admin: bool) -> UserCtx {
    UserCtx {
        user: users::get_user(conn, telegram_id).unwrap().unwrap(),
        lang: i18n::lang_from_code(lang),
        is_admin,
    }
}

fn check(name: &str, screen: &Screen) {
    assert!(!screen.text.is_empty(), "{}: empty text", name);
    for key in ["btn-", "error-", "status-", "sale-", "dashboard-", "admin-"] {
        assert!(!screen.text.contains(key), "{}: untranslated key in {:?}", name, screen.text);
    }
    for row in &screen.keyboard.inline_keyboard {
        for button in row {
            assert!(!button.text.starts_with("btn-"), "{}: untranslated button {}", name, button.text);
        }
    }
    for data in screen.callbacks() {
        assert!(data.len() <= 64, "{}: callback too long: {}", name, data);
        let parsed = CallbackData::parse(&data).unwrap_or_else(|e| panic!("{}: {}", name, e));
        assert_eq!(parsed.encode(), data, "{}: callback does not round-trip", name);
    }
}

#[test]
fn all_screens_render_in_both_languages() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 450, 4);
    let mut conn = env.conn();

    companies::join_company(&conn, MEMBER, company.id).unwrap();
    referrals::generate_code(&mut conn, MEMBER, company.id).unwrap();
    companies::register_company(&conn, BUYER, "Pending Place", "Awaiting review").unwrap();

    for lang in ["en", "ru"] {
        let member = ctx(&conn, MEMBER, lang, false);
        let owner_ctx = ctx(&conn, OWNER, lang, false);
        let admin_ctx = ctx(&conn, OWNER, lang, true);
        let settings = env.settings.current(&conn).unwrap();

        check("main", &main_menu::main_menu(&member));
        check("help", &main_menu::help(&member, &settings));
        check("language", &main_menu::language_menu(&member));
        check("browse", &browse::companies_page(&conn, &member, 0).unwrap());
        check("company", &browse::company_card(&conn, &member, company.id).unwrap());
        check("products", &browse::company_products(&conn, &member, company.id).unwrap());
        check("product", &browse::product_card(&conn, &member, latte.id).unwrap());
        check("profile", &profile::profile(&conn, &member).unwrap());
        check("favorites", &profile::favorites(&conn, &member).unwrap());
        check("cart", &profile::cart(&conn, &member).unwrap());
        check("referrals", &profile::referral_history(&conn, &member).unwrap());
        check("my-companies", &owner::my_companies(&conn, &owner_ctx).unwrap());
        check("dashboard", &owner::dashboard(&conn, &owner_ctx, company.id).unwrap());
        check("manage", &owner::manage_product(&conn, &owner_ctx, latte.id).unwrap());
        check("sale", &sale::sale_products(&conn, &owner_ctx, company.id).unwrap());
        check("admin", &admin::panel(&conn, &admin_ctx).unwrap());
        check("admin-companies", &admin::pending_companies(&conn, &admin_ctx).unwrap());
        check("admin-withdrawals", &admin::pending_withdrawals(&conn, &admin_ctx).unwrap());
        check("admin-stats", &admin::stats(&conn, &admin_ctx).unwrap());
    }
}

#[test]
fn owner_screens_are_private() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let latte = env.product(company.id, "Latte", 450, 4);
    let conn = env.conn();
    let member = ctx(&conn, MEMBER, "en", false);

    assert!(owner::dashboard(&conn, &member, company.id).is_err());
    assert!(owner::manage_product(&conn, &member, latte.id).is_err());
    assert!(sale::sale_products(&conn, &member, company.id).is_err());
}

#[test]
fn company_card_offers_join_then_code() {
    let env = TestEnvironment::new();
    let company = env.active_company("Bean There");
    let conn = env.conn();
    let member = ctx(&conn, MEMBER, "en", false);

    let before = browse::company_card(&conn, &member, company.id).unwrap().callbacks();
    assert!(before.contains(&CallbackData::JoinCompany { id: company.id }.encode()));

    companies::join_company(&conn, MEMBER, company.id).unwrap();
    let after = browse::company_card(&conn, &member, company.id).unwrap().callbacks();
    assert!(after.contains(&CallbackData::GenerateCode { company_id: company.id }.encode()));
    assert!(after.contains(&CallbackData::LeaveCompany { id: company.id }.encode()));
}
