//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Per-language command menus

use secrecy::ExposeSecret;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::i18n;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "snake_case", description = "Available commands:")]
pub enum Command {
    #[command(description = "main menu")]
    Start,
    #[command(description = "how the marketplace works")]
    Help,
    #[command(description = "browse companies")]
    Browse,
    #[command(description = "your balances and codes")]
    Profile,
    #[command(description = "saved products")]
    Favorites,
    #[command(description = "your cart")]
    Cart,
    #[command(description = "companies you own")]
    MyCompanies,
    #[command(description = "register a company")]
    RegisterCompany,
    #[command(description = "withdraw referral earnings")]
    Withdraw,
    #[command(description = "change language")]
    Language,
    #[command(description = "cancel the current action")]
    Cancel,
    #[command(description = "admin panel (admins only)")]
    Admin,
    #[command(description = "ban a user: /ban <telegram id>")]
    Ban(String),
    #[command(description = "unban a user: /unban <telegram id>")]
    Unban(String),
    #[command(description = "set a fee: /set_fee <platform|referral|discount> <percent>")]
    SetFee(String),
    #[command(description = "set a minimum: /set_min <withdrawal|payout> <amount>")]
    SetMin(String),
    #[command(description = "platform statistics (admins only)")]
    Stats,
}

impl Command {
    /// Metric label for the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::Browse => "browse",
            Command::Profile => "profile",
            Command::Favorites => "favorites",
            Command::Cart => "cart",
            Command::MyCompanies => "my_companies",
            Command::RegisterCompany => "register_company",
            Command::Withdraw => "withdraw",
            Command::Language => "language",
            Command::Cancel => "cancel",
            Command::Admin => "admin",
            Command::Ban(_) => "ban",
            Command::Unban(_) => "unban",
            Command::SetFee(_) => "set_fee",
            Command::SetMin(_) => "set_min",
            Command::Stats => "stats",
        }
    }

    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::Admin
                | Command::Ban(_)
                | Command::Unban(_)
                | Command::SetFee(_)
                | Command::SetMin(_)
                | Command::Stats
        )
    }
}

/// Commands shown in the Telegram menu, with the locale key of their description.
const MENU_COMMANDS: &[(&str, &str)] = &[
    ("start", "cmd-start"),
    ("browse", "cmd-browse"),
    ("profile", "cmd-profile"),
    ("my_companies", "cmd-my-companies"),
    ("register_company", "cmd-register-company"),
    ("withdraw", "cmd-withdraw"),
    ("favorites", "cmd-favorites"),
    ("cart", "cmd-cart"),
    ("language", "cmd-language"),
    ("cancel", "cmd-cancel"),
    ("help", "cmd-help"),
];

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Token missing, invalid BOT_API_URL or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("BOT_TOKEN environment variable not set"))?;

    let client = teloxide::net::default_reqwest_settings()
        .timeout(config::network::timeout())
        .build()?;
    let bot = Bot::with_client(token.expose_secret(), client);

    // Check if local Bot API server is configured
    let bot = if let Some(bot_api_url) = config::bot_api::get_url() {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

fn menu_commands(lang_code: &str) -> Vec<BotCommand> {
    let lang = i18n::lang_from_code(lang_code);
    MENU_COMMANDS
        .iter()
        .map(|(command, key)| BotCommand::new(*command, i18n::t(&lang, key)))
        .collect()
}

/// Sets up bot commands in Telegram UI for every supported language.
///
/// The fallback language is also registered without a language code so
/// clients in other languages still get a menu.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(menu_commands(i18n::DEFAULT_LANG_CODE)).await?;

    for (code, _) in i18n::SUPPORTED_LANGS {
        bot.set_my_commands(menu_commands(code)).language_code(*code).await?;
    }

    Ok(())
}
