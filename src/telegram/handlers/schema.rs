//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::handle_command;
use super::messages::handle_text_message;
use super::types::{is_banned_sender, HandlerDeps, HandlerError};
use crate::i18n;
use crate::telegram::bot::Command;
use crate::telegram::markup::send_html;
use crate::telegram::menu::handle_callback;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Banned senders are stopped first; then commands, free text and button
/// presses are routed. The same tree is used in production and in tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(banned_message_handler(deps.clone()))
        .branch(banned_callback_handler(deps.clone()))
        .branch(command_handler(deps.clone()))
        .branch(message_handler(deps.clone()))
        .branch(callback_handler(deps))
}

/// Answers every message of a banned user with the ban notice.
fn banned_message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let filter_deps = deps.clone();
    Update::filter_message()
        .filter(move |msg: Message| is_banned_sender(&filter_deps, msg.from.as_ref()))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                log::debug!("Dropped message from banned chat {}", msg.chat.id);
                let lang = i18n::user_lang_from_pool(&deps.db_pool, msg.chat.id.0);
                send_html(&bot, msg.chat.id, i18n::t(&lang, "error-banned"), None).await?;
                Ok::<(), HandlerError>(())
            }
        })
}

fn banned_callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let filter_deps = deps.clone();
    Update::filter_callback_query()
        .filter(move |q: CallbackQuery| is_banned_sender(&filter_deps, Some(&q.from)))
        .endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps.clone();
            async move {
                let lang = i18n::user_lang_from_pool(&deps.db_pool, i64::try_from(q.from.id.0).unwrap_or(0));
                bot.answer_callback_query(q.id)
                    .text(i18n::t(&lang, "error-banned"))
                    .show_alert(true)
                    .await?;
                Ok::<(), HandlerError>(())
            }
        })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move { handle_command(&bot, &msg, cmd, &deps).await }
        },
    ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { handle_text_message(&bot, &msg, &deps).await }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            handle_callback(bot, q, deps)
                .await
                .map_err(|e| Box::new(e) as HandlerError)
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use teloxide::types::{Me, Update, User, UserId};

    use super::*;
    use crate::core::rate_limiter::RateLimiter;
    use crate::services::{users, SettingsService};
    use crate::storage::db;
    use crate::telegram::session::SessionStore;

    fn offline_bot() -> Bot {
        // Nothing listens on the discard port, so every send fails fast.
        Bot::new("1:offline").set_api_url(url::Url::parse("http://127.0.0.1:9/").unwrap())
    }

    fn me() -> Me {
        Me {
            user: User {
                id: UserId(1),
                is_bot: true,
                first_name: "Market".into(),
                last_name: None,
                username: Some("market_bot".into()),
                language_code: None,
                is_premium: false,
                added_to_attachment_menu: false,
            },
            can_join_groups: false,
            can_read_all_group_messages: false,
            supports_inline_queries: false,
            can_connect_to_business: false,
            has_main_web_app: false,
        }
    }

    fn start_from(id: i64, username: &str) -> Update {
        // `Update` only deserializes its kind correctly from text, not from a `Value`.
        serde_json::from_str(&serde_json::json!({
            "update_id": 1,
            "message": {
                "message_id": 1,
                "date": 1_700_000_000,
                "chat": { "id": id, "type": "private", "first_name": "Test" },
                "from": { "id": id, "is_bot": false, "first_name": "Test", "username": username },
                "text": "/start",
                "entities": [{ "type": "bot_command", "offset": 0, "length": 6 }]
            }
        })
        .to_string())
        .unwrap()
    }

    #[tokio::test]
    async fn banned_user_never_reaches_commands() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(dir.path().join("schema.sqlite").to_str().unwrap()).unwrap();
        {
            let conn = pool.get().unwrap();
            users::register_user(&conn, 51, Some("before"), Some("Test"), Some("en")).unwrap();
            users::register_user(&conn, 52, Some("before"), Some("Test"), Some("en")).unwrap();
            users::set_banned(&conn, 51, true).unwrap();
        }
        let deps = HandlerDeps::new(
            Arc::new(pool),
            Arc::new(SessionStore::default()),
            Arc::new(RateLimiter::new()),
            Arc::new(SettingsService::new()),
        );
        let handler = schema(deps.clone());

        // The command branch refreshes the stored username before replying.
        for id in [51, 52] {
            let _ = handler
                .dispatch(dptree::deps![offline_bot(), me(), start_from(id, "after")])
                .await;
        }

        let conn = deps.conn().unwrap();
        let banned = users::get_user(&conn, 51).unwrap();
        let regular = users::get_user(&conn, 52).unwrap();
        assert_eq!(banned.username.as_deref(), Some("before"));
        assert_eq!(regular.username.as_deref(), Some("after"));
    }
}
