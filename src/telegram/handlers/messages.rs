//! Plain text messages: input for the running flow, or a hint.

use teloxide::prelude::*;
use teloxide::types::Message;

use super::flows;
use super::types::{ensure_user, error_text, HandlerDeps, HandlerError, UserInfo};
use crate::i18n;
use crate::telegram::markup::send_html;

pub(super) async fn handle_text_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(from), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };

    let ctx = match ensure_user(deps, &UserInfo::from_user(from)) {
        Ok(ctx) => ctx,
        Err(e) => {
            let lang = i18n::user_lang_from_pool(&deps.db_pool, msg.chat.id.0);
            send_html(bot, msg.chat.id, error_text(&lang, &e), None).await?;
            return Ok(());
        }
    };

    // Commands that did not parse end up here too
    if text.starts_with('/') {
        send_html(bot, msg.chat.id, ctx.t("unknown-command"), None).await?;
        return Ok(());
    }

    if !flows::handle_text(bot, deps, &ctx, msg.chat.id, text).await? {
        send_html(bot, msg.chat.id, ctx.t("no-flow-hint"), None).await?;
    }
    Ok(())
}
