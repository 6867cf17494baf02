//! HTML message helpers and localized labels for enum values.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use unic_langid::LanguageIdentifier;

use crate::core::types::{CompanyStatus, ProductStatus, WithdrawalKind, WithdrawalStatus};
use crate::i18n;

pub use teloxide::utils::html::escape;

fn is_parse_error(err: &RequestError) -> bool {
    err.to_string().to_lowercase().contains("can't parse entities")
}

/// Send an HTML message. On a parse error the text is resent escaped.
pub async fn send_html(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> ResponseResult<Message> {
    let raw_text = text.into();
    let mut req = bot.send_message(chat_id, raw_text.clone()).parse_mode(ParseMode::Html);
    if let Some(kb) = keyboard.clone() {
        req = req.reply_markup(kb);
    }

    match req.await {
        Ok(msg) => Ok(msg),
        Err(e) if is_parse_error(&e) => {
            log::warn!("HTML rejected by Telegram, resending escaped: {}", e);
            let mut retry = bot.send_message(chat_id, escape(&raw_text)).parse_mode(ParseMode::Html);
            if let Some(kb) = keyboard {
                retry = retry.reply_markup(kb);
            }
            retry.await
        }
        Err(e) => Err(e),
    }
}

/// Edit a message in place. Falls back to a new message when the original
/// can no longer be edited; an unchanged message is not an error.
pub async fn edit_html(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: impl Into<String>,
    keyboard: InlineKeyboardMarkup,
) -> ResponseResult<()> {
    let text = text.into();
    match bot
        .edit_message_text(chat_id, message_id, text.clone())
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard.clone())
        .await
    {
        Ok(_) => Ok(()),
        Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => {
            log::debug!("Edit failed ({}), sending a new message", e);
            send_html(bot, chat_id, text, Some(keyboard)).await.map(|_| ())
        }
    }
}

pub fn company_status(lang: &LanguageIdentifier, status: CompanyStatus) -> String {
    let key = match status {
        CompanyStatus::Pending => "status-pending",
        CompanyStatus::Active => "status-active",
        CompanyStatus::Rejected => "status-rejected",
        CompanyStatus::Suspended => "status-suspended",
    };
    format!("{} {}", status.emoji(), i18n::t(lang, key))
}

pub fn product_status(lang: &LanguageIdentifier, status: ProductStatus) -> String {
    let key = match status {
        ProductStatus::Active => "product-status-active",
        ProductStatus::Inactive => "product-status-inactive",
        ProductStatus::OutOfStock => "product-status-out-of-stock",
    };
    i18n::t(lang, key)
}

pub fn withdrawal_kind(lang: &LanguageIdentifier, kind: WithdrawalKind) -> String {
    match kind {
        WithdrawalKind::Referral => i18n::t(lang, "withdrawal-kind-referral"),
        WithdrawalKind::Company => i18n::t(lang, "withdrawal-kind-company"),
    }
}

pub fn withdrawal_status(lang: &LanguageIdentifier, status: WithdrawalStatus) -> String {
    let key = match status {
        WithdrawalStatus::UserPending | WithdrawalStatus::CompanyPending => "withdrawal-status-pending",
        WithdrawalStatus::Approved => "withdrawal-status-approved",
        WithdrawalStatus::Declined => "withdrawal-status-declined",
    };
    i18n::t(lang, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_translated() {
        let en = i18n::lang_from_code("en");
        assert_eq!(company_status(&en, CompanyStatus::Active), "✅ Active");
        assert_eq!(product_status(&en, ProductStatus::OutOfStock), "Out of stock");
        assert_eq!(
            withdrawal_status(&en, WithdrawalStatus::CompanyPending),
            withdrawal_status(&en, WithdrawalStatus::UserPending)
        );
    }

    #[test]
    fn escapes_user_text() {
        assert_eq!(escape("<b>Tom & Jerry</b>"), "&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;");
    }
}
