use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use unic_langid::LanguageIdentifier;

use crate::i18n;
use crate::telegram::callback_data::CallbackData;
use crate::telegram::markup::{edit_html, send_html};

/// A rendered menu: HTML text plus its inline keyboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub text: String,
    pub keyboard: InlineKeyboardMarkup,
}

impl Screen {
    pub fn new(text: impl Into<String>, rows: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self {
            text: text.into(),
            keyboard: InlineKeyboardMarkup::new(rows),
        }
    }

    /// Every callback payload on the screen, row by row.
    pub fn callbacks(&self) -> Vec<String> {
        self.keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Where a screen goes: a fresh message or an edit of the pressed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    New(ChatId),
    Edit(ChatId, MessageId),
}

impl Target {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Target::New(chat_id) | Target::Edit(chat_id, _) => *chat_id,
        }
    }
}

pub async fn show(bot: &Bot, target: Target, screen: Screen) -> ResponseResult<()> {
    match target {
        Target::New(chat_id) => send_html(bot, chat_id, screen.text, Some(screen.keyboard)).await.map(|_| ()),
        Target::Edit(chat_id, message_id) => edit_html(bot, chat_id, message_id, screen.text, screen.keyboard).await,
    }
}

pub fn button(text: impl Into<String>, data: CallbackData) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data.encode())
}

pub fn back_row(lang: &LanguageIdentifier, data: CallbackData) -> Vec<InlineKeyboardButton> {
    vec![button(i18n::t(lang, "btn-back"), data)]
}

pub fn cancel_row(lang: &LanguageIdentifier) -> Vec<InlineKeyboardButton> {
    vec![button(i18n::t(lang, "btn-cancel"), CallbackData::CancelFlow)]
}

/// Prev/next buttons for a paged list; empty when there is one page.
pub fn pager_row(
    lang: &LanguageIdentifier,
    page: i64,
    has_prev: bool,
    has_next: bool,
    to_page: impl Fn(i64) -> CallbackData,
) -> Vec<InlineKeyboardButton> {
    let mut row = Vec::new();
    if has_prev {
        row.push(button(i18n::t(lang, "btn-prev"), to_page(page - 1)));
    }
    if has_next {
        row.push(button(i18n::t(lang, "btn-next"), to_page(page + 1)));
    }
    row
}
