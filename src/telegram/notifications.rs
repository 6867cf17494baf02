//! Out-of-band messages to sellers, referrers, buyers and admins.
//!
//! Every send is retried on transient Telegram failures. A notification that
//! still fails is logged and dropped; the ledger never depends on it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use fluent_templates::fluent_bundle::FluentValue;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::RequestError;
use unic_langid::LanguageIdentifier;

use crate::core::config;
use crate::core::money::format_amount;
use crate::core::types::CompanyStatus;
use crate::i18n;
use crate::services::sales::SaleReceipt;
use crate::storage::companies::Company;
use crate::storage::db::DbPool;
use crate::storage::withdrawals::Withdrawal;
use crate::telegram::markup::{self, escape};

/// Network hiccups and flood control are worth another try; API errors are not.
fn is_transient(err: &RequestError) -> bool {
    matches!(err, RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_))
}

fn backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(config::retry::notify_min_delay())
        .with_max_times(config::retry::NOTIFY_MAX_ATTEMPTS)
        .with_jitter()
}

/// Flood control names its own wait; other errors keep the backoff delay.
/// An exhausted backoff stays exhausted.
fn retry_delay(err: &RequestError, delay: Option<Duration>) -> Option<Duration> {
    match (err, delay) {
        (RequestError::RetryAfter(seconds), Some(_)) => Some(seconds.duration()),
        _ => delay,
    }
}

async fn retry_request<T, Fut>(chat_id: ChatId, request: impl FnMut() -> Fut) -> Result<T, RequestError>
where
    Fut: Future<Output = Result<T, RequestError>>,
{
    request
        .retry(backoff())
        .when(is_transient)
        .adjust(retry_delay)
        .notify(|err: &RequestError, delay| {
            log::warn!("Notification to {} failed ({}), retrying in {:?}", chat_id, err, delay);
        })
        .await
}

/// Sends an HTML message with retries. Returns whether it was delivered.
pub async fn send_with_retry(bot: &Bot, chat_id: ChatId, text: &str) -> bool {
    let send = || async { bot.send_message(chat_id, text).parse_mode(ParseMode::Html).await };

    match retry_request(chat_id, send).await {
        Ok(_) => true,
        Err(e) => {
            log::error!("Failed to notify {}: {}", chat_id, e);
            false
        }
    }
}

/// Messages for the referrer and the buyer of a settled sale.
///
/// `lang_of` resolves a recipient's language; the seller already sees the
/// receipt in the chat where the sale was confirmed.
pub fn sale_messages(receipt: &SaleReceipt, lang_of: impl Fn(i64) -> LanguageIdentifier) -> Vec<(ChatId, String)> {
    let mut messages = Vec::new();
    let settlement = &receipt.settlement;

    if let (Some(referrer), Some(code)) = (receipt.referrer_id, receipt.referral_code.as_deref()) {
        let lang = lang_of(referrer);
        let text = i18n::t_args(
            &lang,
            "notify-referrer-commission",
            &[
                ("code", code.to_string().into()),
                ("company", escape(&receipt.company_name).into()),
                ("amount", format_amount(settlement.amount).into()),
                ("commission", format_amount(settlement.referrer_bonus).into()),
            ],
        );
        messages.push((ChatId(referrer), text));
    }

    if let Some(buyer) = receipt.buyer_id {
        if settlement.buyer_bonus > 0 {
            let lang = lang_of(buyer);
            let text = i18n::t_args(
                &lang,
                "notify-buyer-bonus",
                &[
                    ("company", escape(&receipt.company_name).into()),
                    ("product", escape(&receipt.product_name).into()),
                    ("bonus", format_amount(settlement.buyer_bonus).into()),
                ],
            );
            messages.push((ChatId(buyer), text));
        }
    }

    messages
}

pub async fn notify_sale(bot: &Bot, db_pool: &Arc<DbPool>, receipt: &SaleReceipt) {
    for (chat_id, text) in sale_messages(receipt, |id| i18n::user_lang_from_pool(db_pool, id)) {
        send_with_retry(bot, chat_id, &text).await;
    }
}

pub fn company_decision_message(lang: &LanguageIdentifier, company: &Company) -> Option<String> {
    let key = match company.status {
        CompanyStatus::Active => "notify-company-active",
        CompanyStatus::Rejected => "notify-company-rejected",
        CompanyStatus::Suspended => "notify-company-suspended",
        CompanyStatus::Pending => return None,
    };
    Some(i18n::t_args(lang, key, &[("name", escape(&company.name).into())]))
}

pub async fn notify_company_decision(bot: &Bot, db_pool: &Arc<DbPool>, company: &Company) {
    let lang = i18n::user_lang_from_pool(db_pool, company.owner_id);
    if let Some(text) = company_decision_message(&lang, company) {
        send_with_retry(bot, ChatId(company.owner_id), &text).await;
    }
}

pub fn withdrawal_decision_message(lang: &LanguageIdentifier, withdrawal: &Withdrawal) -> String {
    let args: [(&'static str, FluentValue<'static>); 3] = [
        ("id", withdrawal.id.into()),
        ("amount", format_amount(withdrawal.amount).into()),
        ("status", markup::withdrawal_status(lang, withdrawal.status).into()),
    ];
    i18n::t_args(lang, "notify-withdrawal-decided", &args)
}

pub async fn notify_withdrawal_decision(bot: &Bot, db_pool: &Arc<DbPool>, withdrawal: &Withdrawal) {
    let lang = i18n::user_lang_from_pool(db_pool, withdrawal.requester_id);
    let text = withdrawal_decision_message(&lang, withdrawal);
    send_with_retry(bot, ChatId(withdrawal.requester_id), &text).await;
}

async fn notify_admins(bot: &Bot, db_pool: &Arc<DbPool>, render: impl Fn(&LanguageIdentifier) -> String) {
    if config::admin::ADMIN_IDS.is_empty() {
        log::warn!("No ADMIN_IDS configured, admin notification dropped");
        return;
    }
    for admin_id in config::admin::ADMIN_IDS.iter() {
        let lang = i18n::user_lang_from_pool(db_pool, *admin_id);
        send_with_retry(bot, ChatId(*admin_id), &render(&lang)).await;
    }
}

pub async fn notify_admins_new_company(bot: &Bot, db_pool: &Arc<DbPool>, company: &Company, owner: &str) {
    notify_admins(bot, db_pool, |lang| {
        i18n::t_args(
            lang,
            "admin-notify-new-company",
            &[
                ("id", company.id.into()),
                ("name", escape(&company.name).into()),
                ("owner", escape(owner).into()),
            ],
        )
    })
    .await;
}

pub async fn notify_admins_new_withdrawal(bot: &Bot, db_pool: &Arc<DbPool>, withdrawal: &Withdrawal) {
    notify_admins(bot, db_pool, |lang| {
        i18n::t_args(
            lang,
            "admin-notify-new-withdrawal",
            &[
                ("id", withdrawal.id.into()),
                ("kind", markup::withdrawal_kind(lang, withdrawal.kind).into()),
                ("amount", format_amount(withdrawal.amount).into()),
                ("requester", withdrawal.requester_id.into()),
            ],
        )
    })
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settlement::Settlement;
    use crate::core::types::WithdrawalStatus;

    fn receipt(referrer: Option<i64>, buyer: Option<i64>, buyer_bonus: i64) -> SaleReceipt {
        SaleReceipt {
            sale_id: 1,
            company_id: 2,
            company_name: "Fish & Chips".into(),
            product_id: 3,
            product_name: "Cod".into(),
            seller_id: 10,
            quantity: 1,
            unit_price: 10_000,
            settlement: Settlement {
                amount: 10_000,
                platform_fee: 150,
                referrer_bonus: if referrer.is_some() { 250 } else { 0 },
                buyer_bonus,
                seller_earnings: 10_000 - 150 - 250 - buyer_bonus,
            },
            referral_code: referrer.map(|_| "ABCD-EFGH".into()),
            referrer_id: referrer,
            buyer_id: buyer,
            remaining_stock: 4,
        }
    }

    #[test]
    fn referred_sale_notifies_both_parties() {
        let messages = sale_messages(&receipt(Some(20), Some(30), 100), |_| i18n::lang_from_code("en"));

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, ChatId(20));
        assert!(messages[0].1.contains("2.50"));
        assert!(messages[0].1.contains("Fish &amp; Chips"));
        assert_eq!(messages[1].0, ChatId(30));
        assert!(messages[1].1.contains("1.00"));
    }

    #[test]
    fn plain_sale_notifies_nobody() {
        assert!(sale_messages(&receipt(None, Some(30), 0), |_| i18n::lang_from_code("en")).is_empty());
    }

    #[test]
    fn pending_company_has_no_decision_message() {
        let en = i18n::lang_from_code("en");
        let mut company = Company {
            id: 1,
            owner_id: 2,
            name: "Acme".into(),
            description: String::new(),
            status: CompanyStatus::Pending,
            billing_balance: 0,
            created_at: String::new(),
        };
        assert!(company_decision_message(&en, &company).is_none());
        company.status = CompanyStatus::Active;
        assert!(company_decision_message(&en, &company).unwrap().contains("Acme"));
    }

    #[test]
    fn withdrawal_message_quotes_amount() {
        let en = i18n::lang_from_code("en");
        let withdrawal = Withdrawal {
            id: 5,
            kind: crate::core::types::WithdrawalKind::Referral,
            requester_id: 1,
            company_id: None,
            amount: 1_250,
            status: WithdrawalStatus::Declined,
            created_at: String::new(),
            reviewed_at: None,
            reviewed_by: Some(9),
        };
        let text = withdrawal_decision_message(&en, &withdrawal);
        assert!(text.contains("12.50"));
        assert!(text.contains("#5"));
    }

    #[test]
    fn flood_control_overrides_backoff_delay() {
        use teloxide::types::Seconds;

        let backoff = Some(Duration::from_millis(500));
        let flood = RequestError::RetryAfter(Seconds::from_seconds(7));
        assert_eq!(retry_delay(&flood, backoff), Some(Duration::from_secs(7)));
        assert_eq!(retry_delay(&flood, None), None);

        let io = RequestError::Io(std::io::Error::other("reset").into());
        assert_eq!(retry_delay(&io, backoff), backoff);
    }

    #[tokio::test]
    async fn retry_waits_as_long_as_telegram_asks() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::time::Instant;
        use teloxide::types::Seconds;

        let calls = AtomicUsize::new(0);
        let started = Instant::now();
        let result = retry_request(ChatId(1), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(RequestError::RetryAfter(Seconds::from_seconds(1)))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(1), "waited {:?}", started.elapsed());
    }
}
