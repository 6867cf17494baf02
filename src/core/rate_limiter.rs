use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::core::config;

/// Actions that are throttled per chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GenerateCode,
    Withdraw,
    RecordSale,
}

/// Rate limiter for money-touching actions.
///
/// Each `(chat, action)` pair gets its own cooldown. Admin chats are never limited.
#[derive(Clone)]
pub struct RateLimiter {
    /// Deadline until which a pair is blocked
    limits: Arc<Mutex<HashMap<(ChatId, Action), Instant>>>,
    generate_code: Duration,
    withdraw: Duration,
    record_sale: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Creates a limiter with the cooldowns from `config::rate_limit`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use refmarket::core::rate_limiter::RateLimiter;
    ///
    /// let limiter = RateLimiter::new();
    /// ```
    pub fn new() -> Self {
        Self::with_durations(
            Duration::from_secs(config::rate_limit::GENERATE_CODE_COOLDOWN_SECS),
            Duration::from_secs(config::rate_limit::WITHDRAW_COOLDOWN_SECS),
            Duration::from_secs(config::rate_limit::RECORD_SALE_COOLDOWN_SECS),
        )
    }

    pub fn with_durations(generate_code: Duration, withdraw: Duration, record_sale: Duration) -> Self {
        Self {
            limits: Arc::new(Mutex::new(HashMap::new())),
            generate_code,
            withdraw,
            record_sale,
        }
    }

    fn duration_for(&self, action: Action) -> Duration {
        match action {
            Action::GenerateCode => self.generate_code,
            Action::Withdraw => self.withdraw,
            Action::RecordSale => self.record_sale,
        }
    }

    /// Returns `true` while the chat is still cooling down for `action`.
    pub async fn is_rate_limited(&self, chat_id: ChatId, action: Action) -> bool {
        if config::admin::is_admin(chat_id.0) {
            return false;
        }
        self.get_remaining_time(chat_id, action).await.is_some()
    }

    /// Time left until `action` is allowed again, if the chat is limited.
    pub async fn get_remaining_time(&self, chat_id: ChatId, action: Action) -> Option<Duration> {
        let limits = self.limits.lock().await;
        let deadline = *limits.get(&(chat_id, action))?;
        let now = Instant::now();
        (now < deadline).then(|| deadline - now)
    }

    /// Starts a new cooldown after a successful action.
    pub async fn update_rate_limit(&self, chat_id: ChatId, action: Action) {
        if config::admin::is_admin(chat_id.0) {
            return;
        }
        let mut limits = self.limits.lock().await;
        limits.insert((chat_id, action), Instant::now() + self.duration_for(action));
    }

    /// Clears every cooldown of a chat.
    pub async fn remove_rate_limit(&self, chat_id: ChatId) {
        let mut limits = self.limits.lock().await;
        limits.retain(|(chat, _), _| *chat != chat_id);
    }

    /// Drops expired entries. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut limits = self.limits.lock().await;
        let before = limits.len();
        let now = Instant::now();
        limits.retain(|_, deadline| *deadline > now);
        before - limits.len()
    }

    /// Spawns a background task that periodically calls [`cleanup_expired`](Self::cleanup_expired).
    pub fn spawn_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config::rate_limit::cleanup_interval());
            loop {
                interval.tick().await;
                let removed = self.cleanup_expired().await;
                if removed > 0 {
                    log::debug!("Rate limiter cleanup removed {} entries", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short() -> RateLimiter {
        RateLimiter::with_durations(
            Duration::from_millis(50),
            Duration::from_secs(60),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn limits_per_action() {
        let limiter = short();
        let chat = ChatId(42);

        assert!(!limiter.is_rate_limited(chat, Action::Withdraw).await);
        limiter.update_rate_limit(chat, Action::Withdraw).await;
        assert!(limiter.is_rate_limited(chat, Action::Withdraw).await);
        assert!(!limiter.is_rate_limited(chat, Action::GenerateCode).await);
        assert!(limiter.get_remaining_time(chat, Action::Withdraw).await.is_some());
    }

    #[tokio::test]
    async fn cooldown_expires_and_is_cleaned() {
        let limiter = short();
        let chat = ChatId(7);

        limiter.update_rate_limit(chat, Action::RecordSale).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(!limiter.is_rate_limited(chat, Action::RecordSale).await);
        assert_eq!(limiter.cleanup_expired().await, 1);
    }

    #[tokio::test]
    async fn remove_clears_all_actions() {
        let limiter = short();
        let chat = ChatId(9);

        limiter.update_rate_limit(chat, Action::Withdraw).await;
        limiter.update_rate_limit(chat, Action::GenerateCode).await;
        limiter.remove_rate_limit(chat).await;

        assert!(!limiter.is_rate_limited(chat, Action::Withdraw).await);
        assert!(!limiter.is_rate_limited(chat, Action::GenerateCode).await);
    }
}
