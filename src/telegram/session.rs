//! Per-user conversation state for multi-step text input.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::core::config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterCompanyStep {
    Name,
    Description { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddProductStep {
    Name,
    Price { name: String },
    Quantity { name: String, price: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleStep {
    Quantity,
    Code,
    Buyer,
    Confirm,
}

/// A sale being assembled by its seller.
///
/// `sale_key` is fixed when the wizard starts, so pressing confirm twice
/// can never settle the same sale twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDraft {
    pub sale_key: String,
    pub company_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub referral_code: Option<String>,
    pub buyer_id: Option<i64>,
    pub step: SaleStep,
}

impl SaleDraft {
    pub fn new(company_id: i64, product_id: i64) -> Self {
        Self {
            sale_key: uuid::Uuid::new_v4().to_string(),
            company_id,
            product_id,
            quantity: 1,
            referral_code: None,
            buyer_id: None,
            step: SaleStep::Quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    RegisterCompany(RegisterCompanyStep),
    AddProduct { company_id: i64, step: AddProductStep },
    EditPrice { product_id: i64 },
    EditQuantity { product_id: i64 },
    RecordSale(SaleDraft),
    /// `None` withdraws referral balance, `Some` pays out a company
    Withdraw { company_id: Option<i64> },
}

#[derive(Debug, Clone)]
pub struct Session {
    pub flow: Flow,
    pub started_at: Instant,
}

/// Active flows keyed by Telegram user id.
pub struct SessionStore {
    sessions: DashMap<i64, Session>,
    ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(config::session::ttl())
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Starts (or replaces) the user's flow.
    pub fn start(&self, user_id: i64, flow: Flow) {
        self.sessions.insert(
            user_id,
            Session {
                flow,
                started_at: Instant::now(),
            },
        );
    }

    /// Replaces the flow of a running session, keeping its start time.
    pub fn advance(&self, user_id: i64, flow: Flow) {
        match self.sessions.get_mut(&user_id) {
            Some(mut session) => session.flow = flow,
            None => self.start(user_id, flow),
        }
    }

    /// Current flow, if any. Expired sessions are dropped on read.
    pub fn get(&self, user_id: i64) -> Option<Flow> {
        {
            // The read guard must be released before removing
            let session = self.sessions.get(&user_id)?;
            if session.started_at.elapsed() < self.ttl {
                return Some(session.flow.clone());
            }
        }
        self.sessions.remove(&user_id);
        None
    }

    /// Removes and returns the user's flow.
    pub fn take(&self, user_id: i64) -> Option<Flow> {
        self.sessions
            .remove(&user_id)
            .filter(|(_, session)| session.started_at.elapsed() < self.ttl)
            .map(|(_, session)| session.flow)
    }

    pub fn clear(&self, user_id: i64) -> bool {
        self.sessions.remove(&user_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drops sessions older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.started_at.elapsed() < self.ttl);
        before.saturating_sub(self.sessions.len())
    }

    pub fn spawn_sweep_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(config::session::sweep_interval());
            loop {
                interval.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    log::debug!("Dropped {} expired session(s)", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_keeps_start_time() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.start(1, Flow::RegisterCompany(RegisterCompanyStep::Name));
        let started = store.sessions.get(&1).map(|s| s.started_at);

        store.advance(
            1,
            Flow::RegisterCompany(RegisterCompanyStep::Description { name: "Acme".into() }),
        );

        assert_eq!(store.sessions.get(&1).map(|s| s.started_at), started);
        assert_eq!(
            store.get(1),
            Some(Flow::RegisterCompany(RegisterCompanyStep::Description {
                name: "Acme".into()
            }))
        );
    }

    #[test]
    fn expired_sessions_disappear() {
        let store = SessionStore::new(Duration::ZERO);
        store.start(1, Flow::Withdraw { company_id: None });
        store.start(2, Flow::EditPrice { product_id: 3 });

        assert_eq!(store.get(1), None);
        assert_eq!(store.take(2), None);
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_counts_removed() {
        let store = SessionStore::new(Duration::ZERO);
        store.start(1, Flow::Withdraw { company_id: None });
        store.start(2, Flow::Withdraw { company_id: Some(4) });
        assert_eq!(store.sweep_expired(), 2);
    }

    #[test]
    fn sale_drafts_get_unique_keys() {
        let a = SaleDraft::new(1, 2);
        let b = SaleDraft::new(1, 2);
        assert_ne!(a.sale_key, b.sale_key);
        assert_eq!(a.step, SaleStep::Quantity);
    }

    #[test]
    fn take_clears() {
        let store = SessionStore::default();
        store.start(5, Flow::EditQuantity { product_id: 9 });
        assert_eq!(store.take(5), Some(Flow::EditQuantity { product_id: 9 }));
        assert!(!store.clear(5));
    }
}
