//! Metrics collection using Prometheus
//!
//! Tracks:
//! - Marketplace volume (sales, sale volume, commissions paid)
//! - Withdrawal decisions by kind and status
//! - Handler errors by error kind
//! - Command usage

// Metric names and label sets are static; registration only fails on a duplicate name.
#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

use crate::core::settlement::Settlement;

// ======================
// BUSINESS METRICS
// ======================

/// Settled sales
pub static SALES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("refmarket_sales_total", "Total number of settled sales").expect("register sales_total")
});

/// Sum of settled sale amounts in cents
pub static SALE_VOLUME_CENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "refmarket_sale_volume_cents_total",
        "Total settled sale volume in cents"
    )
    .expect("register sale_volume")
});

/// Referrer commissions credited, in cents
pub static COMMISSION_CENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "refmarket_commission_cents_total",
        "Total referral commission credited in cents"
    )
    .expect("register commission")
});

/// Withdrawal events
/// Labels: kind (referral/company), status (user_pending/company_pending/approved/declined)
pub static WITHDRAWALS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "refmarket_withdrawals_total",
        "Withdrawal requests and decisions",
        &["kind", "status"]
    )
    .expect("register withdrawals")
});

// ======================
// HEALTH METRICS
// ======================

/// Errors surfaced by handlers
/// Labels: kind (see `AppError::kind`)
pub static HANDLER_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "refmarket_handler_errors_total",
        "Errors returned to handlers, by kind",
        &["kind"]
    )
    .expect("register handler_errors")
});

/// Commands received
/// Labels: command
pub static COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("refmarket_commands_total", "Bot commands received", &["command"])
        .expect("register commands")
});

/// Initialize metrics (call this at startup so every series shows up in /metrics)
pub fn init_metrics() {
    log::info!("Initializing metrics registry...");

    Lazy::force(&SALES_TOTAL);
    Lazy::force(&SALE_VOLUME_CENTS_TOTAL);
    Lazy::force(&COMMISSION_CENTS_TOTAL);

    for kind in ["referral", "company"] {
        for status in ["user_pending", "company_pending", "approved", "declined"] {
            WITHDRAWALS_TOTAL.with_label_values(&[kind, status]);
        }
    }
    Lazy::force(&HANDLER_ERRORS_TOTAL);
    Lazy::force(&COMMANDS_TOTAL);
}

pub fn record_sale(settlement: &Settlement) {
    SALES_TOTAL.inc();
    SALE_VOLUME_CENTS_TOTAL.inc_by(settlement.amount.max(0) as u64);
    COMMISSION_CENTS_TOTAL.inc_by(settlement.referrer_bonus.max(0) as u64);
}

pub fn record_withdrawal(kind: &str, status: &str) {
    WITHDRAWALS_TOTAL.with_label_values(&[kind, status]).inc();
}

pub fn record_handler_error(kind: &str) {
    HANDLER_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn record_command(command: &str) {
    COMMANDS_TOTAL.with_label_values(&[command]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_updates_volume_and_commission() {
        let before_volume = SALE_VOLUME_CENTS_TOTAL.get();
        let before_commission = COMMISSION_CENTS_TOTAL.get();

        record_sale(&Settlement {
            amount: 10_000,
            platform_fee: 150,
            referrer_bonus: 250,
            buyer_bonus: 100,
            seller_earnings: 9_500,
        });

        assert!(SALE_VOLUME_CENTS_TOTAL.get() >= before_volume + 10_000);
        assert!(COMMISSION_CENTS_TOTAL.get() >= before_commission + 250);
    }

    #[test]
    fn labelled_counters_accept_known_labels() {
        init_metrics();
        record_withdrawal("referral", "approved");
        record_handler_error("database");
        assert!(WITHDRAWALS_TOTAL.with_label_values(&["referral", "approved"]).get() >= 1);
    }
}
