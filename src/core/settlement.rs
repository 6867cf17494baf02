//! Splitting a sale amount between the platform, the referrer, the buyer and the seller.

use crate::core::money::percent_of;

/// Percentages applied to a sale. Stored in the `settings` row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub platform_fee_percent: f64,
    pub referral_commission_percent: f64,
    pub buyer_discount_percent: f64,
}

impl FeeSchedule {
    pub fn total_percent(&self) -> f64 {
        self.platform_fee_percent + self.referral_commission_percent + self.buyer_discount_percent
    }
}

/// Result of settling one sale. All parts are non-negative and sum to `amount`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settlement {
    pub amount: i64,
    pub platform_fee: i64,
    pub referrer_bonus: i64,
    pub buyer_bonus: i64,
    pub seller_earnings: i64,
}

/// Settles `amount` cents.
///
/// The referrer bonus is paid only when a referral code was redeemed. The buyer
/// bonus additionally needs a registered buyer to credit. Each part is clamped
/// to what is left, so even a misconfigured schedule cannot make the seller's
/// share negative.
pub fn settle(amount: i64, fees: &FeeSchedule, has_referrer: bool, has_buyer: bool) -> Settlement {
    let amount = amount.max(0);
    let mut remaining = amount;

    let mut take = |pct: f64, applies: bool| -> i64 {
        if !applies {
            return 0;
        }
        let part = percent_of(amount, pct).clamp(0, remaining);
        remaining -= part;
        part
    };

    let platform_fee = take(fees.platform_fee_percent, true);
    let referrer_bonus = take(fees.referral_commission_percent, has_referrer);
    let buyer_bonus = take(fees.buyer_discount_percent, has_referrer && has_buyer);

    Settlement {
        amount,
        platform_fee,
        referrer_bonus,
        buyer_bonus,
        seller_earnings: remaining,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DEFAULT: FeeSchedule = FeeSchedule {
        platform_fee_percent: 1.5,
        referral_commission_percent: 2.5,
        buyer_discount_percent: 1.0,
    };

    fn parts_sum(s: &Settlement) -> i64 {
        s.platform_fee + s.referrer_bonus + s.buyer_bonus + s.seller_earnings
    }

    #[test]
    fn hundred_with_referrer_and_buyer() {
        let s = settle(10_000, &DEFAULT, true, true);
        assert_eq!(
            s,
            Settlement {
                amount: 10_000,
                platform_fee: 150,
                referrer_bonus: 250,
                buyer_bonus: 100,
                seller_earnings: 9_500,
            }
        );
    }

    #[test]
    fn no_code_means_only_platform_fee() {
        let s = settle(10_000, &DEFAULT, false, true);
        assert_eq!(s.referrer_bonus, 0);
        assert_eq!(s.buyer_bonus, 0);
        assert_eq!(s.seller_earnings, 9_850);
    }

    #[test]
    fn code_without_buyer_skips_buyer_bonus() {
        let s = settle(10_000, &DEFAULT, true, false);
        assert_eq!(s.buyer_bonus, 0);
        assert_eq!(s.seller_earnings, 9_600);
    }

    #[test]
    fn parts_always_sum_to_amount() {
        let greedy = FeeSchedule {
            platform_fee_percent: 80.0,
            referral_commission_percent: 30.0,
            buyer_discount_percent: 10.0,
        };
        for amount in [1, 7, 99, 333, 10_001, 123_457] {
            for schedule in [DEFAULT, greedy] {
                let s = settle(amount, &schedule, true, true);
                assert_eq!(parts_sum(&s), amount);
                assert!(s.seller_earnings >= 0 && s.buyer_bonus >= 0 && s.referrer_bonus >= 0);
            }
        }
    }
}
