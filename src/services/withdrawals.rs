use rusqlite::{Connection, Transaction};

use crate::core::error::{AppError, AppResult};
use crate::core::types::{WithdrawalKind, WithdrawalStatus};
use crate::services::begin_immediate;
use crate::services::companies::require_owner;
use crate::services::settings;
use crate::storage::withdrawals::{self as store, Withdrawal};
use crate::storage::{companies, users};

fn get_withdrawal(conn: &Connection, id: i64) -> AppResult<Withdrawal> {
    store::get_withdrawal(conn, id)?.ok_or(AppError::NotFound("withdrawal"))
}

/// Reserves `amount` cents of the user's referral balance for payout.
pub fn request_referral_withdrawal(conn: &mut Connection, user_id: i64, amount: i64) -> AppResult<Withdrawal> {
    let tx = begin_immediate(conn)?;

    let user = users::get_user(&tx, user_id)?.ok_or(AppError::NotFound("user"))?;
    if user.is_banned {
        return Err(AppError::Banned);
    }
    let minimum = settings::load(&tx)?.min_withdrawal;
    if amount < minimum {
        return Err(AppError::BelowMinimum { minimum });
    }
    if !users::debit_referral_balance(&tx, user_id, amount)? {
        return Err(AppError::InsufficientFunds {
            available: user.referral_balance,
            requested: amount,
        });
    }

    let id = store::insert_withdrawal(&tx, WithdrawalKind::Referral, user_id, None, amount)?;
    let withdrawal = get_withdrawal(&tx, id)?;
    tx.commit()?;

    log::info!("Withdrawal {} requested by user {}: {}", id, user_id, amount);
    Ok(withdrawal)
}

/// Reserves `amount` cents of the company's billing balance for payout to its owner.
pub fn request_company_payout(
    conn: &mut Connection,
    owner_id: i64,
    company_id: i64,
    amount: i64,
) -> AppResult<Withdrawal> {
    let tx = begin_immediate(conn)?;

    let company = require_owner(&tx, company_id, owner_id)?;
    let minimum = settings::load(&tx)?.min_payout;
    if amount < minimum {
        return Err(AppError::BelowMinimum { minimum });
    }
    if !companies::debit_billing(&tx, company_id, amount)? {
        return Err(AppError::InsufficientFunds {
            available: company.billing_balance,
            requested: amount,
        });
    }

    let id = store::insert_withdrawal(&tx, WithdrawalKind::Company, owner_id, Some(company_id), amount)?;
    let withdrawal = get_withdrawal(&tx, id)?;
    tx.commit()?;

    log::info!("Payout {} requested for company {}: {}", id, company_id, amount);
    Ok(withdrawal)
}

fn decide(tx: &Transaction<'_>, id: i64, admin_id: i64, to: WithdrawalStatus) -> AppResult<Withdrawal> {
    let withdrawal = get_withdrawal(tx, id)?;
    withdrawal.status.transition(to)?;
    if !store::update_status(tx, id, withdrawal.status, to, admin_id)? {
        return Err(AppError::transition(withdrawal.status, to));
    }
    Ok(withdrawal)
}

/// Marks a pending request as paid out. The funds were reserved at request time.
pub fn approve(conn: &mut Connection, id: i64, admin_id: i64) -> AppResult<Withdrawal> {
    let tx = begin_immediate(conn)?;
    decide(&tx, id, admin_id, WithdrawalStatus::Approved)?;
    let updated = get_withdrawal(&tx, id)?;
    tx.commit()?;
    log::info!("Withdrawal {} approved by {}", id, admin_id);
    Ok(updated)
}

/// Declines a pending request and returns the reserved funds to where they came from.
pub fn decline(conn: &mut Connection, id: i64, admin_id: i64) -> AppResult<Withdrawal> {
    let tx = begin_immediate(conn)?;
    let original = decide(&tx, id, admin_id, WithdrawalStatus::Declined)?;

    let refunded = match (original.kind, original.company_id) {
        (WithdrawalKind::Referral, _) => users::credit_referral_balance(&tx, original.requester_id, original.amount)?,
        (WithdrawalKind::Company, Some(company_id)) => companies::credit_billing(&tx, company_id, original.amount)?,
        (WithdrawalKind::Company, None) => 0,
    };
    if refunded != 1 {
        return Err(AppError::NotFound("refund target"));
    }

    let updated = get_withdrawal(&tx, id)?;
    tx.commit()?;
    log::info!("Withdrawal {} declined by {}, {} refunded", id, admin_id, original.amount);
    Ok(updated)
}

pub fn list_pending(conn: &Connection, limit: i64) -> AppResult<Vec<Withdrawal>> {
    Ok(store::list_pending(conn, limit)?)
}

pub fn list_for_user(conn: &Connection, user_id: i64, limit: i64) -> AppResult<Vec<Withdrawal>> {
    Ok(store::list_for_requester(conn, user_id, limit)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::companies::{approve as approve_company, register_company};
    use crate::services::users::{get_user, register_user};
    use crate::storage::db::open_in_memory;
    use crate::storage::settings::{insert_if_missing, MarketSettings};

    const USER: i64 = 1;
    const ADMIN: i64 = 99;

    fn setup() -> Connection {
        let conn = open_in_memory().unwrap();
        register_user(&conn, USER, None, None, None).unwrap();
        insert_if_missing(
            &conn,
            &MarketSettings {
                fees: crate::core::settlement::FeeSchedule {
                    platform_fee_percent: 1.5,
                    referral_commission_percent: 2.5,
                    buyer_discount_percent: 1.0,
                },
                min_withdrawal: 1_000,
                min_payout: 5_000,
                platform_balance: 0,
            },
        )
        .unwrap();
        users::credit_referral_balance(&conn, USER, 2_500).unwrap();
        conn
    }

    #[test]
    fn below_minimum_names_the_threshold() {
        let mut conn = setup();
        let err = request_referral_withdrawal(&mut conn, USER, 999).unwrap_err();
        assert!(matches!(err, AppError::BelowMinimum { minimum: 1_000 }));
        assert!(err.to_string().contains("10.00"));
    }

    #[test]
    fn cannot_withdraw_more_than_balance() {
        let mut conn = setup();
        assert!(matches!(
            request_referral_withdrawal(&mut conn, USER, 3_000),
            Err(AppError::InsufficientFunds {
                available: 2_500,
                requested: 3_000
            })
        ));
    }

    #[test]
    fn decline_restores_exact_balance() {
        let mut conn = setup();
        let w = request_referral_withdrawal(&mut conn, USER, 2_000).unwrap();
        assert_eq!(w.status, WithdrawalStatus::UserPending);
        assert_eq!(get_user(&conn, USER).unwrap().referral_balance, 500);

        let declined = decline(&mut conn, w.id, ADMIN).unwrap();
        assert_eq!(declined.status, WithdrawalStatus::Declined);
        assert_eq!(declined.reviewed_by, Some(ADMIN));
        assert_eq!(get_user(&conn, USER).unwrap().referral_balance, 2_500);

        // decisions are final
        assert!(approve(&mut conn, w.id, ADMIN).is_err());
        assert!(decline(&mut conn, w.id, ADMIN).is_err());
        assert_eq!(get_user(&conn, USER).unwrap().referral_balance, 2_500);
    }

    #[test]
    fn company_payout_is_owner_only_and_refundable() {
        let mut conn = setup();
        register_user(&conn, 2, None, None, None).unwrap();
        let company = register_company(&conn, USER, "Flowers", "-").unwrap();
        approve_company(&mut conn, company.id).unwrap();
        companies::credit_billing(&conn, company.id, 8_000).unwrap();

        assert!(matches!(
            request_company_payout(&mut conn, 2, company.id, 6_000),
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            request_company_payout(&mut conn, USER, company.id, 4_000),
            Err(AppError::BelowMinimum { minimum: 5_000 })
        ));

        let payout = request_company_payout(&mut conn, USER, company.id, 6_000).unwrap();
        assert_eq!(payout.status, WithdrawalStatus::CompanyPending);
        assert_eq!(list_pending(&conn, 10).unwrap().len(), 1);

        decline(&mut conn, payout.id, ADMIN).unwrap();
        let company = crate::services::companies::get_company(&conn, company.id).unwrap();
        assert_eq!(company.billing_balance, 8_000);
        assert!(list_pending(&conn, 10).unwrap().is_empty());
        assert_eq!(list_for_user(&conn, USER, 10).unwrap().len(), 1);
    }

    #[test]
    fn approve_keeps_funds_debited() {
        let mut conn = setup();
        let w = request_referral_withdrawal(&mut conn, USER, 1_000).unwrap();
        let approved = approve(&mut conn, w.id, ADMIN).unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(get_user(&conn, USER).unwrap().referral_balance, 1_500);
    }
}
