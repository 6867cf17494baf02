use rand::Rng;
use rusqlite::Connection;

use crate::core::error::{AppError, AppResult};
use crate::core::types::CompanyStatus;
use crate::services::begin_immediate;
use crate::services::companies::get_company;
use crate::storage::companies;
use crate::storage::referral_codes::{self, ActiveCode};
use crate::storage::referrals::{self, ReferralEntry, ReferralTotals};
use crate::storage::users;

/// Uppercase alphanumerics without the easily confused 0/O and 1/I.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_GENERATION_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedCode {
    pub code: String,
    pub company_id: i64,
    /// False when an existing active code was returned
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferralStats {
    pub totals: ReferralTotals,
    pub active_codes: i64,
    pub balance: i64,
}

/// Random `XXXX-XXXX` code.
pub fn random_code() -> String {
    let mut rng = rand::thread_rng();
    let mut half = || -> String {
        (0..4)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    };
    let first = half();
    let second = half();
    format!("{}-{}", first, second)
}

/// Returns the user's active code for the company, creating one if needed.
///
/// The user must be a member of the company and the company must be active.
pub fn generate_code(conn: &mut Connection, user_id: i64, company_id: i64) -> AppResult<GeneratedCode> {
    let tx = begin_immediate(conn)?;

    let company = get_company(&tx, company_id)?;
    if company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }
    let user = users::get_user(&tx, user_id)?.ok_or(AppError::NotFound("user"))?;
    if user.is_banned {
        return Err(AppError::Banned);
    }
    if !companies::is_member(&tx, user_id, company_id)? {
        return Err(AppError::Forbidden("join the company first"));
    }

    if let Some(existing) = referral_codes::find_active(&tx, user_id, company_id)? {
        return Ok(GeneratedCode {
            code: existing.code,
            company_id,
            created: false,
        });
    }

    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code = random_code();
        if referral_codes::code_exists(&tx, &code)? {
            continue;
        }
        referral_codes::insert_code(&tx, &code, user_id, company_id)?;
        tx.commit()?;
        log::info!("Referral code {} created for user {} at company {}", code, user_id, company_id);
        return Ok(GeneratedCode {
            code,
            company_id,
            created: true,
        });
    }

    log::error!("Could not find a free referral code after {} attempts", MAX_GENERATION_ATTEMPTS);
    Err(AppError::AlreadyExists("referral code"))
}

pub fn list_active_codes(conn: &Connection, user_id: i64) -> AppResult<Vec<ActiveCode>> {
    Ok(referral_codes::list_active_for_owner(conn, user_id)?)
}

pub fn referral_history(conn: &Connection, user_id: i64, limit: i64) -> AppResult<Vec<ReferralEntry>> {
    Ok(referrals::history_for_referrer(conn, user_id, limit)?)
}

pub fn referral_stats(conn: &Connection, user_id: i64) -> AppResult<ReferralStats> {
    let user = users::get_user(conn, user_id)?.ok_or(AppError::NotFound("user"))?;
    Ok(ReferralStats {
        totals: referrals::totals_for_referrer(conn, user_id)?,
        active_codes: referral_codes::count_active_for_owner(conn, user_id)?,
        balance: user.referral_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::validation::normalize_referral_code;
    use crate::services::companies::{approve, join_company, register_company};
    use crate::services::users::register_user;
    use crate::storage::db::open_in_memory;

    #[test]
    fn random_codes_have_the_right_shape() {
        for _ in 0..50 {
            let code = random_code();
            assert_eq!(normalize_referral_code(&code).unwrap(), code);
            assert!(!code.contains('O') && !code.contains('0'));
        }
    }

    #[test]
    fn generation_requires_membership_and_reuses_code() {
        let mut conn = open_in_memory().unwrap();
        register_user(&conn, 1, None, None, None).unwrap();
        register_user(&conn, 2, None, None, None).unwrap();
        let company = register_company(&conn, 1, "Bikes", "-").unwrap();
        approve(&mut conn, company.id).unwrap();

        assert!(matches!(
            generate_code(&mut conn, 2, company.id),
            Err(AppError::Forbidden(_))
        ));

        join_company(&conn, 2, company.id).unwrap();
        let first = generate_code(&mut conn, 2, company.id).unwrap();
        let second = generate_code(&mut conn, 2, company.id).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.code, second.code);
        assert_eq!(list_active_codes(&conn, 2).unwrap().len(), 1);
        assert_eq!(referral_stats(&conn, 2).unwrap().active_codes, 1);
    }
}
