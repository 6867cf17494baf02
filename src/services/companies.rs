use rusqlite::Connection;

use crate::core::config::listing::{HISTORY_LIMIT, PAGE_SIZE};
use crate::core::error::{AppError, AppResult};
use crate::core::types::CompanyStatus;
use crate::core::validation::{validate_description, validate_name};
use crate::services::{begin_immediate, is_unique_violation, total_pages, Page};
use crate::storage::companies::{self, Company};
use crate::storage::products;
use crate::storage::sales::{self, SaleRecord, SalesSummary};
use crate::storage::users;

/// Owner's view of one company.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub company: Company,
    pub product_count: i64,
    pub member_count: i64,
    pub summary: SalesSummary,
    pub recent_sales: Vec<SaleRecord>,
}

pub fn get_company(conn: &Connection, company_id: i64) -> AppResult<Company> {
    companies::get_company(conn, company_id)?.ok_or(AppError::NotFound("company"))
}

/// Loads the company and checks that `user_id` owns it.
pub fn require_owner(conn: &Connection, company_id: i64, user_id: i64) -> AppResult<Company> {
    let company = get_company(conn, company_id)?;
    if company.owner_id != user_id {
        return Err(AppError::Forbidden("not the company owner"));
    }
    Ok(company)
}

/// Creates a company waiting for admin review.
pub fn register_company(conn: &Connection, owner_id: i64, name: &str, description: &str) -> AppResult<Company> {
    let name = validate_name(name)?;
    let description = validate_description(description)?;

    let owner = users::get_user(conn, owner_id)?.ok_or(AppError::NotFound("user"))?;
    if owner.is_banned {
        return Err(AppError::Banned);
    }
    // The case-insensitive unique index decides, so racing registrations
    // get the same answer as sequential ones.
    let id = companies::insert_company(conn, owner_id, &name, &description).map_err(|e| {
        if is_unique_violation(&e) {
            AppError::AlreadyExists("company")
        } else {
            AppError::Database(e)
        }
    })?;
    log::info!("Company {} '{}' registered by {}", id, name, owner_id);
    get_company(conn, id)
}

fn change_status(conn: &mut Connection, company_id: i64, target: CompanyStatus) -> AppResult<Company> {
    let tx = begin_immediate(conn)?;
    let company = get_company(&tx, company_id)?;
    company.status.transition(target)?;
    if !companies::update_status(&tx, company_id, company.status, target)? {
        return Err(AppError::transition(company.status, target));
    }
    let updated = get_company(&tx, company_id)?;
    tx.commit()?;
    log::info!("Company {} {} -> {}", company_id, company.status, target);
    Ok(updated)
}

pub fn approve(conn: &mut Connection, company_id: i64) -> AppResult<Company> {
    change_status(conn, company_id, CompanyStatus::Active)
}

pub fn reject(conn: &mut Connection, company_id: i64) -> AppResult<Company> {
    change_status(conn, company_id, CompanyStatus::Rejected)
}

pub fn suspend(conn: &mut Connection, company_id: i64) -> AppResult<Company> {
    change_status(conn, company_id, CompanyStatus::Suspended)
}

pub fn reactivate(conn: &mut Connection, company_id: i64) -> AppResult<Company> {
    change_status(conn, company_id, CompanyStatus::Active)
}

/// Active companies in name order, `PAGE_SIZE` per page. Out-of-range pages clamp to the last one.
pub fn list_active(conn: &Connection, page: i64) -> AppResult<Page<Company>> {
    let total = companies::count_by_status(conn, CompanyStatus::Active)?;
    let total_pages = total_pages(total, PAGE_SIZE);
    let page = page.clamp(0, total_pages - 1);
    let items = companies::list_by_status(conn, CompanyStatus::Active, PAGE_SIZE, page * PAGE_SIZE)?;
    Ok(Page {
        items,
        page,
        total_pages,
    })
}

pub fn list_owned(conn: &Connection, owner_id: i64) -> AppResult<Vec<Company>> {
    Ok(companies::list_owned(conn, owner_id)?)
}

/// Oldest first, for the admin review queue.
pub fn list_pending(conn: &Connection, limit: i64) -> AppResult<Vec<Company>> {
    Ok(companies::list_pending(conn, limit)?)
}

/// Joins an active company. Returns false if already a member.
pub fn join_company(conn: &Connection, user_id: i64, company_id: i64) -> AppResult<bool> {
    let company = get_company(conn, company_id)?;
    if company.status != CompanyStatus::Active {
        return Err(AppError::Forbidden("company is not active"));
    }
    if company.owner_id == user_id {
        return Err(AppError::Forbidden("owners cannot join their own company"));
    }
    Ok(companies::add_member(conn, user_id, company_id)?)
}

/// Leaves a company and retires the member's unused code for it.
pub fn leave_company(conn: &mut Connection, user_id: i64, company_id: i64) -> AppResult<bool> {
    let tx = begin_immediate(conn)?;
    let left = companies::remove_member(&tx, user_id, company_id)?;
    if left {
        tx.execute(
            "UPDATE referral_codes SET active = 0 WHERE owner_id = ?1 AND company_id = ?2 AND active = 1",
            [user_id, company_id],
        )?;
    }
    tx.commit()?;
    Ok(left)
}

pub fn is_member(conn: &Connection, user_id: i64, company_id: i64) -> AppResult<bool> {
    Ok(companies::is_member(conn, user_id, company_id)?)
}

pub fn company_dashboard(conn: &Connection, owner_id: i64, company_id: i64) -> AppResult<Dashboard> {
    let company = require_owner(conn, company_id, owner_id)?;
    Ok(Dashboard {
        product_count: products::count_for_company(conn, company_id)?,
        member_count: companies::member_count(conn, company_id)?,
        summary: sales::summary_for_company(conn, company_id)?,
        recent_sales: sales::list_for_company(conn, company_id, HISTORY_LIMIT)?,
        company,
    })
}
