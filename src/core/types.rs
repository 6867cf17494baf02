use std::str::FromStr;

use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

use crate::core::error::{AppError, AppResult};

/// Lifecycle of a company listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CompanyStatus {
    #[default]
    Pending,
    Active,
    Rejected,
    Suspended,
}

impl CompanyStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            CompanyStatus::Pending => "⏳",
            CompanyStatus::Active => "✅",
            CompanyStatus::Rejected => "❌",
            CompanyStatus::Suspended => "⛔",
        }
    }

    pub fn can_transition_to(&self, next: CompanyStatus) -> bool {
        use CompanyStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Rejected) | (Active, Suspended) | (Suspended, Active)
        )
    }

    /// Returns `next` if the move is allowed, `InvalidTransition` otherwise.
    pub fn transition(self, next: CompanyStatus) -> AppResult<CompanyStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AppError::transition(self, next))
        }
    }

    /// Products may be added while pending (to prepare a catalogue) or active.
    pub fn accepts_products(&self) -> bool {
        matches!(self, CompanyStatus::Pending | CompanyStatus::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum WithdrawalKind {
    /// Paid out of a user's referral balance
    Referral,
    /// Paid out of a company's billing balance
    Company,
}

impl WithdrawalKind {
    pub fn pending_status(&self) -> WithdrawalStatus {
        match self {
            WithdrawalKind::Referral => WithdrawalStatus::UserPending,
            WithdrawalKind::Company => WithdrawalStatus::CompanyPending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum WithdrawalStatus {
    UserPending,
    CompanyPending,
    Approved,
    Declined,
}

impl WithdrawalStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, WithdrawalStatus::UserPending | WithdrawalStatus::CompanyPending)
    }

    pub fn transition(self, next: WithdrawalStatus) -> AppResult<WithdrawalStatus> {
        let allowed = self.is_pending() && matches!(next, WithdrawalStatus::Approved | WithdrawalStatus::Declined);
        if allowed {
            Ok(next)
        } else {
            Err(AppError::transition(self, next))
        }
    }
}

// All status enums live in TEXT columns using their snake_case names.
macro_rules! text_column {
    ($($ty:ty),+ $(,)?) => {$(
        impl rusqlite::types::FromSql for $ty {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                let s = value.as_str()?;
                <$ty>::from_str(s).map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }

        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                let s: &'static str = self.into();
                Ok(rusqlite::types::ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(s.as_bytes())))
            }
        }
    )+};
}

text_column!(CompanyStatus, ProductStatus, WithdrawalKind, WithdrawalStatus);
