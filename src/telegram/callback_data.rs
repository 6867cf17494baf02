//! Typed inline-keyboard payloads.
//!
//! Every button carries a compact `prefix[:arg[:arg]]` string. Telegram caps
//! callback data at 64 bytes, which the longest variant stays far below.

use std::fmt;
use std::str::FromStr;

use strum::{AsRefStr, EnumString};
use thiserror::Error;

/// Admin decision on a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CompanyDecision {
    Approve,
    Reject,
    Suspend,
    Reactivate,
}

/// Which balance a withdrawal prompt draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawSource {
    Referral,
    Company(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackData {
    MainMenu,
    Help,
    Browse { page: i64 },
    Company { id: i64 },
    JoinCompany { id: i64 },
    LeaveCompany { id: i64 },
    GenerateCode { company_id: i64 },
    Products { company_id: i64 },
    Product { id: i64 },
    ToggleFavorite { product_id: i64 },
    ToggleCart { product_id: i64 },
    Profile,
    Favorites,
    Cart,
    ClearCart,
    ReferralHistory,
    Withdraw { source: WithdrawSource },
    LanguageMenu,
    Language { code: String },
    MyCompanies,
    RegisterCompany,
    Dashboard { company_id: i64 },
    AddProduct { company_id: i64 },
    ManageProduct { product_id: i64 },
    EditPrice { product_id: i64 },
    EditQuantity { product_id: i64 },
    ToggleProduct { product_id: i64 },
    StartSale { company_id: i64 },
    SaleProduct { product_id: i64 },
    SkipStep,
    ConfirmSale,
    CancelFlow,
    Admin,
    AdminCompanies,
    AdminCompanyDecision { id: i64, decision: CompanyDecision },
    AdminWithdrawals,
    AdminWithdrawalDecision { id: i64, approve: bool },
    AdminStats,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallbackParseError {
    #[error("unknown callback prefix: {0}")]
    UnknownPrefix(String),
    #[error("malformed callback data: {0}")]
    Malformed(String),
}

impl CallbackData {
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn parse(data: &str) -> Result<Self, CallbackParseError> {
        data.parse()
    }
}

impl fmt::Display for CallbackData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CallbackData::*;
        match self {
            MainMenu => write!(f, "m"),
            Help => write!(f, "h"),
            Browse { page } => write!(f, "b:{}", page),
            Company { id } => write!(f, "c:{}", id),
            JoinCompany { id } => write!(f, "cj:{}", id),
            LeaveCompany { id } => write!(f, "cl:{}", id),
            GenerateCode { company_id } => write!(f, "cg:{}", company_id),
            Products { company_id } => write!(f, "cp:{}", company_id),
            Product { id } => write!(f, "p:{}", id),
            ToggleFavorite { product_id } => write!(f, "pf:{}", product_id),
            ToggleCart { product_id } => write!(f, "pc:{}", product_id),
            Profile => write!(f, "u"),
            Favorites => write!(f, "uf"),
            Cart => write!(f, "uc"),
            ClearCart => write!(f, "ux"),
            ReferralHistory => write!(f, "ur"),
            Withdraw {
                source: WithdrawSource::Referral,
            } => write!(f, "w"),
            Withdraw {
                source: WithdrawSource::Company(id),
            } => write!(f, "w:{}", id),
            LanguageMenu => write!(f, "l"),
            Language { code } => write!(f, "l:{}", code),
            MyCompanies => write!(f, "o"),
            RegisterCompany => write!(f, "or"),
            Dashboard { company_id } => write!(f, "o:{}", company_id),
            AddProduct { company_id } => write!(f, "oa:{}", company_id),
            ManageProduct { product_id } => write!(f, "op:{}", product_id),
            EditPrice { product_id } => write!(f, "oe:{}", product_id),
            EditQuantity { product_id } => write!(f, "oq:{}", product_id),
            ToggleProduct { product_id } => write!(f, "ot:{}", product_id),
            StartSale { company_id } => write!(f, "s:{}", company_id),
            SaleProduct { product_id } => write!(f, "sp:{}", product_id),
            SkipStep => write!(f, "sk"),
            ConfirmSale => write!(f, "sy"),
            CancelFlow => write!(f, "x"),
            Admin => write!(f, "a"),
            AdminCompanies => write!(f, "ac"),
            AdminCompanyDecision { id, decision } => write!(f, "ad:{}:{}", id, decision.as_ref()),
            AdminWithdrawals => write!(f, "aw"),
            AdminWithdrawalDecision { id, approve } => {
                write!(f, "awd:{}:{}", id, if *approve { "a" } else { "d" })
            }
            AdminStats => write!(f, "as"),
        }
    }
}

fn id_arg(data: &str, arg: Option<&str>) -> Result<i64, CallbackParseError> {
    arg.and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| CallbackParseError::Malformed(data.to_string()))
}

impl FromStr for CallbackData {
    type Err = CallbackParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        use CallbackData::*;

        let mut parts = data.split(':');
        let prefix = parts.next().unwrap_or_default();
        let first = parts.next();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(CallbackParseError::Malformed(data.to_string()));
        }

        // Variants without arguments must not carry any
        let bare = |value: CallbackData| {
            if first.is_none() {
                Ok(value)
            } else {
                Err(CallbackParseError::Malformed(data.to_string()))
            }
        };
        let id = || id_arg(data, first);

        match prefix {
            "m" => bare(MainMenu),
            "h" => bare(Help),
            "b" => Ok(Browse { page: id()?.max(0) }),
            "c" => Ok(Company { id: id()? }),
            "cj" => Ok(JoinCompany { id: id()? }),
            "cl" => Ok(LeaveCompany { id: id()? }),
            "cg" => Ok(GenerateCode { company_id: id()? }),
            "cp" => Ok(Products { company_id: id()? }),
            "p" => Ok(Product { id: id()? }),
            "pf" => Ok(ToggleFavorite { product_id: id()? }),
            "pc" => Ok(ToggleCart { product_id: id()? }),
            "u" => bare(Profile),
            "uf" => bare(Favorites),
            "uc" => bare(Cart),
            "ux" => bare(ClearCart),
            "ur" => bare(ReferralHistory),
            "w" => match first {
                None => Ok(Withdraw {
                    source: WithdrawSource::Referral,
                }),
                Some(_) => Ok(Withdraw {
                    source: WithdrawSource::Company(id()?),
                }),
            },
            "l" => match first {
                None => Ok(LanguageMenu),
                Some(code) if !code.is_empty() && code.len() <= 8 => Ok(Language { code: code.to_string() }),
                Some(_) => Err(CallbackParseError::Malformed(data.to_string())),
            },
            "o" => match first {
                None => Ok(MyCompanies),
                Some(_) => Ok(Dashboard { company_id: id()? }),
            },
            "or" => bare(RegisterCompany),
            "oa" => Ok(AddProduct { company_id: id()? }),
            "op" => Ok(ManageProduct { product_id: id()? }),
            "oe" => Ok(EditPrice { product_id: id()? }),
            "oq" => Ok(EditQuantity { product_id: id()? }),
            "ot" => Ok(ToggleProduct { product_id: id()? }),
            "s" => Ok(StartSale { company_id: id()? }),
            "sp" => Ok(SaleProduct { product_id: id()? }),
            "sk" => bare(SkipStep),
            "sy" => bare(ConfirmSale),
            "x" => bare(CancelFlow),
            "a" => bare(Admin),
            "ac" => bare(AdminCompanies),
            "ad" => {
                let decision = second
                    .and_then(|s| CompanyDecision::from_str(s).ok())
                    .ok_or_else(|| CallbackParseError::Malformed(data.to_string()))?;
                Ok(AdminCompanyDecision { id: id()?, decision })
            }
            "aw" => bare(AdminWithdrawals),
            "awd" => {
                let approve = match second {
                    Some("a") => true,
                    Some("d") => false,
                    _ => return Err(CallbackParseError::Malformed(data.to_string())),
                };
                Ok(AdminWithdrawalDecision { id: id()?, approve })
            }
            "as" => bare(AdminStats),
            other => Err(CallbackParseError::UnknownPrefix(other.to_string())),
        }
    }
}
