//! Loan (checkout) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::enums::Condition;

/// SQL condition selecting open loans (alias `l`)
pub const OPEN_LOAN_SQL: &str = "l.closed_at IS NULL";

/// SQL condition selecting overdue loans (alias `l`, `$1` = now).
/// Must agree with [`is_overdue`].
pub const OVERDUE_LOAN_SQL: &str = "l.closed_at IS NULL AND l.expected_return < $1";

/// A loan is overdue iff it is still open and `now` is past its expected return.
pub fn is_overdue(
    closed_at: Option<DateTime<Utc>>,
    expected_return: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    closed_at.is_none() && now > expected_return
}

/// Whole days elapsed since the expected return (0 when not yet due)
pub fn days_overdue(expected_return: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - expected_return).num_days().max(0)
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub item_id: i32,
    pub member_id: i32,
    pub opened_at: DateTime<Utc>,
    pub expected_return: DateTime<Utc>,
    /// Null while the loan is open
    pub closed_at: Option<DateTime<Utc>>,
    pub condition_out: Condition,
    pub condition_in: Option<Condition>,
    pub checkout_notes: Option<String>,
    pub checkin_notes: Option<String>,
    /// Who opened the loan
    pub opened_by: String,
    /// Who closed the loan
    pub closed_by: Option<String>,
    /// Set once the overdue notice went out
    pub notification_sent: bool,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        is_overdue(self.closed_at, self.expected_return, now)
    }

    pub fn status(&self) -> LoanStatus {
        if self.is_open() {
            LoanStatus::Active
        } else {
            LoanStatus::Returned
        }
    }
}

/// Lifecycle status shown in listings and exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LoanStatus {
    Active,
    Returned,
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanStatus::Active => write!(f, "Active"),
            LoanStatus::Returned => write!(f, "Returned"),
        }
    }
}

/// Loan with item and member names for display
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub loan: Loan,
    pub item_name: String,
    pub member_name: String,
    pub member_email: Option<String>,
    #[sqlx(skip)]
    pub is_overdue: bool,
}

impl LoanDetails {
    /// Compute the derived overdue flag for the given instant
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.is_overdue = self.loan.is_overdue_at(now);
        self
    }
}

/// Checkout request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLoan {
    pub item_id: i32,
    pub member_id: i32,
    /// Must be strictly after the checkout instant
    pub expected_return: DateTime<Utc>,
    pub condition_out: Condition,
    pub notes: Option<String>,
    /// Identifier of the person performing the checkout
    pub actor: String,
}

/// Check-in request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CloseLoan {
    pub condition_in: Condition,
    pub notes: Option<String>,
    /// Identifier of the person receiving the item
    pub actor: String,
}

/// Listing selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanFilter {
    #[default]
    All,
    Active,
    Overdue,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    /// all (default), active or overdue
    pub status: Option<LoanFilter>,
}

/// Overdue loan waiting for its notice, as seen by the scanner
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct OverdueNotice {
    pub loan_id: i32,
    pub expected_return: DateTime<Utc>,
    pub item_name: String,
    pub member_name: String,
    pub member_email: String,
}
