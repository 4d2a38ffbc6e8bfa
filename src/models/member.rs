//! Member model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::MemberRole;

/// Member record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub name: String,
    /// Contact address, unique when present
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: MemberRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member with the number of loans they currently hold
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MemberWithLoans {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub member: Member,
    pub open_loan_count: i64,
}

/// Create member request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[validate(length(max = 200, message = "Name is too long"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Defaults to MEMBER
    pub role: Option<MemberRole>,
}

/// Member listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct MemberQuery {
    /// Only active members (default: false)
    pub active_only: Option<bool>,
}
