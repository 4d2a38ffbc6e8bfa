//! Shared domain enums, persisted as upper-case text

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use std::str::FromStr;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

/// Physical condition of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Condition {
    Excellent,
    Good,
    Fair,
    Poor,
    Damaged,
}

impl Condition {
    pub const ALL: [Condition; 5] = [
        Condition::Excellent,
        Condition::Good,
        Condition::Fair,
        Condition::Poor,
        Condition::Damaged,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Excellent => "EXCELLENT",
            Condition::Good => "GOOD",
            Condition::Fair => "FAIR",
            Condition::Poor => "POOR",
            Condition::Damaged => "DAMAGED",
        }
    }

    /// Lenient coercion used by bulk import: unknown or absent values become GOOD
    pub fn coerce(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl Default for Condition {
    fn default() -> Self {
        Condition::Good
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "EXCELLENT" => Ok(Condition::Excellent),
            "GOOD" => Ok(Condition::Good),
            "FAIR" => Ok(Condition::Fair),
            "POOR" => Ok(Condition::Poor),
            "DAMAGED" => Ok(Condition::Damaged),
            _ => Err(format!("Invalid condition: {}", s)),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<Postgres> for Condition {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for Condition {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Condition {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

// ---------------------------------------------------------------------------
// MemberRole
// ---------------------------------------------------------------------------

/// Role of a member within the organisation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    Admin,
    Leader,
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Admin => "ADMIN",
            MemberRole::Leader => "LEADER",
            MemberRole::Member => "MEMBER",
        }
    }

    /// Lenient coercion used by bulk import: unknown or absent values become MEMBER
    pub fn coerce(raw: Option<&str>) -> Self {
        raw.and_then(|s| s.parse().ok()).unwrap_or_default()
    }
}

impl Default for MemberRole {
    fn default() -> Self {
        MemberRole::Member
    }
}

impl FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Ok(MemberRole::Admin),
            "LEADER" => Ok(MemberRole::Leader),
            "MEMBER" => Ok(MemberRole::Member),
            _ => Err(format!("Invalid member role: {}", s)),
        }
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<Postgres> for MemberRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for MemberRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for MemberRole {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}
