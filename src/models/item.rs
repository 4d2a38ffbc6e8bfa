//! Item (tracked equipment) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::category::Category;
use super::enums::Condition;
use super::loan::LoanDetails;

/// Item record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Manufacturer serial number, unique when present
    pub serial_number: Option<String>,
    pub category_id: i32,
    pub condition: Condition,
    /// Opaque token encoded in the item's printed code; never reassigned
    pub scan_token: String,
    pub notes: Option<String>,
    /// Soft-delete marker
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Item row in listings, with category name and availability flattened in
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ItemSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: Item,
    pub category_name: String,
    pub is_available: bool,
}

/// Item with category, current loan state and scan URL
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemDetails {
    #[serde(flatten)]
    pub item: Item,
    pub category: Category,
    pub is_available: bool,
    pub active_loan: Option<LoanDetails>,
    pub scan_url: String,
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(max = 200, message = "Name is too long"))]
    pub name: String,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: i32,
    /// Defaults to GOOD
    pub condition: Option<Condition>,
    pub notes: Option<String>,
}

/// Update item request; absent fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateItem {
    #[validate(length(max = 200, message = "Name is too long"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub condition: Option<Condition>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

/// Item listing filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ItemQuery {
    /// Restrict to one category
    pub category_id: Option<i32>,
    /// Case-insensitive search over name, description and serial number
    pub search: Option<String>,
    pub condition: Option<Condition>,
    /// Only active items (default: true)
    pub active_only: Option<bool>,
    /// Filter on availability (no open loan)
    pub available: Option<bool>,
}

/// Build the URL printed into an item's scannable code
pub fn scan_url(public_url: &str, scan_token: &str) -> String {
    format!("{}/scan?item={}", public_url.trim_end_matches('/'), scan_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_url() {
        assert_eq!(
            scan_url("https://gear.example.org/", "QM7K2P9XJ4TB"),
            "https://gear.example.org/scan?item=QM7K2P9XJ4TB"
        );
        assert_eq!(scan_url("http://localhost:8080", "T1"), "http://localhost:8080/scan?item=T1");
    }
}
