//! Packing list models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Packing list record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PackingList {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Date of the outing the list is prepared for
    pub outing_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PackingListSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub list: PackingList,
    pub entry_count: i64,
}

/// Entry of a packing list, with the item name joined in
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PackingListEntry {
    pub id: i32,
    pub packing_list_id: i32,
    pub item_id: i32,
    pub item_name: String,
    pub quantity: i32,
    pub notes: Option<String>,
    pub is_packed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PackingListDetails {
    #[serde(flatten)]
    pub list: PackingList,
    pub entries: Vec<PackingListEntry>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePackingList {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub outing_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePackingList {
    #[validate(length(min = 1, max = 200, message = "Name cannot be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub outing_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddPackingListEntry {
    pub item_id: i32,
    /// Defaults to 1
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePackingListEntry {
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: Option<i32>,
    pub notes: Option<String>,
    pub is_packed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_quantity_must_be_positive() {
        let entry = |quantity| AddPackingListEntry {
            item_id: 1,
            quantity,
            notes: None,
        };
        assert!(entry(None).validate().is_ok());
        assert!(entry(Some(1)).validate().is_ok());
        assert!(entry(Some(0)).validate().is_err());
        assert!(entry(Some(-3)).validate().is_err());
    }

    #[test]
    fn test_entry_update_quantity_must_be_positive() {
        let update = UpdatePackingListEntry {
            quantity: Some(0),
            ..UpdatePackingListEntry::default()
        };
        assert!(update.validate().is_err());

        let packed = UpdatePackingListEntry {
            is_packed: Some(true),
            ..UpdatePackingListEntry::default()
        };
        assert!(packed.validate().is_ok());
    }
}
