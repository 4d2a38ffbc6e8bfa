//! Category model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";

/// Description given to categories created on the fly by bulk import
pub const AUTO_CREATED_DESCRIPTION: &str = "Auto-created from CSV import";

/// Category record
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    /// Display color (CSS hex)
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category with the number of items referencing it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub item_count: i64,
}

/// Create category request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 120, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
}
