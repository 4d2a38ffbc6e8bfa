//! Bulk import rows and report models.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::item::Item;
use super::member::Member;

/// One loosely-typed input record: column name → raw text (absent or null = missing)
pub type RawRow = IndexMap<String, Option<String>>;

/// Rows are numbered for humans as if a header line preceded them
pub const HEADER_OFFSET: usize = 2;

/// Which registry a batch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    Items,
    Members,
}

/// Outcome of one import call. Always returned, even when every row failed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(ItemImportReport = ImportReport<Item>, MemberImportReport = ImportReport<Member>)]
pub struct ImportReport<T> {
    pub success: usize,
    pub failed: usize,
    /// One message per failed row, e.g. `Row 3: Email 'x' already exists`
    pub errors: Vec<String>,
    /// Batch-level remarks (ignored columns)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Entities created, in input order
    pub created: Vec<T>,
}

impl<T> Default for ImportReport<T> {
    fn default() -> Self {
        Self {
            success: 0,
            failed: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            created: Vec::new(),
        }
    }
}

impl<T> ImportReport<T> {
    pub fn record_success(&mut self, entity: T) {
        self.success += 1;
        self.created.push(entity);
    }

    pub fn record_failure(&mut self, row_number: usize, message: impl std::fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("Row {}: {}", row_number, message));
    }
}
